// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync history retention.

use crate::db::LocalStore;
use chrono::Local;

/// Drop a user's history days older than `retention_days`.
///
/// Failures are logged and reported as zero removals; the next purge retries.
pub async fn purge_expired(store: &LocalStore, user: &str, retention_days: i64) -> usize {
    let today = Local::now().date_naive();
    match store.purge_sync_history(user, today, retention_days).await {
        Ok(0) => 0,
        Ok(removed) => {
            tracing::info!(user, removed, retention_days, "Purged expired sync history");
            removed
        }
        Err(e) => {
            tracing::warn!(user, error = %e, "Failed to purge sync history");
            0
        }
    }
}
