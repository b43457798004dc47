// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Flush engine: uploads a day's pending counts to the remote log.
//!
//! One attempt:
//! 1. Check the session (signed in, team selected)
//! 2. Snapshot the non-zero pending records into a batch
//! 3. Append the whole batch in a single remote call
//! 4. On success, commit settle + history + running totals in one store write
//!
//! Nothing local changes unless the remote append succeeded.

use crate::config::Config;
use crate::db::{keys, LocalStore};
use crate::models::{FlushBatch, FlushedActivity, RunningTotals, Session, SyncHistoryEntry};
use crate::services::history;
use crate::services::sheets::SheetsApi;
use crate::time_utils::{format_log_timestamp, now_millis};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// `Failed` error text when the remote log asked us to back off.
pub const RATE_LIMITED_ERROR: &str = "Sheets is busy, will retry at the next sync";

/// Per-(user, day) locks shared by the flush engine and the reconciler.
pub type FlushLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Get (or create) the lock guarding one (user, day).
pub fn day_lock(locks: &FlushLocks, user: &str, day: &str) -> Arc<Mutex<()>> {
    locks
        .entry(keys::user_day(user, day))
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Why a flush attempt did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotSignedIn,
    NoTeam,
    NothingPending,
    /// Another flush for the same (user, day) holds the lock
    InFlight,
    /// Credential missing or rejected; the user has to sign in again
    AuthRequired(String),
}

/// Result of one flush attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Skipped(SkipReason),
    Flushed {
        flushed: Vec<FlushedActivity>,
        totals: RunningTotals,
    },
    Failed {
        error: String,
    },
}

impl FlushOutcome {
    /// `{id, count}` pairs actually uploaded (empty unless flushed).
    pub fn flushed_activities(&self) -> &[FlushedActivity] {
        match self {
            FlushOutcome::Flushed { flushed, .. } => flushed,
            _ => &[],
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FlushOutcome::Failed { .. })
    }
}

/// Uploads pending counts and records confirmed flushes.
#[derive(Clone)]
pub struct FlushEngine {
    store: LocalStore,
    sheets: Arc<dyn SheetsApi>,
    locks: FlushLocks,
    logs_range: String,
    retention_days: i64,
}

impl FlushEngine {
    pub fn new(
        store: LocalStore,
        sheets: Arc<dyn SheetsApi>,
        locks: FlushLocks,
        config: &Config,
    ) -> Self {
        Self {
            store,
            sheets,
            locks,
            logs_range: config.logs_range.clone(),
            retention_days: config.sync_history_retention_days,
        }
    }

    /// Try to flush the pending counts of `session`'s user for `day`.
    ///
    /// Never returns an error: every fault is folded into the outcome.
    pub async fn attempt_flush(&self, session: Option<&Session>, day: &str) -> FlushOutcome {
        let Some(session) = session else {
            tracing::debug!(day, "Flush skipped: not signed in");
            return FlushOutcome::Skipped(SkipReason::NotSignedIn);
        };
        if !session.is_ready() {
            tracing::debug!(user = %session.user_email, day, "Flush skipped: no team");
            return FlushOutcome::Skipped(SkipReason::NoTeam);
        }
        let user = session.user_email.as_str();

        let lock = day_lock(&self.locks, user, day);
        let Ok(_guard) = lock.try_lock() else {
            tracing::info!(user, day, "Flush skipped: already in flight");
            return FlushOutcome::Skipped(SkipReason::InFlight);
        };

        let pending = self
            .store
            .pending_day(user, day)
            .await
            .filter(|p| !p.is_idle());
        let timestamp = format_log_timestamp(Utc::now());
        let Some(batch) = pending.and_then(|p| FlushBatch::capture(&p, user, timestamp)) else {
            tracing::debug!(user, day, "Flush skipped: nothing pending");
            return FlushOutcome::Skipped(SkipReason::NothingPending);
        };

        tracing::info!(
            user,
            day,
            rows = batch.entries().len(),
            timestamp = batch.timestamp(),
            "Appending batch to remote log"
        );
        let rows = batch.rows();

        if let Err(e) = self.sheets.append_rows(&self.logs_range, rows).await {
            if e.is_auth_error() {
                tracing::warn!(user, day, error = %e, "Flush needs re-authentication");
                return FlushOutcome::Skipped(SkipReason::AuthRequired(e.to_string()));
            }
            if e.is_rate_limited() {
                tracing::warn!(user, day, "Remote log rate limited, retrying next cycle");
                return FlushOutcome::Failed {
                    error: RATE_LIMITED_ERROR.to_string(),
                };
            }
            tracing::error!(user, day, error = %e, "Remote append failed, pending counts kept");
            return FlushOutcome::Failed {
                error: e.to_string(),
            };
        }

        let flushed = batch.flushed();
        let entry = SyncHistoryEntry {
            timestamp: now_millis(),
            date_key: day.to_string(),
            activities: flushed.clone(),
        };

        let totals = match self.store.commit_flush(user, day, &flushed, entry).await {
            Ok(totals) => totals,
            Err(e) => {
                // Rows are already in the remote log; the reconciler will
                // pick them up, but the pending counts will go out again.
                tracing::error!(
                    user,
                    day,
                    error = %e,
                    "Remote append succeeded but local commit failed"
                );
                return FlushOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        tracing::info!(
            user,
            day,
            activities = flushed.len(),
            total = totals.grand_total(),
            "Flush committed"
        );

        history::purge_expired(&self.store, user, self.retention_days).await;

        FlushOutcome::Flushed { flushed, totals }
    }
}
