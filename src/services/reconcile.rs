// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Running total reconciliation.
//!
//! The remote log is the source of truth. Totals are rebuilt from it when it
//! can be read, from the local sync history when it cannot, and checked once
//! per session start so a corrupted or missing cache heals itself.

use crate::db::LocalStore;
use crate::error::Result;
use crate::models::{Activity, RunningTotals, Session};
use crate::services::flush::{day_lock, FlushLocks};
use crate::services::sheets::SheetsApi;
use crate::time_utils::day_key_from_timestamp;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Where recomputed totals came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum TotalsSource {
    Remote,
    History,
    None,
}

/// Recomputed totals and their source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recomputed {
    pub totals: RunningTotals,
    pub source: TotalsSource,
}

/// What `validate_and_correct` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Stored totals were empty or all zero while history had entries
    Recomputed(TotalsSource),
    /// No stored totals; remote rows were adopted
    AdoptedRemote,
    Unchanged,
}

/// Sum remote log rows `[timestamp, user, activity name, count]` for one
/// (user, day).
///
/// Rows that are too short, belong to another user or day, or name an
/// unknown activity are ignored (this also skips a header row). Counts that
/// do not parse contribute 0.
pub fn totals_from_rows(
    rows: &[Vec<String>],
    user: &str,
    day: &str,
    name_to_id: &HashMap<String, String>,
) -> RunningTotals {
    let mut totals = RunningTotals::new();
    for row in rows {
        let [timestamp, email, name, count, ..] = row.as_slice() else {
            continue;
        };
        if email.trim() != user {
            continue;
        }
        if day_key_from_timestamp(timestamp).as_deref() != Some(day) {
            continue;
        }
        let Some(id) = name_to_id.get(name.trim()) else {
            continue;
        };
        totals.add(id, parse_count(count));
    }
    totals
}

/// Parse a count cell; anything that is not a non-negative number is 0.
fn parse_count(raw: &str) -> u64 {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => n.trunc() as u64,
        _ => 0,
    }
}

/// Rebuilds and validates running totals.
#[derive(Clone)]
pub struct Reconciler {
    store: LocalStore,
    sheets: Arc<dyn SheetsApi>,
    locks: FlushLocks,
    logs_range: String,
}

impl Reconciler {
    pub fn new(
        store: LocalStore,
        sheets: Arc<dyn SheetsApi>,
        locks: FlushLocks,
        logs_range: String,
    ) -> Self {
        Self {
            store,
            sheets,
            locks,
            logs_range,
        }
    }

    /// Activity name to ID, from the roster plus names seen in pending records.
    async fn name_index(&self, user: &str, day: &str, activities: &[Activity]) -> HashMap<String, String> {
        let mut index: HashMap<String, String> = HashMap::new();
        if let Some(pending) = self.store.pending_day(user, day).await {
            for record in pending.activities {
                index.insert(record.name, record.id);
            }
        }
        for activity in activities {
            index.insert(activity.name.clone(), activity.id.clone());
        }
        index
    }

    /// Read and sum the remote log for (user, day).
    async fn remote_totals(
        &self,
        user: &str,
        day: &str,
        activities: &[Activity],
    ) -> Result<RunningTotals> {
        let rows = self.sheets.get_values(&self.logs_range).await?;
        let index = self.name_index(user, day, activities).await;
        let totals = totals_from_rows(&rows, user, day, &index);
        tracing::debug!(
            user,
            day,
            rows = rows.len(),
            total = totals.grand_total(),
            "Summed remote log"
        );
        Ok(totals)
    }

    /// Rebuild the running totals for (user, day) and persist them.
    ///
    /// Waits for any in-flight flush of the same day.
    pub async fn recompute(
        &self,
        session: &Session,
        day: &str,
        activities: &[Activity],
    ) -> Result<Recomputed> {
        let lock = day_lock(&self.locks, &session.user_email, day);
        let _guard = lock.lock().await;
        self.recompute_locked(&session.user_email, day, activities)
            .await
    }

    async fn recompute_locked(
        &self,
        user: &str,
        day: &str,
        activities: &[Activity],
    ) -> Result<Recomputed> {
        let (mut totals, source) = match self.remote_totals(user, day, activities).await {
            Ok(totals) => (totals, TotalsSource::Remote),
            Err(e) => {
                let history = self.store.sync_history(user, day).await;
                tracing::warn!(
                    user,
                    day,
                    error = %e,
                    history_entries = history.len(),
                    "Remote log unavailable, recomputing from sync history"
                );
                if history.is_empty() {
                    (RunningTotals::new(), TotalsSource::None)
                } else {
                    (RunningTotals::from_history(&history), TotalsSource::History)
                }
            }
        };

        totals.fill_missing(activities);
        self.store.set_running_totals(user, day, &totals).await?;

        tracing::info!(
            user,
            day,
            source = ?source,
            total = totals.grand_total(),
            "Running totals recomputed"
        );
        Ok(Recomputed { totals, source })
    }

    /// Session-start consistency check for (user, day).
    pub async fn validate_and_correct(
        &self,
        session: &Session,
        day: &str,
        activities: &[Activity],
    ) -> Result<ReconcileAction> {
        let user = session.user_email.as_str();
        let lock = day_lock(&self.locks, user, day);
        let _guard = lock.lock().await;

        let stored = self.store.running_totals(user, day).await;
        let history = self.store.sync_history(user, day).await;

        if stored.as_ref().map_or(true, RunningTotals::is_all_zero) && !history.is_empty() {
            tracing::info!(
                user,
                day,
                history_entries = history.len(),
                "Stored totals empty but history present, recomputing"
            );
            let recomputed = self.recompute_locked(user, day, activities).await?;
            return Ok(ReconcileAction::Recomputed(recomputed.source));
        }

        if stored.is_none() {
            match self.remote_totals(user, day, activities).await {
                Ok(mut totals) if !totals.is_empty() => {
                    totals.fill_missing(activities);
                    self.store.set_running_totals(user, day, &totals).await?;
                    tracing::info!(
                        user,
                        day,
                        total = totals.grand_total(),
                        "Adopted running totals from remote log"
                    );
                    return Ok(ReconcileAction::AdoptedRemote);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(user, day, error = %e, "Remote log unavailable at session start");
                }
            }
        }

        Ok(ReconcileAction::Unchanged)
    }
}
