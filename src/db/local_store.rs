// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JSON-document store with typed operations.
//!
//! Provides high-level operations for:
//! - Identity (signed-in email and selected team)
//! - Pending activity counts per (user, day)
//! - Running totals per (user, day)
//! - Sync history per (user, day)
//! - Sync timer state and last-sync time
//! - Roster cache and activity display order
//!
//! Every mutation runs against a copy of the document, is written to disk
//! (temp file + rename) and only then replaces the in-memory state, so a
//! failed write leaves both untouched.

use crate::db::keys;
use crate::error::{AppError, Result};
use crate::models::{
    AlarmState, CachedRoster, FlushedActivity, PendingActivityRecord, PendingDay, RunningTotals,
    StoredIdentity, SyncHistoryEntry,
};
use crate::time_utils::{days_between, parse_day_key};
use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

/// Records keyed by user email, then day key.
type PerUserDay<T> = BTreeMap<String, BTreeMap<String, T>>;

/// The whole persisted document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub identity: StoredIdentity,
    #[serde(default)]
    pub pending: PerUserDay<PendingDay>,
    #[serde(default)]
    pub running_totals: PerUserDay<RunningTotals>,
    #[serde(default)]
    pub sync_history: PerUserDay<Vec<SyncHistoryEntry>>,
    #[serde(default)]
    pub last_sync_timestamp: Option<i64>,
    #[serde(default)]
    pub alarm: Option<AlarmState>,
    #[serde(default)]
    pub roster_cache: BTreeMap<String, CachedRoster>,
    #[serde(default)]
    pub activity_order: BTreeMap<String, Vec<String>>,
}

/// Local store handle. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LocalStore {
    path: Option<PathBuf>,
    data: Arc<Mutex<StoreData>>,
}

impl LocalStore {
    /// Open (or create) the store backed by a JSON file.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create data dir: {}", e)))?;
        }

        let data = load_document(&path).await?;
        tracing::info!(path = %path.display(), "Opened local store");

        Ok(Self {
            path: Some(path),
            data: Arc::new(Mutex::new(data)),
        })
    }

    /// Create a store that lives only in memory (tests, dry runs).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Arc::new(Mutex::new(StoreData::default())),
        }
    }

    /// Run a read-only closure against the document.
    async fn read<R>(&self, f: impl FnOnce(&StoreData) -> R) -> R {
        let guard = self.data.lock().await;
        f(&guard)
    }

    /// Apply a mutation as one durable transaction.
    async fn update<R>(&self, f: impl FnOnce(&mut StoreData) -> R) -> Result<R> {
        let mut guard = self.data.lock().await;
        let mut next = guard.clone();
        let out = f(&mut next);
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }

    async fn persist(&self, data: &StoreData) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let payload = serde_json::to_vec_pretty(data).context("Failed to serialize store")?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write store: {}", e)))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to replace store: {}", e)))?;
        Ok(())
    }

    // ─── Identity ────────────────────────────────────────────────

    pub async fn identity(&self) -> StoredIdentity {
        self.read(|d| d.identity.clone()).await
    }

    pub async fn set_identity_email(&self, email: &str) -> Result<()> {
        let email = email.to_string();
        self.update(|d| d.identity.email = Some(email)).await
    }

    pub async fn set_team(&self, team: Option<&str>) -> Result<()> {
        let team = team.map(str::to_string);
        self.update(|d| d.identity.team = team).await
    }

    /// Forget the signed-in user and team.
    pub async fn clear_identity(&self) -> Result<()> {
        self.update(|d| d.identity = StoredIdentity::default()).await
    }

    // ─── Pending Counts ──────────────────────────────────────────

    /// Pending records for (user, day), if the day was ever touched.
    pub async fn pending_day(&self, user: &str, day: &str) -> Option<PendingDay> {
        self.read(|d| d.pending.get(user).and_then(|days| days.get(day)).cloned())
            .await
    }

    /// Set the absolute pending count of one activity.
    pub async fn set_pending_count(
        &self,
        user: &str,
        day: &str,
        team: Option<&str>,
        activity_id: &str,
        count: u64,
        name: &str,
    ) -> Result<PendingActivityRecord> {
        self.update(|d| {
            let pending = d
                .pending
                .entry(user.to_string())
                .or_default()
                .entry(day.to_string())
                .or_default();
            if team.is_some() {
                pending.team = team.map(str::to_string);
            }
            pending.set_count(activity_id, count, name).clone()
        })
        .await
    }

    // ─── Running Totals ──────────────────────────────────────────

    /// Persisted running totals, `None` if none were ever stored.
    pub async fn running_totals(&self, user: &str, day: &str) -> Option<RunningTotals> {
        self.read(|d| {
            d.running_totals
                .get(user)
                .and_then(|days| days.get(day))
                .cloned()
        })
        .await
    }

    /// Overwrite the running totals for (user, day).
    pub async fn set_running_totals(
        &self,
        user: &str,
        day: &str,
        totals: &RunningTotals,
    ) -> Result<()> {
        let totals = totals.clone();
        self.update(|d| {
            d.running_totals
                .entry(user.to_string())
                .or_default()
                .insert(day.to_string(), totals);
        })
        .await
    }

    // ─── Sync History ────────────────────────────────────────────

    pub async fn sync_history(&self, user: &str, day: &str) -> Vec<SyncHistoryEntry> {
        self.read(|d| {
            d.sync_history
                .get(user)
                .and_then(|days| days.get(day))
                .cloned()
                .unwrap_or_default()
        })
        .await
    }

    /// Drop history days that are `retention_days` or more calendar days
    /// before `today`. A day is measured from its local midnight, so a key
    /// exactly `retention_days` old has already aged past the window.
    ///
    /// Returns the number of day keys removed.
    pub async fn purge_sync_history(
        &self,
        user: &str,
        today: NaiveDate,
        retention_days: i64,
    ) -> Result<usize> {
        let expired: Vec<String> = self
            .read(|d| {
                d.sync_history
                    .get(user)
                    .map(|days| {
                        days.keys()
                            .filter(|key| {
                                parse_day_key(key)
                                    .is_some_and(|day| days_between(day, today) >= retention_days)
                            })
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .await;

        if expired.is_empty() {
            return Ok(0);
        }

        self.update(|d| {
            if let Some(days) = d.sync_history.get_mut(user) {
                for key in &expired {
                    days.remove(key);
                }
            }
        })
        .await?;

        Ok(expired.len())
    }

    // ─── Atomic Flush Commit ─────────────────────────────────────

    /// Record a confirmed flush: settle the pending counts, append the
    /// history entry and bump the running totals, all in one write.
    ///
    /// Returns the running totals after the bump.
    pub async fn commit_flush(
        &self,
        user: &str,
        day: &str,
        flushed: &[FlushedActivity],
        entry: SyncHistoryEntry,
    ) -> Result<RunningTotals> {
        self.update(|d| {
            if let Some(pending) = d.pending.get_mut(user).and_then(|days| days.get_mut(day)) {
                pending.settle(flushed);
            }

            d.sync_history
                .entry(user.to_string())
                .or_default()
                .entry(day.to_string())
                .or_default()
                .push(entry);

            let totals = d
                .running_totals
                .entry(user.to_string())
                .or_default()
                .entry(day.to_string())
                .or_default();
            totals.apply_flushed(flushed);
            totals.clone()
        })
        .await
    }

    // ─── Sync Timer ──────────────────────────────────────────────

    pub async fn last_sync_timestamp(&self) -> Option<i64> {
        self.read(|d| d.last_sync_timestamp).await
    }

    pub async fn set_last_sync_timestamp(&self, millis: i64) -> Result<()> {
        self.update(|d| d.last_sync_timestamp = Some(millis)).await
    }

    pub async fn alarm(&self) -> Option<AlarmState> {
        self.read(|d| d.alarm.clone()).await
    }

    pub async fn set_alarm(&self, alarm: Option<AlarmState>) -> Result<()> {
        self.update(|d| d.alarm = alarm).await
    }

    // ─── Roster Cache ────────────────────────────────────────────

    pub async fn cached_roster(&self, key: &str) -> Option<CachedRoster> {
        self.read(|d| d.roster_cache.get(key).cloned()).await
    }

    pub async fn set_cached_roster(&self, key: &str, entry: CachedRoster) -> Result<()> {
        let key = key.to_string();
        self.update(|d| {
            d.roster_cache.insert(key, entry);
        })
        .await
    }

    /// Remove every roster cache entry that belongs to `user`.
    pub async fn clear_user_cache(&self, user: &str) -> Result<usize> {
        let suffix = keys::roster_cache_suffix(user);
        self.update(|d| {
            let before = d.roster_cache.len();
            d.roster_cache
                .retain(|key, _| !(key.starts_with("cache_") && key.ends_with(&suffix)));
            before - d.roster_cache.len()
        })
        .await
    }

    // ─── Activity Order ──────────────────────────────────────────

    pub async fn activity_order(&self, user: &str, team: &str) -> Option<Vec<String>> {
        let key = keys::user_team(user, team);
        self.read(|d| d.activity_order.get(&key).cloned()).await
    }

    pub async fn set_activity_order(&self, user: &str, team: &str, order: Vec<String>) -> Result<()> {
        let key = keys::user_team(user, team);
        self.update(|d| {
            d.activity_order.insert(key, order);
        })
        .await
    }
}

/// Load the document, treating a missing file as an empty store.
async fn load_document(path: &Path) -> Result<StoreData> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to parse store");
            AppError::Storage(format!("Failed to parse store: {}", e))
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(StoreData::default()),
        Err(err) => Err(AppError::Storage(format!("Failed to read store: {}", err))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::day_key;
    use chrono::Duration;

    const USER: &str = "a@x.com";
    const DAY: &str = "2024-05-01";

    fn flushed(id: &str, count: u64) -> FlushedActivity {
        FlushedActivity {
            id: id.to_string(),
            count,
        }
    }

    #[tokio::test]
    async fn test_commit_flush_updates_all_three_records() {
        let store = LocalStore::in_memory();
        store
            .set_pending_count(USER, DAY, Some("Eng"), "a", 3, "Alpha")
            .await
            .unwrap();
        store
            .set_pending_count(USER, DAY, Some("Eng"), "c", 5, "Gamma")
            .await
            .unwrap();

        let batch = vec![flushed("a", 3), flushed("c", 5)];
        let totals = store
            .commit_flush(
                USER,
                DAY,
                &batch,
                SyncHistoryEntry {
                    timestamp: 1,
                    date_key: DAY.to_string(),
                    activities: batch.clone(),
                },
            )
            .await
            .unwrap();

        assert_eq!(totals.get("a"), 3);
        assert_eq!(totals.get("c"), 5);

        let pending = store.pending_day(USER, DAY).await.unwrap();
        assert_eq!(pending.get("a").unwrap().count, 0);
        assert_eq!(pending.get("c").unwrap().name, "Gamma");
        assert_eq!(pending.team.as_deref(), Some("Eng"));
        assert_eq!(store.sync_history(USER, DAY).await.len(), 1);
    }

    #[tokio::test]
    async fn test_purge_sync_history_retention() {
        let store = LocalStore::in_memory();
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();

        for age in [0, 6, 7, 8, 30] {
            let key = day_key(today - Duration::days(age));
            store
                .commit_flush(
                    USER,
                    &key,
                    &[flushed("a", 1)],
                    SyncHistoryEntry {
                        timestamp: age,
                        date_key: key.clone(),
                        activities: vec![flushed("a", 1)],
                    },
                )
                .await
                .unwrap();
        }

        let removed = store.purge_sync_history(USER, today, 7).await.unwrap();
        assert_eq!(removed, 3);

        for (age, kept) in [(0, true), (6, true), (7, false), (8, false), (30, false)] {
            let key = day_key(today - Duration::days(age));
            assert_eq!(
                !store.sync_history(USER, &key).await.is_empty(),
                kept,
                "history {} days old",
                age
            );
        }
    }

    #[tokio::test]
    async fn test_clear_user_cache_only_touches_that_user() {
        let store = LocalStore::in_memory();
        let entry = CachedRoster {
            fetched_at: 0,
            data: crate::models::RosterData::Teams(vec![]),
        };
        store
            .set_cached_roster(&keys::roster_cache("teams", "", USER), entry.clone())
            .await
            .unwrap();
        store
            .set_cached_roster(&keys::roster_cache("teams", "", "b@x.com"), entry)
            .await
            .unwrap();

        assert_eq!(store.clear_user_cache(USER).await.unwrap(), 1);
        assert!(store
            .cached_roster(&keys::roster_cache("teams", "", "b@x.com"))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        {
            let store = LocalStore::open(&path).await.unwrap();
            store.set_identity_email(USER).await.unwrap();
            store.set_team(Some("Eng")).await.unwrap();
            store
                .set_pending_count(USER, DAY, Some("Eng"), "build", 5, "Build")
                .await
                .unwrap();
            store.set_last_sync_timestamp(42).await.unwrap();
        }

        let reopened = LocalStore::open(&path).await.unwrap();
        let identity = reopened.identity().await;
        assert_eq!(identity.email.as_deref(), Some(USER));
        assert_eq!(identity.team.as_deref(), Some("Eng"));
        assert_eq!(
            reopened
                .pending_day(USER, DAY)
                .await
                .unwrap()
                .get("build")
                .unwrap()
                .count,
            5
        );
        assert_eq!(reopened.last_sync_timestamp().await, Some(42));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{not json").unwrap();

        assert!(matches!(
            LocalStore::open(&path).await,
            Err(AppError::Storage(_))
        ));
    }
}
