// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Running totals per (user, day).
//!
//! Totals are derived data: recomputed from the remote log when possible,
//! from the local sync history otherwise, and bumped incrementally after
//! each confirmed flush.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Activity, FlushedActivity, SyncHistoryEntry};

/// Cumulative remotely-confirmed count per activity ID.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunningTotals {
    counts: BTreeMap<String, u64>,
}

impl RunningTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, activity_id: &str) -> u64 {
        self.counts.get(activity_id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, activity_id: &str, count: u64) {
        self.counts.insert(activity_id.to_string(), count);
    }

    /// Add `count` to one activity.
    pub fn add(&mut self, activity_id: &str, count: u64) {
        let entry = self.counts.entry(activity_id.to_string()).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Add the amounts of a confirmed flush.
    pub fn apply_flushed(&mut self, flushed: &[FlushedActivity]) {
        for item in flushed {
            self.add(&item.id, item.count);
        }
    }

    /// Sum a day's sync history.
    pub fn from_history(entries: &[SyncHistoryEntry]) -> Self {
        let mut totals = Self::new();
        for entry in entries {
            totals.apply_flushed(&entry.activities);
        }
        totals
    }

    /// Ensure every roster activity has an entry (zero if unseen).
    pub fn fill_missing(&mut self, activities: &[Activity]) {
        for activity in activities {
            self.counts.entry(activity.id.clone()).or_insert(0);
        }
    }

    /// True when no activity has a non-zero total (vacuously true when empty).
    pub fn is_all_zero(&self) -> bool {
        self.counts.values().all(|c| *c == 0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum over all activities.
    pub fn grand_total(&self) -> u64 {
        self.counts.values().fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }
}
