// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Cached roster data (team list and per-team activities).

use serde::{Deserialize, Serialize};

use crate::models::Activity;

/// Roster payload stored in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum RosterData {
    Teams(Vec<String>),
    Activities(Vec<Activity>),
}

/// Cache entry with its fetch time (milliseconds since the Unix epoch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRoster {
    pub fetched_at: i64,
    pub data: RosterData,
}

impl CachedRoster {
    /// Whether the entry is younger than `max_age_days`.
    pub fn is_fresh(&self, now_millis: i64, max_age_days: i64) -> bool {
        now_millis - self.fetched_at < max_age_days * 24 * 60 * 60 * 1000
    }
}
