// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity roster entries and the per-day pending counts.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A countable activity defined by the team roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Activity {
    /// Stable roster ID (column B of the roster sheet)
    pub id: String,
    /// Display name, also written into log rows
    pub name: String,
}

/// Not-yet-sent count for one activity on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingActivityRecord {
    pub id: String,
    pub count: u64,
    pub name: String,
}

/// All pending records for one (user, day), in first-touched order.
///
/// An absent record means the activity was never touched; a zero count means
/// nothing is pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDay {
    #[serde(default)]
    pub activities: Vec<PendingActivityRecord>,
    /// Team selected when the day was last edited
    #[serde(default)]
    pub team: Option<String>,
}

impl PendingDay {
    /// Look up a record by activity ID.
    pub fn get(&self, activity_id: &str) -> Option<&PendingActivityRecord> {
        self.activities.iter().find(|r| r.id == activity_id)
    }

    /// Set the absolute pending count for an activity, creating the record
    /// on first touch.
    pub fn set_count(&mut self, activity_id: &str, count: u64, name: &str) -> &PendingActivityRecord {
        let index = match self.activities.iter().position(|r| r.id == activity_id) {
            Some(index) => {
                let record = &mut self.activities[index];
                record.count = count;
                record.name = name.to_string();
                index
            }
            None => {
                self.activities.push(PendingActivityRecord {
                    id: activity_id.to_string(),
                    count,
                    name: name.to_string(),
                });
                self.activities.len() - 1
            }
        };
        &self.activities[index]
    }

    /// True when no record carries a non-zero count.
    pub fn is_idle(&self) -> bool {
        self.activities.iter().all(|r| r.count == 0)
    }

    /// Remove flushed amounts from the pending counts, keeping every record.
    ///
    /// Counts raised while the flush was in flight keep the difference.
    pub fn settle(&mut self, flushed: &[super::FlushedActivity]) {
        for item in flushed {
            if let Some(record) = self.activities.iter_mut().find(|r| r.id == item.id) {
                record.count = record.count.saturating_sub(item.count);
            }
        }
    }
}
