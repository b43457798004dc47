// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Flush batches: the immutable snapshot sent to the remote log.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::PendingDay;

/// One activity amount included in a confirmed flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct FlushedActivity {
    pub id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub count: u64,
}

/// Row captured into a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub id: String,
    pub name: String,
    pub count: u64,
}

/// Non-zero pending records at the moment a flush begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushBatch {
    timestamp: String,
    user_email: String,
    entries: Vec<BatchEntry>,
}

impl FlushBatch {
    /// Snapshot the non-zero records of a pending day.
    ///
    /// Returns `None` when nothing is pending.
    pub fn capture(pending: &PendingDay, user_email: &str, timestamp: String) -> Option<Self> {
        let entries: Vec<BatchEntry> = pending
            .activities
            .iter()
            .filter(|r| r.count > 0)
            .map(|r| BatchEntry {
                id: r.id.clone(),
                name: r.name.clone(),
                count: r.count,
            })
            .collect();

        if entries.is_empty() {
            return None;
        }

        Some(Self {
            timestamp,
            user_email: user_email.to_string(),
            entries,
        })
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Log rows `[timestamp, user, activity name, count]` in capture order.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        self.entries
            .iter()
            .map(|e| {
                vec![
                    json!(self.timestamp),
                    json!(self.user_email),
                    json!(e.name),
                    json!(e.count),
                ]
            })
            .collect()
    }

    /// The `{id, count}` pairs this batch carries.
    pub fn flushed(&self) -> Vec<FlushedActivity> {
        self.entries
            .iter()
            .map(|e| FlushedActivity {
                id: e.id.clone(),
                count: e.count,
            })
            .collect()
    }
}
