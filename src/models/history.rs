// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Sync history journal entries.

use serde::{Deserialize, Serialize};

use crate::models::FlushedActivity;

/// Record of one confirmed flush, kept locally as a fallback source for
/// running totals. The remote log stays authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncHistoryEntry {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub date_key: String,
    pub activities: Vec<FlushedActivity>,
}
