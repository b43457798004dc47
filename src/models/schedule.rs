// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Persisted state of the periodic sync timer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single named sync timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmState {
    pub name: String,
    pub period_secs: u64,
    pub next_fire: DateTime<Utc>,
}
