// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod batch;
pub mod history;
pub mod roster;
pub mod schedule;
pub mod totals;
pub mod user;

pub use activity::{Activity, PendingActivityRecord, PendingDay};
pub use batch::{FlushBatch, FlushedActivity};
pub use history::SyncHistoryEntry;
pub use roster::{CachedRoster, RosterData};
pub use schedule::AlarmState;
pub use totals::RunningTotals;
pub use user::{Session, StoredIdentity};
