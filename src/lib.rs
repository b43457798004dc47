// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity-Tally: per-day activity counts synced to a shared spreadsheet
//!
//! This crate provides the local background service for an activity logger:
//! pending counts, periodic flushes to a Google Sheets log and running totals
//! reconciled against that log.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{SyncScheduler, SyncService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sync: Arc<SyncService>,
    pub scheduler: SyncScheduler,
}
