// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Messages pushed from the sync core to the UI.

use crate::models::FlushedActivity;
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Outbound UI message, serialized with an `action` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SyncEvent {
    /// Progress or error text for the status line
    #[serde(rename_all = "camelCase")]
    UpdateSyncStatus {
        #[serde(skip_serializing_if = "Option::is_none")]
        status_message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A scheduled sync finished; the UI clears flushed counts
    #[serde(rename = "syncCompleteAndClearUI", rename_all = "camelCase")]
    SyncCompleteAndClearUI {
        #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
        last_sync_timestamp: Option<i64>,
        #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
        next_sync_in_seconds: Option<i64>,
        flushed_activities: Vec<FlushedActivity>,
    },
}

impl SyncEvent {
    pub fn status(message: impl Into<String>) -> Self {
        SyncEvent::UpdateSyncStatus {
            status_message: Some(message.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SyncEvent::UpdateSyncStatus {
            status_message: None,
            error: Some(message.into()),
        }
    }
}
