// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use activity_tally::config::Config;
use activity_tally::db::LocalStore;
use activity_tally::error::AppError;
use activity_tally::models::Session;
use activity_tally::routes::create_router;
use activity_tally::services::{SheetsApi, StaticIdentity, SyncScheduler, SyncService};
use activity_tally::AppState;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[allow(dead_code)]
pub const USER: &str = "a@x.com";
#[allow(dead_code)]
pub const TEAM: &str = "Eng";

/// How the fake Sheets API should fail appends.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendFailure {
    Auth,
    RateLimit,
    Remote,
}

/// In-memory stand-in for the Google Sheets API.
///
/// Appended rows are recorded and also become readable from the log range.
#[derive(Default)]
pub struct FakeSheets {
    appends: Mutex<Vec<(String, Vec<Vec<Value>>)>>,
    append_attempts: Mutex<usize>,
    log_rows: Mutex<Vec<Vec<String>>>,
    roster_rows: Mutex<Vec<Vec<String>>>,
    append_failure: Mutex<Option<AppendFailure>>,
    fail_reads: Mutex<bool>,
    append_delay: Mutex<Option<Duration>>,
}

#[allow(dead_code)]
impl FakeSheets {
    pub fn new() -> Arc<Self> {
        let fake = Self::default();
        *fake.roster_rows.lock().unwrap() = default_roster();
        Arc::new(fake)
    }

    /// Every append call as (range, rows).
    pub fn appends(&self) -> Vec<(String, Vec<Vec<Value>>)> {
        self.appends.lock().unwrap().clone()
    }

    /// Successful appends.
    pub fn append_count(&self) -> usize {
        self.appends.lock().unwrap().len()
    }

    /// Append calls, including failed ones.
    pub fn append_attempts(&self) -> usize {
        *self.append_attempts.lock().unwrap()
    }

    pub fn set_log_rows(&self, rows: Vec<Vec<String>>) {
        *self.log_rows.lock().unwrap() = rows;
    }

    pub fn set_roster_rows(&self, rows: Vec<Vec<String>>) {
        *self.roster_rows.lock().unwrap() = rows;
    }

    pub fn fail_appends(&self, failure: Option<AppendFailure>) {
        *self.append_failure.lock().unwrap() = failure;
    }

    pub fn fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    pub fn delay_appends(&self, delay: Option<Duration>) {
        *self.append_delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl SheetsApi for FakeSheets {
    async fn append_rows(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<(), AppError> {
        *self.append_attempts.lock().unwrap() += 1;
        let delay = *self.append_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = *self.append_failure.lock().unwrap();
        match failure {
            Some(AppendFailure::Auth) => {
                return Err(AppError::SheetsApi(AppError::SHEETS_AUTH_ERROR.to_string()))
            }
            Some(AppendFailure::RateLimit) => {
                return Err(AppError::SheetsApi(AppError::SHEETS_RATE_LIMIT.to_string()))
            }
            Some(AppendFailure::Remote) => {
                return Err(AppError::SheetsApi("HTTP 500: backend error".to_string()))
            }
            None => {}
        }

        let text_rows: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect();
        self.log_rows.lock().unwrap().extend(text_rows);
        self.appends.lock().unwrap().push((range.to_string(), rows));
        Ok(())
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, AppError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(AppError::SheetsApi("HTTP 503: unavailable".to_string()));
        }
        match range {
            "CONFIG!A:A" => Ok(self
                .roster_rows
                .lock()
                .unwrap()
                .iter()
                .map(|row| row.iter().take(1).cloned().collect())
                .collect()),
            "CONFIG!A:C" => Ok(self.roster_rows.lock().unwrap().clone()),
            _ => Ok(self.log_rows.lock().unwrap().clone()),
        }
    }
}

/// Roster with a header row: Eng has Build and Test, Ops has Deploy.
pub fn default_roster() -> Vec<Vec<String>> {
    rows(&[
        &["Team", "Activity ID", "Activity Name"],
        &["Eng", "build", "Build"],
        &["Eng", "test", "Test"],
        &["Ops", "deploy", "Deploy"],
    ])
}

/// Build string rows from literals.
pub fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
    data.iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}

#[allow(dead_code)]
pub fn session() -> Session {
    Session::new(USER, Some(TEAM.to_string()))
}

/// Sync service over an in-memory store, the fake API and a static identity.
#[allow(dead_code)]
pub fn test_sync(sheets: Arc<FakeSheets>) -> Arc<SyncService> {
    let config = Config::test_default();
    let identity = Arc::new(StaticIdentity::new("test_access_token", USER));
    Arc::new(SyncService::new(
        &config,
        LocalStore::in_memory(),
        sheets,
        identity,
    ))
}

/// Sign in and select the default team.
#[allow(dead_code)]
pub async fn sign_in(sync: &SyncService) -> Session {
    sync.login().await.expect("login");
    sync.select_team(Some(TEAM.to_string()))
        .await
        .expect("select team")
}

/// Sync service with the default user signed in to the default team.
#[allow(dead_code)]
pub async fn sign_in_sync(sheets: Arc<FakeSheets>) -> Arc<SyncService> {
    let sync = test_sync(sheets);
    sign_in(&sync).await;
    sync
}

/// Create a test app with in-memory dependencies.
/// Returns the router, the shared state and the fake Sheets API.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<FakeSheets>) {
    let config = Config::test_default();
    let sheets = FakeSheets::new();
    let sync = test_sync(sheets.clone());
    let scheduler = SyncScheduler::new(sync.clone(), &config);

    let state = Arc::new(AppState {
        config,
        sync,
        scheduler,
    });

    (create_router(state.clone()), state, sheets)
}
