// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Running total reconciliation tests.
//!
//! These tests verify that:
//! 1. Recompute prefers the remote log and falls back to sync history
//! 2. Session-start validation repairs zeroed or missing totals
//! 3. Recompute never interleaves with a flush of the same day

use activity_tally::db::LocalStore;
use activity_tally::models::{Activity, FlushedActivity, RunningTotals, SyncHistoryEntry};
use activity_tally::services::flush::{day_lock, FlushLocks};
use activity_tally::services::reconcile::{ReconcileAction, Reconciler, TotalsSource};
use common::{rows, FakeSheets, USER};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

mod common;

const DAY: &str = "2024-05-01";

fn activities() -> Vec<Activity> {
    vec![
        Activity {
            id: "a".to_string(),
            name: "Alpha".to_string(),
        },
        Activity {
            id: "b".to_string(),
            name: "Beta".to_string(),
        },
    ]
}

fn reconciler(store: &LocalStore, sheets: Arc<FakeSheets>) -> (Reconciler, FlushLocks) {
    let locks: FlushLocks = Arc::new(DashMap::new());
    let reconciler = Reconciler::new(store.clone(), sheets, locks.clone(), "Logs!A:D".to_string());
    (reconciler, locks)
}

async fn journal(store: &LocalStore, id: &str, count: u64) {
    let flushed = vec![FlushedActivity {
        id: id.to_string(),
        count,
    }];
    store
        .commit_flush(
            USER,
            DAY,
            &flushed,
            SyncHistoryEntry {
                timestamp: 0,
                date_key: DAY.to_string(),
                activities: flushed.clone(),
            },
        )
        .await
        .unwrap();
}

fn zero_totals() -> RunningTotals {
    let mut totals = RunningTotals::new();
    totals.set("a", 0);
    totals
}

#[tokio::test]
async fn test_recompute_prefers_remote_log() {
    let store = LocalStore::in_memory();
    let sheets = FakeSheets::new();
    sheets.set_log_rows(rows(&[
        &["Timestamp", "User", "Activity", "Count"],
        &["2024-05-01 09:00:00", USER, "Alpha", "4"],
        &["2024-05-01 11:00:00", USER, "Alpha", "1"],
        &["2024-05-01 11:00:00", "someone@x.com", "Alpha", "7"],
    ]));
    journal(&store, "a", 2).await;
    let (reconciler, _) = reconciler(&store, sheets);

    let recomputed = reconciler
        .recompute(&common::session(), DAY, &activities())
        .await
        .unwrap();

    assert_eq!(recomputed.source, TotalsSource::Remote);
    assert_eq!(recomputed.totals.get("a"), 5);
    // Every known activity gets an entry
    assert_eq!(recomputed.totals.as_map().get("b"), Some(&0));
    assert_eq!(store.running_totals(USER, DAY).await.unwrap(), recomputed.totals);
}

#[tokio::test]
async fn test_recompute_falls_back_to_history() {
    let store = LocalStore::in_memory();
    let sheets = FakeSheets::new();
    sheets.fail_reads(true);
    journal(&store, "a", 2).await;
    journal(&store, "a", 1).await;
    let (reconciler, _) = reconciler(&store, sheets);

    let recomputed = reconciler
        .recompute(&common::session(), DAY, &activities())
        .await
        .unwrap();

    assert_eq!(recomputed.source, TotalsSource::History);
    assert_eq!(recomputed.totals.get("a"), 3);
    assert_eq!(recomputed.totals.get("b"), 0);
}

#[tokio::test]
async fn test_recompute_with_no_source() {
    let store = LocalStore::in_memory();
    let sheets = FakeSheets::new();
    sheets.fail_reads(true);
    let (reconciler, _) = reconciler(&store, sheets);

    let recomputed = reconciler
        .recompute(&common::session(), DAY, &activities())
        .await
        .unwrap();

    assert_eq!(recomputed.source, TotalsSource::None);
    assert!(recomputed.totals.is_all_zero());
    assert_eq!(recomputed.totals.as_map().len(), 2);
}

#[tokio::test]
async fn test_empty_remote_log_is_not_a_failure() {
    let store = LocalStore::in_memory();
    let sheets = FakeSheets::new();
    journal(&store, "a", 3).await;
    let (reconciler, _) = reconciler(&store, sheets);

    let recomputed = reconciler
        .recompute(&common::session(), DAY, &activities())
        .await
        .unwrap();

    assert_eq!(recomputed.source, TotalsSource::Remote);
    assert_eq!(recomputed.totals.get("a"), 0);
}

#[tokio::test]
async fn test_validate_repairs_zeroed_totals_from_history() {
    let store = LocalStore::in_memory();
    let sheets = FakeSheets::new();
    sheets.fail_reads(true);
    journal(&store, "a", 3).await;
    store.set_running_totals(USER, DAY, &zero_totals()).await.unwrap();
    let (reconciler, _) = reconciler(&store, sheets);

    let action = reconciler
        .validate_and_correct(&common::session(), DAY, &activities())
        .await
        .unwrap();

    assert_eq!(action, ReconcileAction::Recomputed(TotalsSource::History));
    assert_eq!(store.running_totals(USER, DAY).await.unwrap().get("a"), 3);
}

#[tokio::test]
async fn test_validate_adopts_remote_when_nothing_stored() {
    let store = LocalStore::in_memory();
    let sheets = FakeSheets::new();
    sheets.set_log_rows(rows(&[&["2024-05-01 09:00:00", USER, "Beta", "6"]]));
    let (reconciler, _) = reconciler(&store, sheets);

    let action = reconciler
        .validate_and_correct(&common::session(), DAY, &activities())
        .await
        .unwrap();

    assert_eq!(action, ReconcileAction::AdoptedRemote);
    let totals = store.running_totals(USER, DAY).await.unwrap();
    assert_eq!(totals.get("b"), 6);
    assert_eq!(totals.as_map().get("a"), Some(&0));
}

#[tokio::test]
async fn test_validate_leaves_consistent_totals_alone() {
    let store = LocalStore::in_memory();
    let sheets = FakeSheets::new();
    sheets.set_log_rows(rows(&[&["2024-05-01 09:00:00", USER, "Alpha", "9"]]));
    journal(&store, "a", 3).await;
    let (reconciler, _) = reconciler(&store, sheets);

    let action = reconciler
        .validate_and_correct(&common::session(), DAY, &activities())
        .await
        .unwrap();

    assert_eq!(action, ReconcileAction::Unchanged);
    assert_eq!(store.running_totals(USER, DAY).await.unwrap().get("a"), 3);
}

#[tokio::test]
async fn test_validate_with_nothing_anywhere() {
    let store = LocalStore::in_memory();
    let sheets = FakeSheets::new();
    let (reconciler, _) = reconciler(&store, sheets);

    let action = reconciler
        .validate_and_correct(&common::session(), DAY, &activities())
        .await
        .unwrap();

    assert_eq!(action, ReconcileAction::Unchanged);
    assert!(store.running_totals(USER, DAY).await.is_none());
}

#[tokio::test]
async fn test_recompute_waits_for_flush_lock() {
    let store = LocalStore::in_memory();
    let sheets = FakeSheets::new();
    let (reconciler, locks) = reconciler(&store, sheets);

    let lock = day_lock(&locks, USER, DAY);
    let guard = lock.lock().await;

    let task = tokio::spawn(async move {
        reconciler
            .recompute(&common::session(), DAY, &activities())
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!task.is_finished());
    assert!(store.running_totals(USER, DAY).await.is_none());

    drop(guard);
    let recomputed = task.await.unwrap().unwrap();
    assert_eq!(recomputed.source, TotalsSource::Remote);
}
