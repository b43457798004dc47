// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lifecycle tests.
//!
//! These tests verify that:
//! 1. Requests racing a logout never bring the signed-out session back
//! 2. A timer cannot be armed for a user after logout

use activity_tally::config::Config;
use activity_tally::db::LocalStore;
use activity_tally::error::AppError;
use activity_tally::services::{IdentityProvider, StaticIdentity, SyncScheduler, SyncService};
use async_trait::async_trait;
use common::{FakeSheets, TEAM, USER};
use std::sync::Arc;
use std::time::Duration;

mod common;

/// Static credential whose revocation takes a while, like a network call.
struct SlowRevokeIdentity {
    inner: StaticIdentity,
    delay: Duration,
}

#[async_trait]
impl IdentityProvider for SlowRevokeIdentity {
    async fn access_token(&self, interactive: bool) -> Result<String, AppError> {
        self.inner.access_token(interactive).await
    }

    async fn user_email(&self) -> Result<String, AppError> {
        self.inner.user_email().await
    }

    async fn revoke(&self) -> Result<(), AppError> {
        tokio::time::sleep(self.delay).await;
        self.inner.revoke().await
    }
}

fn slow_revoke_sync() -> Arc<SyncService> {
    let identity = Arc::new(SlowRevokeIdentity {
        inner: StaticIdentity::new("test_access_token", USER),
        delay: Duration::from_millis(200),
    });
    Arc::new(SyncService::new(
        &Config::test_default(),
        LocalStore::in_memory(),
        FakeSheets::new(),
        identity,
    ))
}

#[tokio::test]
async fn test_request_during_logout_does_not_restore_session() {
    let sync = slow_revoke_sync();
    common::sign_in(&sync).await;

    let logout = {
        let sync = sync.clone();
        tokio::spawn(async move { sync.logout().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Lands while the credential is still being revoked
    let during = sync.today_view().await;
    assert!(matches!(during, Err(AppError::AuthRequired(_))));

    logout.await.unwrap().unwrap();

    assert_eq!(sync.store().identity().await.email, None);
    assert!(sync.current_session().await.is_none());
    assert!(sync.restore_session().await.is_none());
}

#[tokio::test]
async fn test_logout_races_restore_from_stored_identity() {
    let sync = slow_revoke_sync();
    // Identity only on disk, as after a restart
    sync.store().set_identity_email(USER).await.unwrap();
    sync.store().set_team(Some(TEAM)).await.unwrap();

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let sync = sync.clone();
            tokio::spawn(async move { sync.restore_session().await })
        })
        .collect();
    sync.logout().await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    assert!(sync.current_session().await.is_none());
    assert!(sync.restore_session().await.is_none());
}

#[tokio::test]
async fn test_timer_cannot_be_armed_after_logout() {
    let sync = slow_revoke_sync();
    common::sign_in(&sync).await;
    let scheduler = SyncScheduler::new(sync.clone(), &Config::test_default());
    scheduler.follow_session().await.unwrap();
    assert!(scheduler.is_armed());

    let logout = {
        let sync = sync.clone();
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            scheduler.disarm().await?;
            sync.logout().await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // A UI request arriving mid-logout tries to re-arm
    let ready = sync.restore_session().await.is_some_and(|s| s.is_ready());
    assert!(!ready);
    logout.await.unwrap().unwrap();

    scheduler.follow_session().await.unwrap();
    assert!(!scheduler.is_armed());
    assert!(sync.store().alarm().await.is_none());
}
