// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Periodic sync timer.
//!
//! A single named timer exists while a user is signed in with a team
//! selected. Each fire flushes today's pending counts and re-arms. The
//! next-fire time is persisted so a restart resumes the same schedule.
//!
//! Cancelling the timer only interrupts the wait; a fire already in progress
//! runs to completion.

use crate::config::Config;
use crate::db::LocalStore;
use crate::error::Result;
use crate::models::AlarmState;
use crate::services::events::SyncEvent;
use crate::services::flush::{FlushOutcome, SkipReason};
use crate::services::sync::SyncService;
use crate::time_utils::now_millis;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Status text shown while a scheduled flush runs.
pub const UPLOADING_STATUS: &str = "Uploading data to Sheets...";

/// The running timer task.
struct Timer {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    next_fire: DateTime<Utc>,
}

struct Inner {
    sync: Arc<SyncService>,
    store: LocalStore,
    name: String,
    period: Duration,
    timer: Mutex<Option<Timer>>,
    generation: AtomicU64,
}

/// Handle to the sync timer. Cheap to clone; clones share the timer.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

impl SyncScheduler {
    pub fn new(sync: Arc<SyncService>, config: &Config) -> Self {
        Self::with_period(sync, config.sync_alarm_name.clone(), config.sync_interval())
    }

    /// Build with an explicit period (tests use sub-second periods).
    pub fn with_period(sync: Arc<SyncService>, name: String, period: Duration) -> Self {
        let store = sync.store().clone();
        Self {
            inner: Arc::new(Inner {
                sync,
                store,
                name,
                period,
                timer: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    pub fn is_armed(&self) -> bool {
        self.lock_timer()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.lock_timer().as_ref().map(|t| t.next_fire)
    }

    /// Seconds until the next fire, `None` while disarmed.
    pub fn next_sync_in_seconds(&self) -> Option<i64> {
        let next_fire = self.next_fire()?;
        Some((next_fire - Utc::now()).num_seconds().max(0))
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<Timer>> {
        // A poisoned slot only means a panic while swapping handles.
        self.inner
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancel any timer and start a fresh one firing after one period.
    pub async fn arm(&self) -> Result<()> {
        let next_fire = Utc::now() + self.period_delta();
        self.arm_at(next_fire).await
    }

    /// Arm unless a timer is already running. A persisted next-fire time
    /// that is still in the future is resumed.
    pub async fn ensure_armed(&self) -> Result<()> {
        if self.is_armed() {
            return Ok(());
        }
        let now = Utc::now();
        match self.inner.store.alarm().await {
            Some(alarm) if alarm.name == self.inner.name && alarm.next_fire > now => {
                tracing::info!(name = %alarm.name, next_fire = %alarm.next_fire, "Resuming persisted sync timer");
                self.arm_at(alarm.next_fire).await
            }
            _ => self.arm().await,
        }
    }

    /// Cancel the timer and clear the persisted alarm.
    pub async fn disarm(&self) -> Result<()> {
        if let Some(timer) = self.lock_timer().take() {
            timer.cancel.cancel();
            tracing::info!(name = %self.inner.name, "Sync timer disarmed");
        }
        self.inner.store.set_alarm(None).await
    }

    /// Startup: re-arm for a persisted signed-in user with a team, otherwise
    /// drop any stale alarm.
    pub async fn restore(&self) -> Result<()> {
        match self.inner.sync.restore_session().await {
            Some(session) if session.is_ready() => {
                tracing::info!(user = %session.user_email, "Restoring sync timer");
                self.ensure_armed().await
            }
            _ => {
                if self.inner.store.alarm().await.is_some() {
                    tracing::info!("Clearing stale sync timer");
                }
                self.disarm().await
            }
        }
    }

    /// Arm or disarm to match the current session.
    pub async fn follow_session(&self) -> Result<()> {
        match self.inner.sync.current_session().await {
            Some(session) if session.is_ready() => self.ensure_armed().await,
            _ => self.disarm().await,
        }
    }

    fn period_delta(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.period().as_millis() as i64)
    }

    async fn persist_alarm(&self, next_fire: DateTime<Utc>) -> Result<()> {
        self.inner
            .store
            .set_alarm(Some(AlarmState {
                name: self.inner.name.clone(),
                period_secs: self.inner.period.as_secs(),
                next_fire,
            }))
            .await
    }

    async fn arm_at(&self, next_fire: DateTime<Utc>) -> Result<()> {
        self.persist_alarm(next_fire).await?;

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_timer(
            self.clone(),
            generation,
            cancel.clone(),
            next_fire,
        ));

        let previous = self.lock_timer().replace(Timer {
            generation,
            cancel,
            handle,
            next_fire,
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        tracing::info!(name = %self.inner.name, next_fire = %next_fire, "Sync timer armed");
        Ok(())
    }

    /// Record the next fire of the running timer `generation`.
    fn advance(&self, generation: u64, next_fire: DateTime<Utc>) {
        if let Some(timer) = self.lock_timer().as_mut() {
            if timer.generation == generation {
                timer.next_fire = next_fire;
            }
        }
    }

    /// Make the persisted alarm match the running timer (or its absence).
    async fn resync_persisted_alarm(&self) -> Result<()> {
        match self.next_fire() {
            Some(next_fire) => self.persist_alarm(next_fire).await,
            None => self.inner.store.set_alarm(None).await,
        }
    }

    /// Drop timer `generation` from the slot (if still current) and clear
    /// the persisted alarm.
    async fn release(&self, generation: u64) -> Result<()> {
        let released = {
            let mut slot = self.lock_timer();
            if slot.as_ref().is_some_and(|t| t.generation == generation) {
                slot.take()
            } else {
                None
            }
        };
        match released {
            Some(_) => {
                tracing::info!(name = %self.inner.name, "Sync timer disarmed");
                self.inner.store.set_alarm(None).await
            }
            None => Ok(()),
        }
    }

    /// One scheduled sync. Returns whether the timer should keep running.
    pub async fn fire(&self) -> FireResult {
        let sync = &self.inner.sync;

        let Some(session) = sync.restore_session().await.filter(|s| s.is_ready()) else {
            tracing::info!("Sync timer fired without a signed-in user and team, disarming");
            return FireResult::Disarm;
        };

        sync.emit(SyncEvent::status(UPLOADING_STATUS));
        tracing::info!(user = %session.user_email, "Scheduled sync started");

        let outcome = sync.flush_today().await;
        match &outcome {
            FlushOutcome::Failed { error } => {
                sync.emit(SyncEvent::error(format!("Sync failed: {}", error)));
            }
            FlushOutcome::Skipped(SkipReason::AuthRequired(_)) => {
                sync.emit(SyncEvent::error("Sign-in required to sync with Sheets"));
            }
            _ => {}
        }

        let last_sync_timestamp = if outcome.is_failure() {
            self.inner.store.last_sync_timestamp().await
        } else {
            let now = now_millis();
            if let Err(e) = self.inner.store.set_last_sync_timestamp(now).await {
                tracing::warn!(error = %e, "Failed to record last sync time");
            }
            Some(now)
        };

        if !outcome.is_failure() {
            sync.emit(SyncEvent::SyncCompleteAndClearUI {
                last_sync_timestamp,
                next_sync_in_seconds: Some(self.period().as_secs() as i64),
                flushed_activities: outcome.flushed_activities().to_vec(),
            });
        }

        tracing::info!(outcome = ?outcome, "Scheduled sync finished");
        FireResult::Rearm(outcome)
    }
}

/// What a timer fire decided.
#[derive(Debug)]
pub enum FireResult {
    Rearm(FlushOutcome),
    Disarm,
}

/// Timer task: wait until `next_fire`, run one sync, schedule the next one.
///
/// The same task keeps running across fires; it exits when cancelled or
/// when a fire finds nobody to sync for.
async fn run_timer(
    scheduler: SyncScheduler,
    generation: u64,
    cancel: CancellationToken,
    mut next_fire: DateTime<Utc>,
) {
    loop {
        let wait = (next_fire - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(generation, "Sync timer cancelled");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let result = scheduler.fire().await;

        // A disarm or re-arm during the fire owns the slot now.
        if cancel.is_cancelled() {
            return;
        }

        match result {
            FireResult::Disarm => {
                if let Err(e) = scheduler.release(generation).await {
                    tracing::error!(error = %e, "Failed to clear sync timer");
                }
                return;
            }
            FireResult::Rearm(_) => {
                next_fire = Utc::now() + scheduler.period_delta();
                scheduler.advance(generation, next_fire);
                if let Err(e) = scheduler.persist_alarm(next_fire).await {
                    tracing::error!(error = %e, "Failed to persist sync timer");
                }
                if cancel.is_cancelled() {
                    // Our write may have landed after a disarm or re-arm.
                    if let Err(e) = scheduler.resync_persisted_alarm().await {
                        tracing::error!(error = %e, "Failed to repair sync timer state");
                    }
                    return;
                }
                tracing::debug!(next_fire = %next_fire, "Sync timer re-armed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::identity::StaticIdentity;
    use crate::services::sheets::SheetsClient;

    fn scheduler() -> SyncScheduler {
        let config = Config::test_default();
        let identity = Arc::new(StaticIdentity::new("tok", "a@x.com"));
        let sheets = Arc::new(SheetsClient::new("sheet".to_string(), identity.clone()));
        let sync = Arc::new(SyncService::new(
            &config,
            LocalStore::in_memory(),
            sheets,
            identity,
        ));
        SyncScheduler::new(sync, &config)
    }

    #[tokio::test]
    async fn test_stale_write_after_disarm_is_cleared() {
        let scheduler = scheduler();
        scheduler.arm().await.unwrap();
        let stale = scheduler.next_fire().unwrap();
        scheduler.disarm().await.unwrap();

        // A timer task finishing its fire writes after the disarm
        scheduler.persist_alarm(stale).await.unwrap();
        scheduler.resync_persisted_alarm().await.unwrap();

        assert!(scheduler.inner.store.alarm().await.is_none());
    }

    #[tokio::test]
    async fn test_stale_write_after_rearm_is_replaced() {
        let scheduler = scheduler();
        scheduler.arm().await.unwrap();
        let stale = scheduler.next_fire().unwrap() - chrono::Duration::minutes(1);
        scheduler.arm().await.unwrap();
        let current = scheduler.next_fire().unwrap();

        scheduler.persist_alarm(stale).await.unwrap();
        scheduler.resync_persisted_alarm().await.unwrap();

        assert_eq!(
            scheduler.inner.store.alarm().await.unwrap().next_fire,
            current
        );
        scheduler.disarm().await.unwrap();
    }
}
