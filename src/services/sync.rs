// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session coordination: the operations the UI drives.
//!
//! `SyncService` owns the current `Session` and hands it to the flush engine,
//! reconciler and roster on every call. Timer arming lives in the scheduler.

use crate::config::Config;
use crate::db::LocalStore;
use crate::error::{AppError, Result};
use crate::models::{Activity, PendingActivityRecord, RunningTotals, Session};
use crate::services::events::SyncEvent;
use crate::services::flush::{FlushEngine, FlushLocks, FlushOutcome};
use crate::services::history;
use crate::services::identity::IdentityProvider;
use crate::services::reconcile::{ReconcileAction, Recomputed, Reconciler};
use crate::services::roster::RosterService;
use crate::services::sheets::SheetsApi;
use crate::time_utils::today_key;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One activity row of the today view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct TodayActivity {
    pub id: String,
    pub name: String,
    /// Not yet uploaded
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub pending: u64,
    /// Confirmed in the remote log
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total: u64,
}

/// Everything the UI shows for the current day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct TodayView {
    pub date: String,
    pub user_email: String,
    pub team: Option<String>,
    pub activities: Vec<TodayActivity>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub last_sync_timestamp: Option<i64>,
}

/// Core operations behind the UI surface.
pub struct SyncService {
    store: LocalStore,
    identity: Arc<dyn IdentityProvider>,
    roster: RosterService,
    flush: FlushEngine,
    reconciler: Reconciler,
    retention_days: i64,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncService {
    pub fn new(
        config: &Config,
        store: LocalStore,
        sheets: Arc<dyn SheetsApi>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let locks: FlushLocks = Arc::new(DashMap::new());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            roster: RosterService::new(store.clone(), sheets.clone(), config),
            flush: FlushEngine::new(store.clone(), sheets.clone(), locks.clone(), config),
            reconciler: Reconciler::new(store.clone(), sheets, locks, config.logs_range.clone()),
            retention_days: config.sync_history_retention_days,
            session: RwLock::new(None),
            store,
            identity,
            events,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    // ─── Events ──────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Broadcast to every connected UI; dropped when nobody listens.
    pub fn emit(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("No UI subscribers for sync event");
        }
    }

    // ─── Session ─────────────────────────────────────────────────

    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Current session, rebuilt from the persisted identity if needed.
    pub async fn restore_session(&self) -> Option<Session> {
        if let Some(session) = self.current_session().await {
            return Some(session);
        }

        // Read the stored identity under the write lock so a concurrent
        // logout cannot clear it between the read and the install.
        let mut slot = self.session.write().await;
        if let Some(session) = slot.as_ref() {
            return Some(session.clone());
        }
        let restored = self.store.identity().await.session()?;
        tracing::info!(
            user = %restored.user_email,
            team = ?restored.team,
            "Session restored from stored identity"
        );
        *slot = Some(restored.clone());
        Some(restored)
    }

    async fn require_session(&self) -> Result<Session> {
        self.restore_session()
            .await
            .ok_or_else(|| AppError::AuthRequired("Not signed in".to_string()))
    }

    async fn require_team(&self) -> Result<(Session, String)> {
        let session = self.require_session().await?;
        let team = session
            .team
            .clone()
            .ok_or_else(|| AppError::BadRequest("No team selected".to_string()))?;
        Ok((session, team))
    }

    /// Interactive sign-in.
    ///
    /// The stored team is kept when the same account signs in again.
    pub async fn login(&self) -> Result<Session> {
        self.identity.access_token(true).await?;
        let email = self.identity.user_email().await?;

        let stored = self.store.identity().await;
        let team = match stored.email.as_deref() {
            Some(previous) if previous == email => stored.team,
            _ => None,
        };

        self.store.set_identity_email(&email).await?;
        self.store.set_team(team.as_deref()).await?;

        let session = Session::new(email, team);
        *self.session.write().await = Some(session.clone());
        tracing::info!(user = %session.user_email, team = ?session.team, "User signed in");

        self.start_session(&session).await;
        Ok(session)
    }

    /// Sign out: revoke the credential and forget the identity and the
    /// user's roster cache. Pending counts stay on disk.
    pub async fn logout(&self) -> Result<()> {
        {
            // Hold the session slot until the stored identity is gone; a
            // reader must never find the slot empty with an identity on disk.
            let mut slot = self.session.write().await;
            let user = match slot.take() {
                Some(session) => Some(session.user_email),
                None => self.store.identity().await.email,
            };

            self.store.clear_identity().await?;
            if let Some(user) = user.as_deref() {
                let cleared = self.store.clear_user_cache(user).await?;
                tracing::info!(user, cleared, "User signed out");
            }
        }

        if let Err(e) = self.identity.revoke().await {
            tracing::warn!(error = %e, "Credential revocation failed");
        }
        Ok(())
    }

    /// Select (or clear) the team for the signed-in user.
    pub async fn select_team(&self, team: Option<String>) -> Result<Session> {
        let mut session = self.require_session().await?;
        let team = team.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

        self.store.set_team(team.as_deref()).await?;
        session.team = team;
        *self.session.write().await = Some(session.clone());
        tracing::info!(user = %session.user_email, team = ?session.team, "Team selected");

        self.start_session(&session).await;
        Ok(session)
    }

    /// Session start work: purge old history and validate today's totals.
    ///
    /// Failures are logged; they never block sign-in.
    pub async fn start_session(&self, session: &Session) -> Option<ReconcileAction> {
        let team = session.team()?;
        let user = session.user_email.as_str();

        history::purge_expired(&self.store, user, self.retention_days).await;

        let activities = self.activities_or_empty(user, team).await;
        match self
            .reconciler
            .validate_and_correct(session, &today_key(), &activities)
            .await
        {
            Ok(action) => {
                tracing::debug!(user, action = ?action, "Session totals validated");
                Some(action)
            }
            Err(e) => {
                tracing::warn!(user, error = %e, "Totals validation failed");
                None
            }
        }
    }

    async fn activities_or_empty(&self, user: &str, team: &str) -> Vec<Activity> {
        self.roster.activities(user, team).await.unwrap_or_else(|e| {
            tracing::warn!(user, team, error = %e, "Roster unavailable");
            Vec::new()
        })
    }

    // ─── Counts & Sync ───────────────────────────────────────────

    /// Set the absolute pending count of an activity for today.
    pub async fn update_local_activity(
        &self,
        activity_id: &str,
        count: u64,
        name: Option<&str>,
    ) -> Result<PendingActivityRecord> {
        let session = self.require_session().await?;
        let activity_id = activity_id.trim();
        if activity_id.is_empty() {
            return Err(AppError::BadRequest("activityId is required".to_string()));
        }
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(activity_id);

        let day = today_key();
        let record = self
            .store
            .set_pending_count(
                &session.user_email,
                &day,
                session.team(),
                activity_id,
                count,
                name,
            )
            .await?;
        tracing::debug!(user = %session.user_email, day, activity = activity_id, count, "Pending count updated");
        Ok(record)
    }

    /// Flush today's pending counts for the current session.
    pub async fn flush_today(&self) -> FlushOutcome {
        let session = self.restore_session().await;
        self.flush.attempt_flush(session.as_ref(), &today_key()).await
    }

    /// Rebuild today's running totals (remote log first, history second).
    pub async fn recalculate_totals(&self) -> Result<Recomputed> {
        let (session, team) = self.require_team().await?;
        let activities = self.activities_or_empty(&session.user_email, &team).await;
        self.reconciler
            .recompute(&session, &today_key(), &activities)
            .await
    }

    /// Activities with today's pending counts and running totals.
    pub async fn today_view(&self) -> Result<TodayView> {
        let session = self.require_session().await?;
        let user = session.user_email.as_str();
        let day = today_key();

        let roster = match session.team() {
            Some(team) => self.activities_or_empty(user, team).await,
            None => Vec::new(),
        };
        let pending = self.store.pending_day(user, &day).await.unwrap_or_default();
        let totals = self
            .store
            .running_totals(user, &day)
            .await
            .unwrap_or_else(RunningTotals::new);

        let mut activities: Vec<TodayActivity> = roster
            .iter()
            .map(|a| TodayActivity {
                id: a.id.clone(),
                name: a.name.clone(),
                pending: pending.get(&a.id).map_or(0, |r| r.count),
                total: totals.get(&a.id),
            })
            .collect();

        // Records touched under an older roster are still shown.
        for record in &pending.activities {
            if !roster.iter().any(|a| a.id == record.id) {
                activities.push(TodayActivity {
                    id: record.id.clone(),
                    name: record.name.clone(),
                    pending: record.count,
                    total: totals.get(&record.id),
                });
            }
        }

        Ok(TodayView {
            date: day,
            user_email: session.user_email.clone(),
            team: session.team.clone(),
            activities,
            last_sync_timestamp: self.store.last_sync_timestamp().await,
        })
    }

    // ─── Roster ──────────────────────────────────────────────────

    pub async fn teams(&self) -> Result<Vec<String>> {
        let session = self.require_session().await?;
        self.roster.teams(&session.user_email).await
    }

    pub async fn team_activities(&self, team: &str) -> Result<Vec<Activity>> {
        let session = self.require_session().await?;
        self.roster.activities(&session.user_email, team).await
    }

    pub async fn refresh_roster(&self) -> Result<()> {
        let session = self.require_session().await?;
        self.roster
            .refresh(&session.user_email, session.team())
            .await
    }

    /// Persist the display order of the current team's activities.
    pub async fn set_activity_order(&self, order: Vec<String>) -> Result<()> {
        let (session, team) = self.require_team().await?;
        self.store
            .set_activity_order(&session.user_email, &team, order)
            .await
    }
}
