// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Request/response messages from the UI.
//!
//! Every reply is an acknowledgement carrying `success`; failures are
//! rendered by `AppError` as `{success: false, error}`.

use crate::error::{AppError, Result};
use crate::models::{Activity, PendingActivityRecord, Session};
use crate::services::reconcile::TotalsSource;
use crate::services::sync::TodayView;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes used by the UI process.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/team", post(select_team))
        .route("/api/sync-alarm", post(start_sync_alarm))
        .route("/api/sync/next", get(next_sync_time))
        .route("/api/activity", post(update_activity))
        .route("/api/activity-order", put(set_activity_order))
        .route("/api/totals/recalculate", post(recalculate_totals))
        .route("/api/today", get(get_today))
        .route("/api/teams", get(get_teams))
        .route("/api/teams/{team}/activities", get(get_team_activities))
        .route("/api/roster/refresh", post(refresh_roster))
}

/// Plain acknowledgement.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AckResponse {
    pub success: bool,
}

impl AckResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

// ─── Session ─────────────────────────────────────────────────

/// Signed-in identity as seen by the UI.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub user_email: String,
    pub team: Option<String>,
    pub sync_armed: bool,
}

fn session_response(state: &AppState, session: Session) -> Json<SessionResponse> {
    Json(SessionResponse {
        success: true,
        user_email: session.user_email,
        team: session.team,
        sync_armed: state.scheduler.is_armed(),
    })
}

/// Interactive sign-in; arms the sync timer when a team is already known.
async fn login(State(state): State<Arc<AppState>>) -> Result<Json<SessionResponse>> {
    let session = state.sync.login().await?;
    state.scheduler.follow_session().await?;
    Ok(session_response(&state, session))
}

/// Sign out and stop syncing.
async fn logout(State(state): State<Arc<AppState>>) -> Result<Json<AckResponse>> {
    state.scheduler.disarm().await?;
    state.sync.logout().await?;
    Ok(AckResponse::ok())
}

#[derive(Deserialize)]
struct TeamRequest {
    team: Option<String>,
}

/// `teamSelected`: choosing a team arms the timer, clearing it disarms.
async fn select_team(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TeamRequest>,
) -> Result<Json<SessionResponse>> {
    let session = state.sync.select_team(req.team).await?;
    state.scheduler.follow_session().await?;
    Ok(session_response(&state, session))
}

// ─── Sync Timer ──────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct NextSyncResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub next_sync_in_seconds: Option<i64>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub last_sync_timestamp: Option<i64>,
}

async fn next_sync_response(state: &AppState) -> Json<NextSyncResponse> {
    Json(NextSyncResponse {
        success: true,
        next_sync_in_seconds: state.scheduler.next_sync_in_seconds(),
        last_sync_timestamp: state.sync.store().last_sync_timestamp().await,
    })
}

/// `startSyncAlarm`: cancel and recreate the timer.
async fn start_sync_alarm(State(state): State<Arc<AppState>>) -> Result<Json<NextSyncResponse>> {
    let ready = state
        .sync
        .restore_session()
        .await
        .is_some_and(|s| s.is_ready());
    if !ready {
        return Err(AppError::BadRequest(
            "Sign in and select a team before starting sync".to_string(),
        ));
    }
    state.scheduler.arm().await?;
    Ok(next_sync_response(&state).await)
}

/// `requestNextSyncTime`; only answered for a signed-in user.
async fn next_sync_time(State(state): State<Arc<AppState>>) -> Result<Json<NextSyncResponse>> {
    if state.sync.restore_session().await.is_none() {
        return Err(AppError::AuthRequired("Not logged in".to_string()));
    }
    Ok(next_sync_response(&state).await)
}

// ─── Counts ──────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityUpdateRequest {
    activity_id: String,
    count: u64,
    name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUpdateResponse {
    pub success: bool,
    pub record: PendingActivityRecord,
}

/// `updateLocalActivityData`: set today's pending count for one activity.
async fn update_activity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActivityUpdateRequest>,
) -> Result<Json<ActivityUpdateResponse>> {
    let record = state
        .sync
        .update_local_activity(&req.activity_id, req.count, req.name.as_deref())
        .await?;
    Ok(Json(ActivityUpdateResponse {
        success: true,
        record,
    }))
}

#[derive(Deserialize)]
struct ActivityOrderRequest {
    order: Vec<String>,
}

async fn set_activity_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActivityOrderRequest>,
) -> Result<Json<AckResponse>> {
    state.sync.set_activity_order(req.order).await?;
    Ok(AckResponse::ok())
}

// ─── Totals ──────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RecalculateResponse {
    pub success: bool,
    pub source: TotalsSource,
    #[cfg_attr(feature = "binding-generation", ts(type = "Record<string, number>"))]
    pub totals: BTreeMap<String, u64>,
}

/// Rebuild today's running totals from the remote log (or history).
async fn recalculate_totals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RecalculateResponse>> {
    let recomputed = state.sync.recalculate_totals().await?;
    Ok(Json(RecalculateResponse {
        success: true,
        source: recomputed.source,
        totals: recomputed.totals.as_map().clone(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayResponse {
    pub success: bool,
    #[serde(flatten)]
    pub today: TodayView,
}

async fn get_today(State(state): State<Arc<AppState>>) -> Result<Json<TodayResponse>> {
    let today = state.sync.today_view().await?;
    Ok(Json(TodayResponse {
        success: true,
        today,
    }))
}

// ─── Roster ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct TeamsResponse {
    pub success: bool,
    pub teams: Vec<String>,
}

async fn get_teams(State(state): State<Arc<AppState>>) -> Result<Json<TeamsResponse>> {
    let teams = state.sync.teams().await?;
    Ok(Json(TeamsResponse {
        success: true,
        teams,
    }))
}

#[derive(Serialize)]
pub struct ActivitiesResponse {
    pub success: bool,
    pub activities: Vec<Activity>,
}

async fn get_team_activities(
    State(state): State<Arc<AppState>>,
    Path(team): Path<String>,
) -> Result<Json<ActivitiesResponse>> {
    let activities = state.sync.team_activities(&team).await?;
    Ok(Json(ActivitiesResponse {
        success: true,
        activities,
    }))
}

async fn refresh_roster(State(state): State<Arc<AppState>>) -> Result<Json<AckResponse>> {
    state.sync.refresh_roster().await?;
    Ok(AckResponse::ok())
}
