// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Team and activity roster, read from the CONFIG sheet and cached locally.
//!
//! Cache entries are per user and stay fresh for `ROSTER_CACHE_DAYS`. When a
//! fetch fails, an expired entry is still served rather than failing the
//! request.

use crate::config::Config;
use crate::db::{keys, LocalStore};
use crate::error::{AppError, Result};
use crate::models::{Activity, CachedRoster, RosterData};
use crate::services::sheets::SheetsApi;
use crate::time_utils::now_millis;
use std::collections::HashSet;
use std::sync::Arc;

const TEAMS_KIND: &str = "teams";
const ACTIVITIES_KIND: &str = "activities";

/// Team names from the teams column: header skipped, blanks dropped,
/// duplicates removed keeping first occurrence.
pub fn parse_teams(rows: &[Vec<String>]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .skip(1)
        .flatten()
        .map(|cell| cell.trim())
        .filter(|team| !team.is_empty())
        .filter(|team| seen.insert(team.to_string()))
        .map(str::to_string)
        .collect()
}

/// Activities of `team` from `team, id, name` rows; name defaults to id.
pub fn parse_activities(rows: &[Vec<String>], team: &str) -> Vec<Activity> {
    rows.iter()
        .filter(|row| row.first().map(String::as_str) == Some(team))
        .filter_map(|row| {
            let id = row.get(1)?.trim();
            if id.is_empty() {
                return None;
            }
            let name = row
                .get(2)
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .unwrap_or(id);
            Some(Activity {
                id: id.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// Reorder activities by a saved ID list. Activities missing from the list
/// keep their roster order after the ordered ones.
pub fn apply_order(activities: Vec<Activity>, order: &[String]) -> Vec<Activity> {
    let mut ordered = activities;
    ordered.sort_by_key(|a| order.iter().position(|id| *id == a.id).unwrap_or(usize::MAX));
    ordered
}

/// Roster lookups with a per-user cache.
#[derive(Clone)]
pub struct RosterService {
    store: LocalStore,
    sheets: Arc<dyn SheetsApi>,
    teams_range: String,
    config_range: String,
    cache_days: i64,
}

impl RosterService {
    pub fn new(store: LocalStore, sheets: Arc<dyn SheetsApi>, config: &Config) -> Self {
        Self {
            store,
            sheets,
            teams_range: config.teams_range.clone(),
            config_range: config.config_range.clone(),
            cache_days: config.roster_cache_days,
        }
    }

    /// Available teams.
    pub async fn teams(&self, user: &str) -> Result<Vec<String>> {
        self.fetch_teams(user, true).await
    }

    /// Activities of `team`, in the user's saved display order.
    pub async fn activities(&self, user: &str, team: &str) -> Result<Vec<Activity>> {
        self.fetch_activities(user, team, true).await
    }

    /// Fetch the roster again, bypassing fresh cache entries.
    ///
    /// With `team` set, that team's activities are refreshed as well.
    pub async fn refresh(&self, user: &str, team: Option<&str>) -> Result<()> {
        self.fetch_teams(user, false).await?;
        if let Some(team) = team {
            self.fetch_activities(user, team, false).await?;
        }
        tracing::info!(user, team, "Roster refreshed");
        Ok(())
    }

    async fn fetch_teams(&self, user: &str, use_cache: bool) -> Result<Vec<String>> {
        let key = keys::roster_cache(TEAMS_KIND, "", user);
        let fetched = self.load(&key, use_cache, || async {
            let rows = self.sheets.get_values(&self.teams_range).await?;
            let teams = parse_teams(&rows);
            if teams.is_empty() {
                return Err(AppError::NotFound("No valid teams found".to_string()));
            }
            Ok(RosterData::Teams(teams))
        });

        match fetched.await? {
            RosterData::Teams(teams) => Ok(teams),
            RosterData::Activities(_) => Err(corrupt_entry(&key)),
        }
    }

    async fn fetch_activities(
        &self,
        user: &str,
        team: &str,
        use_cache: bool,
    ) -> Result<Vec<Activity>> {
        let key = keys::roster_cache(ACTIVITIES_KIND, team, user);
        let fetched = self.load(&key, use_cache, || async {
            let rows = self.sheets.get_values(&self.config_range).await?;
            let activities = parse_activities(&rows, team);
            if activities.is_empty() {
                return Err(AppError::NotFound(format!(
                    "No activities found for team: {}",
                    team
                )));
            }
            Ok(RosterData::Activities(activities))
        });

        let activities = match fetched.await? {
            RosterData::Activities(activities) => activities,
            RosterData::Teams(_) => return Err(corrupt_entry(&key)),
        };

        Ok(match self.store.activity_order(user, team).await {
            Some(order) => apply_order(activities, &order),
            None => activities,
        })
    }

    /// Cache-first load; falls back to an expired entry if the fetch fails.
    async fn load<F, Fut>(&self, key: &str, use_cache: bool, fetch: F) -> Result<RosterData>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<RosterData>>,
    {
        let cached = self.store.cached_roster(key).await;
        if use_cache {
            if let Some(entry) = cached.as_ref() {
                if entry.is_fresh(now_millis(), self.cache_days) {
                    tracing::debug!(key, "Using cached roster");
                    return Ok(entry.data.clone());
                }
            }
        }

        match fetch().await {
            Ok(data) => {
                let entry = CachedRoster {
                    fetched_at: now_millis(),
                    data: data.clone(),
                };
                if let Err(e) = self.store.set_cached_roster(key, entry).await {
                    tracing::warn!(key, error = %e, "Failed to cache roster");
                }
                Ok(data)
            }
            Err(e) => match cached {
                Some(entry) => {
                    tracing::warn!(key, error = %e, "Roster fetch failed, serving expired cache");
                    Ok(entry.data)
                }
                None => Err(e),
            },
        }
    }
}

fn corrupt_entry(key: &str) -> AppError {
    AppError::Storage(format!("Cache entry {} holds the wrong roster kind", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_parse_teams() {
        let data = rows(&[&["Team"], &["Eng"], &[""], &["Ops"], &["Eng"], &["  "]]);
        assert_eq!(parse_teams(&data), vec!["Eng", "Ops"]);
        assert!(parse_teams(&rows(&[&["Team"]])).is_empty());
    }

    #[test]
    fn test_parse_activities_filters_team_and_defaults_name() {
        let data = rows(&[
            &["Team", "ID", "Name"],
            &["Eng", "build", "Build"],
            &["Ops", "deploy", "Deploy"],
            &["Eng", "test"],
            &["Eng", "", "Broken"],
        ]);
        assert_eq!(
            parse_activities(&data, "Eng"),
            vec![
                Activity {
                    id: "build".to_string(),
                    name: "Build".to_string()
                },
                Activity {
                    id: "test".to_string(),
                    name: "test".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_apply_order_puts_unknown_last() {
        let activities: Vec<Activity> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| Activity {
                id: id.to_string(),
                name: id.to_uppercase(),
            })
            .collect();
        let order = vec!["c".to_string(), "a".to_string(), "gone".to_string()];
        let ids: Vec<String> = apply_order(activities, &order)
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, ["c", "a", "b", "d"]);
    }
}
