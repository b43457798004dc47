//! Device-local persistent store.

pub mod local_store;

pub use local_store::LocalStore;

/// Key builders for per-user scoped records.
pub mod keys {
    /// Scope key for per-(user, day) records: pending counts, running totals
    /// and sync history.
    pub fn user_day(user_email: &str, day: &str) -> String {
        format!("{}_{}", user_email, day)
    }

    /// Scope key for a user's activity order within a team.
    pub fn user_team(user_email: &str, team: &str) -> String {
        format!("{}_{}", user_email, team)
    }

    /// Cache key for roster data (`kind` is `teams` or `activities`).
    pub fn roster_cache(kind: &str, identifier: &str, user_email: &str) -> String {
        format!("cache_{}_{}_{}", kind, identifier, user_email)
    }

    /// Suffix shared by every cache key that belongs to `user_email`.
    pub fn roster_cache_suffix(user_email: &str) -> String {
        format!("_{}", user_email)
    }
}
