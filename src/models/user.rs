// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Signed-in identity and the session context passed to core operations.

use serde::{Deserialize, Serialize};

/// Identity persisted across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIdentity {
    /// Email of the signed-in Google account
    pub email: Option<String>,
    /// Team picked from the roster
    pub team: Option<String>,
}

impl StoredIdentity {
    /// Session described by the persisted identity, if a user is signed in.
    pub fn session(&self) -> Option<Session> {
        self.email.as_ref().map(|email| Session {
            user_email: email.clone(),
            team: self.team.clone(),
        })
    }
}

/// Session context: constructed at login, torn down at logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_email: String,
    pub team: Option<String>,
}

impl Session {
    pub fn new(user_email: impl Into<String>, team: Option<String>) -> Self {
        Self {
            user_email: user_email.into(),
            team,
        }
    }

    /// Selected team, if any.
    pub fn team(&self) -> Option<&str> {
        self.team.as_deref()
    }

    /// Sync runs only once a user has picked a team.
    pub fn is_ready(&self) -> bool {
        self.team.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_identity() {
        let identity = StoredIdentity::default();
        assert!(identity.session().is_none());

        let identity = StoredIdentity {
            email: Some("a@x.com".to_string()),
            team: None,
        };
        let session = identity.session().unwrap();
        assert_eq!(session.user_email, "a@x.com");
        assert!(!session.is_ready());

        let identity = StoredIdentity {
            email: Some("a@x.com".to_string()),
            team: Some("Eng".to_string()),
        };
        assert_eq!(identity.session().unwrap().team(), Some("Eng"));
    }
}
