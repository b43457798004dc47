// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google identity: bearer credentials and the signed-in email.
//!
//! Handles:
//! - Access token refresh from a stored OAuth refresh token
//! - In-memory token caching with a refresh margin
//! - Userinfo lookup for the account email
//! - Token revocation on logout

use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Source of credentials for remote calls.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Bearer token for Google APIs.
    ///
    /// `interactive` marks a user-initiated sign-in; background callers pass
    /// `false` and get `AuthRequired` when consent is needed.
    async fn access_token(&self, interactive: bool) -> Result<String, AppError>;

    /// Email of the account behind the credential.
    async fn user_email(&self) -> Result<String, AppError>;

    /// Revoke the current credential and forget it locally.
    async fn revoke(&self) -> Result<(), AppError>;
}

/// Cached access token with expiry information.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Google OAuth identity backed by a refresh token.
pub struct GoogleIdentity {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    refresh_token: Option<String>,
    token_url: String,
    userinfo_url: String,
    revoke_url: String,
    /// Also serializes refreshes: only one task refreshes at a time.
    cache: Mutex<Option<CachedToken>>,
    signed_out: AtomicBool,
}

impl GoogleIdentity {
    pub fn new(client_id: String, client_secret: String, refresh_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            refresh_token,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            revoke_url: GOOGLE_REVOKE_URL.to_string(),
            cache: Mutex::new(None),
            signed_out: AtomicBool::new(false),
        }
    }

    /// Point all Google endpoints at another host (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.token_url = format!("{}/token", base);
        self.userinfo_url = format!("{}/oauth2/v2/userinfo", base);
        self.revoke_url = format!("{}/revoke", base);
        self
    }

    /// Exchange the refresh token for a fresh access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(format!("Token refresh request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Google token refresh rejected");
            // invalid_grant means the refresh token was revoked or expired
            return Err(AppError::AuthRequired(format!(
                "Token refresh failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("Failed to parse token response: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentity {
    async fn access_token(&self, interactive: bool) -> Result<String, AppError> {
        if interactive {
            self.signed_out.store(false, Ordering::SeqCst);
        } else if self.signed_out.load(Ordering::SeqCst) {
            return Err(AppError::AuthRequired("Signed out".to_string()));
        }

        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if now + margin < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        let refresh_token = self.refresh_token.as_deref().ok_or_else(|| {
            AppError::AuthRequired("No refresh token configured; consent required".to_string())
        })?;

        tracing::info!("Access token missing or expiring, refreshing");
        let refreshed = self.refresh(refresh_token).await?;

        let expires_at = now + Duration::seconds(refreshed.expires_in);
        *cache = Some(CachedToken {
            access_token: refreshed.access_token.clone(),
            expires_at,
        });

        tracing::info!(expires_at = %expires_at, "Token refreshed and cached");
        Ok(refreshed.access_token)
    }

    async fn user_email(&self) -> Result<String, AppError> {
        let token = self.access_token(false).await?;

        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(format!("Userinfo request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(AppError::SheetsApi(AppError::SHEETS_AUTH_ERROR.to_string()));
        }
        if !status.is_success() {
            return Err(AppError::SheetsApi(format!(
                "Failed to fetch user info: HTTP {}",
                status
            )));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("Failed to parse user info: {}", e)))?;

        info.email
            .ok_or_else(|| AppError::AuthRequired("Account has no email scope".to_string()))
    }

    async fn revoke(&self) -> Result<(), AppError> {
        self.signed_out.store(true, Ordering::SeqCst);
        let Some(cached) = self.cache.lock().await.take() else {
            return Ok(());
        };

        // Revocation failures are ignored: the local token is already gone.
        if let Err(e) = self
            .http
            .post(&self.revoke_url)
            .form(&[("token", cached.access_token.as_str())])
            .send()
            .await
        {
            tracing::warn!(error = %e, "Google token revocation request failed");
        }

        tracing::info!("Google access token revoked");
        Ok(())
    }
}

/// Fixed credential for local development and tests.
pub struct StaticIdentity {
    token: String,
    email: String,
    signed_out: AtomicBool,
}

impl StaticIdentity {
    pub fn new(token: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            email: email.into(),
            signed_out: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn access_token(&self, interactive: bool) -> Result<String, AppError> {
        if interactive {
            self.signed_out.store(false, Ordering::SeqCst);
        } else if self.signed_out.load(Ordering::SeqCst) {
            return Err(AppError::AuthRequired("Signed out".to_string()));
        }
        Ok(self.token.clone())
    }

    async fn user_email(&self) -> Result<String, AppError> {
        self.access_token(false).await?;
        Ok(self.email.clone())
    }

    async fn revoke(&self) -> Result<(), AppError> {
        self.signed_out.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Token refresh response from Google.
#[derive(Debug, Clone, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_identity_signs_out_until_interactive_login() {
        let identity = StaticIdentity::new("tok", "a@x.com");
        assert_eq!(identity.access_token(false).await.unwrap(), "tok");

        identity.revoke().await.unwrap();
        let err = identity.access_token(false).await.unwrap_err();
        assert!(err.is_auth_error());
        assert!(identity.user_email().await.is_err());

        assert_eq!(identity.access_token(true).await.unwrap(), "tok");
        assert_eq!(identity.user_email().await.unwrap(), "a@x.com");
    }

    #[tokio::test]
    async fn test_google_identity_without_refresh_token_requires_consent() {
        let identity = GoogleIdentity::new("id".to_string(), "secret".to_string(), None);
        let err = identity.access_token(false).await.unwrap_err();
        assert!(matches!(err, AppError::AuthRequired(_)));
    }
}
