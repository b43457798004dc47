// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Sheets API client for the remote activity log and roster.
//!
//! Handles:
//! - Appending log rows in one call per batch
//! - Reading value ranges (log rows, roster)
//! - Mapping auth and rate-limit responses to typed errors

use crate::error::AppError;
use crate::services::identity::IdentityProvider;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

/// Remote spreadsheet operations used by the core.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Append rows to a range as one atomic operation.
    async fn append_rows(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<(), AppError>;

    /// Read a range; every cell is returned as text.
    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, AppError>;
}

/// Google Sheets REST client.
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    identity: Arc<dyn IdentityProvider>,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: String, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: SHEETS_BASE_URL.to_string(),
            spreadsheet_id,
            identity,
        }
    }

    /// Override the API host (tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // Rate limit - the next scheduled cycle retries
        if status.as_u16() == 429 {
            tracing::warn!("Sheets rate limit hit (429)");
            return Err(AppError::SheetsApi(AppError::SHEETS_RATE_LIMIT.to_string()));
        }

        // Unauthorized / forbidden - credential expired, revoked or lacks scope
        if status.as_u16() == 401 || status.as_u16() == 403 {
            tracing::warn!(status = %status, "Sheets rejected credential");
            return Err(AppError::SheetsApi(AppError::SHEETS_AUTH_ERROR.to_string()));
        }

        Err(AppError::SheetsApi(format!("HTTP {}: {}", status, body)))
    }
}

#[async_trait]
impl SheetsApi for SheetsClient {
    async fn append_rows(&self, range: &str, rows: Vec<Vec<Value>>) -> Result<(), AppError> {
        let token = self.identity.access_token(false).await?;
        let url = format!("{}:append", self.values_url(range));
        let row_count = rows.len();

        let body = serde_json::json!({ "values": rows });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        let response = self.check_response(response).await?;
        let reply: AppendResponse = response
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("JSON parse error: {}", e)))?;

        tracing::debug!(
            range,
            rows = row_count,
            updated_range = ?reply.updates.as_ref().and_then(|u| u.updated_range.as_deref()),
            "Sheets append acknowledged"
        );
        Ok(())
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, AppError> {
        let token = self.identity.access_token(false).await?;

        let response = self
            .http
            .get(self.values_url(range))
            .bearer_auth(&token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| AppError::SheetsApi(e.to_string()))?;

        let response = self.check_response(response).await?;
        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| AppError::SheetsApi(format!("JSON parse error: {}", e)))?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

/// Render a cell as the text the sheet would display.
fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// `values.get` response body. Empty ranges omit `values`.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// `values.append` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: Option<String>,
}
