//! HTTP client for the n8n public REST API.
//!
//! Every collection endpoint is cursor-paginated: each page returns
//! `{data, nextCursor}` and fetching continues until the cursor is absent or
//! the configured page cap is reached.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::remote::types::{
    Page, RemoteExecution, RemoteTag, RemoteUser, RemoteVariable, RemoteWorkflow,
};

const API_KEY_HEADER: &str = "X-N8N-API-KEY";
const API_PREFIX: &str = "/api/v1";

/// Client for one tenant's n8n instance.
#[derive(Clone)]
pub struct N8nClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    max_pages: usize,
    page_limit: u32,
}

impl N8nClient {
    /// Build a client for the given instance, honoring the configured
    /// request timeout and pagination caps.
    pub fn new(base_url: &str, api_key: &str, sync: &SyncConfig) -> Result<Self, SyncError> {
        if base_url.is_empty() {
            return Err(SyncError::Configuration(
                "tenant base URL is empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(sync.request_timeout_seconds))
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_pages: sync.max_pages,
            page_limit: sync.page_limit,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        cursor: Option<&str>,
        extra_params: &[(&str, String)],
    ) -> Result<Page<T>, SyncError> {
        let mut request = self
            .http
            .get(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("limit", self.page_limit.to_string())]);

        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        for (key, value) in extra_params {
            request = request.query(&[(*key, value.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Connectivity(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(path, status, body));
        }

        response
            .json::<Page<T>>()
            .await
            .map_err(|e| SyncError::RemoteApi {
                status: status.as_u16(),
                message: format!("invalid response body from {path}: {e}"),
            })
    }

    fn status_error(path: &str, status: StatusCode, body: String) -> SyncError {
        let snippet: String = body.chars().take(200).collect();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Configuration(format!(
                "remote API rejected credentials on {path} (status {})",
                status.as_u16()
            )),
            _ => SyncError::RemoteApi {
                status: status.as_u16(),
                message: format!("{path}: {snippet}"),
            },
        }
    }

    /// Fetch a full collection, following cursors up to the page cap.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        extra_params: &[(&str, String)],
    ) -> Result<Vec<T>, SyncError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for page_index in 0..self.max_pages {
            let page: Page<T> = self
                .get_page(path, cursor.as_deref(), extra_params)
                .await?;
            items.extend(page.data);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(items),
            }

            if page_index + 1 == self.max_pages {
                warn!(path, pages = self.max_pages, "page cap hit, truncating fetch");
            }
        }

        Ok(items)
    }

    /// Fetch an optional sub-resource, tolerating 403 on credentials that
    /// lack access to it.
    async fn fetch_all_tolerant<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<T>, SyncError> {
        match self.fetch_all(path, &[]).await {
            Ok(items) => Ok(items),
            Err(SyncError::Configuration(message)) => {
                debug!(path, %message, "optional sub-resource inaccessible, skipping");
                Ok(Vec::new())
            }
            Err(other) => Err(other),
        }
    }

    /// Fetch all workflows visible to this credential.
    #[instrument(skip(self))]
    pub async fn fetch_workflows(&self) -> Result<Vec<RemoteWorkflow>, SyncError> {
        let workflows = self.fetch_all("/workflows", &[]).await?;
        debug!(count = workflows.len(), "fetched workflows");
        Ok(workflows)
    }

    /// Fetch executions, newest first, with their result payloads. When
    /// `since` is given, pagination stops as soon as a page crosses the
    /// window boundary and older rows are dropped.
    #[instrument(skip(self), fields(since = ?since))]
    pub async fn fetch_executions(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteExecution>, SyncError> {
        let mut executions: Vec<RemoteExecution> = Vec::new();
        let mut cursor: Option<String> = None;
        // The payload carries the error detail for failed runs.
        let params = [("includeData", "true".to_string())];

        for _ in 0..self.max_pages {
            let page: Page<RemoteExecution> = self
                .get_page("/executions", cursor.as_deref(), &params)
                .await?;

            let mut crossed_window = false;
            for execution in page.data {
                if let (Some(window_start), Some(started_at)) = (since, execution.started_at)
                    && started_at < window_start
                {
                    crossed_window = true;
                    continue;
                }
                executions.push(execution);
            }

            if crossed_window {
                break;
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = executions.len(), "fetched executions");
        Ok(executions)
    }

    /// Fetch instance users. Optional: some API keys cannot list users.
    pub async fn fetch_users(&self) -> Result<Vec<RemoteUser>, SyncError> {
        self.fetch_all_tolerant("/users").await
    }

    /// Fetch instance variables. Optional: commonly 403 on non-owner keys.
    pub async fn fetch_variables(&self) -> Result<Vec<RemoteVariable>, SyncError> {
        self.fetch_all_tolerant("/variables").await
    }

    /// Fetch workflow tags. Optional: tags also arrive embedded in workflow
    /// payloads, so an inaccessible endpoint costs nothing.
    pub async fn fetch_tags(&self) -> Result<Vec<RemoteTag>, SyncError> {
        self.fetch_all_tolerant("/tags").await
    }
}
