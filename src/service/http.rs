//! reqwest-backed implementation of the service contract
//!
//! ## Usage
//!
//! ```no_run
//! use agentlab::service::{AgentService, HttpAgentService};
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let service = HttpAgentService::new("http://localhost:8000", Duration::from_secs(10))?;
//! let health = service.health().await?;
//! println!("API {:?}", health.status);
//! # Ok(())
//! # }
//! ```

use super::error::ServiceError;
use super::types::{
    Cursor, EventsPage, HealthResponse, SessionRequest, SessionResponse, SourceRequest,
    SourceResponse, UploadFile, UploadTarget,
};
use super::AgentService;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest slice of an error body carried into `RequestRejected`
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for the perception-agent service
#[derive(Debug, Clone)]
pub struct HttpAgentService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAgentService {
    /// Build a client rooted at `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/sessions/{id}/events`, with the id percent-encoded as one segment
    fn events_url(&self, session_id: &str) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ServiceError::transport(format!("invalid base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::transport(format!("base URL {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["sessions", session_id, "events"]);
        Ok(url)
    }
}

/// Decode a success body, or turn a non-success status into `RequestRejected`
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::rejected(status.as_u16(), truncate_body(body)));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ServiceError::transport(format!("invalid response body: {}", e)))
}

/// Health replies carry their report on any status; a degraded service
/// may answer 503 with the per-dependency map
async fn decode_health(response: Response) -> Result<HealthResponse, ServiceError> {
    let status = response.status();
    let body = response.text().await?;

    let parsed = serde_json::from_str::<HealthResponse>(&body);
    if status.is_success() {
        return parsed.map_err(|e| ServiceError::transport(format!("invalid response body: {}", e)));
    }

    match parsed {
        Ok(health) if health.status.is_some() => {
            log::debug!("Health report delivered with status {}", status);
            Ok(health)
        }
        _ => Err(ServiceError::rejected(status.as_u16(), truncate_body(body))),
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body.trim().to_string()
}

#[async_trait]
impl AgentService for HttpAgentService {
    async fn health(&self) -> Result<HealthResponse, ServiceError> {
        let response = self.client.get(self.url("/health")).send().await?;
        decode_health(response).await
    }

    async fn create_source(&self, request: &SourceRequest) -> Result<SourceResponse, ServiceError> {
        let response = self
            .client
            .post(self.url("/sources"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<SessionResponse, ServiceError> {
        let response = self
            .client
            .post(self.url("/sessions"))
            .json(request)
            .send()
            .await?;
        decode(response).await
    }

    async fn list_events(
        &self,
        session_id: &str,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<EventsPage, ServiceError> {
        let url = self.events_url(session_id)?;
        let response = self
            .client
            .get(url)
            .query(&[("cursor", cursor.as_query()), ("limit", limit.to_string())])
            .send()
            .await?;
        decode(response).await
    }

    async fn analyze_upload(
        &self,
        target: UploadTarget,
        file: &UploadFile,
    ) -> Result<serde_json::Value, ServiceError> {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| ServiceError::transport(format!("invalid content type: {}", e)))?;
        }
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(target.path()))
            .multipart(form)
            .send()
            .await?;
        decode(response).await
    }

    fn service_type(&self) -> &'static str {
        "http"
    }
}
