//! Remote contract of the perception-agent service
//!
//! The orchestrator only talks to the service through the `AgentService`
//! trait, so tests and alternative transports can stand in for HTTP.

pub mod error;
pub mod http;
pub mod types;

use async_trait::async_trait;

pub use error::{OrchestratorError, ServiceError};
pub use http::HttpAgentService;
pub use types::{
    Cursor, Event, EventsPage, HealthResponse, Pipelines, Profile, SessionRequest,
    SessionResponse, SessionState, SourceKind, SourceRequest, SourceResponse, UploadFile,
    UploadTarget,
};

/// Request/response contract of the service
///
/// Each call is one suspension point: it resolves to a complete payload or a
/// `ServiceError`, never a partial response. Timeouts belong to the
/// implementation and surface as `TransportFailure`.
#[async_trait]
pub trait AgentService: Send + Sync {
    async fn health(&self) -> Result<HealthResponse, ServiceError>;

    async fn create_source(&self, request: &SourceRequest) -> Result<SourceResponse, ServiceError>;

    async fn create_session(&self, request: &SessionRequest) -> Result<SessionResponse, ServiceError>;

    /// Events at or after `cursor`, at most `limit` of them
    async fn list_events(
        &self,
        session_id: &str,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<EventsPage, ServiceError>;

    async fn analyze_upload(
        &self,
        target: UploadTarget,
        file: &UploadFile,
    ) -> Result<serde_json::Value, ServiceError>;

    /// Short name for logging
    fn service_type(&self) -> &'static str;
}
