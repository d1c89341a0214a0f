//! Client session context
//!
//! `AgentLabClient` owns everything one client instance needs: the service
//! handle, the source and session controllers, the event synchronizer, and
//! the poller task. Nothing is global, so several clients (or a client with
//! a fake service in tests) can run side by side.
//!
//! ```text
//! connect_source ──sourceId──▶ start_session ──bind──▶ EventSynchronizer ──▶ EventLog ──▶ projections
//!                                   stop_session ──unbind──┘
//! analyze_upload (independent)
//! ```

use super::health::{check_health, HealthReport};
use super::projection::{self, MetricSnapshot};
use super::session::{Session, SessionController};
use super::snapshot::save_snapshot;
use super::source::{Source, SourceController};
use super::synchronizer::{EventSynchronizer, PollerHandle, SyncStatus};
use super::upload::{AnalysisResult, UploadAnalyzer};
use crate::config::ClientConfig;
use crate::service::{
    AgentService, Event, HttpAgentService, OrchestratorError, Pipelines, Profile, ServiceError,
    SourceKind, UploadFile, UploadTarget,
};
use std::path::Path;
use std::sync::Arc;

pub struct AgentLabClient {
    service: Arc<dyn AgentService>,
    config: ClientConfig,
    sources: SourceController,
    sessions: SessionController,
    synchronizer: EventSynchronizer,
    uploads: UploadAnalyzer,
    poller: Option<PollerHandle>,
}

impl AgentLabClient {
    pub fn new(service: Arc<dyn AgentService>, config: ClientConfig) -> Self {
        let synchronizer = EventSynchronizer::new(service.clone(), config.poll.clone());
        Self {
            sources: SourceController::new(service.clone()),
            sessions: SessionController::new(service.clone(), synchronizer.clone()),
            uploads: UploadAnalyzer::new(service.clone()),
            synchronizer,
            service,
            config,
            poller: None,
        }
    }

    /// Client talking HTTP to `config.api_base`
    pub fn from_config(config: ClientConfig) -> Result<Self, ServiceError> {
        let service = HttpAgentService::new(&config.api_base, config.request_timeout)?;
        log::info!("🌐 Using {} service at {}", service.service_type(), service.base_url());
        Ok(Self::new(Arc::new(service), config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn synchronizer(&self) -> &EventSynchronizer {
        &self.synchronizer
    }

    pub async fn check_health(&self) -> Result<HealthReport, OrchestratorError> {
        check_health(self.service.as_ref()).await
    }

    pub async fn connect_source(
        &mut self,
        kind: SourceKind,
        locator: Option<&str>,
    ) -> Result<&Source, OrchestratorError> {
        self.sources.connect(kind, locator).await
    }

    pub fn source(&self) -> Option<&Source> {
        self.sources.current()
    }

    /// Start a session on the held source
    pub async fn start_session(
        &mut self,
        pipelines: Pipelines,
        profile: Profile,
    ) -> Result<&Session, OrchestratorError> {
        let source_id = self.sources.source_id();
        self.sessions.start(source_id, pipelines, profile).await
    }

    /// Stop the active session; a no-op without one
    pub async fn stop_session(&mut self) -> bool {
        self.sessions.stop().await
    }

    /// Latest session, active or stopped
    pub fn session(&self) -> Option<&Session> {
        self.sessions.current()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.sessions.active()
    }

    /// Fold synchronizer-observed session loss back into the session state
    pub async fn reconcile(&mut self) -> bool {
        self.sessions.reconcile().await
    }

    pub async fn analyze_upload(
        &self,
        file: Option<&UploadFile>,
        target: UploadTarget,
    ) -> Result<AnalysisResult, OrchestratorError> {
        self.uploads.analyze(file, target).await
    }

    /// Start the background poller; a second call is a no-op
    pub fn start_polling(&mut self) {
        if self.poller.as_ref().is_some_and(|p| !p.is_finished()) {
            return;
        }
        self.poller = Some(self.synchronizer.spawn_poller());
    }

    pub fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
            log::info!("⏰ Event poller stopped");
        }
    }

    pub async fn events(&self) -> Vec<Event> {
        self.synchronizer.events().await
    }

    pub async fn latest_metric(&self) -> Option<Event> {
        self.synchronizer
            .read_log(|log| projection::latest_metric(log.events()).cloned())
            .await
    }

    pub async fn metric_snapshot(&self) -> Option<MetricSnapshot> {
        self.synchronizer
            .read_log(|log| MetricSnapshot::latest(log.events()))
            .await
    }

    pub async fn sync_status(&self) -> SyncStatus {
        self.synchronizer.status().await
    }

    /// Write the current log to `path`
    pub async fn export_events(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let snapshot = self
            .synchronizer
            .snapshot()
            .await
            .ok_or(OrchestratorError::NoActiveSession)?;
        save_snapshot(&snapshot, path)
    }
}

impl Drop for AgentLabClient {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
