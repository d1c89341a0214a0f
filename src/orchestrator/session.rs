//! Session Controller - starts and stops analysis sessions
//!
//! Owns the active session binding and signals the event synchronizer on
//! every transition: a started session rebinds it (fresh log, initial
//! cursor), a stopped one releases it.

use super::synchronizer::{EventSynchronizer, SyncPhase};
use crate::service::{
    AgentService, OrchestratorError, Pipelines, Profile, SessionRequest, SessionState,
};
use std::sync::Arc;

/// A session as held by the client
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub source_id: String,
    pub pipelines: Pipelines,
    pub profile: Profile,
    pub state: SessionState,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.state != SessionState::Stopped
    }
}

pub struct SessionController {
    service: Arc<dyn AgentService>,
    synchronizer: EventSynchronizer,
    /// Latest session; kept after it stops so its final state stays visible
    current: Option<Session>,
}

impl SessionController {
    pub fn new(service: Arc<dyn AgentService>, synchronizer: EventSynchronizer) -> Self {
        Self {
            service,
            synchronizer,
            current: None,
        }
    }

    /// Latest session, active or stopped
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Session currently bound to the synchronizer
    pub fn active(&self) -> Option<&Session> {
        self.current.as_ref().filter(|s| s.is_active())
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active().map(|s| s.session_id.as_str())
    }

    /// Start a session on `source_id`
    ///
    /// Without a source this fails before any request is made. A rejected or
    /// failed request leaves the held session untouched.
    pub async fn start(
        &mut self,
        source_id: Option<&str>,
        pipelines: Pipelines,
        profile: Profile,
    ) -> Result<&Session, OrchestratorError> {
        let source_id = source_id
            .ok_or_else(|| OrchestratorError::precondition("connect a source before starting a session"))?;

        if !pipelines.any_enabled() {
            return Err(OrchestratorError::precondition(
                "enable at least one pipeline (vision, audio or llm)",
            ));
        }

        let request = SessionRequest {
            source_id: source_id.to_string(),
            pipelines,
            profile,
        };

        let response = self.service.create_session(&request).await.map_err(|e| {
            log::error!("❌ Failed to start session on source {}: {}", source_id, e);
            OrchestratorError::SessionCreationFailed(e)
        })?;

        if let Some(previous) = self.active() {
            log::info!("🔄 Session {} superseded by {}", previous.session_id, response.session_id);
        }

        let session = Session {
            session_id: response.session_id,
            source_id: request.source_id,
            pipelines,
            profile,
            state: SessionState::from_service(&response.state),
        };

        if session.is_active() {
            self.synchronizer.bind(&session.session_id).await;
            log::info!(
                "▶️  Session {} started (profile: {}, state: {})",
                session.session_id,
                session.profile,
                session.state
            );
        } else {
            // Nothing to poll; the previous session is replaced all the same
            self.synchronizer.unbind().await;
            log::warn!(
                "⚠️  Session {} was created already stopped, not polling it",
                session.session_id
            );
        }

        Ok(self.current.insert(session))
    }

    /// Stop the active session; a no-op when nothing is active or polled
    ///
    /// Purely local: no request is sent to the service. The synchronizer is
    /// released whenever it is bound, even if the held session is no longer
    /// active. Returns whether anything was stopped.
    pub async fn stop(&mut self) -> bool {
        let polling = self.synchronizer.phase().await == SyncPhase::Polling;

        match self.current.as_mut().filter(|s| s.is_active()) {
            Some(session) => {
                session.state = SessionState::Stopped;
                log::info!("⏹️  Session {} stopped", session.session_id);
            }
            None if polling => {
                log::warn!("⚠️  Releasing event synchronizer bound without an active session");
            }
            None => {
                log::debug!("Stop requested with no active session");
                return false;
            }
        }

        self.synchronizer.unbind().await;
        true
    }

    /// Mark the session stopped if the synchronizer lost it
    pub async fn reconcile(&mut self) -> bool {
        let status = self.synchronizer.status().await;
        let Some(lost) = status.lost_session else {
            return false;
        };

        match self.current.as_mut() {
            Some(session) if session.is_active() && session.session_id == lost => {
                log::warn!("⚠️  Session {} ended by the service", session.session_id);
                session.state = SessionState::Stopped;
                true
            }
            _ => false,
        }
    }
}
