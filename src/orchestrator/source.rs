//! Source Controller - creates and holds the acquisition source binding

use crate::service::{AgentService, OrchestratorError, SourceKind, SourceRequest};
use std::sync::Arc;

/// An acquisition source created by the service
///
/// Immutable once created; reconnecting produces a new `Source`.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub source_id: String,
    pub kind: SourceKind,
    pub locator: Option<String>,
    pub label: String,
}

pub struct SourceController {
    service: Arc<dyn AgentService>,
    current: Option<Source>,
}

impl SourceController {
    pub fn new(service: Arc<dyn AgentService>) -> Self {
        Self {
            service,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Source> {
        self.current.as_ref()
    }

    pub fn source_id(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.source_id.as_str())
    }

    /// Create a source and make it the held binding
    ///
    /// On failure the previously held source is left as it was, so a
    /// running session keeps working and the caller may retry.
    pub async fn connect(
        &mut self,
        kind: SourceKind,
        locator: Option<&str>,
    ) -> Result<&Source, OrchestratorError> {
        let locator = locator.map(str::trim).filter(|l| !l.is_empty());

        if kind.requires_locator() && locator.is_none() {
            return Err(OrchestratorError::precondition(format!(
                "a {} source needs a {}",
                kind,
                if kind == SourceKind::Rtsp { "stream URL" } else { "device id" }
            )));
        }

        let request = SourceRequest::new(kind, locator);
        let response = self.service.create_source(&request).await.map_err(|e| {
            log::error!("❌ Failed to create {} source: {}", kind, e);
            OrchestratorError::SourceCreationFailed(e)
        })?;

        if let Some(previous) = &self.current {
            log::info!(
                "🔄 Replacing source {} with {}",
                previous.source_id,
                response.source_id
            );
        }
        log::info!("📷 Source connected: {} ({})", response.source_id, kind);

        let source = Source {
            source_id: response.source_id,
            kind,
            locator: if kind.requires_locator() {
                locator.map(str::to_string)
            } else {
                None
            },
            label: response.label,
        };

        Ok(self.current.insert(source))
    }
}
