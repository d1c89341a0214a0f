//! Upload Analysis Invoker
//!
//! One-shot submission of a file for offline analysis. Independent of the
//! source and session lifecycle; nothing here touches the event log.

use crate::service::{AgentService, OrchestratorError, UploadFile, UploadTarget};
use std::sync::Arc;

/// Structured result returned by the service for one upload
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub target: UploadTarget,
    pub file_name: String,
    pub body: serde_json::Value,
}

pub struct UploadAnalyzer {
    service: Arc<dyn AgentService>,
}

impl UploadAnalyzer {
    pub fn new(service: Arc<dyn AgentService>) -> Self {
        Self { service }
    }

    /// Submit `file` to `target`; no retry on failure
    pub async fn analyze(
        &self,
        file: Option<&UploadFile>,
        target: UploadTarget,
    ) -> Result<AnalysisResult, OrchestratorError> {
        let file = file.ok_or_else(|| OrchestratorError::precondition("select a file to analyze"))?;
        if file.is_empty() {
            return Err(OrchestratorError::precondition(format!(
                "file '{}' is empty",
                file.file_name
            )));
        }

        log::info!(
            "📤 Uploading {} ({} bytes) to {}",
            file.file_name,
            file.bytes.len(),
            target.path()
        );

        let body = self.service.analyze_upload(target, file).await.map_err(|e| {
            log::error!("❌ Analysis of {} failed: {}", file.file_name, e);
            OrchestratorError::AnalysisFailed(e)
        })?;

        Ok(AnalysisResult {
            target,
            file_name: file.file_name.clone(),
            body,
        })
    }
}
