use crate::service::{AgentService, HealthResponse, OrchestratorError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Service health as seen by the client
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub status: Option<String>,
    /// Per-dependency status reported by the service
    pub services: BTreeMap<String, String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn from_response(response: HealthResponse, checked_at: DateTime<Utc>) -> Self {
        Self {
            status: response.status,
            services: response.services,
            checked_at,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("ok"))
    }

    /// Dependencies whose status is anything other than "ok"
    pub fn degraded(&self) -> Vec<(&str, &str)> {
        self.services
            .iter()
            .filter(|(_, status)| !status.eq_ignore_ascii_case("ok"))
            .map(|(name, status)| (name.as_str(), status.as_str()))
            .collect()
    }
}

/// Probe the service's health endpoint
pub async fn check_health(service: &dyn AgentService) -> Result<HealthReport, OrchestratorError> {
    match service.health().await {
        Ok(response) => {
            let report = HealthReport::from_response(response, Utc::now());
            if report.is_ok() {
                log::info!("💚 API healthy ({} dependencies)", report.services.len());
            } else {
                log::warn!("⚠️  API status: {:?}, degraded: {:?}", report.status, report.degraded());
            }
            Ok(report)
        }
        Err(e) => {
            log::warn!("⚠️  API unreachable: {}", e);
            Err(OrchestratorError::HealthCheckFailed(e))
        }
    }
}
