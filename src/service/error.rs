use std::fmt;

/// Outcome of a failed call to the remote service
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Service answered with a non-success status
    RequestRejected { status: u16, message: String },
    /// Connectivity, timeout, or an unreadable response body
    TransportFailure(String),
}

impl ServiceError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        ServiceError::RequestRejected {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ServiceError::TransportFailure(message.into())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::RequestRejected { status, .. } => Some(*status),
            ServiceError::TransportFailure(_) => None,
        }
    }

    /// The service no longer knows the session (404/410 on its resources)
    pub fn is_session_gone(&self) -> bool {
        matches!(self.status(), Some(404) | Some(410))
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        // Status errors only show up here via error_for_status, which we don't use;
        // everything else is transport or decoding trouble.
        match err.status() {
            Some(status) => ServiceError::rejected(status.as_u16(), err.to_string()),
            None => ServiceError::TransportFailure(err.to_string()),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::RequestRejected { status, message } if message.is_empty() => {
                write!(f, "request rejected with status {}", status)
            }
            ServiceError::RequestRejected { status, message } => {
                write!(f, "request rejected with status {}: {}", status, message)
            }
            ServiceError::TransportFailure(msg) => write!(f, "transport failure: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Failures surfaced by lifecycle operations on the client
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    /// Caller error; no request was attempted
    PreconditionFailed(String),
    /// Operation requires a bound session
    NoActiveSession,
    SourceCreationFailed(ServiceError),
    SessionCreationFailed(ServiceError),
    AnalysisFailed(ServiceError),
    HealthCheckFailed(ServiceError),
}

impl OrchestratorError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        OrchestratorError::PreconditionFailed(msg.into())
    }

    /// Underlying service failure, if the request got as far as the network
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            OrchestratorError::SourceCreationFailed(e)
            | OrchestratorError::SessionCreationFailed(e)
            | OrchestratorError::AnalysisFailed(e)
            | OrchestratorError::HealthCheckFailed(e) => Some(e),
            OrchestratorError::PreconditionFailed(_) | OrchestratorError::NoActiveSession => None,
        }
    }

    pub fn is_request_rejected(&self) -> bool {
        matches!(self.service_error(), Some(ServiceError::RequestRejected { .. }))
    }

    pub fn is_transport_failure(&self) -> bool {
        matches!(self.service_error(), Some(ServiceError::TransportFailure(_)))
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::PreconditionFailed(msg) => write!(f, "precondition failed: {}", msg),
            OrchestratorError::NoActiveSession => write!(f, "no active session"),
            OrchestratorError::SourceCreationFailed(e) => write!(f, "failed to create source: {}", e),
            OrchestratorError::SessionCreationFailed(e) => write!(f, "failed to start session: {}", e),
            OrchestratorError::AnalysisFailed(e) => write!(f, "analysis failed: {}", e),
            OrchestratorError::HealthCheckFailed(e) => write!(f, "health check failed: {}", e),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.service_error().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_families() {
        let rejected = OrchestratorError::SessionCreationFailed(ServiceError::rejected(500, "boom"));
        assert!(rejected.is_request_rejected());
        assert!(!rejected.is_transport_failure());

        let offline = OrchestratorError::SourceCreationFailed(ServiceError::transport("connection refused"));
        assert!(offline.is_transport_failure());

        let caller = OrchestratorError::precondition("no source");
        assert!(caller.service_error().is_none());
    }

    #[test]
    fn test_session_gone_statuses() {
        assert!(ServiceError::rejected(404, "").is_session_gone());
        assert!(ServiceError::rejected(410, "").is_session_gone());
        assert!(!ServiceError::rejected(503, "").is_session_gone());
        assert!(!ServiceError::transport("timeout").is_session_gone());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ServiceError::rejected(422, "").to_string(),
            "request rejected with status 422"
        );
        assert_eq!(
            OrchestratorError::SourceCreationFailed(ServiceError::rejected(500, "down")).to_string(),
            "failed to create source: request rejected with status 500: down"
        );
    }
}
