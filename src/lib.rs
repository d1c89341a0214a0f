//! Client for driving a perception-agent service
//!
//! Connects an acquisition source, runs analysis sessions on it, and keeps
//! an incrementally synchronized log of the events each session emits.

pub mod config;
pub mod orchestrator;
pub mod service;

pub use config::{ClientConfig, ConfigError, PollConfig};
pub use orchestrator::AgentLabClient;
pub use service::{AgentService, HttpAgentService, OrchestratorError, ServiceError};
