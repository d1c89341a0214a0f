//! Session orchestration and incremental event synchronization
//!
//! ## Components
//!
//! - `source` - creates and holds the acquisition source (`sourceId`)
//! - `session` - starts/stops analysis sessions bound to a source
//! - `synchronizer` - cursor-based poller feeding the event log
//! - `event_log` - append-only log of the active session's events
//! - `projection` - read-only summaries of the log (latest metric, counts)
//! - `upload` - one-shot upload analysis, independent of sessions
//! - `health` - service health probe
//! - `snapshot` - save/load an event log as JSON
//! - `client` - the per-instance context tying it all together
//!
//! Control flow: source → session → synchronizer → event log → projections.
//! Upload analysis sits on the side and touches none of it.

pub mod backoff;
pub mod client;
pub mod event_log;
pub mod health;
pub mod projection;
pub mod session;
pub mod snapshot;
pub mod source;
pub mod synchronizer;
pub mod upload;

pub use client::AgentLabClient;
pub use event_log::EventLog;
pub use health::HealthReport;
pub use projection::MetricSnapshot;
pub use session::{Session, SessionController};
pub use snapshot::EventLogSnapshot;
pub use source::{Source, SourceController};
pub use synchronizer::{CycleOutcome, EventSynchronizer, PollerHandle, SyncPhase, SyncStatus};
pub use upload::{AnalysisResult, UploadAnalyzer};
