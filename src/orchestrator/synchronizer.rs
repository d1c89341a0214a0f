//! Event Synchronizer - cursor-based incremental event fetching
//!
//! Sole writer of the event log and cursor. While a session is bound, each
//! fetch cycle requests the page at the current cursor, appends it in the
//! order received, and advances the cursor.
//!
//! ## State machine
//!
//! ```text
//! Idle ──bind(session)──▶ Polling ──unbind / bind(other)──▶ Idle | Polling(other)
//! ```
//!
//! There is no error state. A failed cycle leaves the log and cursor
//! untouched and the next tick retries from the same position.
//!
//! ## Switch-over
//!
//! Every bind/unbind bumps a generation counter. A cycle remembers the
//! generation it was issued under and its result is applied only if that
//! generation is still current when the response arrives, so a late page
//! from a previous session never lands in the new session's log.
//!
//! Cycles are fire-and-forget and may overlap. A page is applied only if no
//! other page was applied since it was requested; otherwise it is dropped
//! as superseded and the next tick fetches from the newer cursor.

use super::backoff::PollBackoff;
use super::event_log::EventLog;
use super::snapshot::EventLogSnapshot;
use crate::config::PollConfig;
use crate::service::{AgentService, Cursor, Event, ServiceError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No session bound
    Idle,
    /// Session bound, periodic fetch active
    Polling,
}

/// Result of one fetch cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Nothing bound, no request made
    Idle,
    /// Tick skipped by backoff, no request made
    Skipped,
    /// Page applied to the log
    Applied { appended: usize, cursor: Cursor },
    /// Fetch failed; log and cursor untouched
    Failed(ServiceError),
    /// Bound session changed while the fetch was in flight
    Discarded { fetched_for: String },
    /// Another page was applied while this one was in flight
    Superseded,
    /// Service reported the session gone; synchronizer is now idle
    SessionLost(ServiceError),
}

/// Point-in-time view of the synchronizer
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub session_id: Option<String>,
    pub cursor: Cursor,
    pub event_count: usize,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// Session the service reported as gone, until the next bind
    pub lost_session: Option<String>,
}

#[derive(Debug, Clone)]
struct Binding {
    session_id: String,
    generation: u64,
}

/// What a cycle captured when it was issued
#[derive(Debug, Clone)]
struct FetchTicket {
    session_id: String,
    generation: u64,
    cursor: Cursor,
    applied_pages: u64,
}

#[derive(Debug)]
struct SyncState {
    binding: Option<Binding>,
    generation: u64,
    cursor: Cursor,
    log: EventLog,
    /// Pages applied under the current binding
    applied_pages: u64,
    backoff: PollBackoff,
    last_error: Option<String>,
    lost_session: Option<String>,
}

impl SyncState {
    fn phase(&self) -> SyncPhase {
        if self.binding.is_some() {
            SyncPhase::Polling
        } else {
            SyncPhase::Idle
        }
    }

    /// Drop the binding; in-flight cycles become stale
    fn release(&mut self) {
        self.generation += 1;
        self.binding = None;
        self.applied_pages = 0;
        self.backoff.reset();
    }

    /// Drop the binding and invalidate the cursor
    fn detach(&mut self) {
        self.release();
        self.cursor = Cursor::initial();
    }
}

/// Cursor-based poller for the active session's event stream
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct EventSynchronizer {
    service: Arc<dyn AgentService>,
    config: PollConfig,
    state: Arc<RwLock<SyncState>>,
}

impl EventSynchronizer {
    pub fn new(service: Arc<dyn AgentService>, config: PollConfig) -> Self {
        let backoff = PollBackoff::new(config.backoff, config.backoff_max_skip);
        Self {
            service,
            config,
            state: Arc::new(RwLock::new(SyncState {
                binding: None,
                generation: 0,
                cursor: Cursor::initial(),
                log: EventLog::new(),
                applied_pages: 0,
                backoff,
                last_error: None,
                lost_session: None,
            })),
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Bind a session: clear the log, reset the cursor, start polling
    ///
    /// Returns the generation the binding was issued under.
    pub async fn bind(&self, session_id: &str) -> u64 {
        let mut state = self.state.write().await;
        state.detach();
        state.binding = Some(Binding {
            session_id: session_id.to_string(),
            generation: state.generation,
        });
        state.log.reset_for(session_id);
        state.last_error = None;
        state.lost_session = None;

        log::info!("🔗 Event synchronizer bound to session {}", session_id);
        state.generation
    }

    /// Halt polling and invalidate the cursor
    ///
    /// The log of the last session is kept for display until the next bind.
    pub async fn unbind(&self) {
        let mut state = self.state.write().await;
        if let Some(binding) = state.binding.as_ref() {
            log::info!("⏹️  Event synchronizer released session {}", binding.session_id);
        }
        state.detach();
    }

    /// Run one fetch cycle against the bound session
    pub async fn poll_once(&self) -> CycleOutcome {
        let ticket = {
            let mut state = self.state.write().await;
            let Some(binding) = state.binding.clone() else {
                return CycleOutcome::Idle;
            };
            if state.backoff.should_skip_tick() {
                log::debug!("Backoff: skipping fetch for session {}", binding.session_id);
                return CycleOutcome::Skipped;
            }
            FetchTicket {
                session_id: binding.session_id,
                generation: binding.generation,
                cursor: state.cursor.clone(),
                applied_pages: state.applied_pages,
            }
        };

        log::debug!(
            "📥 Fetching events for session {} at cursor {}",
            ticket.session_id,
            ticket.cursor
        );

        let result = self
            .service
            .list_events(&ticket.session_id, &ticket.cursor, self.config.page_limit)
            .await;

        self.apply(ticket, result).await
    }

    async fn apply(
        &self,
        ticket: FetchTicket,
        result: Result<crate::service::EventsPage, ServiceError>,
    ) -> CycleOutcome {
        let mut state = self.state.write().await;

        let current_generation = state.binding.as_ref().map(|b| b.generation);
        if current_generation != Some(ticket.generation) {
            log::debug!(
                "Discarding late result for session {} (now bound to {:?})",
                ticket.session_id,
                state.binding.as_ref().map(|b| b.session_id.as_str())
            );
            return CycleOutcome::Discarded {
                fetched_for: ticket.session_id,
            };
        }

        if state.applied_pages != ticket.applied_pages {
            log::debug!(
                "Dropping superseded page for session {} (cursor {} already consumed)",
                ticket.session_id,
                ticket.cursor
            );
            return CycleOutcome::Superseded;
        }

        match result {
            Ok(page) => {
                let received = page.items.len();
                let appended = if self.config.dedupe_by_id {
                    state.log.append_unique(page.items)
                } else {
                    state.log.append(page.items)
                };

                match page.next_cursor {
                    Some(next) if state.cursor.regresses_to(&next) => {
                        log::warn!(
                            "⚠️  Ignoring cursor regression {} → {} for session {}",
                            state.cursor,
                            next,
                            ticket.session_id
                        );
                    }
                    Some(next) => state.cursor = next,
                    // No continuation marker: retry from the same position next tick
                    None => {}
                }

                state.applied_pages += 1;
                state.backoff.record_success();
                state.last_error = None;

                if received > 0 {
                    log::debug!(
                        "✅ Appended {} event(s) for session {} (cursor {}, total {})",
                        appended,
                        ticket.session_id,
                        state.cursor,
                        state.log.len()
                    );
                }

                CycleOutcome::Applied {
                    appended,
                    cursor: state.cursor.clone(),
                }
            }
            Err(e) if e.is_session_gone() => {
                log::error!("❌ Session {} is gone: {}", ticket.session_id, e);
                state.lost_session = Some(ticket.session_id);
                state.last_error = Some(e.to_string());
                // Cursor stays where the last page left it
                state.release();
                CycleOutcome::SessionLost(e)
            }
            Err(e) => {
                log::warn!("⚠️  Event fetch failed for session {}: {}", ticket.session_id, e);
                state.last_error = Some(e.to_string());
                state.backoff.record_failure();
                CycleOutcome::Failed(e)
            }
        }
    }

    pub async fn phase(&self) -> SyncPhase {
        self.state.read().await.phase()
    }

    pub async fn cursor(&self) -> Cursor {
        self.state.read().await.cursor.clone()
    }

    /// Copy of the current event log
    pub async fn events(&self) -> Vec<Event> {
        self.state.read().await.log.events().to_vec()
    }

    /// Run a read-only projection against the log without copying it
    pub async fn read_log<R>(&self, f: impl FnOnce(&EventLog) -> R) -> R {
        let state = self.state.read().await;
        f(&state.log)
    }

    /// Session id, cursor and events captured under one lock
    ///
    /// `None` when no session was ever bound.
    pub async fn snapshot(&self) -> Option<EventLogSnapshot> {
        let state = self.state.read().await;
        let session_id = state.log.session_id()?.to_string();
        Some(EventLogSnapshot {
            session_id,
            cursor: state.cursor.clone(),
            events: state.log.events().to_vec(),
            saved_at: chrono::Utc::now().timestamp(),
        })
    }

    pub async fn status(&self) -> SyncStatus {
        let state = self.state.read().await;
        SyncStatus {
            phase: state.phase(),
            session_id: state.binding.as_ref().map(|b| b.session_id.clone()),
            cursor: state.cursor.clone(),
            event_count: state.log.len(),
            consecutive_failures: state.backoff.consecutive_failures(),
            last_error: state.last_error.clone(),
            lost_session: state.lost_session.clone(),
        }
    }

    /// Spawn the recurring fetch loop
    ///
    /// Each tick launches its cycle as its own task, so a slow fetch never
    /// delays the next tick. Ticks while idle do nothing.
    pub fn spawn_poller(&self) -> PollerHandle {
        let sync = self.clone();
        let period = self.config.interval;

        let handle = tokio::spawn(async move {
            log::info!("⏰ Starting event poller (interval: {}ms)", period.as_millis());

            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; the first fetch waits one period
            timer.tick().await;

            loop {
                timer.tick().await;

                if sync.phase().await == SyncPhase::Idle {
                    continue;
                }

                let cycle = sync.clone();
                tokio::spawn(async move {
                    cycle.poll_once().await;
                });
            }
        });

        PollerHandle { handle }
    }
}

/// Handle to a running poller; the loop stops when this is dropped
///
/// Stopping the loop does not cancel cycles already in flight. Their results
/// are still subject to the generation check.
#[derive(Debug)]
pub struct PollerHandle {
    handle: JoinHandle<()>,
}

impl PollerHandle {
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{
        EventsPage, HealthResponse, SessionRequest, SessionResponse, SourceRequest,
        SourceResponse, UploadFile, UploadTarget,
    };
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Serves queued pages for `list_events` and records requested cursors
    #[derive(Default)]
    struct PageQueue {
        pages: Mutex<VecDeque<Result<EventsPage, ServiceError>>>,
        cursors: Mutex<Vec<Cursor>>,
    }

    impl PageQueue {
        fn push(&self, page: Result<EventsPage, ServiceError>) {
            self.pages.lock().unwrap().push_back(page);
        }

        fn requested(&self) -> Vec<Cursor> {
            self.cursors.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AgentService for PageQueue {
        async fn health(&self) -> Result<HealthResponse, ServiceError> {
            unreachable!()
        }
        async fn create_source(&self, _: &SourceRequest) -> Result<SourceResponse, ServiceError> {
            unreachable!()
        }
        async fn create_session(&self, _: &SessionRequest) -> Result<SessionResponse, ServiceError> {
            unreachable!()
        }
        async fn list_events(
            &self,
            _session_id: &str,
            cursor: &Cursor,
            _limit: usize,
        ) -> Result<EventsPage, ServiceError> {
            self.cursors.lock().unwrap().push(cursor.clone());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(EventsPage::default()))
        }
        async fn analyze_upload(
            &self,
            _: UploadTarget,
            _: &UploadFile,
        ) -> Result<serde_json::Value, ServiceError> {
            unreachable!()
        }
        fn service_type(&self) -> &'static str {
            "page-queue"
        }
    }

    fn event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            timestamp: 1_700_000_000.0,
            event_type: "detection".to_string(),
            payload: serde_json::json!({}),
        }
    }

    fn page(ids: &[&str], next: Option<u64>) -> Result<EventsPage, ServiceError> {
        Ok(EventsPage {
            items: ids.iter().map(|id| event(id)).collect(),
            next_cursor: next.map(Cursor::Offset),
        })
    }

    fn setup(config: PollConfig) -> (Arc<PageQueue>, EventSynchronizer) {
        let service = Arc::new(PageQueue::default());
        let sync = EventSynchronizer::new(service.clone(), config);
        (service, sync)
    }

    #[tokio::test]
    async fn test_idle_cycle_makes_no_request() {
        let (service, sync) = setup(PollConfig::default());
        assert_eq!(sync.poll_once().await, CycleOutcome::Idle);
        assert!(service.requested().is_empty());
        assert_eq!(sync.phase().await, SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_cursor_advances_and_is_retained_without_marker() {
        let (service, sync) = setup(PollConfig::default());
        service.push(page(&["e1", "e2"], Some(2)));
        service.push(page(&[], None));
        service.push(page(&["e3"], Some(3)));

        sync.bind("s1").await;
        sync.poll_once().await;
        sync.poll_once().await;
        sync.poll_once().await;

        assert_eq!(
            service.requested(),
            vec![Cursor::Offset(0), Cursor::Offset(2), Cursor::Offset(2)]
        );
        assert_eq!(sync.cursor().await, Cursor::Offset(3));
        assert_eq!(sync.status().await.event_count, 3);
    }

    #[tokio::test]
    async fn test_failed_cycle_leaves_state_untouched() {
        let (service, sync) = setup(PollConfig::default());
        service.push(page(&["e1"], Some(1)));
        service.push(Err(ServiceError::rejected(500, "overloaded")));

        sync.bind("s1").await;
        sync.poll_once().await;
        let outcome = sync.poll_once().await;

        assert!(matches!(outcome, CycleOutcome::Failed(_)));
        assert_eq!(sync.cursor().await, Cursor::Offset(1));
        assert_eq!(sync.events().await.len(), 1);
        assert_eq!(sync.phase().await, SyncPhase::Polling);

        let status = sync.status().await;
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.last_error.unwrap().contains("500"));
    }

    #[tokio::test]
    async fn test_cursor_regression_is_ignored() {
        let (service, sync) = setup(PollConfig::default());
        service.push(page(&["e1"], Some(5)));
        service.push(page(&["e2"], Some(3)));

        sync.bind("s1").await;
        sync.poll_once().await;
        sync.poll_once().await;

        assert_eq!(sync.cursor().await, Cursor::Offset(5));
        assert_eq!(sync.events().await.len(), 2);
    }

    #[tokio::test]
    async fn test_session_gone_unbinds() {
        let (service, sync) = setup(PollConfig::default());
        service.push(Err(ServiceError::rejected(404, "unknown session")));

        sync.bind("s1").await;
        let outcome = sync.poll_once().await;

        assert!(matches!(outcome, CycleOutcome::SessionLost(_)));
        let status = sync.status().await;
        assert_eq!(status.phase, SyncPhase::Idle);
        assert_eq!(status.lost_session.as_deref(), Some("s1"));
        assert_eq!(sync.poll_once().await, CycleOutcome::Idle);
    }

    #[tokio::test]
    async fn test_session_gone_keeps_cursor_and_log() {
        let (service, sync) = setup(PollConfig::default());
        service.push(page(&["e1", "e2"], Some(2)));
        service.push(Err(ServiceError::rejected(410, "expired")));

        sync.bind("s1").await;
        sync.poll_once().await;
        assert!(matches!(sync.poll_once().await, CycleOutcome::SessionLost(_)));

        assert_eq!(sync.cursor().await, Cursor::Offset(2));
        assert_eq!(sync.events().await.len(), 2);

        // A new binding still starts from the beginning
        sync.bind("s2").await;
        assert_eq!(sync.cursor().await, Cursor::initial());
    }

    #[tokio::test]
    async fn test_snapshot_pairs_cursor_with_events() {
        let (service, sync) = setup(PollConfig::default());
        assert!(sync.snapshot().await.is_none());

        service.push(page(&["e1", "e2", "e3"], Some(3)));
        sync.bind("s1").await;
        sync.poll_once().await;

        let snapshot = sync.snapshot().await.unwrap();
        assert_eq!(snapshot.session_id, "s1");
        assert_eq!(snapshot.cursor, Cursor::Offset(3));
        assert_eq!(snapshot.events.len(), 3);
    }

    #[tokio::test]
    async fn test_dedupe_by_id_when_enabled() {
        let config = PollConfig {
            dedupe_by_id: true,
            ..PollConfig::default()
        };
        let (service, sync) = setup(config);
        service.push(page(&["e1", "e2"], Some(2)));
        service.push(page(&["e2", "e3"], Some(3)));

        sync.bind("s1").await;
        sync.poll_once().await;
        let outcome = sync.poll_once().await;

        assert_eq!(
            outcome,
            CycleOutcome::Applied {
                appended: 1,
                cursor: Cursor::Offset(3)
            }
        );
        assert_eq!(sync.events().await.len(), 3);
    }

    #[tokio::test]
    async fn test_backoff_skips_ticks_after_failure() {
        let config = PollConfig {
            backoff: true,
            ..PollConfig::default()
        };
        let (service, sync) = setup(config);
        service.push(Err(ServiceError::transport("timeout")));
        service.push(page(&["e1"], Some(1)));

        sync.bind("s1").await;
        assert!(matches!(sync.poll_once().await, CycleOutcome::Failed(_)));
        assert_eq!(sync.poll_once().await, CycleOutcome::Skipped);
        assert!(matches!(sync.poll_once().await, CycleOutcome::Applied { .. }));
        assert_eq!(service.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_rebind_resets_log_and_cursor() {
        let (service, sync) = setup(PollConfig::default());
        service.push(page(&["e1"], Some(1)));

        sync.bind("s1").await;
        sync.poll_once().await;
        sync.bind("s2").await;

        assert!(sync.events().await.is_empty());
        assert_eq!(sync.cursor().await, Cursor::initial());
        assert_eq!(sync.status().await.session_id.as_deref(), Some("s2"));
    }

    #[tokio::test]
    async fn test_unbind_keeps_log_and_resets_cursor() {
        let (service, sync) = setup(PollConfig::default());
        service.push(page(&["e1"], Some(1)));

        sync.bind("s1").await;
        sync.poll_once().await;
        sync.unbind().await;

        assert_eq!(sync.phase().await, SyncPhase::Idle);
        assert_eq!(sync.cursor().await, Cursor::initial());
        assert_eq!(sync.events().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_fetches_on_each_tick() {
        let config = PollConfig {
            interval: std::time::Duration::from_millis(100),
            ..PollConfig::default()
        };
        let (service, sync) = setup(config);
        service.push(page(&["e1"], Some(1)));
        service.push(page(&["e2"], Some(2)));

        sync.bind("s1").await;
        let poller = sync.spawn_poller();

        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        // Let the spawned cycles finish
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let ids: Vec<String> = sync.events().await.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["e1".to_string(), "e2".to_string()]);
        poller.stop();
    }
}
