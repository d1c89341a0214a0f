//! Scripted in-process stand-in for the perception-agent service

#![allow(dead_code)]

use agentlab::service::{
    AgentService, Cursor, Event, EventsPage, HealthResponse, ServiceError, SessionRequest,
    SessionResponse, SourceRequest, SourceResponse, UploadFile, UploadTarget,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// One recorded `list_events` call
#[derive(Debug, Clone, PartialEq)]
pub struct EventsCall {
    pub session_id: String,
    pub cursor: Cursor,
    pub limit: usize,
}

type PageReply = Result<EventsPage, ServiceError>;

#[derive(Default)]
pub struct ScriptedService {
    sources: Mutex<VecDeque<Result<SourceResponse, ServiceError>>>,
    sessions: Mutex<VecDeque<Result<SessionResponse, ServiceError>>>,
    /// Queued pages per session id
    pages: Mutex<HashMap<String, VecDeque<PageReply>>>,
    /// Per-session gate: the next fetch waits until the sender fires
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    pub source_calls: AtomicUsize,
    pub session_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub events_calls: Mutex<Vec<EventsCall>>,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn source_ok(&self, id: &str) {
        self.sources.lock().unwrap().push_back(Ok(SourceResponse {
            source_id: id.to_string(),
            label: format!("{} label", id),
        }));
    }

    pub fn source_err(&self, err: ServiceError) {
        self.sources.lock().unwrap().push_back(Err(err));
    }

    pub fn session_ok(&self, id: &str) {
        self.sessions.lock().unwrap().push_back(Ok(SessionResponse {
            session_id: id.to_string(),
            state: "running".to_string(),
        }));
    }

    pub fn session_err(&self, err: ServiceError) {
        self.sessions.lock().unwrap().push_back(Err(err));
    }

    pub fn page(&self, session_id: &str, items: Vec<Event>, next: Option<u64>) {
        self.pages
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .push_back(Ok(EventsPage {
                items,
                next_cursor: next.map(Cursor::Offset),
            }));
    }

    pub fn page_err(&self, session_id: &str, err: ServiceError) {
        self.pages
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .push_back(Err(err));
    }

    /// Hold the next fetch for `session_id` until the returned sender fires
    pub fn hold_next_fetch(&self, session_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(session_id.to_string(), rx);
        tx
    }

    pub fn events_calls(&self) -> Vec<EventsCall> {
        self.events_calls.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.source_calls.load(Ordering::SeqCst)
            + self.session_calls.load(Ordering::SeqCst)
            + self.upload_calls.load(Ordering::SeqCst)
            + self.events_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AgentService for ScriptedService {
    async fn health(&self) -> Result<HealthResponse, ServiceError> {
        Ok(HealthResponse {
            status: Some("ok".to_string()),
            services: Default::default(),
        })
    }

    async fn create_source(&self, _request: &SourceRequest) -> Result<SourceResponse, ServiceError> {
        self.source_calls.fetch_add(1, Ordering::SeqCst);
        self.sources
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::rejected(500, "no scripted source")))
    }

    async fn create_session(&self, _request: &SessionRequest) -> Result<SessionResponse, ServiceError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::rejected(500, "no scripted session")))
    }

    async fn list_events(
        &self,
        session_id: &str,
        cursor: &Cursor,
        limit: usize,
    ) -> Result<EventsPage, ServiceError> {
        self.events_calls.lock().unwrap().push(EventsCall {
            session_id: session_id.to_string(),
            cursor: cursor.clone(),
            limit,
        });

        // Take the reply before waiting so a held fetch returns what was queued at request time
        let reply = self
            .pages
            .lock()
            .unwrap()
            .get_mut(session_id)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| Ok(EventsPage::default()));

        let gate = self.gates.lock().unwrap().remove(session_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        reply
    }

    async fn analyze_upload(
        &self,
        target: UploadTarget,
        file: &UploadFile,
    ) -> Result<serde_json::Value, ServiceError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({
            "target": target.path(),
            "filename": file.file_name,
            "bytes": file.bytes.len(),
        }))
    }

    fn service_type(&self) -> &'static str {
        "scripted"
    }
}

pub fn event(id: &str, event_type: &str, payload: serde_json::Value) -> Event {
    Event {
        id: id.to_string(),
        timestamp: 1_700_000_000.0,
        event_type: event_type.to_string(),
        payload,
    }
}

pub fn ids(events: &[Event]) -> Vec<String> {
    events.iter().map(|e| e.id.clone()).collect()
}
