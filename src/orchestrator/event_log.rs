//! Append-only event log for the active session
//!
//! Items are kept in arrival order. The log is never re-sorted; a new
//! session starts from an empty log.

use crate::service::Event;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    /// Session the events belong to
    session_id: Option<String>,
    events: Vec<Event>,
    /// Ids of `events[..indexed]`, built only by `append_unique`
    ids: HashSet<String>,
    indexed: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the log and key it to a new session
    pub fn reset_for(&mut self, session_id: &str) {
        self.session_id = Some(session_id.to_string());
        self.events.clear();
        self.ids.clear();
        self.indexed = 0;
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append a page verbatim, in the order received
    pub fn append(&mut self, items: Vec<Event>) -> usize {
        let count = items.len();
        self.events.extend(items);
        count
    }

    /// Append a page, skipping ids already present in the log
    pub fn append_unique(&mut self, items: Vec<Event>) -> usize {
        // Catch up on events appended verbatim since the last call
        for event in &self.events[self.indexed..] {
            self.ids.insert(event.id.clone());
        }

        let mut count = 0;
        for event in items {
            if self.ids.insert(event.id.clone()) {
                self.events.push(event);
                count += 1;
            } else {
                log::debug!("Skipping replayed event {}", event.id);
            }
        }
        self.indexed = self.events.len();
        count
    }
}
