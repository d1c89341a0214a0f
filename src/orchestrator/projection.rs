//! Aggregate View Projection
//!
//! Read-only summaries derived from the event log: latest event of a type,
//! the metric snapshot shown next to the live feed, per-type counts, and the
//! running transcript. Every function tolerates an empty log.

use crate::service::Event;
use std::collections::BTreeMap;

pub const METRIC: &str = "metric";
pub const DETECTION: &str = "detection";
pub const TRANSCRIPT: &str = "transcript";

/// Most recent event (append order) of the given type
pub fn latest_of_type<'a>(events: &'a [Event], event_type: &str) -> Option<&'a Event> {
    events.iter().rev().find(|e| e.is_type(event_type))
}

pub fn latest_metric(events: &[Event]) -> Option<&Event> {
    latest_of_type(events, METRIC)
}

pub fn latest_event(events: &[Event]) -> Option<&Event> {
    events.last()
}

/// Number of events per type
pub fn counts_by_type(events: &[Event]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for event in events {
        *counts.entry(event.event_type.clone()).or_insert(0) += 1;
    }
    counts
}

/// Text of all transcript events, in order, one fragment per line
pub fn transcript_text(events: &[Event]) -> String {
    events
        .iter()
        .filter(|e| e.is_type(TRANSCRIPT))
        .filter_map(|e| e.payload.get("text").and_then(|t| t.as_str()))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pipeline metrics carried by a `metric` event
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricSnapshot {
    pub fps: Option<f64>,
    pub latency_ms: Option<f64>,
    pub queue_depth: Option<f64>,
}

impl MetricSnapshot {
    /// Read the numeric metric fields; non-numeric values count as absent
    pub fn from_event(event: &Event) -> Self {
        let number = |key: &str| event.payload.get(key).and_then(|v| v.as_f64());
        Self {
            fps: number("fps"),
            latency_ms: number("latencyMs"),
            queue_depth: number("queueDepth"),
        }
    }

    /// Snapshot of the latest metric event, if any
    pub fn latest(events: &[Event]) -> Option<Self> {
        latest_metric(events).map(Self::from_event)
    }

    /// Dropped/queued frames, zero when not reported
    pub fn dropped(&self) -> f64 {
        self.queue_depth.unwrap_or(0.0)
    }
}

impl std::fmt::Display for MetricSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: Option<f64>| v.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "--".to_string());
        write!(
            f,
            "FPS {} | Latency {} ms | Dropped {}",
            show(self.fps),
            show(self.latency_ms),
            self.dropped()
        )
    }
}
