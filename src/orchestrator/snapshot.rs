use crate::service::{Cursor, Event};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Saved copy of one session's event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogSnapshot {
    pub session_id: String,
    pub cursor: Cursor,
    pub events: Vec<Event>,
    pub saved_at: i64,
}

/// Save a snapshot as pretty JSON
pub fn save_snapshot(snapshot: &EventLogSnapshot, file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(file_path, json)?;

    log::debug!(
        "Saved {} events of session {} to {}",
        snapshot.events.len(),
        snapshot.session_id,
        file_path.display()
    );
    Ok(())
}

/// Load a snapshot; `None` when the file doesn't exist
pub fn load_snapshot(file_path: &Path) -> Result<Option<EventLogSnapshot>, Box<dyn std::error::Error>> {
    if !file_path.exists() {
        log::info!("No existing snapshot file found: {}", file_path.display());
        return Ok(None);
    }

    let json = fs::read_to_string(file_path)?;
    let snapshot: EventLogSnapshot = serde_json::from_str(&json)?;

    log::info!(
        "Loaded {} events of session {} from {}",
        snapshot.events.len(),
        snapshot.session_id,
        file_path.display()
    );
    Ok(Some(snapshot))
}
