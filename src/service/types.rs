//! Wire types for the perception-agent service
//!
//! Request and response bodies exchanged with the service, plus the domain
//! enums (source kind, pipelines, profile, session state) they carry.
//!
//! ## Endpoints
//!
//! - `GET  /health` → `HealthResponse`
//! - `POST /sources` (`SourceRequest`) → `SourceResponse`
//! - `POST /sessions` (`SessionRequest`) → `SessionResponse`
//! - `GET  /sessions/{id}/events?cursor=..&limit=..` → `EventsPage`
//! - `POST /analyze/frame`, `/upload/{video,image,audio}` (multipart `file`)

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Acquisition source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Webcam,
    Usb,
    Rtsp,
    Upload,
}

impl SourceKind {
    /// Kinds that cannot be created without a locator (stream URL or device id)
    pub fn requires_locator(&self) -> bool {
        matches!(self, SourceKind::Rtsp | SourceKind::Usb)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Webcam => "webcam",
            SourceKind::Usb => "usb",
            SourceKind::Rtsp => "rtsp",
            SourceKind::Upload => "upload",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webcam" => Ok(SourceKind::Webcam),
            "usb" => Ok(SourceKind::Usb),
            "rtsp" => Ok(SourceKind::Rtsp),
            "upload" => Ok(SourceKind::Upload),
            other => Err(format!("unknown source kind '{}'", other)),
        }
    }
}

/// Performance profile a session runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Fast,
    Accurate,
    Cpu,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Profile::Fast => "fast",
            Profile::Accurate => "accurate",
            Profile::Cpu => "cpu",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" => Ok(Profile::Fast),
            "accurate" => Ok(Profile::Accurate),
            "cpu" => Ok(Profile::Cpu),
            other => Err(format!("unknown profile '{}'", other)),
        }
    }
}

/// Analysis pipelines enabled for a session
///
/// Serialized as the `{vision, audio, llm}` flag object the service expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipelines {
    pub vision: bool,
    pub audio: bool,
    pub llm: bool,
}

impl Default for Pipelines {
    fn default() -> Self {
        Self {
            vision: true,
            audio: false,
            llm: false,
        }
    }
}

impl Pipelines {
    pub fn vision_only() -> Self {
        Self::default()
    }

    pub fn any_enabled(&self) -> bool {
        self.vision || self.audio || self.llm
    }
}

/// Lifecycle state of a session as held by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Ready,
    Running,
    Stopped,
}

impl SessionState {
    /// Map the service's state string; unknown values are treated as `Ready`
    pub fn from_service(state: &str) -> Self {
        match state.to_lowercase().as_str() {
            "ready" => SessionState::Ready,
            "running" => SessionState::Running,
            "stopped" => SessionState::Stopped,
            other => {
                log::debug!("Unrecognised session state '{}', treating as ready", other);
                SessionState::Ready
            }
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Ready => "ready",
            SessionState::Running => "running",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// `GET /health` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, String>,
}

/// `POST /sources` body
///
/// The locator travels as `url` for RTSP streams and `deviceId` for USB
/// devices; other kinds carry no locator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRequest {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl SourceRequest {
    pub fn new(kind: SourceKind, locator: Option<&str>) -> Self {
        let locator = locator.map(str::trim).filter(|l| !l.is_empty()).map(str::to_string);
        match kind {
            SourceKind::Rtsp => Self { kind, url: locator, device_id: None },
            SourceKind::Usb => Self { kind, url: None, device_id: locator },
            SourceKind::Webcam | SourceKind::Upload => Self { kind, url: None, device_id: None },
        }
    }
}

/// `POST /sources` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResponse {
    #[serde(rename = "sourceId")]
    pub source_id: String,
    #[serde(default)]
    pub label: String,
}

/// `POST /sessions` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRequest {
    #[serde(rename = "sourceId")]
    pub source_id: String,
    pub pipelines: Pipelines,
    pub profile: Profile,
}

/// `POST /sessions` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(default = "default_session_state")]
    pub state: String,
}

fn default_session_state() -> String {
    "ready".to_string()
}

/// One event emitted by a running session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    /// Seconds since epoch (fractional)
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    pub fn is_type(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }

    /// Event timestamp as a UTC time, if it is representable
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        if !self.timestamp.is_finite() {
            return None;
        }
        let millis = (self.timestamp * 1000.0).round() as i64;
        Utc.timestamp_millis_opt(millis).single()
    }
}

/// Position in a session's event stream
///
/// The service hands out numeric offsets today; string tokens are accepted
/// so an opaque cursor scheme does not break the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    Offset(u64),
    Token(String),
}

impl Cursor {
    /// Cursor every new session starts from
    pub fn initial() -> Self {
        Cursor::Offset(0)
    }

    /// Value sent in the `cursor` query parameter
    pub fn as_query(&self) -> String {
        match self {
            Cursor::Offset(n) => n.to_string(),
            Cursor::Token(t) => t.clone(),
        }
    }

    /// True when `next` would move the stream position backwards
    ///
    /// Only offsets are comparable; tokens are trusted as given.
    pub fn regresses_to(&self, next: &Cursor) -> bool {
        match (self, next) {
            (Cursor::Offset(current), Cursor::Offset(next)) => next < current,
            _ => false,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::initial()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_query())
    }
}

/// One page of `GET /sessions/{id}/events`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsPage {
    #[serde(default)]
    pub items: Vec<Event>,
    /// Absent or null means "no further pages right now"
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<Cursor>,
}

/// Where an upload is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadTarget {
    /// One-shot analysis (`/analyze/frame`)
    #[default]
    AnalyzeFrame,
    Video,
    Image,
    Audio,
}

impl UploadTarget {
    pub fn path(&self) -> &'static str {
        match self {
            UploadTarget::AnalyzeFrame => "/analyze/frame",
            UploadTarget::Video => "/upload/video",
            UploadTarget::Image => "/upload/image",
            UploadTarget::Audio => "/upload/audio",
        }
    }
}

impl std::str::FromStr for UploadTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "frame" | "analyze" => Ok(UploadTarget::AnalyzeFrame),
            "video" => Ok(UploadTarget::Video),
            "image" => Ok(UploadTarget::Image),
            "audio" => Ok(UploadTarget::Audio),
            other => Err(format!("unknown upload target '{}'", other)),
        }
    }
}

/// Binary payload submitted for offline analysis
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).map(str::to_string);
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read a file from disk into an upload payload
    pub async fn from_path(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        _ => return None,
    };
    Some(mime)
}
