use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::Deserialize;

/// Client-side submission number; echoed back on every event.
pub type SubmissionId = u64;

/// Where upload bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadContent {
    File(PathBuf),
    Bytes(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub name: String,
    pub content: UploadContent,
}

/// Form fields sent next to the file part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadFields {
    pub max_part_mb: f64,
}

/// Status reported by one server-pushed progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Processing,
    Completed,
    Error,
}

/// Payload of one progress event: `{status, progress?, error?}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerEvent {
    pub status: EventStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ServerEvent {
    pub fn is_terminal(&self) -> bool {
        self.status != EventStatus::Processing
    }

    /// Progress rounded and clamped to 0..=100.
    pub fn percent(&self) -> u8 {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0).round() as u8)
            .unwrap_or(0)
    }
}

/// What a subscription reports to its sink.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// The channel is open; the server accepted the subscription.
    Opened,
    Event(ServerEvent),
    /// Transport fault. Reported at most once, after which the subscription is closed.
    Failed(StreamError),
    /// No event arrived within the configured idle interval.
    IdleTimeout,
}

/// How the engine should obtain a result archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPayload {
    Download { job_id: String },
    Inline(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    UploadProgress {
        submission: SubmissionId,
        sent: u64,
        total: u64,
    },
    UploadCompleted {
        submission: SubmissionId,
        result: Result<String, TransportError>,
    },
    SplitCompleted {
        submission: SubmissionId,
        result: Result<Bytes, TransportError>,
    },
    Subscription {
        submission: SubmissionId,
        event: SubscriptionEvent,
    },
    TriggerCompleted {
        submission: SubmissionId,
        result: Result<(), TransportError>,
    },
    ArtifactSaved {
        submission: SubmissionId,
        result: Result<PathBuf, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    /// `error` field of a JSON error body, if the server sent one.
    pub server_detail: Option<String>,
}

impl TransportError {
    pub(crate) fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            server_detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: Option<String>) -> Self {
        self.server_detail = detail;
        self
    }

    /// `true` when the server answered; `false` for connection-level failures.
    pub fn is_server_side(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::HttpStatus(_) | TransportErrorKind::InvalidResponse
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    InvalidResponse,
    Io,
    Network,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::InvalidUrl => write!(f, "invalid url"),
            TransportErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::InvalidResponse => write!(f, "invalid response"),
            TransportErrorKind::Io => write!(f, "io error"),
            TransportErrorKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("could not open progress stream: {0}")]
    Open(TransportError),
    #[error("progress stream transport error: {0}")]
    Transport(String),
    #[error("malformed progress event: {0}")]
    Malformed(String),
    #[error("progress stream ended before a terminal event")]
    EndedEarly,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid server url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("server url cannot carry a path: {0}")]
    CannotBeABase(String),
    #[error("http client setup failed: {0}")]
    Client(String),
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
