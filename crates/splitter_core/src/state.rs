use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::view_model::{progress_label, AppViewModel, ProgressView, Severity, StatusLine};
use crate::Phase;

/// Client-side sequence number of one accepted submission.
pub type SubmissionId = u64;

/// Default part size limit sent with every upload, in MB.
pub const DEFAULT_MAX_PART_MB: f64 = 4.0;

/// Opaque job identifier assigned by the server after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the bytes of a selected file live.
#[derive(Clone, PartialEq, Eq)]
pub enum ContentHandle {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

impl fmt::Debug for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentHandle::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ContentHandle::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
        }
    }
}

/// The user-selected input document. Immutable for the lifetime of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub byte_len: u64,
    pub content: ContentHandle,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, byte_len: u64, content: ContentHandle) -> Self {
        Self {
            name: name.into(),
            byte_len,
            content,
        }
    }

    pub fn in_memory(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self::new(name, bytes.len() as u64, ContentHandle::Memory(bytes))
    }

    /// File name without its final extension, e.g. `report.v2` for `report.v2.pdf`.
    pub fn base_name(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or(&self.name)
    }
}

/// Form fields sent next to the file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadForm {
    pub max_part_mb: f64,
}

impl Default for UploadForm {
    fn default() -> Self {
        Self {
            max_part_mb: DEFAULT_MAX_PART_MB,
        }
    }
}

/// Which server contract a controller instance drives. Never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Contract {
    /// `POST /upload`, `GET /progress/{id}`, `POST /process/{id}`, `GET /download/{id}`.
    #[default]
    Streamed,
    /// Legacy `POST /split` returning the archive inline.
    SingleShot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub contract: Contract,
    pub max_part_mb: f64,
    /// Only used to phrase the timeout message; the engine enforces the limit.
    pub idle_timeout_secs: Option<u64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            contract: Contract::Streamed,
            max_part_mb: DEFAULT_MAX_PART_MB,
            idle_timeout_secs: Some(300),
        }
    }
}

/// Coarse cause category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCause {
    Network,
    Server,
    /// The client could not read its own input, e.g. the file vanished.
    Local,
}

/// Which stage produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Upload,
    Trigger,
    Stream,
    Job,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub cause: ErrorCause,
    pub message: String,
}

/// Failure reported by a transport call, as seen by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub cause: ErrorCause,
    /// Server- or transport-supplied detail, when there is one.
    pub detail: Option<String>,
}

impl TransportFailure {
    pub fn network(detail: impl Into<String>) -> Self {
        Self {
            cause: ErrorCause::Network,
            detail: Some(detail.into()),
        }
    }

    pub fn local(detail: impl Into<String>) -> Self {
        Self {
            cause: ErrorCause::Local,
            detail: Some(detail.into()),
        }
    }

    pub fn server(detail: Option<String>) -> Self {
        Self {
            cause: ErrorCause::Server,
            detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArtifactStatus {
    #[default]
    Pending,
    Saved(PathBuf),
    SaveFailed(String),
}

/// The single tracked job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub submission: SubmissionId,
    pub source: SourceFile,
    pub job_id: Option<JobId>,
    pub phase: Phase,
    pub progress_percent: u8,
    pub error: Option<JobFailure>,
    pub artifact: ArtifactStatus,
    pub(crate) subscription_open: bool,
}

impl Job {
    pub(crate) fn new(submission: SubmissionId, source: SourceFile) -> Self {
        Self {
            submission,
            source,
            job_id: None,
            phase: Phase::Idle,
            progress_percent: 0,
            error: None,
            artifact: ArtifactStatus::Pending,
            subscription_open: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    config: ControllerConfig,
    selected: Option<SourceFile>,
    max_part_mb: f64,
    last_submission: SubmissionId,
    job: Option<Job>,
    status: Option<StatusLine>,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_config(ControllerConfig::default())
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ControllerConfig) -> Self {
        Self {
            config,
            selected: None,
            max_part_mb: config.max_part_mb,
            last_submission: 0,
            job: None,
            status: None,
            dirty: false,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    /// Phase of the tracked job, `Idle` when nothing is tracked.
    pub fn phase(&self) -> Phase {
        self.job.as_ref().map_or(Phase::Idle, |job| job.phase)
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn view(&self) -> AppViewModel {
        let phase = self.phase();
        let progress = self.job.as_ref().and_then(|job| match job.phase {
            Phase::Uploading | Phase::Uploaded | Phase::Processing => Some(ProgressView {
                percent: job.progress_percent,
                label: progress_label(job.phase, job.progress_percent, self.config.contract),
            }),
            _ => None,
        });
        let busy = !phase.is_terminal() && phase != Phase::Idle;

        AppViewModel {
            phase,
            selected_file: self.selected.as_ref().map(|file| file.name.clone()),
            max_part_mb: self.max_part_mb,
            progress,
            status: self.status.clone(),
            submit_enabled: !busy,
            busy,
            contract: self.config.contract,
            dirty: self.dirty,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn selected(&self) -> Option<&SourceFile> {
        self.selected.as_ref()
    }

    pub(crate) fn set_selected(&mut self, file: Option<SourceFile>) {
        if self.selected != file {
            self.selected = file;
            self.mark_dirty();
        }
    }

    pub(crate) fn upload_form(&self) -> UploadForm {
        UploadForm {
            max_part_mb: self.max_part_mb,
        }
    }

    pub(crate) fn set_max_part_mb(&mut self, value: f64) {
        if self.max_part_mb != value {
            self.max_part_mb = value;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_status(&mut self, severity: Severity, text: impl Into<String>) {
        let next = Some(StatusLine {
            severity,
            text: text.into(),
        });
        if self.status != next {
            self.status = next;
            self.mark_dirty();
        }
    }

    pub(crate) fn clear_status(&mut self) {
        if self.status.take().is_some() {
            self.mark_dirty();
        }
    }

    /// Starts tracking a new job for `source` and returns its submission id.
    pub(crate) fn begin_job(&mut self, source: SourceFile) -> SubmissionId {
        self.last_submission += 1;
        self.job = Some(Job::new(self.last_submission, source));
        self.mark_dirty();
        self.last_submission
    }

    pub(crate) fn discard_job(&mut self) -> Option<Job> {
        let job = self.job.take();
        if job.is_some() {
            self.mark_dirty();
        }
        job
    }

    /// The tracked job, only if it belongs to `submission`.
    pub(crate) fn current_job_mut(&mut self, submission: SubmissionId) -> Option<&mut Job> {
        self.job
            .as_mut()
            .filter(|job| job.submission == submission)
    }
}
