//! Splitter core: the job lifecycle state machine and its UI projection.
//!
//! Everything here is pure. Collaborator results arrive as [`Msg`]s and outward
//! calls leave as [`Effect`]s; the host owns all I/O.
mod effect;
mod msg;
mod phase;
mod state;
mod update;
mod view_model;

pub use effect::{ArtifactSource, Effect};
pub use msg::{Msg, ProgressEvent};
pub use phase::{JobEvent, Phase};
pub use state::{
    AppState, ArtifactStatus, ContentHandle, Contract, ControllerConfig, ErrorCause, FailureKind,
    Job, JobFailure, JobId, SourceFile, SubmissionId, TransportFailure, UploadForm,
    DEFAULT_MAX_PART_MB,
};
pub use update::{
    update, MSG_BAD_PART_SIZE, MSG_COMPLETED, MSG_CONNECTION_FAILED, MSG_FILE_UNREADABLE,
    MSG_JOB_FALLBACK, MSG_NO_FILE, MSG_STREAM_LOST, MSG_TRIGGER_FALLBACK, MSG_UPLOAD_FALLBACK,
};
pub use view_model::{
    render, AppViewModel, ProgressView, Severity, StatusLine, UiCommand, SUBMIT_LABEL,
    SUBMIT_LABEL_PROCESSING, SUBMIT_LABEL_UPLOADING,
};
