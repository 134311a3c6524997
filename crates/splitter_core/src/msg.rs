use std::path::PathBuf;

use crate::{JobId, SourceFile, SubmissionId, TransportFailure};

/// One event pushed by the server while a job is processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Processing { progress: u8 },
    Completed,
    Error { message: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// User picked (or cleared) the input document.
    FileSelected(Option<SourceFile>),
    /// User edited the maximum part size, in MB.
    MaxPartSizeChanged(f64),
    /// User pressed the submit control.
    SubmitClicked,
    /// User dismissed the current job.
    ResetClicked,
    /// Transport reported upload byte progress.
    UploadProgress {
        submission: SubmissionId,
        sent: u64,
        total: u64,
    },
    /// Upload request finished.
    UploadFinished {
        submission: SubmissionId,
        result: Result<JobId, TransportFailure>,
    },
    /// Single-shot split request finished; on success the archive is inline.
    SingleShotFinished {
        submission: SubmissionId,
        result: Result<Vec<u8>, TransportFailure>,
    },
    /// The progress channel for the job is open.
    SubscriptionOpened { submission: SubmissionId },
    /// The progress channel delivered an event.
    StreamEvent {
        submission: SubmissionId,
        event: ProgressEvent,
    },
    /// The progress channel failed at the transport level.
    StreamFailed {
        submission: SubmissionId,
        detail: Option<String>,
    },
    /// No progress event arrived within the configured interval.
    IdleTimeout { submission: SubmissionId },
    /// Processing trigger request finished.
    TriggerFinished {
        submission: SubmissionId,
        result: Result<(), TransportFailure>,
    },
    /// The result archive was written (or not).
    ArtifactSaved {
        submission: SubmissionId,
        result: Result<PathBuf, String>,
    },
    /// Fallback for placeholder wiring.
    NoOp,
}
