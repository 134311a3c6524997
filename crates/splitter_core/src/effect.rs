use std::fmt;
use std::sync::Arc;

use crate::{JobId, SourceFile, SubmissionId, UploadForm};

/// Outward calls requested by the controller. Executed by the host in the
/// order they are returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartUpload {
        submission: SubmissionId,
        file: SourceFile,
        form: UploadForm,
    },
    SplitSingleShot {
        submission: SubmissionId,
        file: SourceFile,
        form: UploadForm,
    },
    OpenSubscription {
        submission: SubmissionId,
        job_id: JobId,
    },
    TriggerProcessing {
        submission: SubmissionId,
        job_id: JobId,
    },
    /// Stop observing the job's progress channel. Client-side only; the server
    /// job keeps running.
    CloseSubscription { submission: SubmissionId },
    /// Begin saving the result archive under `{source_base_name}_dividido.zip`.
    SaveArtifact {
        submission: SubmissionId,
        artifact: ArtifactSource,
        source_base_name: String,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Fetch from the server by job id.
    Remote(JobId),
    /// Already received with the response.
    Inline(Arc<[u8]>),
}

impl fmt::Debug for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactSource::Remote(job_id) => f.debug_tuple("Remote").field(job_id).finish(),
            ArtifactSource::Inline(bytes) => write!(f, "Inline({} bytes)", bytes.len()),
        }
    }
}
