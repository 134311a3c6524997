/// Lifecycle phase of the tracked job.
///
/// `Idle` only ever appears as the initial phase; `Completed` and `Failed` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Uploaded,
    Processing,
    Completed,
    Failed,
}

/// Inputs that can move a job between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobEvent {
    Submit,
    UploadProgress,
    UploadSucceeded,
    UploadFailed,
    /// The single-shot contract returned the archive inline.
    ArtifactReceived,
    SubscriptionOpened,
    StreamProgress,
    StreamCompleted,
    StreamReportedError,
    /// Channel fault or idle timeout on the push channel.
    StreamFault,
    TriggerFailed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Total transition function. `None` marks an event that is not legal in
    /// this phase; callers must leave the job untouched in that case.
    pub fn next(self, event: JobEvent) -> Option<Phase> {
        use JobEvent as E;
        use Phase as P;

        match (self, event) {
            (P::Idle, E::Submit) => Some(P::Uploading),

            (P::Uploading, E::UploadProgress) => Some(P::Uploading),
            (P::Uploading, E::UploadSucceeded) => Some(P::Uploaded),
            (P::Uploading, E::ArtifactReceived) => Some(P::Completed),
            (P::Uploading, E::UploadFailed) => Some(P::Failed),

            (P::Uploaded, E::SubscriptionOpened) => Some(P::Processing),
            (P::Uploaded, E::StreamFault) => Some(P::Failed),

            (P::Processing, E::StreamProgress) => Some(P::Processing),
            (P::Processing, E::StreamCompleted) => Some(P::Completed),
            (P::Processing, E::StreamReportedError)
            | (P::Processing, E::StreamFault)
            | (P::Processing, E::TriggerFailed) => Some(P::Failed),

            _ => None,
        }
    }
}
