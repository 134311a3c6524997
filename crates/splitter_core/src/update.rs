use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::view_model::Severity;
use crate::{
    AppState, ArtifactSource, ArtifactStatus, Contract, Effect, ErrorCause, FailureKind,
    JobEvent, JobFailure, Msg, Phase, ProgressEvent, SubmissionId, TransportFailure,
};

pub const MSG_NO_FILE: &str = "Please select a PDF file";
pub const MSG_BAD_PART_SIZE: &str = "The part size must be greater than 0";
pub const MSG_UPLOAD_FALLBACK: &str = "Unexpected server error";
pub const MSG_CONNECTION_FAILED: &str = "Connection to the server failed";
pub const MSG_FILE_UNREADABLE: &str = "Could not read the selected file";
pub const MSG_TRIGGER_FALLBACK: &str = "The server could not start processing the PDF";
pub const MSG_JOB_FALLBACK: &str = "Error while processing the PDF";
pub const MSG_STREAM_LOST: &str = "Lost connection to the progress stream";
pub const MSG_COMPLETED: &str = "PDF split successfully! Downloading ZIP...";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::FileSelected(file) => {
            state.set_selected(file);
            Vec::new()
        }
        Msg::MaxPartSizeChanged(value) => {
            if value.is_finite() && value > 0.0 {
                state.set_max_part_mb(value);
            } else {
                state.set_status(Severity::Error, MSG_BAD_PART_SIZE);
            }
            Vec::new()
        }
        Msg::SubmitClicked => submit(&mut state),
        Msg::ResetClicked => {
            let effects = abandon_current(&mut state);
            state.discard_job();
            state.clear_status();
            effects
        }
        Msg::UploadProgress {
            submission,
            sent,
            total,
        } => {
            on_upload_progress(&mut state, submission, sent, total);
            Vec::new()
        }
        Msg::UploadFinished { submission, result } => match result {
            Ok(job_id) => {
                if !advance(&mut state, submission, JobEvent::UploadSucceeded) {
                    return (state, Vec::new());
                }
                engine_info!("submission {} uploaded as job {}", submission, job_id);
                if let Some(job) = state.current_job_mut(submission) {
                    job.job_id = Some(job_id.clone());
                    job.subscription_open = true;
                }
                vec![Effect::OpenSubscription { submission, job_id }]
            }
            Err(failure) => {
                let message = transport_message(&failure, MSG_UPLOAD_FALLBACK);
                fail(
                    &mut state,
                    submission,
                    JobEvent::UploadFailed,
                    JobFailure {
                        kind: FailureKind::Upload,
                        cause: failure.cause,
                        message,
                    },
                )
            }
        },
        Msg::SingleShotFinished { submission, result } => match result {
            Ok(archive) => complete(&mut state, submission, JobEvent::ArtifactReceived, |_| {
                Some(ArtifactSource::Inline(archive.into()))
            }),
            Err(failure) => {
                let message = transport_message(&failure, MSG_UPLOAD_FALLBACK);
                fail(
                    &mut state,
                    submission,
                    JobEvent::UploadFailed,
                    JobFailure {
                        kind: FailureKind::Upload,
                        cause: failure.cause,
                        message,
                    },
                )
            }
        },
        Msg::SubscriptionOpened { submission } => {
            if !advance(&mut state, submission, JobEvent::SubscriptionOpened) {
                return (state, Vec::new());
            }
            let job_id = state.current_job_mut(submission).and_then(|job| {
                job.progress_percent = 0;
                job.job_id.clone()
            });
            match job_id {
                Some(job_id) => vec![Effect::TriggerProcessing { submission, job_id }],
                None => Vec::new(),
            }
        }
        Msg::StreamEvent { submission, event } => on_stream_event(&mut state, submission, event),
        Msg::StreamFailed { submission, detail } => {
            if let Some(detail) = detail {
                engine_warn!("progress stream for submission {} failed: {}", submission, detail);
            }
            fail(
                &mut state,
                submission,
                JobEvent::StreamFault,
                JobFailure {
                    kind: FailureKind::Stream,
                    cause: ErrorCause::Network,
                    message: MSG_STREAM_LOST.to_string(),
                },
            )
        }
        Msg::IdleTimeout { submission } => {
            let message = match state.config().idle_timeout_secs {
                Some(secs) => format!("No progress received for {secs} seconds"),
                None => MSG_STREAM_LOST.to_string(),
            };
            fail(
                &mut state,
                submission,
                JobEvent::StreamFault,
                JobFailure {
                    kind: FailureKind::Stream,
                    cause: ErrorCause::Network,
                    message,
                },
            )
        }
        Msg::TriggerFinished { submission, result } => match result {
            Ok(()) => {
                engine_debug!("processing confirmed for submission {}", submission);
                Vec::new()
            }
            Err(failure) => {
                let message = transport_message(&failure, MSG_TRIGGER_FALLBACK);
                fail(
                    &mut state,
                    submission,
                    JobEvent::TriggerFailed,
                    JobFailure {
                        kind: FailureKind::Trigger,
                        cause: failure.cause,
                        message,
                    },
                )
            }
        },
        Msg::ArtifactSaved { submission, result } => {
            on_artifact_saved(&mut state, submission, result);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn submit(state: &mut AppState) -> Vec<Effect> {
    let Some(file) = state.selected().cloned() else {
        state.set_status(Severity::Error, MSG_NO_FILE);
        return Vec::new();
    };

    // Stale observation must be torn down before the new job issues any call.
    let mut effects = abandon_current(state);
    state.discard_job();

    let form = state.upload_form();
    let submission = state.begin_job(file.clone());
    advance(state, submission, JobEvent::Submit);
    state.clear_status();
    engine_info!(
        "submission {} started for {} ({} bytes)",
        submission,
        file.name,
        file.byte_len
    );

    effects.push(match state.config().contract {
        Contract::Streamed => Effect::StartUpload {
            submission,
            file,
            form,
        },
        Contract::SingleShot => Effect::SplitSingleShot {
            submission,
            file,
            form,
        },
    });
    effects
}

/// Drops client-side tracking of a non-terminal job. The server job is not
/// cancelled.
fn abandon_current(state: &mut AppState) -> Vec<Effect> {
    let Some(job) = state.job() else {
        return Vec::new();
    };
    if job.phase.is_terminal() {
        return Vec::new();
    }
    let submission = job.submission;
    let had_subscription = job.subscription_open;
    engine_info!(
        "abandoning submission {} in phase {:?}",
        submission,
        job.phase
    );
    if had_subscription {
        if let Some(job) = state.current_job_mut(submission) {
            job.subscription_open = false;
        }
        vec![Effect::CloseSubscription { submission }]
    } else {
        Vec::new()
    }
}

/// Applies `event` to the job identified by `submission`. Returns `false` and
/// leaves state untouched for stale submissions and illegal transitions.
fn advance(state: &mut AppState, submission: SubmissionId, event: JobEvent) -> bool {
    let Some(job) = state.current_job_mut(submission) else {
        engine_debug!("dropping {:?} for stale submission {}", event, submission);
        return false;
    };
    let from = job.phase;
    match from.next(event) {
        Some(to) => {
            job.phase = to;
            if from != to {
                engine_debug!("submission {}: {:?} -> {:?}", submission, from, to);
                state.mark_dirty();
            }
            true
        }
        None if from.is_terminal() => {
            engine_debug!("ignoring {:?} after {:?} for submission {}", event, from, submission);
            false
        }
        None => {
            engine_warn!(
                "illegal event {:?} in phase {:?} for submission {}",
                event,
                from,
                submission
            );
            false
        }
    }
}

fn fail(
    state: &mut AppState,
    submission: SubmissionId,
    event: JobEvent,
    failure: JobFailure,
) -> Vec<Effect> {
    if !advance(state, submission, event) {
        return Vec::new();
    }
    engine_warn!(
        "submission {} failed ({:?}/{:?}): {}",
        submission,
        failure.kind,
        failure.cause,
        failure.message
    );
    let message = failure.message.clone();
    let mut effects = Vec::new();
    if let Some(job) = state.current_job_mut(submission) {
        job.error = Some(failure);
        if std::mem::take(&mut job.subscription_open) {
            effects.push(Effect::CloseSubscription { submission });
        }
    }
    state.set_status(Severity::Error, message);
    effects
}

fn complete(
    state: &mut AppState,
    submission: SubmissionId,
    event: JobEvent,
    artifact: impl FnOnce(&crate::Job) -> Option<ArtifactSource>,
) -> Vec<Effect> {
    if !advance(state, submission, event) {
        return Vec::new();
    }
    let mut effects = Vec::new();
    if let Some(job) = state.current_job_mut(submission) {
        job.progress_percent = 100;
        if std::mem::take(&mut job.subscription_open) {
            effects.push(Effect::CloseSubscription { submission });
        }
        match artifact(job) {
            Some(artifact) => effects.push(Effect::SaveArtifact {
                submission,
                artifact,
                source_base_name: job.source.base_name().to_string(),
            }),
            None => {
                engine_warn!("submission {} completed without a job id", submission);
            }
        }
    }
    engine_info!("submission {} completed", submission);
    state.set_status(Severity::Success, MSG_COMPLETED);
    effects
}

fn on_upload_progress(state: &mut AppState, submission: SubmissionId, sent: u64, total: u64) {
    if !advance(state, submission, JobEvent::UploadProgress) {
        return;
    }
    let percent = percent_of(sent, total);
    let mut changed = false;
    if let Some(job) = state.current_job_mut(submission) {
        if percent > job.progress_percent {
            job.progress_percent = percent;
            changed = true;
        }
    }
    if changed {
        state.mark_dirty();
    }
}

fn on_stream_event(
    state: &mut AppState,
    submission: SubmissionId,
    event: ProgressEvent,
) -> Vec<Effect> {
    match event {
        ProgressEvent::Processing { progress } => {
            if !advance(state, submission, JobEvent::StreamProgress) {
                return Vec::new();
            }
            let percent = progress.min(100);
            let mut changed = false;
            if let Some(job) = state.current_job_mut(submission) {
                if percent > job.progress_percent {
                    job.progress_percent = percent;
                    changed = true;
                }
            }
            if changed {
                state.mark_dirty();
            }
            Vec::new()
        }
        ProgressEvent::Completed => complete(state, submission, JobEvent::StreamCompleted, |job| {
            job.job_id.clone().map(ArtifactSource::Remote)
        }),
        ProgressEvent::Error { message } => fail(
            state,
            submission,
            JobEvent::StreamReportedError,
            JobFailure {
                kind: FailureKind::Job,
                cause: ErrorCause::Server,
                message: non_empty(message).unwrap_or_else(|| MSG_JOB_FALLBACK.to_string()),
            },
        ),
    }
}

fn on_artifact_saved(
    state: &mut AppState,
    submission: SubmissionId,
    result: Result<std::path::PathBuf, String>,
) {
    let Some(job) = state.current_job_mut(submission) else {
        engine_debug!("dropping save result for stale submission {}", submission);
        return;
    };
    if job.phase != Phase::Completed || job.artifact != ArtifactStatus::Pending {
        engine_warn!(
            "unexpected save result for submission {} in phase {:?}",
            submission,
            job.phase
        );
        return;
    }
    match result {
        Ok(path) => {
            let text = format!("ZIP saved to {}", path.display());
            job.artifact = ArtifactStatus::Saved(path);
            state.set_status(Severity::Success, text);
        }
        Err(err) => {
            let text = format!("Could not save the ZIP: {err}");
            job.artifact = ArtifactStatus::SaveFailed(err);
            state.set_status(Severity::Error, text);
        }
    }
}

/// Rounded percentage, clamped to 0..=100.
fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let sent = sent.min(total) as u128;
    let total = total as u128;
    ((sent * 100 + total / 2) / total) as u8
}

fn transport_message(failure: &TransportFailure, server_fallback: &str) -> String {
    match (non_empty(failure.detail.clone()), failure.cause) {
        (Some(detail), ErrorCause::Server) => detail,
        (Some(detail), ErrorCause::Network) => format!("{MSG_CONNECTION_FAILED}: {detail}"),
        (Some(detail), ErrorCause::Local) => format!("{MSG_FILE_UNREADABLE}: {detail}"),
        (None, ErrorCause::Network) => MSG_CONNECTION_FAILED.to_string(),
        (None, ErrorCause::Local) => MSG_FILE_UNREADABLE.to_string(),
        (None, ErrorCause::Server) => server_fallback.to_string(),
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::percent_of;

    #[test]
    fn percent_rounds_and_clamps() {
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(2, 3), 67);
        assert_eq!(percent_of(10, 10), 100);
        assert_eq!(percent_of(20, 10), 100);
    }
}
