use std::path::PathBuf;

use pretty_assertions::assert_eq;
use splitter_core::{
    update, AppState, ArtifactSource, ArtifactStatus, Effect, ErrorCause, FailureKind, JobId,
    Msg, Phase, ProgressEvent, Severity, SourceFile, TransportFailure, MSG_COMPLETED,
    MSG_CONNECTION_FAILED, MSG_FILE_UNREADABLE, MSG_STREAM_LOST,
};

fn submitted(name: &str) -> AppState {
    let file = SourceFile::in_memory(name, vec![0u8; 1024]);
    let (state, _) = update(AppState::new(), Msg::FileSelected(Some(file)));
    let (state, _) = update(state, Msg::SubmitClicked);
    state
}

fn processing(job: &str) -> AppState {
    let state = submitted("input.pdf");
    let (state, effects) = update(
        state,
        Msg::UploadFinished {
            submission: 1,
            result: Ok(JobId::new(job)),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::OpenSubscription {
            submission: 1,
            job_id: JobId::new(job),
        }]
    );
    assert_eq!(state.phase(), Phase::Uploaded);

    let (state, effects) = update(state, Msg::SubscriptionOpened { submission: 1 });
    assert_eq!(
        effects,
        vec![Effect::TriggerProcessing {
            submission: 1,
            job_id: JobId::new(job),
        }]
    );
    state
}

fn stream(state: AppState, event: ProgressEvent) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::StreamEvent {
            submission: 1,
            event,
        },
    )
}

#[test]
fn happy_path_completes_and_saves_artifact() {
    let state = processing("j1");
    assert_eq!(state.phase(), Phase::Processing);

    let (state, effects) = stream(state, ProgressEvent::Processing { progress: 50 });
    assert!(effects.is_empty());
    let progress = state.view().progress.expect("progress");
    assert_eq!(progress.percent, 50);
    assert_eq!(progress.label, "Processing PDF... 50%");

    let (state, effects) = stream(state, ProgressEvent::Completed);
    assert_eq!(state.phase(), Phase::Completed);
    assert_eq!(
        effects,
        vec![
            Effect::CloseSubscription { submission: 1 },
            Effect::SaveArtifact {
                submission: 1,
                artifact: ArtifactSource::Remote(JobId::new("j1")),
                source_base_name: "input".to_string(),
            },
        ]
    );
    let view = state.view();
    assert!(view.progress.is_none());
    assert!(view.submit_enabled);
    let status = view.status.expect("status");
    assert_eq!(status.severity, Severity::Success);
    assert_eq!(status.text, MSG_COMPLETED);

    let (state, effects) = update(
        state,
        Msg::ArtifactSaved {
            submission: 1,
            result: Ok(PathBuf::from("out/input_dividido.zip")),
        },
    );
    assert!(effects.is_empty());
    let job = state.job().expect("job");
    assert_eq!(
        job.artifact,
        ArtifactStatus::Saved(PathBuf::from("out/input_dividido.zip"))
    );
    assert_eq!(job.phase, Phase::Completed);
}

#[test]
fn upload_server_error_fails_without_subscription() {
    let state = submitted("input.pdf");
    let (state, effects) = update(
        state,
        Msg::UploadFinished {
            submission: 1,
            result: Err(TransportFailure::server(Some("disk full".to_string()))),
        },
    );

    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Failed);
    let failure = state.job().and_then(|job| job.error.clone()).expect("error");
    assert_eq!(failure.kind, FailureKind::Upload);
    assert_eq!(failure.cause, ErrorCause::Server);
    assert_eq!(failure.message, "disk full");
    assert!(state.view().submit_enabled);
}

#[test]
fn upload_network_error_uses_connection_message() {
    let state = submitted("input.pdf");
    let (state, _) = update(
        state,
        Msg::UploadFinished {
            submission: 1,
            result: Err(TransportFailure {
                cause: ErrorCause::Network,
                detail: None,
            }),
        },
    );
    assert_eq!(
        state.view().status.expect("status").text,
        MSG_CONNECTION_FAILED
    );
}

#[test]
fn unreadable_source_is_not_reported_as_connection_failure() {
    let state = submitted("input.pdf");
    let (state, effects) = update(
        state,
        Msg::UploadFinished {
            submission: 1,
            result: Err(TransportFailure::local("input.pdf: No such file or directory")),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Failed);
    let failure = state.job().and_then(|job| job.error.clone()).expect("failure");
    assert_eq!(failure.kind, FailureKind::Upload);
    assert_eq!(failure.cause, ErrorCause::Local);
    let text = state.view().status.expect("status").text;
    assert_eq!(
        text,
        format!("{MSG_FILE_UNREADABLE}: input.pdf: No such file or directory")
    );
    assert!(!text.contains(MSG_CONNECTION_FAILED));
}

#[test]
fn job_error_event_fails_and_closes_subscription() {
    let state = processing("j1");
    let (state, effects) = stream(
        state,
        ProgressEvent::Error {
            message: Some("corrupt pdf".to_string()),
        },
    );

    assert_eq!(effects, vec![Effect::CloseSubscription { submission: 1 }]);
    assert_eq!(state.phase(), Phase::Failed);
    let failure = state.job().and_then(|job| job.error.clone()).expect("error");
    assert_eq!(failure.kind, FailureKind::Job);
    assert_eq!(failure.message, "corrupt pdf");
}

#[test]
fn events_after_terminal_produce_no_effects() {
    let state = processing("j1");
    let (mut state, _) = stream(state, ProgressEvent::Completed);
    assert!(state.consume_dirty());
    let before = state.view();

    for event in [
        ProgressEvent::Processing { progress: 99 },
        ProgressEvent::Completed,
        ProgressEvent::Error {
            message: Some("late".to_string()),
        },
    ] {
        let (next, effects) = stream(state, event);
        state = next;
        assert!(effects.is_empty());
    }
    let (mut state, effects) = update(
        state,
        Msg::StreamFailed {
            submission: 1,
            detail: None,
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Completed);
    assert!(state.job().expect("job").error.is_none());
    assert_eq!(state.view(), before);
    assert!(!state.consume_dirty());
}

#[test]
fn stream_fault_and_trigger_failure_are_terminal_once() {
    let state = processing("j1");
    let (state, effects) = update(
        state,
        Msg::StreamFailed {
            submission: 1,
            detail: Some("eof".to_string()),
        },
    );
    assert_eq!(effects, vec![Effect::CloseSubscription { submission: 1 }]);
    assert_eq!(
        state.view().status.expect("status").text,
        MSG_STREAM_LOST
    );

    let (state, effects) = update(
        state,
        Msg::TriggerFinished {
            submission: 1,
            result: Err(TransportFailure::server(Some("no such job".to_string()))),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(
        state.job().and_then(|job| job.error.clone()).expect("error").kind,
        FailureKind::Stream
    );
}

#[test]
fn trigger_failure_reports_server_detail() {
    let state = processing("j1");
    let (state, effects) = update(
        state,
        Msg::TriggerFinished {
            submission: 1,
            result: Err(TransportFailure::server(Some("queue full".to_string()))),
        },
    );

    assert_eq!(effects, vec![Effect::CloseSubscription { submission: 1 }]);
    let failure = state.job().and_then(|job| job.error.clone()).expect("error");
    assert_eq!(failure.kind, FailureKind::Trigger);
    assert_eq!(failure.message, "queue full");
}

#[test]
fn idle_timeout_fails_with_interval_in_message() {
    let state = processing("j1");
    let (state, effects) = update(state, Msg::IdleTimeout { submission: 1 });

    assert_eq!(effects, vec![Effect::CloseSubscription { submission: 1 }]);
    assert_eq!(state.phase(), Phase::Failed);
    assert_eq!(
        state.view().status.expect("status").text,
        "No progress received for 300 seconds"
    );
}

#[test]
fn upload_progress_is_non_decreasing() {
    let mut state = submitted("input.pdf");
    let mut seen = Vec::new();
    for (sent, total) in [(10, 100), (50, 100), (30, 100), (100, 100)] {
        let (next, _) = update(
            state,
            Msg::UploadProgress {
                submission: 1,
                sent,
                total,
            },
        );
        state = next;
        seen.push(state.view().progress.expect("progress").percent);
    }
    assert_eq!(seen, vec![10, 50, 50, 100]);
}

#[test]
fn processing_progress_restarts_from_zero() {
    let state = submitted("input.pdf");
    let (state, _) = update(
        state,
        Msg::UploadProgress {
            submission: 1,
            sent: 1024,
            total: 1024,
        },
    );
    assert_eq!(state.view().progress.expect("progress").percent, 100);
    let (state, _) = update(
        state,
        Msg::UploadFinished {
            submission: 1,
            result: Ok(JobId::new("j1")),
        },
    );
    let (state, _) = update(state, Msg::SubscriptionOpened { submission: 1 });
    assert_eq!(state.view().progress.expect("progress").percent, 0);

    let (state, _) = stream(state, ProgressEvent::Processing { progress: 70 });
    let (state, _) = stream(state, ProgressEvent::Processing { progress: 40 });
    let (state, _) = stream(state, ProgressEvent::Processing { progress: 250 });
    assert_eq!(state.view().progress.expect("progress").percent, 100);
}

#[test]
fn stream_event_before_subscription_opened_is_ignored() {
    let state = submitted("input.pdf");
    let (state, _) = update(
        state,
        Msg::UploadFinished {
            submission: 1,
            result: Ok(JobId::new("j1")),
        },
    );
    let (state, effects) = stream(state, ProgressEvent::Completed);

    assert!(effects.is_empty());
    assert_eq!(state.phase(), Phase::Uploaded);
}

#[test]
fn save_failure_keeps_job_completed() {
    let state = processing("j1");
    let (state, _) = stream(state, ProgressEvent::Completed);
    let (state, _) = update(
        state,
        Msg::ArtifactSaved {
            submission: 1,
            result: Err("permission denied".to_string()),
        },
    );

    assert_eq!(state.phase(), Phase::Completed);
    let status = state.view().status.expect("status");
    assert_eq!(status.severity, Severity::Error);
    assert_eq!(status.text, "Could not save the ZIP: permission denied");
}
