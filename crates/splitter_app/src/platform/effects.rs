use bytes::Bytes;
use engine_logging::engine_info;
use splitter_core::{
    ArtifactSource, ContentHandle, Effect, JobId, Msg, ProgressEvent, SourceFile,
    TransportFailure, UploadForm,
};
use splitter_engine::{
    ArtifactPayload, EngineCommand, EngineEvent, EngineHandle, EventStatus, ServerEvent,
    SubscriptionEvent, TransportError, TransportErrorKind, UploadContent, UploadFields,
    UploadSource,
};

/// Executes controller effects on the engine.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            engine_info!("effect {}", effect_name(&effect));
            self.engine.send(map_effect(effect));
        }
    }

    /// Blocks for the next engine event, already translated for the controller.
    pub fn next_msg(&self) -> Option<Msg> {
        self.engine.recv().map(map_event)
    }
}

fn effect_name(effect: &Effect) -> &'static str {
    match effect {
        Effect::StartUpload { .. } => "StartUpload",
        Effect::SplitSingleShot { .. } => "SplitSingleShot",
        Effect::OpenSubscription { .. } => "OpenSubscription",
        Effect::TriggerProcessing { .. } => "TriggerProcessing",
        Effect::CloseSubscription { .. } => "CloseSubscription",
        Effect::SaveArtifact { .. } => "SaveArtifact",
    }
}

pub fn map_effect(effect: Effect) -> EngineCommand {
    match effect {
        Effect::StartUpload {
            submission,
            file,
            form,
        } => EngineCommand::Upload {
            submission,
            source: map_source(file),
            fields: map_form(form),
        },
        Effect::SplitSingleShot {
            submission,
            file,
            form,
        } => EngineCommand::SplitSingleShot {
            submission,
            source: map_source(file),
            fields: map_form(form),
        },
        Effect::OpenSubscription { submission, job_id } => EngineCommand::Subscribe {
            submission,
            job_id: job_id.as_str().to_string(),
        },
        Effect::TriggerProcessing { submission, job_id } => EngineCommand::Trigger {
            submission,
            job_id: job_id.as_str().to_string(),
        },
        Effect::CloseSubscription { submission } => {
            EngineCommand::CloseSubscription { submission }
        }
        Effect::SaveArtifact {
            submission,
            artifact,
            source_base_name,
        } => EngineCommand::SaveArtifact {
            submission,
            payload: match artifact {
                ArtifactSource::Remote(job_id) => ArtifactPayload::Download {
                    job_id: job_id.as_str().to_string(),
                },
                ArtifactSource::Inline(bytes) => ArtifactPayload::Inline(Bytes::from(bytes.to_vec())),
            },
            base_name: source_base_name,
        },
    }
}

fn map_source(file: SourceFile) -> UploadSource {
    let content = match file.content {
        ContentHandle::Path(path) => UploadContent::File(path),
        ContentHandle::Memory(bytes) => UploadContent::Bytes(Bytes::from(bytes.to_vec())),
    };
    UploadSource {
        name: file.name,
        content,
    }
}

fn map_form(form: UploadForm) -> UploadFields {
    UploadFields {
        max_part_mb: form.max_part_mb,
    }
}

pub fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::UploadProgress {
            submission,
            sent,
            total,
        } => Msg::UploadProgress {
            submission,
            sent,
            total,
        },
        EngineEvent::UploadCompleted { submission, result } => Msg::UploadFinished {
            submission,
            result: result.map(JobId::new).map_err(map_failure),
        },
        EngineEvent::SplitCompleted { submission, result } => Msg::SingleShotFinished {
            submission,
            result: result.map(|bytes| bytes.to_vec()).map_err(map_failure),
        },
        EngineEvent::Subscription { submission, event } => match event {
            SubscriptionEvent::Opened => Msg::SubscriptionOpened { submission },
            SubscriptionEvent::Event(event) => Msg::StreamEvent {
                submission,
                event: map_server_event(event),
            },
            SubscriptionEvent::Failed(err) => Msg::StreamFailed {
                submission,
                detail: Some(err.to_string()),
            },
            SubscriptionEvent::IdleTimeout => Msg::IdleTimeout { submission },
        },
        EngineEvent::TriggerCompleted { submission, result } => Msg::TriggerFinished {
            submission,
            result: result.map_err(map_failure),
        },
        EngineEvent::ArtifactSaved { submission, result } => {
            Msg::ArtifactSaved { submission, result }
        }
    }
}

fn map_server_event(event: ServerEvent) -> ProgressEvent {
    match event.status {
        EventStatus::Processing => ProgressEvent::Processing {
            progress: event.percent(),
        },
        EventStatus::Completed => ProgressEvent::Completed,
        EventStatus::Error => ProgressEvent::Error {
            message: event.error,
        },
    }
}

fn map_failure(err: TransportError) -> TransportFailure {
    if err.is_server_side() {
        TransportFailure::server(err.server_detail)
    } else if err.kind == TransportErrorKind::Io {
        TransportFailure::local(err.message)
    } else {
        TransportFailure::network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use splitter_core::ErrorCause;

    #[test]
    fn server_errors_keep_only_the_detail() {
        let msg = map_event(EngineEvent::TriggerCompleted {
            submission: 2,
            result: Err(http_error(Some("Job not found"))),
        });
        match msg {
            Msg::TriggerFinished {
                submission: 2,
                result: Err(failure),
            } => {
                assert_eq!(failure.cause, ErrorCause::Server);
                assert_eq!(failure.detail.as_deref(), Some("Job not found"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stream_events_map_to_progress_events() {
        let msg = map_event(EngineEvent::Subscription {
            submission: 1,
            event: SubscriptionEvent::Event(ServerEvent {
                status: EventStatus::Processing,
                progress: Some(41.6),
                error: None,
            }),
        });
        assert_eq!(
            msg,
            Msg::StreamEvent {
                submission: 1,
                event: ProgressEvent::Processing { progress: 42 },
            }
        );
    }

    #[test]
    fn save_effect_targets_download() {
        let command = map_effect(Effect::SaveArtifact {
            submission: 4,
            artifact: ArtifactSource::Remote(JobId::new("j9")),
            source_base_name: "informe".to_string(),
        });
        match command {
            EngineCommand::SaveArtifact {
                submission: 4,
                payload: ArtifactPayload::Download { job_id },
                base_name,
            } => {
                assert_eq!(job_id, "j9");
                assert_eq!(base_name, "informe");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn upload_effect_streams_from_path() {
        let command = map_effect(Effect::StartUpload {
            submission: 1,
            file: SourceFile::new("a.pdf", 3, ContentHandle::Path(PathBuf::from("/tmp/a.pdf"))),
            form: UploadForm { max_part_mb: 2.0 },
        });
        match command {
            EngineCommand::Upload { source, fields, .. } => {
                assert_eq!(source.content, UploadContent::File(PathBuf::from("/tmp/a.pdf")));
                assert_eq!(fields.max_part_mb, 2.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unreadable_source_maps_to_local_failure() {
        let msg = map_event(EngineEvent::UploadCompleted {
            submission: 1,
            result: Err(TransportError {
                kind: TransportErrorKind::Io,
                message: "/tmp/gone.pdf: No such file or directory".to_string(),
                server_detail: None,
            }),
        });
        match msg {
            Msg::UploadFinished {
                result: Err(failure),
                ..
            } => {
                assert_eq!(failure.cause, ErrorCause::Local);
                assert_eq!(
                    failure.detail.as_deref(),
                    Some("/tmp/gone.pdf: No such file or directory")
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    fn http_error(detail: Option<&str>) -> TransportError {
        TransportError {
            kind: TransportErrorKind::HttpStatus(404),
            message: "404 Not Found".to_string(),
            server_detail: detail.map(str::to_string),
        }
    }

    #[test]
    fn connection_failures_are_network_failures() {
        let msg = map_event(EngineEvent::UploadCompleted {
            submission: 1,
            result: Err(TransportError {
                kind: TransportErrorKind::Network,
                message: "connection refused".to_string(),
                server_detail: None,
            }),
        });
        match msg {
            Msg::UploadFinished {
                result: Err(failure),
                ..
            } => {
                assert_eq!(failure.cause, ErrorCause::Network);
                assert_eq!(
                    failure.detail.as_deref(),
                    Some("network error: connection refused")
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
