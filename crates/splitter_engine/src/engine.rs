use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread;

use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::filename::artifact_filename;
use crate::persist::ArtifactWriter;
use crate::subscriber::{EventSubscriber, HttpEventSubscriber, Subscription, SubscriptionSink};
use crate::transport::{EngineSettings, ReqwestTransport, Transport, UploadProgressSink};
use crate::{
    ArtifactPayload, EngineError, EngineEvent, SubmissionId, SubscriptionEvent, UploadFields,
    UploadSource,
};

/// Work the host asks the engine to perform. Every command carries the
/// submission it belongs to; every resulting event echoes it back.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    Upload {
        submission: SubmissionId,
        source: UploadSource,
        fields: UploadFields,
    },
    SplitSingleShot {
        submission: SubmissionId,
        source: UploadSource,
        fields: UploadFields,
    },
    Subscribe {
        submission: SubmissionId,
        job_id: String,
    },
    Trigger {
        submission: SubmissionId,
        job_id: String,
    },
    CloseSubscription {
        submission: SubmissionId,
    },
    SaveArtifact {
        submission: SubmissionId,
        payload: ArtifactPayload,
        base_name: String,
    },
}

pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: EngineSettings) -> Result<Self, EngineError> {
        let transport = ReqwestTransport::new(&settings)?;
        let subscriber = HttpEventSubscriber::new(transport.clone(), settings.idle_timeout);
        Self::with_components(
            Arc::new(transport),
            Arc::new(subscriber),
            ArtifactWriter::new(settings.output_dir),
        )
    }

    /// Builds an engine around explicit collaborators.
    pub fn with_components(
        transport: Arc<dyn Transport>,
        subscriber: Arc<dyn EventSubscriber>,
        writer: ArtifactWriter,
    ) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()?;

        thread::spawn(move || {
            let _guard = runtime.enter();
            let mut worker = Worker {
                transport,
                subscriber,
                writer,
                event_tx,
                subscriptions: HashMap::new(),
            };
            while let Ok(command) = cmd_rx.recv() {
                worker.handle(&runtime, command);
            }
            engine_debug!("engine command channel closed; shutting down");
            for (_, subscription) in worker.subscriptions.drain() {
                subscription.close();
            }
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            engine_warn!("engine worker is gone; command dropped");
        }
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Blocks until the next event. `None` once the engine worker has stopped.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }
}

struct Worker {
    transport: Arc<dyn Transport>,
    subscriber: Arc<dyn EventSubscriber>,
    writer: ArtifactWriter,
    event_tx: mpsc::Sender<EngineEvent>,
    subscriptions: HashMap<SubmissionId, Subscription>,
}

impl Worker {
    fn handle(&mut self, runtime: &tokio::runtime::Runtime, command: EngineCommand) {
        match command {
            EngineCommand::Upload {
                submission,
                source,
                fields,
            } => {
                let transport = self.transport.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let sink = Arc::new(ChannelSink::new(submission, event_tx.clone()));
                    let result = transport.submit_upload(&source, &fields, sink).await;
                    match &result {
                        Ok(job_id) => engine_info!("submission {} uploaded as job {}", submission, job_id),
                        Err(err) => engine_warn!("submission {} upload failed: {}", submission, err),
                    }
                    let _ = event_tx.send(EngineEvent::UploadCompleted { submission, result });
                });
            }
            EngineCommand::SplitSingleShot {
                submission,
                source,
                fields,
            } => {
                let transport = self.transport.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let sink = Arc::new(ChannelSink::new(submission, event_tx.clone()));
                    let result = transport.split_single_shot(&source, &fields, sink).await;
                    if let Err(err) = &result {
                        engine_warn!("submission {} split failed: {}", submission, err);
                    }
                    let _ = event_tx.send(EngineEvent::SplitCompleted { submission, result });
                });
            }
            EngineCommand::Subscribe { submission, job_id } => {
                self.subscriptions.retain(|_, s| !s.is_closed());
                let sink = Arc::new(ChannelSink::new(submission, self.event_tx.clone()));
                let subscription = self.subscriber.subscribe(&job_id, sink);
                if let Some(previous) = self.subscriptions.insert(submission, subscription) {
                    previous.close();
                }
            }
            EngineCommand::Trigger { submission, job_id } => {
                let transport = self.transport.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let result = transport.trigger_processing(&job_id).await;
                    if let Err(err) = &result {
                        engine_warn!("job {} trigger failed: {}", job_id, err);
                    }
                    let _ = event_tx.send(EngineEvent::TriggerCompleted { submission, result });
                });
            }
            EngineCommand::CloseSubscription { submission } => {
                if let Some(subscription) = self.subscriptions.remove(&submission) {
                    engine_debug!("closing progress stream of submission {}", submission);
                    subscription.close();
                }
            }
            EngineCommand::SaveArtifact {
                submission,
                payload,
                base_name,
            } => {
                let transport = self.transport.clone();
                let writer = self.writer.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let result = save_artifact(transport.as_ref(), writer, payload, &base_name).await;
                    match &result {
                        Ok(path) => engine_info!("saved archive to {}", path.display()),
                        Err(err) => engine_warn!("saving archive failed: {}", err),
                    }
                    let _ = event_tx.send(EngineEvent::ArtifactSaved { submission, result });
                });
            }
        }
    }
}

async fn save_artifact(
    transport: &dyn Transport,
    writer: ArtifactWriter,
    payload: ArtifactPayload,
    base_name: &str,
) -> Result<std::path::PathBuf, String> {
    let bytes = match payload {
        ArtifactPayload::Inline(bytes) => bytes,
        ArtifactPayload::Download { job_id } => transport
            .fetch_result(&job_id)
            .await
            .map_err(|err| err.to_string())?,
    };
    let filename = artifact_filename(base_name);
    tokio::task::spawn_blocking(move || writer.write(&filename, &bytes))
        .await
        .map_err(|err| err.to_string())?
        .map_err(|err| err.to_string())
}

/// Forwards transport callbacks onto the event channel, tagged with a submission.
struct ChannelSink {
    submission: SubmissionId,
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelSink {
    fn new(submission: SubmissionId, tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { submission, tx }
    }
}

impl UploadProgressSink for ChannelSink {
    fn upload_progress(&self, sent: u64, total: u64) {
        let _ = self.tx.send(EngineEvent::UploadProgress {
            submission: self.submission,
            sent,
            total,
        });
    }
}

impl SubscriptionSink for ChannelSink {
    fn emit(&self, event: SubscriptionEvent) {
        let _ = self.tx.send(EngineEvent::Subscription {
            submission: self.submission,
            event,
        });
    }
}
