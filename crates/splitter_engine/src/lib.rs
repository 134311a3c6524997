//! Splitter engine: talks to the splitting service and executes effects.
mod engine;
mod filename;
mod persist;
mod sse;
mod subscriber;
mod transport;
mod types;

pub use engine::{EngineCommand, EngineHandle};
pub use filename::artifact_filename;
pub use persist::{ensure_output_dir, ArtifactWriter, PersistError};
pub use subscriber::{
    event_stream, EventSubscriber, HttpEventSubscriber, Subscription, SubscriptionSink,
};
pub use transport::{
    EngineSettings, ReqwestTransport, Transport, UploadProgressSink, FILE_FIELD, MAX_SIZE_FIELD,
};
pub use types::{
    ArtifactPayload, EngineError, EngineEvent, EventStatus, ServerEvent, StreamError,
    SubmissionId, SubscriptionEvent, TransportError, TransportErrorKind, UploadContent,
    UploadFields, UploadSource,
};
