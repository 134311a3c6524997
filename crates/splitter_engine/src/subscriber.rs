use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::{stream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::sse::SseDecoder;
use crate::transport::ReqwestTransport;
use crate::{ServerEvent, StreamError, SubscriptionEvent};

/// Receives everything a subscription reports, one call at a time.
pub trait SubscriptionSink: Send + Sync {
    fn emit(&self, event: SubscriptionEvent);
}

/// Handle to one open progress channel.
///
/// Closing is idempotent and never blocks, so it may be called from inside
/// [`SubscriptionSink::emit`].
#[derive(Debug, Clone)]
pub struct Subscription {
    cancel: CancellationToken,
}

impl Subscription {
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub trait EventSubscriber: Send + Sync {
    /// Opens a progress channel for `job_id`. Must be called within a tokio runtime.
    fn subscribe(&self, job_id: &str, sink: Arc<dyn SubscriptionSink>) -> Subscription;
}

/// Lazily decodes a server-sent-events body into progress events.
///
/// Nothing is read until the stream is polled. The stream ends after the first
/// error or when the body ends.
pub fn event_stream<S, E>(body: S) -> impl Stream<Item = Result<ServerEvent, StreamError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = (Box::pin(body), SseDecoder::new(), VecDeque::new(), false);
    stream::unfold(
        state,
        |(mut body, mut decoder, mut ready, mut done)| async move {
            loop {
                if let Some(item) = ready.pop_front() {
                    return Some((item, (body, decoder, ready, done)));
                }
                if done {
                    return None;
                }
                match body.next().await {
                    Some(Ok(chunk)) => match decoder.push(&chunk) {
                        Ok(payloads) => ready.extend(payloads.iter().map(|data| parse_event(data))),
                        Err(reason) => {
                            ready.push_back(Err(StreamError::Malformed(reason)));
                            done = true;
                        }
                    },
                    Some(Err(err)) => {
                        ready.push_back(Err(StreamError::Transport(err.to_string())));
                        done = true;
                    }
                    None => done = true,
                }
            }
        },
    )
    .scan(false, |failed, item| {
        // Nothing follows the first error.
        if *failed {
            return futures_util::future::ready(None);
        }
        *failed = item.is_err();
        futures_util::future::ready(Some(item))
    })
}

fn parse_event(data: &str) -> Result<ServerEvent, StreamError> {
    serde_json::from_str(data).map_err(|err| StreamError::Malformed(format!("{err}: {data}")))
}

/// Subscribes over HTTP using `GET /progress/{job_id}`.
#[derive(Debug, Clone)]
pub struct HttpEventSubscriber {
    transport: ReqwestTransport,
    idle_timeout: Option<Duration>,
}

impl HttpEventSubscriber {
    pub fn new(transport: ReqwestTransport, idle_timeout: Option<Duration>) -> Self {
        Self {
            transport,
            idle_timeout,
        }
    }
}

impl EventSubscriber for HttpEventSubscriber {
    fn subscribe(&self, job_id: &str, sink: Arc<dyn SubscriptionSink>) -> Subscription {
        let cancel = CancellationToken::new();
        let subscription = Subscription {
            cancel: cancel.clone(),
        };
        let transport = self.transport.clone();
        let idle_timeout = self.idle_timeout;
        let job_id = job_id.to_string();

        tokio::spawn(async move {
            run_subscription(transport, job_id, idle_timeout, sink.as_ref(), &cancel).await;
            cancel.cancel();
        });

        subscription
    }
}

async fn run_subscription(
    transport: ReqwestTransport,
    job_id: String,
    idle_timeout: Option<Duration>,
    sink: &dyn SubscriptionSink,
    cancel: &CancellationToken,
) {
    // The idle limit also covers a server that accepts the connection but never answers.
    let open = transport.open_progress(&job_id);
    let response = match idle_timeout {
        Some(limit) => tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            response = tokio::time::timeout(limit, open) => match response {
                Ok(response) => response,
                Err(_) => {
                    engine_warn!(
                        "progress stream for job {} not answered within {:?}",
                        job_id,
                        limit
                    );
                    sink.emit(SubscriptionEvent::IdleTimeout);
                    return;
                }
            },
        },
        None => tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            response = open => response,
        },
    };
    let response = match response {
        Ok(response) => response,
        Err(err) => {
            engine_warn!("progress stream for job {} failed to open: {}", job_id, err);
            sink.emit(SubscriptionEvent::Failed(StreamError::Open(err)));
            return;
        }
    };
    if cancel.is_cancelled() {
        return;
    }
    engine_info!("progress stream for job {} open", job_id);
    sink.emit(SubscriptionEvent::Opened);

    let mut events = Box::pin(event_stream(response.bytes_stream()));
    loop {
        if cancel.is_cancelled() {
            engine_debug!("progress stream for job {} closed by caller", job_id);
            return;
        }
        let next = events.next();
        let item = match idle_timeout {
            Some(limit) => tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                item = tokio::time::timeout(limit, next) => match item {
                    Ok(item) => item,
                    Err(_) => {
                        engine_warn!("progress stream for job {} idle for {:?}", job_id, limit);
                        sink.emit(SubscriptionEvent::IdleTimeout);
                        return;
                    }
                },
            },
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                item = next => item,
            },
        };

        match item {
            Some(Ok(event)) => {
                let terminal = event.is_terminal();
                sink.emit(SubscriptionEvent::Event(event));
                if terminal {
                    engine_info!("progress stream for job {} reached a terminal event", job_id);
                    return;
                }
            }
            Some(Err(err)) => {
                engine_warn!("progress stream for job {} failed: {}", job_id, err);
                sink.emit(SubscriptionEvent::Failed(err));
                return;
            }
            None => {
                sink.emit(SubscriptionEvent::Failed(StreamError::EndedEarly));
                return;
            }
        }
    }
}
