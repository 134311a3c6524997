use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::stream;
use futures_util::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Url};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::{
    EngineError, TransportError, TransportErrorKind, UploadContent, UploadFields, UploadSource,
};

/// Multipart field carrying the document.
pub const FILE_FIELD: &str = "pdf_file";
/// Multipart field carrying the part size limit in MB.
pub const MAX_SIZE_FIELD: &str = "max_size";

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Applied to trigger and download requests. Uploads and the progress
    /// stream are never cut short by it.
    pub request_timeout: Option<Duration>,
    /// Maximum silence on the progress stream before giving up. `None` waits forever.
    pub idle_timeout: Option<Duration>,
    pub upload_chunk_size: usize,
    pub output_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            idle_timeout: Some(Duration::from_secs(300)),
            upload_chunk_size: 64 * 1024,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Receives byte-level upload progress. Calls arrive in send order with a
/// non-decreasing `sent`.
pub trait UploadProgressSink: Send + Sync {
    fn upload_progress(&self, sent: u64, total: u64);
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// `POST /upload`; resolves with the server-assigned job id. Never retries.
    async fn submit_upload(
        &self,
        source: &UploadSource,
        fields: &UploadFields,
        progress: Arc<dyn UploadProgressSink>,
    ) -> Result<String, TransportError>;

    /// `POST /process/{job_id}`.
    async fn trigger_processing(&self, job_id: &str) -> Result<(), TransportError>;

    /// `GET /download/{job_id}`.
    async fn fetch_result(&self, job_id: &str) -> Result<Bytes, TransportError>;

    /// Address of the result archive, for navigation-style downloads.
    fn result_url(&self, job_id: &str) -> Result<Url, TransportError>;

    /// Legacy `POST /split`: uploads and receives the archive in one call.
    async fn split_single_shot(
        &self,
        source: &UploadSource,
        fields: &UploadFields,
        progress: Arc<dyn UploadProgressSink>,
    ) -> Result<Bytes, TransportError>;
}

type ChunkStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
    request_timeout: Option<Duration>,
    chunk_size: usize,
}

#[derive(Debug, Deserialize)]
struct UploadReply {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    #[serde(default)]
    error: Option<String>,
}

impl ReqwestTransport {
    pub fn new(settings: &EngineSettings) -> Result<Self, EngineError> {
        let base_url = Url::parse(&settings.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(EngineError::CannotBeABase(settings.base_url.clone()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| EngineError::Client(err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            request_timeout: settings.request_timeout,
            chunk_size: settings.upload_chunk_size.max(1),
        })
    }

    /// Resolves `segments` below the base url, percent-encoding each one.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                TransportError::new(TransportErrorKind::InvalidUrl, self.base_url.to_string())
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET /progress/{job_id}`, returning the open response once the server
    /// accepted it.
    pub(crate) async fn open_progress(
        &self,
        job_id: &str,
    ) -> Result<reqwest::Response, TransportError> {
        let url = self.endpoint(&["progress", job_id])?;
        let request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream");
        let response = request.send().await.map_err(map_reqwest_error)?;
        engine_info!("GET {} -> {}", url.path(), response.status());
        ensure_success(response).await
    }

    async fn send_form(
        &self,
        url: Url,
        source: &UploadSource,
        fields: &UploadFields,
        progress: Arc<dyn UploadProgressSink>,
    ) -> Result<reqwest::Response, TransportError> {
        let (chunks, total) = self.open_content(&source.content).await?;
        progress.upload_progress(0, total);

        let mut sent = 0u64;
        let counted = chunks.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                progress.upload_progress(sent, total);
            }
            chunk
        });

        let part = Part::stream_with_length(reqwest::Body::wrap_stream(counted), total)
            .file_name(source.name.clone())
            .mime_str("application/pdf")
            .map_err(map_reqwest_error)?;
        let form = Form::new()
            .text(MAX_SIZE_FIELD, fields.max_part_mb.to_string())
            .part(FILE_FIELD, part);

        engine_debug!("POST {} file={} bytes={}", url.path(), source.name, total);
        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        engine_info!("POST {} -> {}", url.path(), response.status());
        Ok(response)
    }

    async fn open_content(
        &self,
        content: &UploadContent,
    ) -> Result<(ChunkStream, u64), TransportError> {
        match content {
            UploadContent::Bytes(bytes) => {
                let total = bytes.len() as u64;
                let chunk_size = self.chunk_size;
                let bytes = bytes.clone();
                let offsets: Vec<usize> = (0..bytes.len()).step_by(chunk_size).collect();
                let chunks = stream::iter(offsets.into_iter().map(move |start| {
                    let end = (start + chunk_size).min(bytes.len());
                    Ok::<_, std::io::Error>(bytes.slice(start..end))
                }));
                Ok((Box::pin(chunks), total))
            }
            UploadContent::File(path) => {
                let file = tokio::fs::File::open(path).await.map_err(|err| {
                    TransportError::new(
                        TransportErrorKind::Io,
                        format!("{}: {err}", path.display()),
                    )
                })?;
                let total = file
                    .metadata()
                    .await
                    .map_err(|err| TransportError::new(TransportErrorKind::Io, err.to_string()))?
                    .len();
                Ok((
                    Box::pin(ReaderStream::with_capacity(file, self.chunk_size)),
                    total,
                ))
            }
        }
    }

    async fn simple_request(
        &self,
        method: Method,
        url: Url,
    ) -> Result<reqwest::Response, TransportError> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await.map_err(map_reqwest_error)?;
        engine_info!("{} {} -> {}", method, url.path(), response.status());
        ensure_success(response).await
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn submit_upload(
        &self,
        source: &UploadSource,
        fields: &UploadFields,
        progress: Arc<dyn UploadProgressSink>,
    ) -> Result<String, TransportError> {
        let url = self.endpoint(&["upload"])?;
        let response = self.send_form(url, source, fields, progress).await?;
        let response = ensure_success(response).await?;
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        let reply: UploadReply = serde_json::from_slice(&body).map_err(|err| {
            TransportError::new(
                TransportErrorKind::InvalidResponse,
                format!("upload reply: {err}"),
            )
        })?;
        if reply.job_id.is_empty() {
            return Err(TransportError::new(
                TransportErrorKind::InvalidResponse,
                "upload reply carried an empty job id",
            ));
        }
        Ok(reply.job_id)
    }

    async fn trigger_processing(&self, job_id: &str) -> Result<(), TransportError> {
        let url = self.endpoint(&["process", job_id])?;
        self.simple_request(Method::POST, url).await?;
        Ok(())
    }

    async fn fetch_result(&self, job_id: &str) -> Result<Bytes, TransportError> {
        let url = self.result_url(job_id)?;
        let response = self.simple_request(Method::GET, url).await?;
        response.bytes().await.map_err(map_reqwest_error)
    }

    fn result_url(&self, job_id: &str) -> Result<Url, TransportError> {
        self.endpoint(&["download", job_id])
    }

    async fn split_single_shot(
        &self,
        source: &UploadSource,
        fields: &UploadFields,
        progress: Arc<dyn UploadProgressSink>,
    ) -> Result<Bytes, TransportError> {
        let url = self.endpoint(&["split"])?;
        let response = self.send_form(url, source, fields, progress).await?;
        let response = ensure_success(response).await?;
        response.bytes().await.map_err(map_reqwest_error)
    }
}

/// Passes 2xx responses through; turns anything else into a `HttpStatus`
/// error carrying the `{error}` body field when present.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = match response.bytes().await {
        Ok(body) => parse_error_detail(&body),
        Err(err) => {
            engine_warn!("failed to read error body for {}: {}", status, err);
            None
        }
    };
    Err(TransportError::new(
        TransportErrorKind::HttpStatus(status.as_u16()),
        status.to_string(),
    )
    .with_detail(detail))
}

fn parse_error_detail(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorReply>(body)
        .ok()
        .and_then(|reply| reply.error)
        .filter(|detail| !detail.trim().is_empty())
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(TransportErrorKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return TransportError::new(TransportErrorKind::InvalidUrl, err.to_string());
    }
    TransportError::new(TransportErrorKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> ReqwestTransport {
        let settings = EngineSettings {
            base_url: base.to_string(),
            ..EngineSettings::default()
        };
        ReqwestTransport::new(&settings).unwrap()
    }

    #[test]
    fn endpoints_keep_base_path_and_encode_ids() {
        let t = transport("http://host/api/");
        assert_eq!(
            t.endpoint(&["process", "a b/c"]).unwrap().as_str(),
            "http://host/api/process/a%20b%2Fc"
        );
        let t = transport("http://host");
        assert_eq!(
            t.result_url("j1").unwrap().as_str(),
            "http://host/download/j1"
        );
    }

    #[test]
    fn error_detail_requires_json_error_field() {
        assert_eq!(
            parse_error_detail(br#"{"error":"disk full"}"#),
            Some("disk full".to_string())
        );
        assert_eq!(parse_error_detail(br#"{"error":"  "}"#), None);
        assert_eq!(parse_error_detail(br#"{"message":"x"}"#), None);
        assert_eq!(parse_error_detail(b"<html>500</html>"), None);
    }

    #[test]
    fn rejects_non_hierarchical_base() {
        let settings = EngineSettings {
            base_url: "mailto:someone@example.com".to_string(),
            ..EngineSettings::default()
        };
        assert!(matches!(
            ReqwestTransport::new(&settings),
            Err(EngineError::CannotBeABase(_))
        ));
    }
}
