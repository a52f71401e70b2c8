//! Outbound calls to the extraction backend.
//!
//! [`Transport`] is the seam between the run orchestration and the network:
//! [`HttpTransport`] talks to the real service with `reqwest`, tests swap in
//! an in-memory fake. Every operation maps a failure to a [`TransportError`]
//! whose message is, in order of preference:
//!
//! 1. the backend's `detail` member from a JSON error body,
//! 2. the network error text when the backend could not be reached,
//! 3. the operation's generic fallback (`"Upload failed"`, …).
//!
//! There are no retries and no request timeouts: a failed call simply ends
//! the run and the user runs again.

use crate::config::ClientConfig;
use crate::error::{ClientError, Operation, TransportError};
use crate::response::{CleanupResponse, ExtractRequest, ExtractResponse, UploadResponse};
use crate::selection::SelectedFile;
use crate::spreadsheet::{resolve_filename, Spreadsheet};
use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

/// The four backend operations a run is built from.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST /upload` with the file as multipart field `file`.
    async fn submit_file(&self, file: &SelectedFile) -> Result<UploadResponse, TransportError>;

    /// `POST /extract`. `run_ocr_only` is forwarded untouched.
    async fn request_extraction(
        &self,
        request: &ExtractRequest,
    ) -> Result<ExtractResponse, TransportError>;

    /// `GET /download/{file_id}`: the generated workbook and its filename.
    async fn fetch_spreadsheet(&self, file_id: &str) -> Result<Spreadsheet, TransportError>;

    /// `DELETE /cleanup/{file_id}`: drop the backend's temporary files.
    async fn request_cleanup(&self, file_id: &str) -> Result<CleanupResponse, TransportError>;
}

/// [`Transport`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport for the configured base URL.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("batchsheet-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::HttpClient(e.to_string()))?;
        Ok(Self::with_client(client, config))
    }

    /// Use a caller-supplied `reqwest::Client` (proxies, custom TLS, …).
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn url(&self, op: Operation, segments: &[&str]) -> Result<Url, TransportError> {
        let invalid =
            || TransportError::new(op, None, format!("Invalid base URL '{}'", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        op: Operation,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::new(op, None, network_message(op, &e)))?;

        if !response.status().is_success() {
            return Err(error_from_response(op, response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit_file(&self, file: &SelectedFile) -> Result<UploadResponse, TransportError> {
        let op = Operation::Upload;
        debug!(
            "Uploading '{}' ({} bytes, {})",
            file.name(),
            file.size(),
            file.media_type()
        );

        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.media_type())
            .map_err(|e| TransportError::new(op, None, e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .send(op, self.client.post(self.url(op, &["upload"])?).multipart(form))
            .await?;
        let upload: UploadResponse = decode(op, response).await?;
        info!("Uploaded '{}' as file_id={}", file.name(), upload.file_id);
        Ok(upload)
    }

    async fn request_extraction(
        &self,
        request: &ExtractRequest,
    ) -> Result<ExtractResponse, TransportError> {
        let op = Operation::Extract;
        debug!(
            "Requesting extraction for file_id={} (ocr_only={})",
            request.file_id, request.run_ocr_only
        );

        let response = self
            .send(op, self.client.post(self.url(op, &["extract"])?).json(request))
            .await?;
        decode(op, response).await
    }

    async fn fetch_spreadsheet(&self, file_id: &str) -> Result<Spreadsheet, TransportError> {
        let op = Operation::Download;
        debug!("Downloading spreadsheet for file_id={}", file_id);

        let response = self
            .send(op, self.client.get(self.url(op, &["download", file_id])?))
            .await?;

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(op, Some(status), e.to_string()))?;

        Ok(Spreadsheet {
            filename: resolve_filename(disposition.as_deref(), file_id),
            bytes: bytes.to_vec(),
        })
    }

    async fn request_cleanup(&self, file_id: &str) -> Result<CleanupResponse, TransportError> {
        let op = Operation::Cleanup;
        debug!("Requesting cleanup for file_id={}", file_id);

        let response = self
            .send(op, self.client.delete(self.url(op, &["cleanup", file_id])?))
            .await?;
        decode(op, response).await
    }
}

/// Decode a 2xx JSON body.
async fn decode<T: DeserializeOwned>(op: Operation, response: Response) -> Result<T, TransportError> {
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|e| {
        TransportError::new(
            op,
            Some(status),
            format!("{}: invalid response from server ({e})", op.fallback_message()),
        )
    })
}

/// Turn a non-2xx response into an error, preferring the backend's `detail`.
async fn error_from_response(op: Operation, response: Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.bytes().await.unwrap_or_default();
    match detail_message(&body) {
        Some(detail) => TransportError::new(op, Some(status), detail),
        None => TransportError::fallback(op, Some(status)),
    }
}

/// Extract `detail` from a JSON error body.
///
/// String details are returned verbatim; structured ones (validation error
/// lists) are rendered as compact JSON.
pub fn detail_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn network_message(op: Operation, err: &reqwest::Error) -> String {
    let text = err.to_string();
    if text.is_empty() {
        op.fallback_message().to_string()
    } else {
        text
    }
}
