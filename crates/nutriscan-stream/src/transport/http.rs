use futures::StreamExt as _;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::StreamError;
use crate::report::{AnalysisReport, UploadReceipt};

use super::upload::UploadRequest;
use super::{AnalysisTransport, ByteStream};

/// HTTP client for the report API.
#[derive(Clone, Debug)]
pub struct ReportClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ReportClient {
    pub fn new(config: ClientConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StreamError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a client from `NUTRISCAN_*` environment variables.
    pub fn from_env() -> Result<Self, StreamError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Uploads a report and waits for the whole analysis (no progress stream).
    pub async fn upload(&self, upload: &UploadRequest) -> Result<UploadReceipt, StreamError> {
        debug!(file = upload.file_name(), bytes = upload.len(), "uploading report");
        let response = self
            .client
            .post(self.config.upload_url())
            .timeout(self.config.timeout)
            .multipart(upload.to_form()?)
            .send()
            .await
            .map_err(|e| StreamError::transport(format!("upload request failed: {e}")))?;
        read_json(response).await
    }

    /// Fetches the full analysis for a completed report.
    pub async fn fetch_report(&self, report_id: &str) -> Result<AnalysisReport, StreamError> {
        let report_id = report_id.trim();
        if report_id.is_empty() {
            return Err(StreamError::Validation("report_id must not be empty".into()));
        }
        debug!(report_id, "fetching report");
        let response = self
            .client
            .get(self.config.report_url(report_id))
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| StreamError::transport(format!("report request failed: {e}")))?;
        read_json(response).await
    }
}

#[async_trait::async_trait]
impl AnalysisTransport for ReportClient {
    async fn open_stream(&self, upload: &UploadRequest) -> Result<ByteStream, StreamError> {
        debug!(file = upload.file_name(), bytes = upload.len(), "opening analysis stream");
        let response = self
            .client
            .post(self.config.stream_upload_url())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .multipart(upload.to_form()?)
            .send()
            .await
            .map_err(|e| StreamError::transport(format!("upload request failed: {e}")))?;
        let response = check_status(response).await?;

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| StreamError::transport(format!("stream read failed: {e}")))
        });
        Ok(Box::pin(stream))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(StreamError::status(status.as_u16(), error_detail(&body, status)))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StreamError> {
    let response = check_status(response).await?;
    let body = response
        .bytes()
        .await
        .map_err(|e| StreamError::transport(format!("response read failed: {e}")))?;
    serde_json::from_slice(&body).map_err(|e| StreamError::Decode(e.to_string()))
}

/// Picks a human-readable message out of an error body.
///
/// Prefers the JSON `detail` field the API uses for HTTP errors.
fn error_detail(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(detail) = value.get("detail").and_then(|v| v.as_str())
        && !detail.trim().is_empty()
    {
        return detail.trim().to_string();
    }
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
