//! Transport seam between the attempt driver and the report API.
//!
//! The driver only needs a byte stream for an upload; `ReportClient` provides
//! it over HTTP and tests substitute in-memory streams.
mod http;
mod upload;

pub use http::ReportClient;
pub use upload::{MAX_UPLOAD_BYTES, UploadRequest};

use std::pin::Pin;

use crate::errors::StreamError;

/// Response body of a streaming upload, chunk by chunk.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, StreamError>> + Send + 'static>>;

/// Opens the analysis event stream for an upload.
#[async_trait::async_trait]
pub trait AnalysisTransport: Send + Sync {
    /// Sends the upload and returns the response body once the server has
    /// accepted it with a success status.
    async fn open_stream(&self, upload: &UploadRequest) -> Result<ByteStream, StreamError>;
}
