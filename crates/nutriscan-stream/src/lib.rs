//! Streaming client for NutriScan lab-report analysis.
//!
//! An upload is sent to the report API, which answers with a long-lived
//! event stream. Bytes are cut into frames, frames are parsed into typed
//! events, and events drive a per-upload [`Session`] through
//! `idle -> uploading -> running -> done | error`.
//!
//! # Streaming an upload
//!
//! ```no_run
//! use nutriscan_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), StreamError> {
//! let client = ReportClient::from_env()?;
//! let upload = UploadRequest::from_path("labs.pdf")
//!     .await?
//!     .dietary_preferences(["vegetarian"]);
//!
//! let mut session = Session::new();
//! let (_abort, signal) = abort_pair();
//! let outcome = run_attempt(
//!     &mut session,
//!     &client,
//!     &upload,
//!     &StreamPolicy::default(),
//!     signal,
//! )
//! .await;
//!
//! if let AttemptOutcome::Completed(summary) = outcome {
//!     let report = client.fetch_report(&summary.report_id).await?;
//!     println!("{} deficiencies", report.deficiencies.len());
//! }
//! # Ok(())
//! # }
//! ```

/// Attempt driver connecting a transport byte stream to a session.
pub mod attempt;
/// Client configuration and stream policy.
pub mod config;
/// Event routing with terminal latching and optional sequence checks.
pub mod dispatch;
/// Public error types.
pub mod errors;
/// Typed progress, completion, and failure events.
pub mod event;
/// Chunk-to-frame reassembly.
pub mod frame;
/// Process-wide tracing setup.
pub mod observability;
/// Frame text to `(kind, payload)` parsing.
pub mod parser;
/// Common imports for typical usage.
pub mod prelude;
/// Report API response documents.
pub mod report;
/// Per-upload session state machine.
pub mod session;
/// Transport seam and the HTTP client.
pub mod transport;

pub use attempt::{AbortHandle, AbortSignal, AttemptOutcome, abort_pair, consume_stream, run_attempt};
pub use config::{ClientConfig, SequencePolicy, StreamPolicy};
pub use dispatch::{Dispatch, DropReason, EventDispatcher, EventHandler, EventKind};
pub use errors::StreamError;
pub use event::{
    CompletionSummary, DEFAULT_FAILURE_MESSAGE, ProgressEvent, ProgressKind, failure_message,
};
pub use frame::{FrameBuffer, RawFrame, frames};
pub use observability::init_observability;
pub use parser::{ParsedFrame, parse_frame};
pub use report::{AnalysisReport, Biomarker, CartItem, Deficiency, Explanation, UploadReceipt};
pub use session::{Session, SessionSnapshot, SessionState};
pub use transport::{AnalysisTransport, ByteStream, MAX_UPLOAD_BYTES, ReportClient, UploadRequest};
