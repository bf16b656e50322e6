//! Common imports for streaming an upload and reading its report.
pub use crate::{
    AbortHandle, AnalysisReport, AttemptOutcome, ClientConfig, CompletionSummary, ProgressEvent,
    ProgressKind, ReportClient, Session, SessionSnapshot, SessionState, StreamError, StreamPolicy,
    UploadRequest, abort_pair, init_observability, run_attempt,
};
