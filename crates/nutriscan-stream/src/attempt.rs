//! Drives one upload attempt from transport bytes to a terminal session state.
//!
//! The loop has a single suspension point per iteration (the next frame),
//! raced against cancellation. The byte stream is owned by the attempt and is
//! dropped on every exit path.

use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::StreamPolicy;
use crate::dispatch::{Dispatch, EventDispatcher};
use crate::errors::StreamError;
use crate::event::{CompletionSummary, DEFAULT_FAILURE_MESSAGE};
use crate::frame::frames;
use crate::parser::parse_frame;
use crate::session::Session;
use crate::transport::{AnalysisTransport, UploadRequest};

const ENDED_EARLY_MESSAGE: &str = "stream ended before the analysis finished";

/// Requests cancellation of a running attempt.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Frames already buffered but not yet dispatched are discarded.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving side of an [`AbortHandle`], handed to the attempt.
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    async fn aborted(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Creates a connected cancellation handle and signal.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

/// How an attempt ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Completed(CompletionSummary),
    /// Failure event or transport failure; carries the session's error message.
    Failed(String),
    Cancelled,
}

/// Runs a full attempt: starts the upload, opens the stream, and pumps it
/// into `session` until a terminal state.
///
/// Every failure is recorded on the session and reported as
/// [`AttemptOutcome::Failed`]. Dropping the returned future releases the
/// transport; the next attempt on the same session supersedes the abandoned one.
pub async fn run_attempt(
    session: &mut Session,
    transport: &dyn AnalysisTransport,
    upload: &UploadRequest,
    policy: &StreamPolicy,
    mut signal: AbortSignal,
) -> AttemptOutcome {
    let attempt_id = session.begin_upload();
    info!(
        attempt_id = %attempt_id,
        file = upload.file_name(),
        bytes = upload.len(),
        preferences = %upload.preferences_field(),
        "starting analysis attempt"
    );

    let opened = tokio::select! {
        biased;
        _ = signal.aborted() => return cancel(session),
        opened = transport.open_stream(upload) => opened,
    };
    let stream = match opened {
        Ok(stream) => stream,
        Err(err) => {
            warn!(attempt_id = %attempt_id, error = %err, "analysis stream could not be opened");
            return fail(session, err.to_string());
        }
    };

    if let Some(delay) = policy.pacing_delay {
        tokio::select! {
            biased;
            _ = signal.aborted() => return cancel(session),
            _ = tokio::time::sleep(delay) => {}
        }
    }
    session.mark_running();

    consume_stream(session, stream, policy, &mut signal).await
}

/// Pumps an already-open byte stream into a session that is `uploading` or `running`.
pub async fn consume_stream<S, B>(
    session: &mut Session,
    stream: S,
    policy: &StreamPolicy,
    signal: &mut AbortSignal,
) -> AttemptOutcome
where
    S: futures::Stream<Item = Result<B, StreamError>> + Unpin,
    B: AsRef<[u8]>,
{
    let mut dispatcher = EventDispatcher::new(policy.sequence);
    let mut frame_stream = std::pin::pin!(frames(stream));
    let mut delivered = 0_usize;
    let mut dropped = 0_usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = signal.aborted() => return cancel(session),
            next = next_frame(&mut frame_stream, policy.idle_timeout) => next,
        };
        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                warn!(delivered, dropped, "stream closed without a terminal event");
                return fail(session, ENDED_EARLY_MESSAGE);
            }
            Err(err) => {
                warn!(delivered, dropped, error = %err, "stream read failed");
                return fail(session, err.to_string());
            }
        };
        // Frames from an already-read chunk are ready immediately; re-check
        // so none is dispatched once cancellation was requested.
        if signal.is_aborted() {
            return cancel(session);
        }

        let Some(parsed) = parse_frame(&frame) else {
            dropped += 1;
            continue;
        };
        match dispatcher.dispatch(parsed, session) {
            Dispatch::Delivered(kind) => {
                delivered += 1;
                if dispatcher.is_terminal() {
                    debug!(
                        delivered,
                        dropped,
                        terminal = ?kind,
                        state = %session.state(),
                        "stream reached terminal event"
                    );
                    return settled(session);
                }
            }
            Dispatch::Dropped(_) => dropped += 1,
            Dispatch::AfterTerminal => return settled(session),
        }
    }
}

async fn next_frame<S, T>(
    stream: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<T>, StreamError>
where
    S: futures::Stream<Item = Result<T, StreamError>> + Unpin,
{
    let Some(limit) = idle_timeout else {
        return stream.next().await.transpose();
    };
    match tokio::time::timeout(limit, stream.next()).await {
        Ok(next) => next.transpose(),
        Err(_) => Err(StreamError::transport(format!(
            "no event received within {limit:?}"
        ))),
    }
}

fn cancel(session: &mut Session) -> AttemptOutcome {
    info!(attempt_id = ?session.attempt_id(), "analysis attempt cancelled");
    session.fail(StreamError::Cancelled.to_string());
    AttemptOutcome::Cancelled
}

fn fail(session: &mut Session, message: impl Into<String>) -> AttemptOutcome {
    session.fail(message);
    settled(session)
}

fn settled(session: &Session) -> AttemptOutcome {
    match (session.summary(), session.last_error()) {
        (Some(summary), _) => AttemptOutcome::Completed(summary.clone()),
        (None, Some(message)) => AttemptOutcome::Failed(message.to_string()),
        (None, None) => AttemptOutcome::Failed(DEFAULT_FAILURE_MESSAGE.to_string()),
    }
}
