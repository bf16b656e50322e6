//! Client-side session state for one upload-and-analyze attempt.
//!
//! ```text
//! idle -> uploading -> running -> done
//!              \           \---> error
//!               \--------------> error
//! ```
//!
//! `done` and `error` are terminal; only [`Session::reset`] or a new
//! [`Session::begin_upload`] leaves them.

use std::fmt;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::dispatch::EventHandler;
use crate::event::{CompletionSummary, DEFAULT_FAILURE_MESSAGE, ProgressEvent};

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    #[default]
    Idle,
    Uploading,
    Running,
    Done,
    Error,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Whether an attempt is in flight and accepts stream events.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Uploading | Self::Running)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        })
    }
}

/// Point-in-time copy of a session, published to observers on every change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub attempt_id: Option<uuid::Uuid>,
    pub state: SessionState,
    pub progress: Vec<ProgressEvent>,
    pub last_error: Option<String>,
    pub summary: Option<CompletionSummary>,
}

/// Owned session state machine.
///
/// Transitions are driven by dispatched stream events (through
/// [`EventHandler`]) and by transport failures reported with
/// [`Session::fail`]. Every change is published to [`Session::subscribe`]rs.
pub struct Session {
    attempt_id: Option<uuid::Uuid>,
    state: SessionState,
    progress: Vec<ProgressEvent>,
    last_error: Option<String>,
    summary: Option<CompletionSummary>,
    observers: watch::Sender<SessionSnapshot>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (observers, _) = watch::channel(SessionSnapshot::default());
        Self {
            attempt_id: None,
            state: SessionState::Idle,
            progress: Vec::new(),
            last_error: None,
            summary: None,
            observers,
        }
    }

    /// Returns a receiver that sees a fresh snapshot after every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.observers.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn attempt_id(&self) -> Option<uuid::Uuid> {
        self.attempt_id
    }

    /// Progress log in arrival order.
    pub fn progress(&self) -> &[ProgressEvent] {
        &self.progress
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn summary(&self) -> Option<&CompletionSummary> {
        self.summary.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            attempt_id: self.attempt_id,
            state: self.state,
            progress: self.progress.clone(),
            last_error: self.last_error.clone(),
            summary: self.summary.clone(),
        }
    }

    /// Starts a new attempt: `idle -> uploading`.
    ///
    /// Any previous attempt is discarded first. An attempt still marked in
    /// flight was abandoned by its driver (its future was dropped), so it is
    /// superseded rather than resumed.
    pub fn begin_upload(&mut self) -> uuid::Uuid {
        if self.state.is_active() {
            warn!(
                superseded = ?self.attempt_id,
                state = %self.state,
                steps = self.progress.len(),
                "superseding abandoned attempt"
            );
        }
        self.clear();
        let attempt_id = uuid::Uuid::new_v4();
        self.attempt_id = Some(attempt_id);
        self.state = SessionState::Uploading;
        info!(attempt_id = %attempt_id, "upload started");
        self.publish();
        attempt_id
    }

    /// The server accepted the upload and the stream is open: `uploading -> running`.
    ///
    /// Returns `false` (and changes nothing) from any other state.
    pub fn mark_running(&mut self) -> bool {
        if self.state != SessionState::Uploading {
            return false;
        }
        self.state = SessionState::Running;
        debug!(attempt_id = ?self.attempt_id, "stream running");
        self.publish();
        true
    }

    /// Moves an in-flight attempt to `error`.
    ///
    /// Used for transport failures as well as failure events. The progress log
    /// is kept. Returns `false` if the session was not in flight.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if !self.state.is_active() {
            debug!(state = %self.state, "ignoring failure outside an active attempt");
            return false;
        }
        let message = message.into();
        let message = if message.trim().is_empty() {
            DEFAULT_FAILURE_MESSAGE.to_string()
        } else {
            message
        };
        warn!(
            attempt_id = ?self.attempt_id,
            steps = self.progress.len(),
            error = %message,
            "analysis failed"
        );
        self.last_error = Some(message);
        self.state = SessionState::Error;
        self.publish();
        true
    }

    /// Returns to `idle` exactly as if freshly constructed.
    pub fn reset(&mut self) {
        self.clear();
        self.publish();
    }

    fn clear(&mut self) {
        self.attempt_id = None;
        self.state = SessionState::Idle;
        self.progress.clear();
        self.last_error = None;
        self.summary = None;
    }

    fn publish(&self) {
        self.observers.send_replace(self.snapshot());
    }
}

impl EventHandler for Session {
    fn on_progress(&mut self, event: ProgressEvent) {
        if !self.state.is_active() {
            debug!(state = %self.state, step_number = event.step_number, "ignoring progress outside an active attempt");
            return;
        }
        debug!(
            attempt_id = ?self.attempt_id,
            step_number = event.step_number,
            tool = event.tool_name.as_deref().unwrap_or("-"),
            "progress"
        );
        self.state = SessionState::Running;
        self.progress.push(event);
        self.publish();
    }

    fn on_completion(&mut self, summary: CompletionSummary) {
        if !self.state.is_active() {
            debug!(state = %self.state, "ignoring completion outside an active attempt");
            return;
        }
        info!(
            attempt_id = ?self.attempt_id,
            report_id = %summary.report_id,
            deficiencies = summary.deficiency_count,
            biomarkers = summary.biomarker_count,
            recommendations = summary.recommendation_count,
            "analysis complete"
        );
        self.summary = Some(summary);
        self.state = SessionState::Done;
        self.publish();
    }

    fn on_failure(&mut self, message: String) {
        self.fail(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ProgressKind;

    fn step(n: u64) -> ProgressEvent {
        ProgressEvent {
            step_number: n,
            kind: ProgressKind::Narration,
            tool_name: None,
            reasoning: format!("step {n}"),
            result_summary: String::new(),
        }
    }

    fn summary() -> CompletionSummary {
        CompletionSummary {
            report_id: "abc".into(),
            deficiency_count: 2,
            biomarker_count: 10,
            recommendation_count: 4,
        }
    }

    #[test]
    fn happy_path_reaches_done_and_freezes_log() {
        let mut session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);
        session.begin_upload();
        assert_eq!(session.state(), SessionState::Uploading);
        assert!(session.mark_running());
        session.on_progress(step(1));
        session.on_progress(step(2));
        session.on_completion(summary());
        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(session.summary(), Some(&summary()));

        session.on_progress(step(3));
        session.on_failure("late".into());
        assert_eq!(session.progress().len(), 2);
        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(session.last_error(), None);
    }

    #[test]
    fn progress_while_uploading_enters_running() {
        let mut session = Session::new();
        session.begin_upload();
        session.on_progress(step(1));
        assert_eq!(session.state(), SessionState::Running);
        assert!(!session.mark_running());
    }

    #[test]
    fn failure_keeps_partial_log() {
        let mut session = Session::new();
        session.begin_upload();
        session.mark_running();
        session.on_progress(step(1));
        session.on_failure("OCR failed".into());
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.last_error(), Some("OCR failed"));
        assert_eq!(session.progress().len(), 1);
    }

    #[test]
    fn blank_failure_message_is_replaced() {
        let mut session = Session::new();
        session.begin_upload();
        assert!(session.fail("   "));
        assert_eq!(session.last_error(), Some(DEFAULT_FAILURE_MESSAGE));
    }

    #[test]
    fn events_are_ignored_while_idle() {
        let mut session = Session::new();
        session.on_progress(step(1));
        session.on_completion(summary());
        assert!(!session.fail("x"));
        assert_eq!(session.snapshot(), SessionSnapshot::default());
    }

    #[test]
    fn begin_upload_supersedes_abandoned_attempt() {
        let mut session = Session::new();
        let first = session.begin_upload();
        session.mark_running();
        session.on_progress(step(1));

        let second = session.begin_upload();
        assert_ne!(first, second);
        assert_eq!(session.attempt_id(), Some(second));
        assert_eq!(session.state(), SessionState::Uploading);
        assert!(session.progress().is_empty());
    }

    #[test]
    fn new_attempt_after_error_starts_clean() {
        let mut session = Session::new();
        let first = session.begin_upload();
        session.on_progress(step(1));
        session.fail("boom");

        let second = session.begin_upload();
        assert_ne!(first, second);
        assert_eq!(session.state(), SessionState::Uploading);
        assert!(session.progress().is_empty());
        assert_eq!(session.last_error(), None);
        assert_eq!(session.summary(), None);
    }

    #[test]
    fn reset_matches_fresh_session() {
        let mut session = Session::new();
        session.begin_upload();
        session.on_progress(step(1));
        session.on_completion(summary());
        session.reset();
        assert_eq!(session.snapshot(), Session::new().snapshot());
    }

    #[test]
    fn observers_see_every_transition() {
        let mut session = Session::new();
        let mut rx = session.subscribe();
        session.begin_upload();
        assert!(rx.has_changed().expect("open"));
        assert_eq!(rx.borrow_and_update().state, SessionState::Uploading);

        session.mark_running();
        session.on_progress(step(1));
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.state, SessionState::Running);
        assert_eq!(snapshot.progress.len(), 1);

        session.fail("boom");
        assert_eq!(rx.borrow().last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn state_display_and_serde_use_lowercase_names() {
        assert_eq!(SessionState::Running.to_string(), "running");
        assert_eq!(
            serde_json::to_value(SessionState::Error).expect("serialize"),
            serde_json::json!("error")
        );
    }
}
