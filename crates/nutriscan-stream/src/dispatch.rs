//! Routes parsed frames to progress, completion, and failure handlers.

use tracing::{debug, warn};

use crate::config::SequencePolicy;
use crate::event::{CompletionSummary, ProgressEvent, failure_message};
use crate::parser::ParsedFrame;

/// Receiver of dispatched events.
///
/// The dispatcher calls at most one of `on_completion`/`on_failure` per stream.
pub trait EventHandler {
    fn on_progress(&mut self, event: ProgressEvent);
    fn on_completion(&mut self, summary: CompletionSummary);
    fn on_failure(&mut self, message: String);
}

/// Event kinds understood by this client, including the aliases used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Progress,
    Completion,
    Failure,
}

impl EventKind {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "progress" | "step" => Some(Self::Progress),
            "completion" | "done" => Some(Self::Completion),
            "failure" | "error" => Some(Self::Failure),
            _ => None,
        }
    }
}

/// Why a frame did not reach a handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    UnknownKind(String),
    InvalidPayload(EventKind),
}

/// Result of dispatching one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// A handler was invoked for this kind.
    Delivered(EventKind),
    /// The frame was dropped without touching any handler.
    Dropped(DropReason),
    /// A terminal event was already dispatched; the frame was ignored.
    AfterTerminal,
}

/// Per-stream dispatcher state.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    policy: SequencePolicy,
    last_step: Option<u64>,
    terminal: Option<EventKind>,
}

impl EventDispatcher {
    pub fn new(policy: SequencePolicy) -> Self {
        Self {
            policy,
            last_step: None,
            terminal: None,
        }
    }

    /// Whether a completion or failure has been dispatched.
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn dispatch<H: EventHandler + ?Sized>(
        &mut self,
        frame: ParsedFrame,
        handler: &mut H,
    ) -> Dispatch {
        if let Some(terminal) = self.terminal {
            warn!(
                kind = %frame.kind,
                terminal = ?terminal,
                "frame received after terminal event; ignoring"
            );
            return Dispatch::AfterTerminal;
        }

        let Some(kind) = EventKind::from_label(&frame.kind) else {
            debug!(kind = %frame.kind, "ignoring unknown event kind");
            return Dispatch::Dropped(DropReason::UnknownKind(frame.kind));
        };

        match kind {
            EventKind::Progress => {
                let Some(event) = ProgressEvent::from_payload(&frame.payload) else {
                    debug!("dropping progress frame with invalid payload");
                    return Dispatch::Dropped(DropReason::InvalidPayload(kind));
                };
                if let Some(message) = self.check_sequence(event.step_number) {
                    warn!(step_number = event.step_number, "{message}");
                    self.terminal = Some(EventKind::Failure);
                    handler.on_failure(message);
                    return Dispatch::Delivered(EventKind::Failure);
                }
                self.last_step = Some(event.step_number);
                handler.on_progress(event);
            }
            EventKind::Completion => {
                let Some(summary) = CompletionSummary::from_payload(&frame.payload) else {
                    debug!("dropping completion frame with invalid payload");
                    return Dispatch::Dropped(DropReason::InvalidPayload(kind));
                };
                self.terminal = Some(kind);
                handler.on_completion(summary);
            }
            EventKind::Failure => {
                self.terminal = Some(kind);
                handler.on_failure(failure_message(&frame.payload));
            }
        }
        Dispatch::Delivered(kind)
    }

    fn check_sequence(&self, step_number: u64) -> Option<String> {
        if self.policy == SequencePolicy::Unchecked {
            return None;
        }
        let expected = self.last_step.map_or(1, |last| last.saturating_add(1));
        (step_number != expected).then(|| {
            format!("protocol violation: expected step {expected}, received step {step_number}")
        })
    }
}
