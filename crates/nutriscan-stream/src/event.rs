use serde::{Deserialize, Serialize};

/// Message used when a failure frame carries no usable message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Analysis failed. Please try again.";

/// What a progress step represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressKind {
    /// Free-form rationale from the agent.
    #[serde(rename = "reasoning")]
    Narration,
    /// The agent invoked one of its tools.
    #[serde(rename = "tool_call")]
    ToolInvocation,
}

/// One unit of reported agent work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Position of this step in the agent trace, starting at 1.
    pub step_number: u64,
    /// Narration or tool invocation.
    #[serde(rename = "action")]
    pub kind: ProgressKind,
    /// Tool identifier. Only set for `ProgressKind::ToolInvocation`.
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Human-readable rationale (may be empty).
    #[serde(default)]
    pub reasoning: String,
    /// Human-readable outcome (may be empty).
    #[serde(default)]
    pub result_summary: String,
}

impl ProgressEvent {
    /// Coerces a raw `step` payload into a progress event.
    ///
    /// Returns `None` when required fields are missing or `step_number` is 0.
    /// A tool name sent alongside a narration step is discarded.
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        let mut event = Self::deserialize(payload).ok()?;
        if event.step_number == 0 {
            return None;
        }
        if event.kind == ProgressKind::Narration {
            event.tool_name = None;
        }
        Some(event)
    }

    pub fn is_tool_invocation(&self) -> bool {
        self.kind == ProgressKind::ToolInvocation
    }
}

/// Terminal success summary carried by the `done` frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSummary {
    /// Report identifier; joins against `GET /api/reports/{id}`.
    pub report_id: String,
    pub deficiency_count: u64,
    /// Number of extracted measurements.
    pub biomarker_count: u64,
    pub recommendation_count: u64,
}

impl CompletionSummary {
    pub fn from_payload(payload: &serde_json::Value) -> Option<Self> {
        Self::deserialize(payload).ok()
    }
}

/// Extracts the failure message from an `error` payload.
///
/// Reads `error` (plain string or `{ "message": .. }`) and then `message`,
/// falling back to [`DEFAULT_FAILURE_MESSAGE`] when neither is a non-empty
/// string. Never returns an empty message.
pub fn failure_message(payload: &serde_json::Value) -> String {
    let error = payload.get("error");
    error
        .and_then(|v| v.as_str())
        .or_else(|| error.and_then(|e| e.get("message")).and_then(|v| v.as_str()))
        .or_else(|| payload.get("message").and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string()
}
