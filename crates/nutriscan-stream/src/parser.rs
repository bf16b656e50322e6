use tracing::debug;

use crate::frame::RawFrame;

const EVENT_LABEL: &str = "event:";
const DATA_LABEL: &str = "data:";

/// A frame reduced to its event label and decoded JSON payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedFrame {
    /// Event label copied verbatim; empty when the frame had no `event:` line.
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Parses one complete frame.
///
/// Returns `None` when the frame has no `data:` line or the data is not
/// valid JSON. Later `event:`/`data:` lines override earlier ones.
pub fn parse_frame(frame: &RawFrame) -> Option<ParsedFrame> {
    let mut kind: Option<&str> = None;
    let mut data: Option<&str> = None;
    for raw_line in frame.as_str().split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix(EVENT_LABEL) {
            kind = Some(field_value(rest));
        } else if let Some(rest) = line.strip_prefix(DATA_LABEL) {
            data = Some(field_value(rest));
        }
    }

    let data = data?;
    match serde_json::from_str(data) {
        Ok(payload) => Some(ParsedFrame {
            kind: kind.unwrap_or_default().to_string(),
            payload,
        }),
        Err(e) => {
            debug!(kind = kind.unwrap_or_default(), error = %e, "dropping frame with malformed data");
            None
        }
    }
}

fn field_value(rest: &str) -> &str {
    rest.strip_prefix(' ').unwrap_or(rest).trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(text: &str) -> Option<ParsedFrame> {
        parse_frame(&RawFrame::new(text))
    }

    #[test]
    fn parses_kind_and_json_payload() {
        let parsed = parse("event: step\ndata: {\"step_number\":1}").expect("parsed");
        assert_eq!(parsed.kind, "step");
        assert_eq!(parsed.payload, json!({"step_number": 1}));
    }

    #[test]
    fn later_lines_override_earlier_ones() {
        let parsed = parse("event: step\ndata: 1\nevent: done\ndata: 2").expect("parsed");
        assert_eq!(parsed.kind, "done");
        assert_eq!(parsed.payload, json!(2));
    }

    #[test]
    fn frame_without_data_line_is_dropped() {
        assert_eq!(parse("event: step"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse(": keep-alive comment"), None);
    }

    #[test]
    fn malformed_or_empty_data_is_dropped() {
        assert_eq!(parse("event: step\ndata: not-json"), None);
        assert_eq!(parse("event: step\ndata: "), None);
        assert_eq!(parse("event: step\ndata: {\"half\":"), None);
    }

    #[test]
    fn missing_event_line_yields_empty_kind() {
        let parsed = parse("data: {}").expect("parsed");
        assert_eq!(parsed.kind, "");
    }

    #[test]
    fn unknown_kinds_and_residue_lines_pass_through() {
        let parsed = parse("id: 7\nretry: 100\nevent: heartbeat\ndata: {}").expect("parsed");
        assert_eq!(parsed.kind, "heartbeat");
    }

    #[test]
    fn tolerates_missing_space_and_crlf() {
        let parsed = parse("event:done\r\ndata:{\"report_id\":\"x\"}\r").expect("parsed");
        assert_eq!(parsed.kind, "done");
        assert_eq!(parsed.payload, json!({"report_id": "x"}));
    }
}
