//! Response envelope normalization
//!
//! Responders reply in several envelope shapes. Each shape has a pure
//! matcher; matchers run in order and the first hit wins. When nothing
//! matches, the raw envelope is rendered as text instead of failing.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::OrchestrationError;

/// A raw envelope with its JSON parse (if any) computed once.
pub struct Envelope<'a> {
    raw: &'a [u8],
    json: Option<Value>,
}

impl<'a> Envelope<'a> {
    pub fn new(raw: &'a [u8]) -> Self {
        let json = serde_json::from_slice::<Value>(raw).ok();
        Self { raw, json }
    }

    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Raw bytes as text; invalid UTF-8 is replaced, not rejected.
    pub fn text(&self) -> String {
        match std::str::from_utf8(self.raw) {
            Ok(s) => s.to_string(),
            Err(e) => {
                let err = OrchestrationError::Decode(e.to_string());
                warn!(error = %err, "Envelope is not valid UTF-8; rendering lossily");
                String::from_utf8_lossy(self.raw).into_owned()
            }
        }
    }
}

pub type ShapeMatcher = fn(&Envelope<'_>) -> Option<String>;

/// Known envelope shapes, in the order they are tried.
pub const SHAPE_MATCHERS: &[(&str, ShapeMatcher)] = &[
    ("nested_result", match_nested_result),
    ("content_list", match_content_list),
    ("flat_field", match_flat_field),
    ("streamed_chunks", match_streamed_chunks),
];

/// Normalize an envelope into plain text. Never fails.
pub fn normalize(raw: &[u8]) -> String {
    let envelope = Envelope::new(raw);

    for (shape, matcher) in SHAPE_MATCHERS {
        if let Some(text) = matcher(&envelope) {
            debug!(shape, chars = text.len(), "Envelope matched");
            return text;
        }
    }

    debug!("Unrecognized envelope; rendering raw");
    render_raw(&envelope)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn join_content_texts(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `{"result": {"content": [{"text": ..}]}}`, `{"result": {"text": ..}}`,
/// `{"result": "..."}` or any other `result` object.
fn match_nested_result(envelope: &Envelope<'_>) -> Option<String> {
    let result = envelope.json()?.get("result")?;

    if let Some(items) = result.get("content").and_then(Value::as_array) {
        return Some(join_content_texts(items));
    }
    if let Some(text) = result.get("text") {
        return Some(render_value(text));
    }
    Some(render_value(result))
}

/// `{"content": [{"text": ..}, ..]}`
fn match_content_list(envelope: &Envelope<'_>) -> Option<String> {
    let items = envelope.json()?.get("content")?.as_array()?;
    Some(join_content_texts(items))
}

/// `{"output": ..}`, `{"text": ..}` or `{"message": ..}`
fn match_flat_field(envelope: &Envelope<'_>) -> Option<String> {
    let json = envelope.json()?;
    ["output", "text", "message"]
        .iter()
        .find_map(|field| json.get(*field))
        .map(render_value)
}

fn chunk_text(chunk: &Value) -> Option<String> {
    if let Some(text) = chunk.get("text").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    if let Some(content) = chunk.get("content").and_then(Value::as_str) {
        return Some(content.to_string());
    }
    chunk
        .pointer("/chunk/bytes")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Streamed completion: a JSON array of chunks, or newline-delimited JSON
/// chunks (optionally `data:`-prefixed server-sent events).
fn match_streamed_chunks(envelope: &Envelope<'_>) -> Option<String> {
    if let Some(chunks) = envelope.json().and_then(Value::as_array) {
        let parts: Vec<String> = chunks.iter().filter_map(chunk_text).collect();
        return (!parts.is_empty()).then(|| parts.concat());
    }
    if envelope.json().is_some() {
        return None;
    }

    let body = envelope.text();
    let mut parts = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        let payload = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
        if payload.is_empty() || payload == "[DONE]" {
            continue;
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(chunk) => {
                if let Some(text) = chunk_text(&chunk) {
                    parts.push(text);
                }
            }
            // Not a stream after all
            Err(_) => return None,
        }
    }

    (!parts.is_empty()).then(|| parts.concat())
}

fn render_raw(envelope: &Envelope<'_>) -> String {
    match envelope.json() {
        Some(json) => render_value(json),
        None => envelope.text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_content_list() {
        let raw = br#"{"result": {"role": "assistant", "content": [{"text": "Line one"}, {"image": "x"}, {"text": "Line two"}]}}"#;
        assert_eq!(normalize(raw), "Line one\nLine two");
    }

    #[test]
    fn test_nested_result_text_and_string() {
        assert_eq!(normalize(br#"{"result": {"text": "VaR is $24,675"}}"#), "VaR is $24,675");
        assert_eq!(normalize(br#"{"result": "plain result"}"#), "plain result");
    }

    #[test]
    fn test_nested_result_other_object_is_pretty_rendered() {
        let text = normalize(br#"{"result": {"score": 0.9}}"#);
        assert!(text.contains("\"score\": 0.9"));
    }

    #[test]
    fn test_top_level_content_list() {
        let raw = br#"{"content": [{"text": "a"}, {"text": "b"}]}"#;
        assert_eq!(normalize(raw), "a\nb");
    }

    #[test]
    fn test_flat_fields_in_order() {
        assert_eq!(normalize(br#"{"output": "from output", "text": "ignored"}"#), "from output");
        assert_eq!(normalize(br#"{"text": "from text"}"#), "from text");
        assert_eq!(normalize(br#"{"message": "from message"}"#), "from message");
    }

    #[test]
    fn test_streamed_sse_chunks() {
        let raw = b"data: {\"text\": \"Hel\"}\n\ndata: {\"content\": \"lo \"}\ndata: {\"chunk\": {\"bytes\": \"world\"}}\ndata: [DONE]\n";
        assert_eq!(normalize(raw), "Hello world");
    }

    #[test]
    fn test_streamed_json_array() {
        let raw = br#"[{"text": "part 1, "}, {"text": "part 2"}]"#;
        assert_eq!(normalize(raw), "part 1, part 2");
    }

    #[test]
    fn test_unrecognized_json_rendered() {
        let text = normalize(br#"{"status": "done", "tokens": 12}"#);
        assert!(text.contains("\"status\": \"done\""));
    }

    #[test]
    fn test_plain_text_passthrough() {
        assert_eq!(normalize(b"Just prose from the model."), "Just prose from the model.");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let text = normalize(&[b'o', b'k', 0xff, b'!']);
        assert!(text.starts_with("ok"));
        assert!(text.ends_with('!'));
    }
}
