//! Response payload normalization.
//!
//! Webhooks are backed by whatever automation tool the user wired up, and
//! those tools disagree on where the answer lives. [`extract_text`] turns
//! any of the observed shapes into display text by running an ordered list
//! of extractor rules; the first rule that yields a value wins.
//!
//! | Order | Shape | Result |
//! |-------|-------|--------|
//! | 1 | `"text"` | the string itself |
//! | 2 | `[{...}, ...]` | first element's `output`, `message`, or `content`; else that element as JSON |
//! | 3 | `{...}` | first present of [`CONTENT_KEYS`] |
//! | 4 | anything else | the whole payload as pretty JSON |
//!
//! [`classify_poll`] uses the same key list to decide whether a poll body is
//! a finished answer.

use serde_json::Value;

/// Object keys that may carry the answer, highest priority first.
pub const CONTENT_KEYS: [&str; 8] = [
    "output", "message", "content", "response", "text", "answer", "result", "data",
];

/// Keys consulted on the first element of an array payload.
const ARRAY_ITEM_KEYS: [&str; 3] = ["output", "message", "content"];

const WORKFLOW_STARTED: &str = "Workflow was started";

/// An extractor rule: returns `Some(text)` when it applies to the payload.
struct ExtractRule {
    name: &'static str,
    extract: fn(&Value) -> Option<String>,
}

const RULES: &[ExtractRule] = &[
    ExtractRule {
        name: "string",
        extract: extract_string,
    },
    ExtractRule {
        name: "array_first_item",
        extract: extract_array_first,
    },
    ExtractRule {
        name: "object_content_key",
        extract: extract_object_field,
    },
];

/// Extract the most plausible human-readable text from a webhook payload.
///
/// Never fails: payloads no rule understands come back as pretty-printed
/// JSON, which parses back to the original value.
pub fn extract_text(payload: &Value) -> String {
    for rule in RULES {
        if let Some(text) = (rule.extract)(payload) {
            tracing::trace!(rule = rule.name, "extracted webhook text");
            return text;
        }
    }
    pretty_json(payload)
}

fn extract_string(payload: &Value) -> Option<String> {
    payload.as_str().map(str::to_string)
}

fn extract_array_first(payload: &Value) -> Option<String> {
    let first = payload.as_array()?.first()?;
    Some(first_present(first, &ARRAY_ITEM_KEYS).unwrap_or_else(|| pretty_json(first)))
}

fn extract_object_field(payload: &Value) -> Option<String> {
    payload.as_object()?;
    first_present(payload, &CONTENT_KEYS)
}

fn first_present(value: &Value, keys: &[&str]) -> Option<String> {
    let obj = value.as_object()?;
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| is_present(v))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => pretty_json(other),
        })
}

/// `null`, `false` and `""` count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn has_content_key(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| {
            CONTENT_KEYS
                .iter()
                .any(|k| obj.get(*k).is_some_and(is_present))
        })
        .unwrap_or(false)
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn status_of(value: &Value) -> Option<&str> {
    value.get("status").and_then(Value::as_str)
}

fn message_of(value: &Value) -> Option<&str> {
    value.get("message").and_then(Value::as_str)
}

/// Whether the initial webhook reply hands the work off to polling.
pub fn signals_started(body: &Value) -> bool {
    message_of(body) == Some(WORKFLOW_STARTED) || status_of(body) == Some("processing")
}

/// How a poll body should steer the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVerdict {
    /// The backend says it is still working.
    Pending,
    /// A usable answer.
    Complete,
    /// Nothing recognizable yet; keep polling.
    NotReady,
}

pub fn classify_poll(body: &Value) -> PollVerdict {
    if matches!(status_of(body), Some("processing") | Some("pending"))
        || message_of(body) == Some(WORKFLOW_STARTED)
    {
        return PollVerdict::Pending;
    }

    let complete = match body {
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => items.first().is_some_and(has_content_key),
        Value::Object(_) => has_content_key(body) || status_of(body) == Some("completed"),
        _ => false,
    };

    if complete {
        PollVerdict::Complete
    } else {
        PollVerdict::NotReady
    }
}
