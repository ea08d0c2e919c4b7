use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Value};

/// Marker the worker is instructed to emit immediately before its JSON payload
pub const PAYLOAD_MARKER: &str = "<JSON>";

/// Characters of raw output kept in an error record for diagnosis
const RAW_EXCERPT_CHARS: usize = 200;

static NONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bNone\b").unwrap());
static TRUE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bTrue\b").unwrap());
static FALSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bFalse\b").unwrap());

/// Repair raw worker output into exactly one line of valid JSON.
///
/// The worker is an uncontrolled free-text generator, so every stage is
/// best-effort: fences and echoed instructions are stripped, the first
/// `{...}` span is located, Python-style bare literals are rewritten, and
/// the span is parsed and re-serialized compactly. Any unrecoverable input
/// degrades to a typed error record; this function never fails.
pub fn normalize(raw: &str) -> String {
    let stripped = strip_fences(raw);
    let payload = after_marker(&stripped);

    let span = match object_span(payload) {
        Some(span) => span,
        None => return error_record("no_json_found", payload),
    };

    // Try the span as-is first, so output that is already valid JSON
    // (including quoted "None" values) is never rewritten again.
    if let Ok(value) = serde_json::from_str::<Value>(span) {
        return compact(&value);
    }

    let rewritten = rewrite_literals(span);
    match serde_json::from_str::<Value>(&rewritten) {
        Ok(value) => compact(&value),
        Err(_) => error_record("decode_error", &rewritten),
    }
}

/// Drop markdown code-fence markers and surrounding whitespace
fn strip_fences(raw: &str) -> String {
    raw.trim().replace("```json", "").replace("```", "")
}

/// Keep only what follows the payload marker, if the worker echoed one
fn after_marker(text: &str) -> &str {
    match text.split_once(PAYLOAD_MARKER) {
        Some((_, rest)) => rest.trim(),
        None => text.trim(),
    }
}

/// Greedy span from the first `{` to the last `}`, across lines
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Rewrite bare Python literals into their JSON equivalents.
/// Word boundaries keep substrings like "NoneSuch" intact.
fn rewrite_literals(span: &str) -> String {
    let s = NONE_RE.replace_all(span, "\"None\"");
    let s = TRUE_RE.replace_all(&s, "true");
    FALSE_RE.replace_all(&s, "false").into_owned()
}

fn compact(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| error_record("decode_error", ""))
}

fn error_record(kind: &str, raw: &str) -> String {
    json!({"error": kind, "raw": excerpt(raw)}).to_string()
}

fn excerpt(text: &str) -> String {
    text.chars().take(RAW_EXCERPT_CHARS).collect()
}
