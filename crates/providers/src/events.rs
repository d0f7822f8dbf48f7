//! Model-CLI stream parsing.
//!
//! Model CLIs emit one JSON object per line. Four shapes drive daemon
//! behavior (init, compact_boundary, assistant text, result); everything
//! else stays opaque and is displayed through a generic text-fragment
//! walk so tool chatter from any CLI still reads well in logs.

use ap_domain::stream::{ModelEvent, ModelUsage, ResultEvent};
use serde_json::Value;

/// Lines longer than this are condensed for display when they carry an
/// extractable error, instead of flooding the log.
const OVERSIZED_LINE_CHARS: usize = 500;

/// Keys whose string values count as displayable text in opaque events.
const TEXT_KEYS: [&str; 4] = ["text", "content", "delta", "output_text"];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typed event recognition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse one stream line into a typed event.
///
/// Returns `None` for non-JSON lines and for JSON that matches none of
/// the recognized shapes; callers fall back to [`text_fragments`] for
/// display.
pub fn parse_line(line: &str) -> Option<ModelEvent> {
    let v: Value = serde_json::from_str(line.trim()).ok()?;
    parse_event(&v)
}

/// Recognize an already-parsed payload. Split from [`parse_line`] so a
/// stream consumer that needs the raw payload for display can parse the
/// line once.
pub fn parse_event(v: &Value) -> Option<ModelEvent> {
    let event_type = v.get("type").and_then(|t| t.as_str())?;

    match event_type {
        "system" => match v.get("subtype").and_then(|s| s.as_str()) {
            Some("init") => Some(ModelEvent::Init {
                session_id: str_field(v, "session_id"),
                model: str_field(v, "model"),
                permission_mode: str_field(v, "permissionMode"),
            }),
            Some("compact_boundary") => {
                let meta = v.get("compact_metadata");
                Some(ModelEvent::CompactBoundary {
                    trigger: meta
                        .and_then(|m| m.get("trigger"))
                        .and_then(|t| t.as_str())
                        .unwrap_or("auto")
                        .to_string(),
                    pre_tokens: meta
                        .and_then(|m| m.get("pre_tokens"))
                        .and_then(|t| t.as_u64())
                        .unwrap_or(0),
                })
            }
            _ => None,
        },
        "assistant" => {
            let text = assistant_text(v);
            if text.is_empty() {
                None
            } else {
                Some(ModelEvent::AssistantText { text })
            }
        }
        "result" => Some(ModelEvent::Result(parse_result(v))),
        "error" | "warning" => Some(ModelEvent::Notice {
            level: event_type.to_string(),
            message: str_field(v, "message"),
        }),
        _ => None,
    }
}

fn str_field(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|f| f.as_str())
        .unwrap_or_default()
        .to_string()
}

fn u64_field(v: &Value, key: &str) -> u64 {
    v.get(key).and_then(|f| f.as_u64()).unwrap_or(0)
}

/// Join the `text` content blocks of an assistant message event.
fn assistant_text(v: &Value) -> String {
    let blocks = match v
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_array())
    {
        Some(blocks) => blocks,
        None => return String::new(),
    };

    let mut out = String::new();
    for block in blocks {
        let block_type = block.get("type").and_then(|t| t.as_str()).unwrap_or("");
        if block_type == "text" {
            if let Some(t) = block.get("text").and_then(|t| t.as_str()) {
                out.push_str(t);
            }
        }
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Result extraction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Extract usage from a terminal `result` event.
///
/// The per-model breakdown is preferred: it carries the context window
/// and splits cache categories per model. The flat `usage` object is a
/// fallback for streams that omit the breakdown.
fn parse_result(v: &Value) -> ResultEvent {
    let mut ev = ResultEvent {
        is_error: v.get("is_error").and_then(|b| b.as_bool()).unwrap_or(false),
        duration_ms: u64_field(v, "duration_ms"),
        num_turns: u64_field(v, "num_turns"),
        ..ResultEvent::default()
    };

    if let Some(models) = v.get("modelUsage").and_then(|m| m.as_object()) {
        for usage in models.values() {
            if let Ok(mu) = serde_json::from_value::<ModelUsage>(usage.clone()) {
                ev.input_tokens += mu.total_input();
                ev.output_tokens += mu.output_tokens;
                ev.context_window = ev.context_window.max(mu.context_window);
            }
        }
    }

    if ev.input_tokens == 0 && ev.output_tokens == 0 {
        if let Some(usage) = v.get("usage") {
            ev.input_tokens = u64_field(usage, "input_tokens")
                + u64_field(usage, "cache_read_input_tokens")
                + u64_field(usage, "cache_creation_input_tokens");
            ev.output_tokens = u64_field(usage, "output_tokens");
        }
    }

    ev
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Opaque line display
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Collect displayable text from an unrecognized JSON payload.
///
/// Walks the whole value and concatenates string values found under the
/// conventional text keys. Works across the JSON dialects of all four
/// CLIs without per-CLI schemas.
pub fn text_fragments(payload: &Value) -> String {
    let mut out = String::new();
    walk(payload, &mut out);
    out
}

fn walk(node: &Value, out: &mut String) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                if TEXT_KEYS.contains(&key.as_str()) {
                    if let Value::String(s) = value {
                        out.push_str(s);
                        continue;
                    }
                }
                walk(value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, out);
            }
        }
        _ => {}
    }
}

/// Condense an oversized opaque line to a short error summary, when one
/// can be extracted. Verbose CLIs dump multi-kilobyte JSON errors on a
/// single line; the raw line still lands in the rolling buffer.
pub fn condense_oversized(line: &str) -> Option<String> {
    if line.len() <= OVERSIZED_LINE_CHARS {
        return None;
    }

    if let Ok(v) = serde_json::from_str::<Value>(line) {
        if v.is_object() {
            let code = v
                .get("error")
                .and_then(|e| e.get("code"))
                .and_then(code_label)
                .or_else(|| v.get("code").and_then(code_label))
                .or_else(|| v.get("status").and_then(code_label));
            let message = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .or_else(|| v.get("message").and_then(|m| m.as_str()))
                .unwrap_or("");
            if code.is_some() || !message.is_empty() {
                let code = code.unwrap_or_else(|| "ERROR".into());
                let short: String = message.chars().take(120).collect();
                return Some(format!("{code}: {short}"));
            }
        }
    }

    let head: String = line.chars().take(200).collect();
    if let Ok(re) = regex::Regex::new(r"\b([45]\d{2})\b") {
        if let Some(m) = re.find(&head) {
            return Some(format!(
                "HTTP {} (response truncated, {} chars)",
                m.as_str(),
                line.len()
            ));
        }
    }
    Some(format!("Large output ({} chars)", line.len()))
}

fn code_label(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
