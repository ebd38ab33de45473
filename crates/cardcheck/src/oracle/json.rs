//! Best-effort extraction of a JSON object from free-form oracle output.
//!
//! Replies may wrap the object in preamble text, markdown fences or trailing
//! commentary. The search takes the first `{` and walks forward counting
//! braces (ignoring braces inside string literals) until that brace is
//! closed. Text after the first complete object is never consumed.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

/// Return the first balanced `{...}` span, or `None` if there is no opening
/// brace or it is never closed.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in text.as_bytes()[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse an oracle reply into `key -> value` for the keys that were asked.
///
/// Returns `None` when no object is found or it does not parse. Unexpected
/// keys, nulls, nested values and the `"-"` sentinel are dropped; numbers
/// and booleans are kept as text.
pub fn parse_reply(
    reply: &str,
    expected: &IndexMap<String, String>,
) -> Option<IndexMap<String, String>> {
    let Some(span) = first_balanced_object(reply) else {
        warn!(reply_len = reply.len(), "no JSON object found in oracle reply");
        return None;
    };

    let object = match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(object)) => object,
        Ok(_) => {
            warn!("oracle reply span is not a JSON object");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "failed to parse JSON object from oracle reply");
            return None;
        }
    };

    let mut values: HashMap<String, String> = HashMap::new();
    for (key, value) in object {
        let key = key.trim();
        if !expected.contains_key(key) {
            debug!(key, "ignoring key not present in the request");
            continue;
        }

        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => continue,
        };
        if text.is_empty() || text == "-" {
            continue;
        }
        values.insert(key.to_string(), text);
    }

    // Request order keeps merged results deterministic.
    let parsed = expected
        .keys()
        .filter_map(|k| values.remove_entry(k.as_str()))
        .collect();
    Some(parsed)
}
