//! Best-effort JSON extraction from unstructured LLM output
//!
//! Language models asked for "ONLY a raw JSON object" still wrap it in
//! markdown fences or surround it with prose often enough that the router
//! cannot parse responses directly. This module strips fences, locates the
//! first balanced `{...}` span, and parses that span, failing explicitly
//! when no object can be found.

use serde_json::Value;

/// Errors from JSON extraction
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no JSON object found in output")]
    NoObject,

    #[error("extracted span is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Extract and parse the first JSON object embedded in `raw`.
pub fn extract_object(raw: &str) -> Result<Value, ExtractError> {
    let text = strip_fences(raw);
    let span = balanced_object_span(&text).ok_or(ExtractError::NoObject)?;
    let value: Value = serde_json::from_str(span)?;
    Ok(value)
}

/// Remove markdown code-fence markers (```json / ```), keeping the content.
fn strip_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "")
}

/// Find the first balanced `{...}` span, tracking string literals and
/// escapes so braces inside strings do not break the count.
fn balanced_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
