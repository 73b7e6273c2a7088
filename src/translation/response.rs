/*!
 * Reading model output back into records.
 *
 * Responses are parsed as-is first. When that fails, the text goes through a
 * repair pass: code fences and surrounding prose are stripped, full-width
 * structural punctuation and smart-quoted strings outside of JSON strings are
 * normalized, and trailing commas are dropped.
 */

use serde_json::Value;

use crate::errors::{BackendError, BackendErrorKind};
use crate::records::{CellValue, Record};

/// Object fields that may wrap the record array
pub const WRAPPER_FIELDS: &[&str] = &["records", "translations", "rows", "data", "items"];

/// Strip a surrounding Markdown code fence
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_open = &trimmed[start + 3..];
    // Skip an info string such as `json`
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Cut from the first opening bracket to the last matching closing one
fn strip_surrounding_prose(text: &str) -> &str {
    let open = text.find(['[', '{', '［', '｛']);
    let close = text.rfind([']', '}', '］', '｝']);
    match (open, close) {
        (Some(start), Some(end)) if end > start => {
            let end_char_len = text[end..].chars().next().map(char::len_utf8).unwrap_or(1);
            &text[start..end + end_char_len]
        }
        _ => text,
    }
}

fn structural_equivalent(c: char) -> Option<char> {
    match c {
        '，' => Some(','),
        '：' => Some(':'),
        '［' => Some('['),
        '］' => Some(']'),
        '｛' => Some('{'),
        '｝' => Some('}'),
        _ => None,
    }
}

fn is_smart_double_quote(c: char) -> bool {
    matches!(c, '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{FF02}')
}

/// Normalize punctuation outside JSON strings and drop trailing commas
fn normalize_structure(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Opening delimiter of the current string, if inside one
    let mut open_quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(opener) = open_quote {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    if opener == '"' {
                        open_quote = None;
                        out.push('"');
                    } else {
                        // Straight quote inside a smart-quoted string is content
                        out.push_str("\\\"");
                    }
                }
                c if is_smart_double_quote(c) && opener != '"' => {
                    open_quote = None;
                    out.push('"');
                }
                c => out.push(c),
            }
            continue;
        }

        let c = structural_equivalent(c).unwrap_or(c);
        match c {
            '"' => {
                open_quote = Some('"');
                out.push('"');
            }
            c if is_smart_double_quote(c) => {
                open_quote = Some(c);
                out.push('"');
            }
            ']' | '}' => {
                let trimmed_len = out.trim_end().len();
                out.truncate(trimmed_len);
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(c);
            }
            c => out.push(c),
        }
    }

    out
}

/// Parse a response, repairing minor corruption when a plain parse fails
pub fn repair_and_parse(text: &str) -> Option<Value> {
    let unfenced = strip_code_fence(text);
    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Some(value);
    }

    let candidate = strip_surrounding_prose(unfenced);
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
    }

    serde_json::from_str::<Value>(&normalize_structure(candidate)).ok()
}

/// The record array inside a parsed response
fn locate_rows(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(rows) => Some(rows),
        Value::Object(mut map) => WRAPPER_FIELDS
            .iter()
            .find_map(|field| match map.remove(*field) {
                Some(Value::Array(rows)) => Some(rows),
                _ => None,
            }),
        _ => None,
    }
}

fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a backend's text into records shaped like `expected`.
///
/// Every output record carries exactly the text keys of its input record, in
/// the same order; anything else in the response is ignored.
pub fn parse_records(backend: &str, text: &str, expected: &[Record]) -> Result<Vec<Record>, BackendError> {
    if text.trim().is_empty() {
        return Err(BackendError::new(backend, BackendErrorKind::EmptyResponse));
    }

    let value = repair_and_parse(text)
        .ok_or_else(|| BackendError::parse(backend, format!("no JSON found in: {}", text)))?;
    let rows = locate_rows(value)
        .ok_or_else(|| BackendError::shape(backend, "response holds no record array"))?;

    if rows.len() != expected.len() {
        return Err(BackendError::shape(
            backend,
            format!("expected {} records, got {}", expected.len(), rows.len()),
        ));
    }

    rows.iter()
        .zip(expected)
        .enumerate()
        .map(|(idx, (row, input))| {
            let object = row
                .as_object()
                .ok_or_else(|| BackendError::shape(backend, format!("record {} is not an object", idx)))?;

            let mut output = Record::new();
            for (key, _) in input.text_cells() {
                let value = object.get(key).and_then(coerce_text).ok_or_else(|| {
                    BackendError::shape(backend, format!("record {} lacks text for '{}'", idx, key))
                })?;
                output.set(key, CellValue::Text(value));
            }
            Ok(output)
        })
        .collect()
}
