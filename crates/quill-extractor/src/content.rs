//! Turn raw file bytes into the text handed to the LLM

use crate::error::ExtractorError;
use serde_json::Value;
use std::path::Path;

/// Fields checked, in order, when a JSON export wraps the notes text
const JSON_TEXT_FIELDS: [&str; 3] = ["transcript", "content", "notes"];

/// Prepare the text content of an export.
///
/// Plain-text and markdown files are decoded as UTF-8. JSON exports use the
/// first non-empty `transcript`, `content` or `notes` string field; any
/// other JSON document is pretty-printed as-is, and unparseable JSON falls
/// back to the raw text.
///
/// # Examples
///
/// ```
/// use quill_extractor::prepare_content;
///
/// let text = prepare_content(br#"{"transcript": "hello"}"#, "call.json").unwrap();
/// assert_eq!(text, "hello");
/// ```
pub fn prepare_content(raw: &[u8], filename: &str) -> Result<String, ExtractorError> {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    let text = std::str::from_utf8(raw)?;

    let is_json = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let content = if is_json {
        json_content(text).unwrap_or_else(|| text.to_string())
    } else {
        text.to_string()
    };

    if content.trim().is_empty() {
        return Err(ExtractorError::EmptyContent);
    }
    Ok(content)
}

/// `None` when the text is not JSON at all
fn json_content(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;

    if let Value::Object(map) = &value {
        let field = JSON_TEXT_FIELDS
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty());
        if let Some(field) = field {
            return Some(field.to_string());
        }
    }

    serde_json::to_string_pretty(&value).ok()
}
