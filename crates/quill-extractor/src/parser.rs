//! Parse LLM output into an extracted record

use crate::error::ExtractorError;
use quill_domain::{ExtractedRecord, TaggedItem};
use serde_json::{Map, Value};
use tracing::warn;

/// Parse the LLM's JSON reply into a record.
///
/// Action items that are not objects or lack a title are dropped with a
/// warning. At most `max_tags` distinct tags are kept, in reply order.
pub fn parse_llm_response(response: &str, max_tags: usize) -> Result<ExtractedRecord, ExtractorError> {
    // LLMs sometimes wrap JSON in markdown code blocks
    let json_str = extract_json(response)?;

    let json: Value = serde_json::from_str(&json_str)
        .map_err(|e| ExtractorError::InvalidFormat(format!("JSON parse error: {}", e)))?;

    let obj = json
        .as_object()
        .ok_or_else(|| ExtractorError::InvalidFormat("Expected JSON object".to_string()))?;

    let title = required_str(obj, "title")?;
    let body = required_str(obj, "summary")?;

    let mut record = ExtractedRecord::new(title.trim(), body);
    record.items = parse_items(obj.get("action_items"));

    if let Some(tags) = obj.get("tags").and_then(Value::as_array) {
        for tag in tags.iter().filter_map(Value::as_str) {
            if record.tags.len() >= max_tags {
                break;
            }
            let tag = tag.trim();
            if !tag.is_empty() {
                record.tags.insert(tag.to_string());
            }
        }
    }

    Ok(record)
}

/// Extract JSON from response, handling markdown code blocks
fn extract_json(response: &str) -> Result<String, ExtractorError> {
    let trimmed = response.trim();

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return Err(ExtractorError::InvalidFormat("Empty code block".to_string()));
        }

        // Skip first line (```json or ```) and the closing fence if present
        let end = if lines[lines.len() - 1].trim_start().starts_with("```") {
            lines.len() - 1
        } else {
            lines.len()
        };
        Ok(lines[1..end].join("\n"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn required_str(obj: &Map<String, Value>, key: &str) -> Result<String, ExtractorError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExtractorError::InvalidFormat(format!("Missing or invalid '{}'", key)))
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_items(value: Option<&Value>) -> Vec<TaggedItem> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut parsed = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            warn!("Action item {} is not a JSON object", idx);
            continue;
        };
        let Some(title) = optional_str(obj, "title") else {
            warn!("Action item {} has no title", idx);
            continue;
        };
        parsed.push(TaggedItem {
            title,
            description: optional_str(obj, "description"),
            assignee_name: optional_str(obj, "assignee_name"),
        });
    }
    parsed
}
