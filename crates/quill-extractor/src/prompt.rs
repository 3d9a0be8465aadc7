//! LLM prompt for meeting-notes extraction

/// Instructions sent as the system message
pub const SYSTEM_PROMPT: &str = r#"You are parsing a meeting notes export. Analyze the content and output a JSON object with:
{
    "title": "Meeting title (extract from content or generate from context)",
    "summary": "The full meeting notes content, cleaned up and formatted as markdown",
    "action_items": [
        {
            "title": "Action item title",
            "description": "Optional details",
            "assignee_name": "Person's name if mentioned, or null"
        }
    ],
    "tags": ["relevant", "topic", "tags"]
}

Guidelines:
- Keep the original notes content; do not over-summarize
- Extract every action item, task, follow-up and to-do mentioned
- Include assignee names exactly as written when mentioned
- Tags should reflect the main topics discussed (2-5 tags)
- Use the export's own title when it has one; otherwise derive one from the content"#;

/// Build the user message for one file
pub fn build_user_message(filename: &str, content: &str) -> String {
    format!("Filename: {}\n\nContent:\n{}", filename, content)
}
