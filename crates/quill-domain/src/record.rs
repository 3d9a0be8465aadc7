//! Extracted records - the structured form of a meeting-notes file

use std::collections::BTreeSet;

/// Maximum accepted title length in characters
pub const MAX_TITLE_LENGTH: usize = 500;

/// A single action item found in the notes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedItem {
    /// Short title of the item
    pub title: String,

    /// Optional longer description
    pub description: Option<String>,

    /// Name of the person the item was assigned to, as written
    pub assignee_name: Option<String>,
}

impl TaggedItem {
    /// Create an item with only a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            assignee_name: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach an assignee name
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee_name = Some(assignee.into());
        self
    }
}

/// Structured output of extraction.
///
/// Immutable once produced; consumed exactly once by a persistence adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    /// Meeting title
    pub title: String,

    /// Full notes body (markdown)
    pub body: String,

    /// Action items in the order they appear
    pub items: Vec<TaggedItem>,

    /// Topic tags
    pub tags: BTreeSet<String>,
}

impl ExtractedRecord {
    /// Create a record without items or tags
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            items: Vec::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Number of tagged items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Check that the record is well-formed enough to persist
    pub fn validate(&self) -> Result<(), String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("title is empty".to_string());
        }
        let title_len = title.chars().count();
        if title_len > MAX_TITLE_LENGTH {
            return Err(format!(
                "title is {} chars (max: {})",
                title_len, MAX_TITLE_LENGTH
            ));
        }
        if self.body.trim().is_empty() {
            return Err("body is empty".to_string());
        }
        if let Some(idx) = self.items.iter().position(|i| i.title.trim().is_empty()) {
            return Err(format!("item {} has an empty title", idx));
        }
        Ok(())
    }
}
