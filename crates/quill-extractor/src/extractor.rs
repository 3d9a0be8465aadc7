//! Core Extractor implementation

use crate::config::ExtractorConfig;
use crate::content::prepare_content;
use crate::error::ExtractorError;
use crate::parser::parse_llm_response;
use crate::prompt::{build_user_message, SYSTEM_PROMPT};
use quill_domain::traits::{ExtractionAdapter, LlmProvider};
use quill_domain::ExtractedRecord;
use std::fmt::Display;
use tracing::{debug, info};

/// The Extractor turns meeting-notes exports into structured records
pub struct Extractor<L>
where
    L: LlmProvider,
{
    llm_provider: L,
    config: ExtractorConfig,
}

impl<L> Extractor<L>
where
    L: LlmProvider,
    L::Error: Display,
{
    /// Create a new Extractor
    pub fn new(llm_provider: L, config: ExtractorConfig) -> Self {
        Self {
            llm_provider,
            config,
        }
    }

    /// Access the configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }
}

impl<L> ExtractionAdapter for Extractor<L>
where
    L: LlmProvider,
    L::Error: Display,
{
    type Error = ExtractorError;

    fn extract(&self, raw_content: &[u8], filename: &str) -> Result<ExtractedRecord, Self::Error> {
        let content = prepare_content(raw_content, filename)?;

        let length = content.chars().count();
        if length > self.config.max_text_length {
            return Err(ExtractorError::TextTooLong(length, self.config.max_text_length));
        }

        debug!("Extracting '{}' ({} chars)", filename, length);

        let user_message = build_user_message(filename, &content);
        let response = self
            .llm_provider
            .complete_json(SYSTEM_PROMPT, &user_message)
            .map_err(|e| ExtractorError::Llm(e.to_string()))?;

        debug!("LLM response length: {} chars", response.len());

        let record = parse_llm_response(&response, self.config.max_tags)?;
        record.validate().map_err(ExtractorError::Validation)?;

        info!("Extracted {} action items from '{}'", record.item_count(), filename);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_llm::MockProvider;

    fn create_test_extractor(response: &str) -> Extractor<MockProvider> {
        Extractor::new(MockProvider::new(response), ExtractorConfig::default())
    }

    #[test]
    fn test_extract_text_too_long() {
        let extractor = Extractor::new(
            MockProvider::default(),
            ExtractorConfig {
                max_text_length: 10,
                ..Default::default()
            },
        );

        let result = extractor.extract("a".repeat(11).as_bytes(), "long.txt");
        assert!(matches!(result, Err(ExtractorError::TextTooLong(11, 10))));
    }

    #[test]
    fn test_empty_content_skips_llm() {
        let llm = MockProvider::default();
        let extractor = Extractor::new(llm.clone(), ExtractorConfig::default());

        assert!(extractor.extract(b"   ", "blank.md").is_err());
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn test_blank_title_fails_validation() {
        let extractor = create_test_extractor(r#"{"title": "   ", "summary": "s"}"#);
        let result = extractor.extract(b"notes", "notes.md");
        assert!(matches!(result, Err(ExtractorError::Validation(_))));
    }

    #[test]
    fn test_empty_summary_fails_validation() {
        let extractor = create_test_extractor(r#"{"title": "t", "summary": ""}"#);
        let result = extractor.extract(b"notes", "notes.md");
        assert!(matches!(result, Err(ExtractorError::Validation(_))));
    }
}
