use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Requested summary size, mapped to the directive embedded in the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    Medium,
    Long,
}

impl SummaryLength {
    pub fn instruction(self) -> &'static str {
        match self {
            SummaryLength::Short => "in 2-3 sentences",
            SummaryLength::Medium => "in 1 paragraph (4-6 sentences)",
            SummaryLength::Long => "in 2-3 paragraphs with key details",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_length_directives_match_prompt_wording() {
        assert_eq!(SummaryLength::Short.instruction(), "in 2-3 sentences");
        assert_eq!(
            SummaryLength::Medium.instruction(),
            "in 1 paragraph (4-6 sentences)"
        );
        assert_eq!(
            SummaryLength::Long.instruction(),
            "in 2-3 paragraphs with key details"
        );
    }

    #[test]
    fn summary_length_deserializes_lowercase() {
        let parsed: SummaryLength = serde_json::from_str("\"short\"").expect("parse");
        assert_eq!(parsed, SummaryLength::Short);
    }
}
