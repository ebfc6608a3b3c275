//! Mock LLM client for testing.
//!
//! Provides deterministic responses keyed off which pipeline stage sent the
//! prompt, so orchestrator and stage tests can run without a real API key.

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::types::{Message, Role};
use crate::llm::LlmClient;

/// Mock LLM client that returns canned responses based on which stage's
/// prompt it receives.
///
/// Each pipeline stage (intent classifier, planner, validator, synthesizer,
/// debugger, interpreter, descriptive responder) sends a system prompt with
/// a distinctive instruction. The mock matches on those instructions so a
/// single client can stand in for the whole pipeline in tests.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    /// Custom response mappings (pattern -> response), checked first.
    custom_responses: Vec<(String, String)>,
}

impl MockLlmClient {
    /// Creates a new mock client with default stage responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom response mapping.
    ///
    /// When the combined prompt text contains `pattern` (case-insensitive),
    /// the mock returns `response` instead of falling through to the
    /// built-in stage responses. Checked in insertion order.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Concatenates system and user message content for pattern matching.
    fn combined_text(messages: &[Message]) -> String {
        messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase()
    }

    fn last_user_message(messages: &[Message]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    fn mock_response(&self, messages: &[Message]) -> String {
        let text = Self::combined_text(messages);

        for (pattern, response) in &self.custom_responses {
            if text.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if text.contains("answer with exactly one of these three tokens") {
            return Self::classify_intent(&text);
        }

        if text.contains("analytical questions about the dataset") {
            return "1. How do total sales amounts vary by product?\n2. Which sale dates have the highest transaction counts?\n3. What is the average sale amount across all transactions?\n4. Are there any products with unusually high or low amounts?\n5. How does sales volume change from one day to the next?".to_string();
        }

        if text.contains("conceptual steps to answer the question") {
            return "1. Identify the relevant sales records for the requested period.\n2. Aggregate the amount or count across those records.\n3. Summarize the result in plain language.".to_string();
        }

        if text.contains("propose a single corrected sql statement") {
            return "```sql\nSELECT COUNT(*) FROM sales;\n```".to_string();
        }

        if text.contains("write a single sql statement") {
            return Self::synthesize_sql(&text);
        }

        if text.contains("summarize these query result rows") {
            return "There were 2 sales recorded on 2025-04-11, matching the filtered result set.".to_string();
        }

        if text.contains("paragraph overview of this dataset") {
            return "This dataset tracks individual sales transactions, each with an amount and a sale date, linked to a product catalog.\n\nIt looks well suited to revenue and trend questions over time.".to_string();
        }

        let input = Self::last_user_message(messages).to_lowercase();
        if input.contains("count") && input.contains("sales") {
            return "```sql\nSELECT COUNT(*) FROM sales;\n```".to_string();
        }

        "I don't have enough information to answer that.".to_string()
    }

    fn classify_intent(text: &str) -> String {
        if text.contains("insight") || text.contains("explore") || text.contains("interesting") || text.contains("suggest") {
            "exploratory_analytical".to_string()
        } else if text.contains("describe") || text.contains("overview") || text.contains("what's in") {
            "exploratory_descriptive".to_string()
        } else {
            "specific".to_string()
        }
    }

    fn synthesize_sql(text: &str) -> String {
        if text.contains("2025-04-11") {
            "```sql\nSELECT COUNT(*) FROM sales WHERE sale_date = '2025-04-11';\n```".to_string()
        } else {
            "```sql\nSELECT * FROM sales;\n```".to_string()
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        Ok(self.mock_response(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_classifies_specific_intent() {
        let client = MockLlmClient::new();
        let messages = vec![
            Message::system(
                "Answer with exactly one of these three tokens: specific, exploratory_analytical, exploratory_descriptive.",
            ),
            Message::user("What were total sales last week?"),
        ];
        let response = client.complete(&messages).await.unwrap();
        assert_eq!(response, "specific");
    }

    #[tokio::test]
    async fn test_mock_classifies_exploratory_analytical_intent() {
        let client = MockLlmClient::new();
        let messages = vec![
            Message::system(
                "Answer with exactly one of these three tokens: specific, exploratory_analytical, exploratory_descriptive.",
            ),
            Message::user("Help me explore this dataset for insights."),
        ];
        let response = client.complete(&messages).await.unwrap();
        assert_eq!(response, "exploratory_analytical");
    }

    #[tokio::test]
    async fn test_mock_classifies_exploratory_descriptive_intent() {
        let client = MockLlmClient::new();
        let messages = vec![
            Message::system(
                "Answer with exactly one of these three tokens: specific, exploratory_analytical, exploratory_descriptive.",
            ),
            Message::user("Give me an overview of what's in this dataset."),
        ];
        let response = client.complete(&messages).await.unwrap();
        assert_eq!(response, "exploratory_descriptive");
    }

    #[tokio::test]
    async fn test_mock_produces_plan_steps() {
        let client = MockLlmClient::new();
        let messages = vec![
            Message::system("Produce a numbered list of conceptual steps to answer the question."),
            Message::user("Total sales on 2025-04-11"),
        ];
        let response = client.complete(&messages).await.unwrap();
        assert!(response.starts_with("1."));
    }

    #[tokio::test]
    async fn test_mock_produces_analytical_questions() {
        let client = MockLlmClient::new();
        let messages = vec![Message::system(
            "Produce analytical questions about the dataset, one per line.",
        )];
        let response = client.complete(&messages).await.unwrap();
        assert!(response.lines().count() >= 5);
    }

    #[tokio::test]
    async fn test_mock_synthesizes_sql_for_date() {
        let client = MockLlmClient::new();
        let messages = vec![
            Message::system("Write a single SQL statement matching the dialect to implement this plan."),
            Message::user("How many sales happened on 2025-04-11?"),
        ];
        let response = client.complete(&messages).await.unwrap();
        assert!(response.contains("2025-04-11"));
    }

    #[tokio::test]
    async fn test_mock_debugs_failed_sql() {
        let client = MockLlmClient::new();
        let messages = vec![Message::system(
            "The prior statement failed. Propose a single corrected SQL statement.",
        )];
        let response = client.complete(&messages).await.unwrap();
        assert!(response.contains("SELECT"));
    }

    #[tokio::test]
    async fn test_mock_interprets_results() {
        let client = MockLlmClient::new();
        let messages = vec![Message::system(
            "Summarize these query result rows in one paragraph.",
        )];
        let response = client.complete(&messages).await.unwrap();
        assert!(response.contains("2025-04-11"));
    }

    #[tokio::test]
    async fn test_mock_describes_dataset() {
        let client = MockLlmClient::new();
        let messages = vec![Message::system(
            "Write a paragraph overview of this dataset for a new user.",
        )];
        let response = client.complete(&messages).await.unwrap();
        assert!(response.contains("sales"));
    }

    #[tokio::test]
    async fn test_mock_custom_response_override() {
        let client = MockLlmClient::new().with_response("custom marker", "custom output");
        let messages = vec![Message::user("contains custom marker in text")];
        let response = client.complete(&messages).await.unwrap();
        assert_eq!(response, "custom output");
    }

    #[tokio::test]
    async fn test_mock_fallback_response() {
        let client = MockLlmClient::new();
        let messages = vec![Message::user("what is the meaning of life")];
        let response = client.complete(&messages).await.unwrap();
        assert!(response.contains("don't have enough information"));
    }
}
