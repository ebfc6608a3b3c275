//! LLM gateway: retry, timeout, and per-session conversation state.
//!
//! Every pipeline stage goes through the gateway rather than calling an
//! `LlmClient` directly. It owns the concerns that apply uniformly across
//! stages: a hard per-call timeout, bounded retry with backoff for
//! transient failures, and a capped conversation history per session so a
//! multi-turn exchange doesn't grow the prompt without bound.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{OrchestratorError, Result};
use crate::llm::parser::{parse_llm_response, ParsedResponse};
use crate::llm::types::{Conversation, Message};
use crate::llm::LlmClient;

/// Maximum number of retry attempts for a gateway call.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retries; doubles on each attempt.
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Hard timeout for a single LLM call, regardless of provider configuration.
const CALL_TIMEOUT_SECS: u64 = 60;

/// Maximum number of user/assistant exchanges retained per session.
const MAX_EXCHANGES_PER_SESSION: usize = 8;

/// Wraps an `LlmClient` with retry, timeout, and per-session history.
pub struct LlmGateway {
    client: Box<dyn LlmClient>,
    conversations: Mutex<HashMap<String, Conversation>>,
}

impl LlmGateway {
    /// Creates a gateway around the given client.
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self {
            client,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Sends a one-shot request with no session history: a system prompt
    /// plus a single user message. Used by stages that don't need
    /// multi-turn context (intent classification, planning, synthesis).
    pub async fn complete(&self, system: impl Into<String>, user: impl Into<String>) -> Result<String> {
        let messages = vec![Message::system(system), Message::user(user)];
        self.complete_with_retry(&messages).await
    }

    /// Sends a request as part of a session's running conversation.
    ///
    /// The session's history is replayed ahead of the new user message and
    /// the reply is appended to it, trimmed to the exchange cap. Used by
    /// the interpreter and descriptive responder, where a follow-up
    /// question should see what was discussed before.
    pub async fn complete_in_session(
        &self,
        session_id: &str,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let user = user.into();

        let mut messages = vec![Message::system(system)];
        {
            let conversations = self.conversations.lock().await;
            if let Some(conv) = conversations.get(session_id) {
                messages.extend(conv.messages().iter().cloned());
            }
        }
        messages.push(Message::user(user.clone()));

        let reply = self.complete_with_retry(&messages).await?;

        let mut conversations = self.conversations.lock().await;
        let conv = conversations
            .entry(session_id.to_string())
            .or_insert_with(|| Conversation::with_max_exchanges(MAX_EXCHANGES_PER_SESSION));
        conv.add_user(user);
        conv.add_assistant(reply.clone());

        Ok(reply)
    }

    /// Sends a request and parses the reply for an embedded SQL code block.
    pub async fn complete_parsed(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<ParsedResponse> {
        let text = self.complete(system, user).await?;
        Ok(parse_llm_response(&text))
    }

    /// Drops a session's conversation history. Called when a session is
    /// taken out of the store so memory doesn't accumulate across sessions.
    pub async fn forget_session(&self, session_id: &str) {
        self.conversations.lock().await.remove(session_id);
    }

    async fn complete_with_retry(&self, messages: &[Message]) -> Result<String> {
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);
        let mut last_error = None;

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            let call = tokio::time::timeout(
                Duration::from_secs(CALL_TIMEOUT_SECS),
                self.client.complete(messages),
            )
            .await;

            let result = match call {
                Ok(result) => result,
                Err(_) => Err(OrchestratorError::llm_timeout(format!(
                    "LLM call exceeded {}s timeout",
                    CALL_TIMEOUT_SECS
                ))),
            };

            match result {
                Ok(text) => return Ok(text),
                Err(error) if attempt < MAX_RETRY_ATTEMPTS && Self::is_retryable(&error) => {
                    tracing::warn!(attempt, %error, "LLM call failed, retrying");
                    last_error = Some(error);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(error) => return Err(error),
            }
        }

        Err(last_error.unwrap_or_else(|| OrchestratorError::llm_transport("Retry attempts exhausted")))
    }

    fn is_retryable(error: &OrchestratorError) -> bool {
        matches!(
            error,
            OrchestratorError::LlmTimeout(_) | OrchestratorError::LlmQuota(_) | OrchestratorError::LlmTransport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLlmClient;

    #[tokio::test]
    async fn test_complete_one_shot() {
        let gateway = LlmGateway::new(Box::new(MockLlmClient::new()));
        let response = gateway
            .complete(
                "Answer with exactly one of these three tokens: specific, exploratory_analytical, exploratory_descriptive.",
                "What were total sales last week?",
            )
            .await
            .unwrap();
        assert_eq!(response, "specific");
    }

    #[tokio::test]
    async fn test_complete_in_session_retains_history() {
        let gateway = LlmGateway::new(Box::new(MockLlmClient::new()));
        gateway
            .complete_in_session(
                "session-1",
                "Summarize these query result rows in one paragraph.",
                "first question",
            )
            .await
            .unwrap();
        gateway
            .complete_in_session(
                "session-1",
                "Summarize these query result rows in one paragraph.",
                "follow up",
            )
            .await
            .unwrap();

        let conversations = gateway.conversations.lock().await;
        let conv = conversations.get("session-1").unwrap();
        assert_eq!(conv.len(), 4);
    }

    #[tokio::test]
    async fn test_forget_session_clears_history() {
        let gateway = LlmGateway::new(Box::new(MockLlmClient::new()));
        gateway
            .complete_in_session(
                "session-2",
                "Write a paragraph overview of this dataset for a new user.",
                "hi",
            )
            .await
            .unwrap();
        gateway.forget_session("session-2").await;
        assert!(gateway.conversations.lock().await.get("session-2").is_none());
    }

    #[tokio::test]
    async fn test_complete_parsed_extracts_sql() {
        let gateway = LlmGateway::new(Box::new(MockLlmClient::new()));
        let parsed = gateway
            .complete_parsed(
                "Write a single SQL statement matching the dialect to implement this plan.",
                "How many sales happened on 2025-04-11?",
            )
            .await
            .unwrap();
        assert!(parsed.sql.is_some());
    }
}
