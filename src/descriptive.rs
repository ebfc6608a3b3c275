//! Descriptive Responder: answers "what's in this dataset" requests from
//! context alone, without issuing any SQL.

use crate::context::DatabaseContext;
use crate::error::{OrchestratorError, Result};
use crate::llm::gateway::LlmGateway;

const DESCRIPTIVE_PROMPT_TEMPLATE: &str = r#"You are introducing a dataset to someone who hasn't seen it before.

DATABASE CONTEXT:
{context}

USER REQUEST:
{utterance}

Write a paragraph overview of this dataset for a new user. Cover what tables it has, what each one represents, their approximate sizes, and any columns worth calling out. Use 3 to 6 short paragraphs. Do not write or suggest any SQL."#;

/// Describes the dataset using context alone; never issues a query.
pub async fn describe(gateway: &LlmGateway, utterance: &str, context: &DatabaseContext) -> Result<String> {
    let system = DESCRIPTIVE_PROMPT_TEMPLATE
        .replace("{context}", &context.render())
        .replace("{utterance}", utterance);

    let text = gateway.complete(system, utterance).await?;
    if text.trim().is_empty() {
        return Err(OrchestratorError::llm_empty("descriptive responder returned an empty response"));
    }
    Ok(text)
}
