//! Interpreter: turns query result rows into a natural-language answer.

use crate::db::QueryResult;
use crate::error::{OrchestratorError, Result};
use crate::llm::gateway::LlmGateway;

/// Row count above which results are truncated before being shown to the
/// LLM, to keep prompts bounded.
const MAX_ROWS_FOR_PROMPT: usize = 50;

const INTERPRETER_PROMPT_TEMPLATE: &str = r#"You are explaining a query result to the person who asked the question.

USER QUESTION:
{utterance}

SQL THAT WAS RUN:
{sql}

RESULT ROWS ({row_count} shown{truncation_note}):
{rows}

Summarize these query result rows in one paragraph. Answer the question directly in your first sentence. Cite at most 5 concrete values from the rows. If the result was truncated, say so explicitly. Keep the whole answer under 500 words."#;

/// Interprets a query's rows into a single paragraph answering `utterance`.
pub async fn interpret(gateway: &LlmGateway, utterance: &str, sql: &str, result: &QueryResult) -> Result<String> {
    let shown_rows = result.rows.iter().take(MAX_ROWS_FOR_PROMPT).count();
    let truncated_for_prompt = result.rows.len() > MAX_ROWS_FOR_PROMPT;
    let truncation_note = if truncated_for_prompt || result.was_truncated {
        ", truncated"
    } else {
        ""
    };

    let rows_text = render_rows(result);

    let system = INTERPRETER_PROMPT_TEMPLATE
        .replace("{utterance}", utterance)
        .replace("{sql}", sql)
        .replace("{row_count}", &shown_rows.to_string())
        .replace("{truncation_note}", truncation_note)
        .replace("{rows}", &rows_text);

    let text = gateway.complete(system, utterance).await?;
    if text.trim().is_empty() {
        return Err(OrchestratorError::llm_empty("interpreter returned an empty response"));
    }
    Ok(text)
}

fn render_rows(result: &QueryResult) -> String {
    let header = result
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let body = result
        .rows
        .iter()
        .take(MAX_ROWS_FOR_PROMPT)
        .map(|row| {
            row.iter()
                .map(|v| v.to_display_string())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect::<Vec<_>>()
        .join("\n");

    if header.is_empty() {
        body
    } else {
        format!("{}\n{}", header, body)
    }
}
