//! Planner: turns an utterance into either a step-by-step plan or a list of
//! suggested analytical questions, depending on the classified intent.

use crate::context::DatabaseContext;
use crate::error::{OrchestratorError, Result};
use crate::llm::gateway::LlmGateway;

/// Minimum/maximum number of steps a "plan" mode plan must contain.
const PLAN_MIN_STEPS: usize = 3;
const PLAN_MAX_STEPS: usize = 10;

/// Minimum/maximum number of questions an "insights" mode plan must contain.
const INSIGHTS_MIN_QUESTIONS: usize = 5;
const INSIGHTS_MAX_QUESTIONS: usize = 7;

const PLAN_PROMPT_TEMPLATE: &str = r#"You are planning how to answer a data question.

DATABASE CONTEXT:
{context}

USER QUESTION:
{utterance}

Produce a numbered list of conceptual steps to answer the question. Use between 3 and 10 steps. Each step must reference only table or column names present in the context above, and must not contain any SQL. Respond with only the numbered list."#;

const INSIGHTS_PROMPT_TEMPLATE: &str = r#"You are suggesting avenues for open-ended data exploration.

DATABASE CONTEXT:
{context}

USER REQUEST:
{utterance}

Produce analytical questions about the dataset, one per line. Use between 5 and 7 questions. Each question must be self-contained, at most 30 words, and answerable by a single SQL query against the schema above. Respond with only the list."#;

/// The two modes the Planner can run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    Plan,
    Insights,
}

/// A plan produced by the Planner: a set of ordered prose steps (plan mode)
/// or self-contained questions (insights mode).
#[derive(Debug, Clone)]
pub struct Plan {
    pub mode: PlanMode,
    pub items: Vec<String>,
}

/// Invokes the Planner in the given mode and parses its reply into a `Plan`.
pub async fn plan(
    gateway: &LlmGateway,
    mode: PlanMode,
    utterance: &str,
    context: &DatabaseContext,
) -> Result<Plan> {
    let template = match mode {
        PlanMode::Plan => PLAN_PROMPT_TEMPLATE,
        PlanMode::Insights => INSIGHTS_PROMPT_TEMPLATE,
    };
    let system = template
        .replace("{context}", &context.render())
        .replace("{utterance}", utterance);

    let reply = gateway.complete(system, utterance).await?;
    let items = parse_items(&reply);

    if items.is_empty() {
        return Err(OrchestratorError::plan("planner returned no usable steps"));
    }

    Ok(Plan { mode, items })
}

/// Parses a line-based reply into a list of items, tolerant of leading
/// enumeration markers like `1.`, `1)`, `-`, or `*`.
fn parse_items(text: &str) -> Vec<String> {
    text.lines()
        .map(strip_enumeration_marker)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn strip_enumeration_marker(line: &str) -> &str {
    let trimmed = line.trim_start();
    let after_number = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .map(|idx| &trimmed[idx..])
        .unwrap_or(trimmed);

    let after_punct = after_number
        .strip_prefix('.')
        .or_else(|| after_number.strip_prefix(')'))
        .unwrap_or(after_number);

    if after_punct.len() != after_number.len() {
        return after_punct.trim_start();
    }

    trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('*'))
        .map(|s| s.trim_start())
        .unwrap_or(trimmed)
}

impl Plan {
    /// Returns whether the item count falls within the mode-appropriate
    /// bounds from spec §4.5. The Planner doesn't enforce this itself (an
    /// LLM may over- or under-shoot); the Validator checks it.
    pub fn within_bounds(&self) -> bool {
        match self.mode {
            PlanMode::Plan => {
                self.items.len() >= PLAN_MIN_STEPS && self.items.len() <= PLAN_MAX_STEPS
            }
            PlanMode::Insights => {
                self.items.len() >= INSIGHTS_MIN_QUESTIONS
                    && self.items.len() <= INSIGHTS_MAX_QUESTIONS
            }
        }
    }
}
