//! Intent classification: labels a user utterance before planning begins.

use crate::context::DatabaseContext;
use crate::error::Result;
use crate::llm::gateway::LlmGateway;

/// System prompt template instructing the LLM to emit exactly one label.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are the intent classifier for a data-analysis assistant.

DATABASE CONTEXT:
{context}

Classify the user's utterance. Answer with exactly one of these three tokens: specific, exploratory_analytical, exploratory_descriptive.

- specific: the user wants a concrete, answerable question about the data (counts, sums, filters, comparisons).
- exploratory_analytical: the user wants open-ended analysis, insights, or interesting patterns, without a single concrete question.
- exploratory_descriptive: the user wants a description or overview of what the dataset contains.

Respond with only the token, nothing else."#;

/// Confidence assigned when the keyword-rule fallback is used instead of
/// an LLM call.
const FALLBACK_CONFIDENCE: f64 = 0.4;

/// One of the three intents a user utterance can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentLabel {
    Specific,
    ExploratoryAnalytical,
    ExploratoryDescriptive,
}

impl IntentLabel {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "specific" => Some(Self::Specific),
            "exploratory_analytical" => Some(Self::ExploratoryAnalytical),
            "exploratory_descriptive" => Some(Self::ExploratoryDescriptive),
            _ => None,
        }
    }
}

/// Outcome of classifying an utterance: a label plus a confidence score.
#[derive(Debug, Clone, Copy)]
pub struct IntentResult {
    pub label: IntentLabel,
    pub confidence: f64,
}

/// Classifies a user utterance into one of the three intents.
///
/// Tries a single LLM call first; if the call fails or the reply doesn't
/// parse to one of the three tokens, falls back to keyword rules.
pub async fn classify(
    gateway: &LlmGateway,
    utterance: &str,
    context: &DatabaseContext,
) -> Result<IntentResult> {
    let system = SYSTEM_PROMPT_TEMPLATE.replace("{context}", &context.render());

    match gateway.complete(system, utterance).await {
        Ok(reply) => {
            if let Some(label) = IntentLabel::parse(&reply) {
                return Ok(IntentResult {
                    label,
                    confidence: 1.0,
                });
            }
            Ok(fallback_classify(utterance, context))
        }
        Err(error) => {
            tracing::warn!(%error, "intent classifier LLM call failed, using keyword fallback");
            Ok(fallback_classify(utterance, context))
        }
    }
}

/// Keyword-rule fallback used when the LLM call or its parse fails.
///
/// The interrogative branch only classifies `specific` when the utterance
/// names a real table or column; otherwise an interrogative-shaped question
/// about an unknown subject falls back to a descriptive answer rather than
/// being routed toward a plan that can't ground itself in the schema.
fn fallback_classify(utterance: &str, context: &DatabaseContext) -> IntentResult {
    let lower = utterance.to_lowercase();

    let label = if lower.contains("explore")
        || lower.contains("insight")
        || lower.contains("suggest")
        || lower.contains("interesting")
    {
        IntentLabel::ExploratoryAnalytical
    } else if lower.contains("describe") || lower.contains("overview") || lower.contains("what's in")
    {
        IntentLabel::ExploratoryDescriptive
    } else if is_interrogative(&lower) {
        if mentions_known_identifier(utterance, context) {
            IntentLabel::Specific
        } else {
            IntentLabel::ExploratoryDescriptive
        }
    } else {
        IntentLabel::Specific
    };

    IntentResult {
        label,
        confidence: FALLBACK_CONFIDENCE,
    }
}

fn is_interrogative(lower: &str) -> bool {
    lower.contains("how many") || lower.contains("list") || lower.contains("what is the")
}

/// True if any whitespace-delimited word in `utterance` names a known table
/// or column.
fn mentions_known_identifier(utterance: &str, context: &DatabaseContext) -> bool {
    utterance
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .any(|word| context.schema_has_table(word) || context.schema_has_any_column(word))
}
