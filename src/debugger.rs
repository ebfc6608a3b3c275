//! SQL Debugger: proposes a corrected statement after an execution failure,
//! without ever running it itself.

use crate::context::DatabaseContext;
use crate::error::Result;
use crate::llm::gateway::LlmGateway;
use crate::llm::parser::parse_llm_response;
use crate::planner::Plan;
use crate::synth::validate_lexically;

const DEBUG_PROMPT_TEMPLATE: &str = r#"A SQL statement you or a teammate wrote failed to execute.

DATABASE CONTEXT:
{context}

USER QUESTION:
{utterance}

PLAN:
{plan}

STATEMENT THAT FAILED:
{sql}

ENGINE ERROR:
{error}

The prior statement failed. Propose a single corrected SQL statement that still implements the plan and is read-only. Return it as a single ```sql``` code block with no other statements."#;

/// Asks the debugger LLM for a corrected statement and validates it the
/// same way the synthesizer's first pass does. Returns `None` if the LLM
/// didn't produce a statement or the result still carries a hard warning;
/// the caller never executes what comes back from here automatically.
pub async fn suggest_fix(
    gateway: &LlmGateway,
    utterance: &str,
    sql: &str,
    engine_error: &str,
    plan: &Plan,
    context: &DatabaseContext,
) -> Result<Option<String>> {
    let plan_text = plan.items.join("\n");
    let system = DEBUG_PROMPT_TEMPLATE
        .replace("{context}", &context.render())
        .replace("{utterance}", utterance)
        .replace("{plan}", &plan_text)
        .replace("{sql}", sql)
        .replace("{error}", engine_error);

    let reply = gateway.complete(system, utterance).await?;
    let Some(candidate) = parse_llm_response(&reply).sql else {
        return Ok(None);
    };

    let warnings = validate_lexically(&candidate, context);
    if has_hard_warning(&warnings) {
        return Ok(None);
    }

    Ok(Some(candidate))
}

fn has_hard_warning(warnings: &[String]) -> bool {
    warnings
        .iter()
        .any(|w| w.starts_with("unknown table") || w.starts_with("unknown column") || w.contains("unknown table alias"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockDatabaseClient;
    use crate::llm::mock::MockLlmClient;
    use crate::planner::PlanMode;

    async fn sample_context() -> DatabaseContext {
        let db = MockDatabaseClient::with_sales_fixture();
        DatabaseContext::build(&db).await.unwrap()
    }

    fn sample_plan() -> Plan {
        Plan {
            mode: PlanMode::Plan,
            items: vec!["Count rows in sales".to_string()],
        }
    }

    #[tokio::test]
    async fn test_suggest_fix_returns_corrected_sql() {
        let gateway = LlmGateway::new(Box::new(MockLlmClient::new()));
        let context = sample_context().await;
        let result = suggest_fix(
            &gateway,
            "How many sales happened?",
            "SELECT COUNT(*) FROM sale",
            "relation \"sale\" does not exist",
            &sample_plan(),
            &context,
        )
        .await
        .unwrap();
        assert!(result.is_some());
        assert!(result.unwrap().contains("SELECT"));
    }

    #[tokio::test]
    async fn test_suggest_fix_returns_none_when_still_invalid() {
        let gateway = LlmGateway::new(Box::new(
            MockLlmClient::new().with_response(
                "propose a single corrected sql statement",
                "```sql\nSELECT * FROM products\n```",
            ),
        ));
        let context = sample_context().await;
        let result = suggest_fix(
            &gateway,
            "How many sales happened?",
            "SELECT COUNT(*) FROM sale",
            "relation \"sale\" does not exist",
            &sample_plan(),
            &context,
        )
        .await
        .unwrap();
        assert!(result.is_none());
    }
}
