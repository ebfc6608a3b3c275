//! End-to-end scenarios for the analyze/execute pipeline, run entirely
//! against the mock store and mock LLM client so they need no external
//! services.

use std::sync::Arc;
use std::time::Duration;

use dataloom::db::{DatabaseClient, MockDatabaseClient};
use dataloom::llm::gateway::LlmGateway;
use dataloom::llm::mock::MockLlmClient;
use dataloom::orchestrator::{AnalyzeResult, ExecuteResult, Orchestrator};
use dataloom::session::SessionStore;

fn build_orchestrator() -> Orchestrator {
    let db: Arc<dyn DatabaseClient> = Arc::new(MockDatabaseClient::with_sales_fixture());
    let gateway = Arc::new(LlmGateway::new(Box::new(MockLlmClient::new())));
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(900)));
    Orchestrator::new(db, gateway, sessions)
}

/// S1: a plan referencing a table and column absent from the schema fails
/// at the plan stage rather than reaching the synthesizer.
#[tokio::test]
async fn s1_plan_referencing_unknown_table_is_infeasible() {
    let gateway = Arc::new(LlmGateway::new(Box::new(MockLlmClient::new().with_response(
        "conceptual steps to answer the question",
        "1. Join products to sales to find the category breakdown.",
    ))));
    let db: Arc<dyn DatabaseClient> = Arc::new(MockDatabaseClient::with_sales_fixture());
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(900)));
    let orchestrator = Orchestrator::new(db, gateway, sessions);

    let result = orchestrator
        .analyze("What are the different product categories and how many products in each?")
        .await;

    match result {
        AnalyzeResult::Failed { stage, reason } => {
            assert_eq!(stage, "plan");
            assert!(reason.contains("products") || reason.contains("category"));
        }
        other => panic!("expected a plan-stage failure, got {:?}", other),
    }
}

/// S2: a question over known tables yields SQL referencing only `sales`,
/// with no warnings, and stores a session.
#[tokio::test]
async fn s2_specific_question_yields_clean_sql() {
    let orchestrator = build_orchestrator();
    let result = orchestrator
        .analyze("How many sales happened on 2025-04-11?")
        .await;

    match result {
        AnalyzeResult::NeedsSqlApproval {
            session_id,
            generated_sql,
            warnings,
            ..
        } => {
            assert!(!session_id.is_empty());
            assert!(generated_sql.to_lowercase().contains("sales"));
            assert!(warnings.is_empty());
        }
        other => panic!("expected NeedsSqlApproval, got {:?}", other),
    }
}

/// S3: approving and executing the generated SQL from S2 returns a result
/// with an interpretation mentioning the count and the date.
#[tokio::test]
async fn s3_execute_approved_sql_returns_interpreted_result() {
    let orchestrator = build_orchestrator();
    let AnalyzeResult::NeedsSqlApproval {
        session_id,
        generated_sql,
        ..
    } = orchestrator
        .analyze("How many sales happened on 2025-04-11?")
        .await
    else {
        panic!("expected NeedsSqlApproval");
    };

    let result = orchestrator.execute(&session_id, &generated_sql).await;
    match result {
        ExecuteResult::Success {
            row_count,
            interpretation,
            ..
        } => {
            assert_eq!(row_count, 1);
            assert!(interpretation.contains('2'));
        }
        other => panic!("expected Success, got {:?}", other),
    }
}

/// S4: a syntactically broken approved statement fails execution but comes
/// back with a debug suggestion that itself passes synthesizer validation.
#[tokio::test]
async fn s4_execute_engine_error_returns_debug_suggestion() {
    let orchestrator = build_orchestrator();
    let AnalyzeResult::NeedsSqlApproval { session_id, .. } = orchestrator
        .analyze("How many sales happened on 2025-04-11?")
        .await
    else {
        panic!("expected NeedsSqlApproval");
    };

    let result = orchestrator
        .execute(&session_id, "SELEC COUNT(*) FROM sales")
        .await;

    match result {
        ExecuteResult::ExecutionFailed {
            engine_error,
            debug_suggestion,
        } => {
            assert!(!engine_error.is_empty());
            let suggestion = debug_suggestion.expect("expected a debug suggestion");
            assert!(suggestion.to_lowercase().contains("select"));
        }
        other => panic!("expected ExecutionFailed, got {:?}", other),
    }
}

/// S5: a session can only produce one terminal outcome. Once taken, a
/// second `execute` call always reports the session missing.
#[tokio::test]
async fn s5_execute_is_single_use_across_repeated_calls() {
    let orchestrator = build_orchestrator();
    let AnalyzeResult::NeedsSqlApproval {
        session_id,
        generated_sql,
        ..
    } = orchestrator
        .analyze("How many sales happened on 2025-04-11?")
        .await
    else {
        panic!("expected NeedsSqlApproval");
    };

    let first = orchestrator.execute(&session_id, &generated_sql).await;
    let second = orchestrator.execute(&session_id, &generated_sql).await;

    assert!(!matches!(first, ExecuteResult::SessionMissing));
    assert!(matches!(second, ExecuteResult::SessionMissing));
}

/// S6: an open-ended request yields 5-7 self-contained suggestions, each
/// within the word-count cap.
#[tokio::test]
async fn s6_analytical_intent_yields_bounded_suggestions() {
    let orchestrator = build_orchestrator();
    let result = orchestrator.analyze("give me some interesting insights").await;

    match result {
        AnalyzeResult::Suggestions { suggestions } => {
            assert!(suggestions.len() >= 5 && suggestions.len() <= 7);
            for question in &suggestions {
                assert!(question.split_whitespace().count() <= 30);
            }
        }
        other => panic!("expected Suggestions, got {:?}", other),
    }
}

/// Invariant 8: a session that has expired behaves exactly like one that
/// was never there.
#[tokio::test]
async fn expired_session_behaves_as_missing() {
    let db: Arc<dyn DatabaseClient> = Arc::new(MockDatabaseClient::with_sales_fixture());
    let gateway = Arc::new(LlmGateway::new(Box::new(MockLlmClient::new())));
    let sessions = Arc::new(SessionStore::new(Duration::from_millis(10)));
    let orchestrator = Orchestrator::new(db, gateway, sessions);

    let AnalyzeResult::NeedsSqlApproval {
        session_id,
        generated_sql,
        ..
    } = orchestrator
        .analyze("How many sales happened on 2025-04-11?")
        .await
    else {
        panic!("expected NeedsSqlApproval");
    };

    tokio::time::sleep(Duration::from_millis(30)).await;

    let result = orchestrator.execute(&session_id, &generated_sql).await;
    assert!(matches!(result, ExecuteResult::SessionMissing));
}
