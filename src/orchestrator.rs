//! Orchestrator: the top-level `analyze`/`execute` pipeline that ties every
//! stage together.

use std::path::PathBuf;
use std::sync::Arc;

use crate::context::DatabaseContext;
use crate::db::DatabaseClient;
use crate::error::OrchestratorError;
use crate::intent::{self, IntentLabel};
use crate::llm::gateway::LlmGateway;
use crate::planner::{self, Plan, PlanMode};
use crate::session::{Session, SessionStore};
use crate::validator::{self, Verdict};
use crate::{debugger, descriptive, executor, interpreter, synth};

/// Confidence below which an intent classification is treated as too weak
/// to trust and the turn defaults to `specific`.
const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Row count above which a result set is truncated before interpretation,
/// while the true count is still reported.
const INTERPRETATION_ROW_CAP: usize = 10_000;

/// Outcome of `analyze`.
#[derive(Debug, Clone)]
pub enum AnalyzeResult {
    NeedsSqlApproval {
        session_id: String,
        generated_sql: String,
        warnings: Vec<String>,
        plan: Plan,
    },
    Suggestions {
        suggestions: Vec<String>,
    },
    Description {
        text: String,
    },
    Failed {
        stage: String,
        reason: String,
    },
}

/// Outcome of `execute`.
#[derive(Debug, Clone)]
pub enum ExecuteResult {
    Success {
        rows: Vec<Vec<String>>,
        columns: Vec<String>,
        interpretation: String,
        row_count: usize,
        truncated: bool,
    },
    ExecutionFailed {
        engine_error: String,
        debug_suggestion: Option<String>,
    },
    SessionMissing,
}

/// Ties the pipeline stages together behind the two operations the
/// transport layer calls.
pub struct Orchestrator {
    db: Arc<dyn DatabaseClient>,
    gateway: Arc<LlmGateway>,
    sessions: Arc<SessionStore>,
    schema_path: PathBuf,
}

impl Orchestrator {
    pub fn new(db: Arc<dyn DatabaseClient>, gateway: Arc<LlmGateway>, sessions: Arc<SessionStore>) -> Self {
        Self::with_schema_path(db, gateway, sessions, PathBuf::from("schema.toml"))
    }

    /// Builds an orchestrator that sources its schema from `schema_path`
    /// when that file exists, falling back to live introspection otherwise.
    pub fn with_schema_path(
        db: Arc<dyn DatabaseClient>,
        gateway: Arc<LlmGateway>,
        sessions: Arc<SessionStore>,
        schema_path: PathBuf,
    ) -> Self {
        Self {
            db,
            gateway,
            sessions,
            schema_path,
        }
    }

    /// Runs the analysis pipeline for a new utterance.
    pub async fn analyze(&self, utterance: &str) -> AnalyzeResult {
        let context = match DatabaseContext::build_with_schema(self.db.as_ref(), &self.schema_path).await {
            Ok(context) => context,
            Err(error) => {
                return AnalyzeResult::Failed {
                    stage: "context".to_string(),
                    reason: error.to_string(),
                }
            }
        };

        let label = match intent::classify(&self.gateway, utterance, &context).await {
            Ok(result) if result.confidence < LOW_CONFIDENCE_THRESHOLD => IntentLabel::Specific,
            Ok(result) => result.label,
            Err(_) => IntentLabel::Specific,
        };

        match label {
            IntentLabel::ExploratoryDescriptive => match descriptive::describe(&self.gateway, utterance, &context).await {
                Ok(text) => AnalyzeResult::Description { text },
                Err(error) => failed(&error),
            },
            IntentLabel::ExploratoryAnalytical => {
                match planner::plan(&self.gateway, PlanMode::Insights, utterance, &context).await {
                    Ok(plan) => AnalyzeResult::Suggestions {
                        suggestions: plan.items,
                    },
                    Err(error) => failed(&error),
                }
            }
            IntentLabel::Specific => self.analyze_specific(utterance, context).await,
        }
    }

    async fn analyze_specific(&self, utterance: &str, context: DatabaseContext) -> AnalyzeResult {
        let plan = match planner::plan(&self.gateway, PlanMode::Plan, utterance, &context).await {
            Ok(plan) => plan,
            Err(error) => return failed(&error),
        };

        let plan = match validator::validate(utterance, plan, &context) {
            Verdict::Feasible(plan) => plan,
            Verdict::Revised { plan, .. } => plan,
            Verdict::Infeasible { rationale } => {
                return AnalyzeResult::Failed {
                    stage: "plan".to_string(),
                    reason: rationale,
                }
            }
        };

        let synth_result = match synth::synthesize(&self.gateway, utterance, &plan, &context).await {
            Ok(result) => result,
            Err(error) => return failed(&error),
        };

        let session_id = self
            .sessions
            .put(Session {
                utterance: utterance.to_string(),
                plan: plan.clone(),
                context,
                generated_sql: synth_result.sql.clone(),
            })
            .await;

        AnalyzeResult::NeedsSqlApproval {
            session_id,
            generated_sql: synth_result.sql,
            warnings: synth_result.warnings,
            plan,
        }
    }

    /// Executes a previously approved statement. Consumes the session
    /// before running anything, so a duplicate call always sees it gone.
    pub async fn execute(&self, session_id: &str, approved_sql: &str) -> ExecuteResult {
        let Some(session) = self.sessions.take(session_id).await else {
            return ExecuteResult::SessionMissing;
        };

        match executor::run(self.db.as_ref(), approved_sql).await {
            Ok(result) => {
                let truncated = result.rows.len() > INTERPRETATION_ROW_CAP;
                let interpretation_rows = if truncated {
                    let mut truncated_result = result.clone();
                    truncated_result.rows.truncate(INTERPRETATION_ROW_CAP);
                    truncated_result.was_truncated = true;
                    truncated_result
                } else {
                    result.clone()
                };

                let interpretation = match interpreter::interpret(
                    &self.gateway,
                    &session.utterance,
                    approved_sql,
                    &interpretation_rows,
                )
                .await
                {
                    Ok(text) => text,
                    Err(error) => error.to_string(),
                };

                let columns = result.columns.iter().map(|c| c.name.clone()).collect();
                let rows = result
                    .rows
                    .iter()
                    .map(|row| row.iter().map(|v| v.to_display_string()).collect())
                    .collect();

                ExecuteResult::Success {
                    rows,
                    columns,
                    interpretation,
                    row_count: result.row_count,
                    truncated: result.was_truncated,
                }
            }
            Err(error) => {
                let engine_error = error.to_string();
                let debug_suggestion = debugger::suggest_fix(
                    &self.gateway,
                    &session.utterance,
                    approved_sql,
                    &engine_error,
                    &session.plan,
                    &session.context,
                )
                .await
                .ok()
                .flatten();

                ExecuteResult::ExecutionFailed {
                    engine_error,
                    debug_suggestion,
                }
            }
        }
    }
}

fn failed(error: &OrchestratorError) -> AnalyzeResult {
    AnalyzeResult::Failed {
        stage: error.stage().to_string(),
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockDatabaseClient;
    use crate::llm::mock::MockLlmClient;
    use std::time::Duration;

    fn build_orchestrator() -> Orchestrator {
        let db: Arc<dyn DatabaseClient> = Arc::new(MockDatabaseClient::with_sales_fixture());
        let gateway = Arc::new(LlmGateway::new(Box::new(MockLlmClient::new())));
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(900)));
        Orchestrator::new(db, gateway, sessions)
    }

    #[tokio::test]
    async fn test_analyze_specific_produces_sql_needing_approval() {
        let orchestrator = build_orchestrator();
        let result = orchestrator
            .analyze("How many sales happened on 2025-04-11?")
            .await;
        match result {
            AnalyzeResult::NeedsSqlApproval {
                generated_sql,
                warnings,
                ..
            } => {
                assert!(generated_sql.contains("sales"));
                assert!(warnings.is_empty());
            }
            other => panic!("expected NeedsSqlApproval, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_insights_returns_suggestions() {
        let orchestrator = build_orchestrator();
        let result = orchestrator.analyze("give me some interesting insights").await;
        match result {
            AnalyzeResult::Suggestions { suggestions } => {
                assert!(suggestions.len() >= 5);
            }
            other => panic!("expected Suggestions, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_analyze_descriptive_returns_description() {
        let orchestrator = build_orchestrator();
        let result = orchestrator.analyze("describe what's in this dataset").await;
        assert!(matches!(result, AnalyzeResult::Description { .. }));
    }

    #[tokio::test]
    async fn test_analyze_infeasible_plan_fails_at_plan_stage() {
        let gateway = Arc::new(LlmGateway::new(Box::new(MockLlmClient::new().with_response(
            "conceptual steps to answer the question",
            "1. Join products to sales to find category totals.",
        ))));
        let db: Arc<dyn DatabaseClient> = Arc::new(MockDatabaseClient::with_sales_fixture());
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(900)));
        let orchestrator = Orchestrator::new(db, gateway, sessions);

        let result = orchestrator
            .analyze("What are the different product categories and how many products in each?")
            .await;

        match result {
            AnalyzeResult::Failed { stage, .. } => assert_eq!(stage, "plan"),
            other => panic!("expected Failed(plan), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_success_returns_interpretation() {
        let orchestrator = build_orchestrator();
        let analyzed = orchestrator
            .analyze("How many sales happened on 2025-04-11?")
            .await;
        let AnalyzeResult::NeedsSqlApproval {
            session_id,
            generated_sql,
            ..
        } = analyzed
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

    #[tokio::test]
    async fn test_execute_is_single_use() {
        let orchestrator = build_orchestrator();
        let analyzed = orchestrator
            .analyze("How many sales happened on 2025-04-11?")
            .await;
        let AnalyzeResult::NeedsSqlApproval {
            session_id,
            generated_sql,
            ..
        } = analyzed
        else {
            panic!("expected NeedsSqlApproval");
        };

        let first = orchestrator.execute(&session_id, &generated_sql).await;
        assert!(!matches!(first, ExecuteResult::SessionMissing));

        let second = orchestrator.execute(&session_id, &generated_sql).await;
        assert!(matches!(second, ExecuteResult::SessionMissing));
    }

    #[tokio::test]
    async fn test_execute_failure_returns_debug_suggestion() {
        let orchestrator = build_orchestrator();
        let analyzed = orchestrator
            .analyze("How many sales happened on 2025-04-11?")
            .await;
        let AnalyzeResult::NeedsSqlApproval { session_id, .. } = analyzed else {
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
                assert!(debug_suggestion.is_some());
            }
            other => panic!("expected ExecutionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_missing_session() {
        let orchestrator = build_orchestrator();
        let result = orchestrator.execute("nonexistent", "SELECT 1").await;
        assert!(matches!(result, ExecuteResult::SessionMissing));
    }
}
