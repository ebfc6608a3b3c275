//! HTTP transport: the `axum` router exposing `POST /analyze` and
//! `POST /execute` over the Orchestrator.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::orchestrator::{AnalyzeResult, ExecuteResult, Orchestrator};
use crate::planner::Plan;

/// Shared state handed to every handler.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Builds the router. `with_state` wires the shared orchestrator in, along
/// with request tracing so every call is logged with its latency.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/execute", post(execute))
        .route("/health", axum::routing::get(health))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    utterance: String,
    /// Reserved for a future follow-up-turn flow; the current pipeline
    /// treats every `analyze` call as the start of a fresh turn.
    #[allow(dead_code)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind")]
#[serde(rename_all = "snake_case")]
enum AnalyzeResponse {
    Sql {
        session_id: String,
        sql: String,
        warnings: Vec<String>,
        plan: Vec<String>,
    },
    Suggestions {
        suggestions: Vec<String>,
    },
    Description {
        text: String,
    },
    Error {
        stage: String,
        message: String,
    },
}

impl From<AnalyzeResult> for AnalyzeResponse {
    fn from(result: AnalyzeResult) -> Self {
        match result {
            AnalyzeResult::NeedsSqlApproval {
                session_id,
                generated_sql,
                warnings,
                plan,
            } => AnalyzeResponse::Sql {
                session_id,
                sql: generated_sql,
                warnings,
                plan: plan_items(&plan),
            },
            AnalyzeResult::Suggestions { suggestions } => {
                AnalyzeResponse::Suggestions { suggestions }
            }
            AnalyzeResult::Description { text } => AnalyzeResponse::Description { text },
            AnalyzeResult::Failed { stage, reason } => AnalyzeResponse::Error {
                stage,
                message: reason,
            },
        }
    }
}

fn plan_items(plan: &Plan) -> Vec<String> {
    plan.items.clone()
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    let result = state.orchestrator.analyze(&request.utterance).await;
    Json(result.into())
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    session_id: String,
    approved_sql: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind")]
#[serde(rename_all = "snake_case")]
enum ExecuteResponse {
    Result {
        rows: Vec<Vec<String>>,
        columns: Vec<String>,
        row_count: usize,
        truncated: bool,
        interpretation: String,
    },
    ExecError {
        engine_error: String,
        debug_suggestion: Option<String>,
    },
    SessionMissing {},
}

async fn execute(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteRequest>,
) -> (StatusCode, Json<ExecuteResponse>) {
    let result = state
        .orchestrator
        .execute(&request.session_id, &request.approved_sql)
        .await;

    match result {
        ExecuteResult::Success {
            rows,
            columns,
            interpretation,
            row_count,
            truncated,
        } => (
            StatusCode::OK,
            Json(ExecuteResponse::Result {
                rows,
                columns,
                row_count,
                truncated,
                interpretation,
            }),
        ),
        ExecuteResult::ExecutionFailed {
            engine_error,
            debug_suggestion,
        } => (
            StatusCode::OK,
            Json(ExecuteResponse::ExecError {
                engine_error,
                debug_suggestion,
            }),
        ),
        ExecuteResult::SessionMissing => (
            StatusCode::NOT_FOUND,
            Json(ExecuteResponse::SessionMissing {}),
        ),
    }
}
