//! Error types for the orchestration pipeline.
//!
//! Defines the main error enum used throughout the application, with one
//! variant per pipeline stage in the error taxonomy.

use thiserror::Error;

/// Main error type for orchestrator operations.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Context Provider failures (schema missing/unreadable).
    #[error("Context error: {0}")]
    Context(String),

    /// Intent Classifier failures (surfaced only when fallback also fails).
    #[error("Intent classification error: {0}")]
    Intent(String),

    /// Planner/Plan Validator failures (empty plan, infeasible verdict).
    #[error("Plan error: {0}")]
    Plan(String),

    /// SQL Synthesizer failed to produce any statement.
    #[error("SQL synthesis error: {0}")]
    SqlSynth(String),

    /// SQL Executor returned an engine error.
    #[error("Execution error: {0}")]
    Exec(String),

    /// Unknown or expired session id on `execute`.
    #[error("Session not found or expired")]
    SessionMissing,

    /// LLM Gateway transport failure (network/provider).
    #[error("LLM transport error: {0}")]
    LlmTransport(String),

    /// LLM provider rejected the request as unauthenticated. Distinct from
    /// `LlmTransport` because retrying it can never succeed.
    #[error("LLM authentication error: {0}")]
    LlmAuth(String),

    /// LLM Gateway call exceeded its deadline.
    #[error("LLM call timed out: {0}")]
    LlmTimeout(String),

    /// LLM provider reported a quota/rate-limit failure.
    #[error("LLM quota exceeded: {0}")]
    LlmQuota(String),

    /// LLM returned an empty completion.
    #[error("LLM returned an empty response: {0}")]
    LlmEmpty(String),

    /// Store connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn context(msg: impl Into<String>) -> Self {
        Self::Context(msg.into())
    }

    pub fn intent(msg: impl Into<String>) -> Self {
        Self::Intent(msg.into())
    }

    pub fn plan(msg: impl Into<String>) -> Self {
        Self::Plan(msg.into())
    }

    pub fn sql_synth(msg: impl Into<String>) -> Self {
        Self::SqlSynth(msg.into())
    }

    pub fn exec(msg: impl Into<String>) -> Self {
        Self::Exec(msg.into())
    }

    pub fn llm_transport(msg: impl Into<String>) -> Self {
        Self::LlmTransport(msg.into())
    }

    pub fn llm_auth(msg: impl Into<String>) -> Self {
        Self::LlmAuth(msg.into())
    }

    pub fn llm_timeout(msg: impl Into<String>) -> Self {
        Self::LlmTimeout(msg.into())
    }

    pub fn llm_quota(msg: impl Into<String>) -> Self {
        Self::LlmQuota(msg.into())
    }

    pub fn llm_empty(msg: impl Into<String>) -> Self {
        Self::LlmEmpty(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the stage tag used in `Failed{stage, reason}` / `kind="error"`
    /// responses.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Context(_) => "context",
            Self::Intent(_) => "intent",
            Self::Plan(_) => "plan",
            Self::SqlSynth(_) => "sql_synth",
            Self::Exec(_) => "exec",
            Self::SessionMissing => "session_missing",
            Self::LlmTransport(_) => "llm_transport",
            Self::LlmAuth(_) => "llm_auth",
            Self::LlmTimeout(_) => "llm_timeout",
            Self::LlmQuota(_) => "llm_quota",
            Self::LlmEmpty(_) => "llm_empty",
            Self::Connection(_) => "connection",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias using OrchestratorError.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_stage_tags() {
        assert_eq!(OrchestratorError::context("x").stage(), "context");
        assert_eq!(OrchestratorError::plan("x").stage(), "plan");
        assert_eq!(OrchestratorError::sql_synth("x").stage(), "sql_synth");
        assert_eq!(OrchestratorError::exec("x").stage(), "exec");
        assert_eq!(OrchestratorError::SessionMissing.stage(), "session_missing");
        assert_eq!(OrchestratorError::llm_timeout("x").stage(), "llm_timeout");
    }

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::plan("unknown table 'products'");
        assert_eq!(err.to_string(), "Plan error: unknown table 'products'");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OrchestratorError>();
    }
}
