//! dataloom - A conversational data-analysis backend.

mod config;
mod context;
mod db;
mod debugger;
mod descriptive;
mod error;
mod executor;
mod http;
mod intent;
mod llm;
mod logging;
mod orchestrator;
mod planner;
mod safety;
mod session;
mod synth;
mod validator;

use std::sync::Arc;

use config::Config;
use error::{OrchestratorError, Result};
use llm::{AnthropicClient, AnthropicConfig, LlmClient, LlmProvider, MockLlmClient, OpenAiClient, OpenAiConfig};
use llm::gateway::LlmGateway;
use orchestrator::Orchestrator;
use session::SessionStore;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    logging::init_logging();

    if let Err(e) = run().await {
        tracing::error!("{}: {}", e.stage(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load_from_file(&config_path)?;

    info!(database = %config.database.display_string(), "Connecting to store");
    let db_client = db::connect(&config.database).await?;
    let db: Arc<dyn db::DatabaseClient> = Arc::from(db_client);

    let llm_provider = resolve_llm_provider(&config.llm.provider)?;
    info!(provider = %llm_provider, model = %config.llm.model, "Initializing LLM client");
    let llm_client = build_llm_client(llm_provider, &config.llm.model)?;
    let gateway = Arc::new(LlmGateway::new(llm_client));

    let ttl = std::time::Duration::from_secs(config.server.session_ttl_seconds);
    let sessions = Arc::new(SessionStore::new(ttl));
    let _sweeper = session::spawn_sweeper(sessions.clone());

    let orchestrator = Orchestrator::with_schema_path(db, gateway, sessions, config.schema_path.clone());
    let state = Arc::new(http::AppState { orchestrator });
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .map_err(|e| OrchestratorError::connection(format!("Failed to bind listener: {e}")))?;
    info!(addr = %config.server.bind_addr, "Listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| OrchestratorError::internal(format!("HTTP server error: {e}")))?;

    Ok(())
}

/// Resolves the configured LLM provider, defaulting to `mock` only when
/// nothing is configured so a freshly checked-out repo still boots.
fn resolve_llm_provider(provider_str: &str) -> Result<LlmProvider> {
    if provider_str.is_empty() {
        return Ok(LlmProvider::Mock);
    }
    provider_str.parse::<LlmProvider>().map_err(|_| {
        OrchestratorError::config(format!(
            "Invalid LLM provider '{provider_str}'. Valid options: anthropic, openai, mock"
        ))
    })
}

fn build_llm_client(provider: LlmProvider, model: &str) -> Result<Box<dyn LlmClient>> {
    match provider {
        LlmProvider::Mock => Ok(Box::new(MockLlmClient::new())),
        LlmProvider::Anthropic => {
            let api_key = std::env::var("LLM_API_KEY")
                .map_err(|_| OrchestratorError::config("LLM_API_KEY is required for the anthropic provider"))?;
            Ok(Box::new(AnthropicClient::new(AnthropicConfig::new(
                api_key, model,
            ))?))
        }
        LlmProvider::OpenAi => {
            let api_key = std::env::var("LLM_API_KEY")
                .map_err(|_| OrchestratorError::config("LLM_API_KEY is required for the openai provider"))?;
            Ok(Box::new(OpenAiClient::new(OpenAiConfig::new(api_key, model))?))
        }
    }
}
