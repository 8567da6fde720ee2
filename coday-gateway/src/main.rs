//! Gateway binary entrypoint: CLI args, tracing init, router wiring.

use anyhow::Context;
use clap::Parser;
use coday_core::runtime::Agent;
use coday_core::runtime::AiClientRuntime;
use coday_core::runtime::AnthropicProvider;
use coday_gateway::state::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "coday-gateway", about = "Coday session gateway")]
struct Cli {
    /// Directory holding per-project thread storage.
    #[arg(long, default_value = "./coday-projects")]
    projects_root: PathBuf,

    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Anthropic API key; falls back to the `ANTHROPIC_API_KEY` env var.
    #[arg(long, env = "ANTHROPIC_API_KEY")]
    anthropic_api_key: String,

    /// System instructions for the single agent this gateway process speaks as.
    #[arg(long, default_value = "You are Coday, a helpful engineering assistant.")]
    agent_instructions: String,

    /// Provider model name; omit to use the provider's default.
    #[arg(long)]
    model_name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let provider = Arc::new(AnthropicProvider::new(cli.anthropic_api_key));
    let runtime = Arc::new(AiClientRuntime::new(provider));
    let mut agent = Agent::new("coday", cli.agent_instructions);
    agent.model_name = cli.model_name;
    let state = AppState::new(cli.projects_root, runtime, agent);

    let app = coday_gateway::router(state);
    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;

    tracing::info!(addr = %cli.listen, "coday-gateway listening");
    axum::serve(listener, app)
        .await
        .context("gateway server exited with an error")?;

    Ok(())
}
