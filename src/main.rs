mod api;
mod config;
mod pr;
mod review;
mod store;
#[cfg(test)]
mod testing;
mod webhook;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// PR Review Relay — receives GitHub pull request webhooks, caches their diffs,
/// and runs LLM code reviews on demand for a polling frontend.
#[derive(Parser, Debug)]
#[command(name = "pr-review-relay", version, about)]
struct Cli {
    /// Path to the TOML config file (missing file means defaults)
    #[arg(short, long, env = "REVIEW_RELAY_CONFIG", default_value = ".review-relay.toml")]
    config: PathBuf,

    /// Address to listen on, overriding the config file
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overriding the config file and PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!(path = %cli.config.display(), "loading configuration");
    let mut config = config::Config::load(&cli.config)?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    if config.github.token.is_none() {
        warn!("no GitHub token configured, requests are unauthenticated and heavily rate limited");
    }
    if config.llm.api_key.is_none() {
        warn!("no LLM API key configured, review requests will fail");
    }

    let state = Arc::new(api::AppState::new(
        Arc::new(pr::GitHubClient::new(&config.github)),
        Arc::new(review::ChatCompletionClient::new(&config.llm)),
        config.default_repo(),
    ));
    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, repo = %config.default_repo(), "review relay listening");

    axum::serve(listener, app).await?;

    Ok(())
}
