use anyhow::Result;
use colored::*;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use support_chat::config::Config;
use support_chat::http::{AppState, router};
use support_chat::service::SupportService;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the chat on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();

    if !config.has_credential() {
        eprintln!(
            "{} {} is not set. Set it in your environment before chatting.",
            "warning:".yellow().bold(),
            config.mistral.api_key_env
        );
    }

    let service = SupportService::new(&config)?;

    // Choose surface: stdio (default) or http
    let transport = std::env::var("SUPPORT_TRANSPORT").unwrap_or_else(|_| "stdio".to_string());
    match transport.as_str() {
        "http" => {
            let bind: SocketAddr = config.server.bind.parse().map_err(|e| {
                anyhow::anyhow!("Invalid bind address '{}': {e}", config.server.bind)
            })?;
            let bearer_token = config.server.bearer_token.clone();
            let auth = if bearer_token.is_some() { "bearer" } else { "none" };

            let app = router(AppState::new(service), bearer_token);
            let listener = tokio::net::TcpListener::bind(bind).await?;
            tracing::info!(%bind, auth, "Starting support chat HTTP server");

            axum::serve(listener, app).await?;
            Ok(())
        }
        _ => {
            support_chat::repl::run(&service).await?;
            Ok(())
        }
    }
}
