mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use recap_api::{AppState, Collaborators, Executor, FetchSettings};
use recap_db::Database;
use recap_slack::{SlackClient, SlackClientConfig, WebhookClient};
use recap_summarizer::{GeminiClient, GeminiConfig, GeminiSummarizer};
use recap_types::api::ConfiguredCredentials;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recap_server=debug,recap_api=debug,recap_slack=debug,recap_summarizer=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);

    let slack = SlackClient::new(SlackClientConfig {
        api_base: config.slack_api_base.clone(),
        bot_token: config.slack_bot_token.clone(),
        request_timeout: config.slack_timeout,
        page_size: config.page_size,
        page_delay: config.page_delay,
        ..Default::default()
    })?;
    let webhook = WebhookClient::new(config.webhook_timeout)?;

    let gemini = match &config.gemini_api_key {
        Some(key) => Some(GeminiClient::new(GeminiConfig {
            api_base: config.gemini_api_base.clone(),
            api_key: key.clone(),
            model: config.gemini_model.clone(),
            ..Default::default()
        })?),
        None => None,
    };

    let executor = Executor::new(
        Collaborators {
            platform: Arc::new(slack),
            summarizer: Arc::new(GeminiSummarizer::new(gemini)),
            sink: Arc::new(webhook),
            db,
        },
        FetchSettings {
            page_size: config.page_size,
            page_delay: config.page_delay,
            author_lookup_delay: config.author_lookup_delay,
        },
        config.max_concurrent_jobs,
    );

    let state = AppState {
        executor: executor.clone(),
        inline_budget: config.inline_budget,
        configured: ConfiguredCredentials {
            slack_bot_token: true,
            gemini_api_key: config.gemini_api_key.is_some(),
        },
    };

    let app = recap_api::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Recap bot listening on {}", addr);
    info!(
        "Worker pool: {} jobs, inline budget {:?}",
        config.max_concurrent_jobs, config.inline_budget
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining background jobs");
    if !executor.shutdown(config.shutdown_drain).await {
        warn!("Exiting with unfinished jobs; their results will not be delivered");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
