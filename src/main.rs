//! mentord — mentor chat backend.
//!
//! Loads configuration, opens the SQLite store, constructs the completion
//! client (real or mock), wires the pipeline, and serves the HTTP API.

#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use mentord::completion::mock::MockClient;
use mentord::completion::openai::OpenAiClient;
use mentord::completion::CompletionClient;
use mentord::config::{load_config, Config};
use mentord::pipeline::summary::SummaryUpdater;
use mentord::pipeline::MentorPipeline;
use mentord::server::{serve, AppState};
use mentord::store::{MessageLog, SummaryStore};

#[derive(Parser, Debug)]
#[command(name = "mentord", version, about = "Mentor chat backend")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "MENTORD_CONFIG", default_value = "mentord.toml")]
    config: PathBuf,

    /// Override the configured bind address.
    #[arg(long, env = "MENTORD_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load `.env` before resolving the API key env var.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // A missing config file is not fatal: fall back to the demo defaults,
    // exactly like a missing mentor-config has always behaved.
    let config = if cli.config.exists() {
        Arc::new(load_config(&cli.config).context("failed to load configuration")?)
    } else {
        let config = Config::default();
        config.validate().context("default configuration invalid")?;
        Arc::new(config)
    };

    let _logging_guard = match &config.logging.logs_dir {
        Some(dir) => Some(
            mentord::logging::init_production(std::path::Path::new(dir))
                .context("failed to initialise logging")?,
        ),
        None => {
            mentord::logging::init_console();
            None
        }
    };

    if !cli.config.exists() {
        warn!(path = %cli.config.display(), "config file not found, using demo defaults");
    }
    info!(school = %config.mentor.school_name, "mentord starting");

    let store = SummaryStore::connect(std::path::Path::new(&config.storage.database_path))
        .await
        .context("failed to open summary store")?;
    let log = MessageLog::new(store.pool().clone());

    let timeout = Duration::from_secs(config.completion.timeout_secs);
    let (chat_client, summary_client): (Arc<dyn CompletionClient>, Arc<dyn CompletionClient>) =
        if config.completion.mock_mode {
            info!("mock mode enabled, completion service will not be called");
            let mock = Arc::new(MockClient::new());
            (Arc::clone(&mock) as _, mock as _)
        } else {
            let api_key = std::env::var(&config.completion.api_key_env).ok();
            if api_key.is_none() {
                warn!(
                    var = %config.completion.api_key_env,
                    "API key missing, completion calls will fail until it is set"
                );
            }
            let chat = OpenAiClient::new(
                config.completion.model.clone(),
                api_key.clone(),
                timeout,
            )
            .context("failed to build completion client")?;
            let summary = OpenAiClient::new(
                config.completion.summary_model.clone(),
                api_key,
                timeout,
            )
            .context("failed to build summary completion client")?;
            (Arc::new(chat) as _, Arc::new(summary) as _)
        };

    let updater = Arc::new(SummaryUpdater::new(
        Arc::clone(&config),
        store.clone(),
        summary_client,
    ));
    let pipeline = MentorPipeline::new(
        Arc::clone(&config),
        store.clone(),
        log,
        Arc::clone(&chat_client),
        updater,
    );

    let state = Arc::new(AppState {
        pipeline,
        store,
        client: chat_client,
    });

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    serve(state, &bind, &config.server.static_dir).await
}
