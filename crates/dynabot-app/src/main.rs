//! Dynabot application binary - composition root.
//!
//! 1. Parse CLI flags, install tracing, then load configuration from TOML
//! 2. Prepare the data directory
//! 3. Start the Gemini session (a failure is logged, not fatal)
//! 4. Resume analytics and build the chat orchestrator
//! 5. Serve the HTTP API until Ctrl-C

mod cli;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter};

use dynabot_api::state::AppState;
use dynabot_chat::{ChatOrchestrator, GeminiProvider, GenerationProvider};
use dynabot_core::types::DataDir;

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Tracing. The filter is provisional until the config file is read.
    let (filter, filter_handle) =
        reload::Layer::new(env_filter(args.log_level.as_deref().unwrap_or("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    tracing::info!("Starting Dynabot v{}", env!("CARGO_PKG_VERSION"));

    // Config.
    let (config_file, config) = args.load_config();
    if let Err(e) = filter_handle.reload(env_filter(&config.general.log_level)) {
        tracing::warn!(error = %e, "Failed to apply configured log level");
    }
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Data directory.
    let data_dir = DataDir::new(config.general.data_dir.clone()).path();
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    tracing::info!(path = %data_dir.display(), "Data directory ready");

    // Provider session.
    let session = GeminiProvider::from_config(&config.provider)
        .map(|provider| Box::new(provider) as Box<dyn GenerationProvider>);
    if session.is_err() {
        tracing::warn!("Set GEMINI_API_KEY or provider.api_key to enable responses");
    }

    if config.voice.enabled {
        tracing::info!("Voice input is library-only; the HTTP server accepts text turns");
    }

    let orchestrator = ChatOrchestrator::new(&config, session);
    let state = AppState::new(config, orchestrator);

    if let Err(e) = dynabot_api::start_server(state).await {
        tracing::error!(error = %e, "API server failed");
        return Err(e.into());
    }

    Ok(())
}

/// RUST_LOG wins over the configured level.
fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}
