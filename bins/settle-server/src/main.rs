mod error;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use settle_analyzer_http::HttpAnalyzer;
use settle_analyzer_log::LogAnalyzer;
use settle_api::Analyzer;
use settle_engine::Engine;
use settle_engine::config::SettleConfig;

use error::ServerError;

#[derive(Parser)]
#[command(name = "settle-server", about = "Per-channel debounced message batching server")]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(long, default_value = "settle.toml", env = "SETTLE_CONFIG")]
    config: String,

    /// Override `batching.timeout_secs`.
    #[arg(long, env = "BATCH_TIMEOUT_SECONDS")]
    batch_timeout_secs: Option<u64>,
}

impl Cli {
    fn load_config(&self) -> Result<SettleConfig, ServerError> {
        let mut config = SettleConfig::load_or_default(&self.config)?;
        if let Some(secs) = self.batch_timeout_secs {
            config.batching.timeout_secs = secs;
        }
        config.batching.validate()?;
        Ok(config)
    }
}

fn build_analyzer(config: &SettleConfig) -> Result<Arc<dyn Analyzer>, ServerError> {
    match &config.analyzer.url {
        Some(url) => {
            let timeout = Duration::from_secs(config.analyzer.request_timeout_secs);
            let analyzer = HttpAnalyzer::new(url.clone(), timeout)
                .map_err(|e| ServerError::Config(format!("analyzer: {e}")))?;
            tracing::info!(url = %url, timeout_secs = timeout.as_secs(), "using http analyzer");
            Ok(Arc::new(analyzer))
        }
        None => {
            tracing::warn!("no analyzer.url configured, messages are only logged");
            Ok(Arc::new(LogAnalyzer::new()))
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!(error = %e, "settle-server failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    tracing::info!(config = %cli.config, "loading configuration");
    let config = cli.load_config()?;

    let analyzer = build_analyzer(&config)?;
    let mut engine = Engine::start(&config.batching, analyzer)?;

    let token = CancellationToken::new();
    let mut api = tokio::spawn({
        let control = Arc::new(engine.handle());
        let archive_base_url = config.slack.archive_base_url.clone();
        let token = token.clone();
        let port = config.api_port;
        async move { settle_api_server::run(port, control, &archive_base_url, token).await }
    });
    tracing::info!(port = config.api_port, "settle-server started, press Ctrl+C to stop");

    // SIGHUP reloads the batching config, Ctrl+C shuts down.
    let mut sighup =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;

    let mut api_result = None;
    loop {
        tokio::select! {
            _ = sighup.recv() => {
                tracing::info!(config = %cli.config, "SIGHUP received, reloading configuration");
                match cli
                    .load_config()
                    .and_then(|c| engine.reconfigure(&c.batching).map_err(ServerError::from))
                {
                    Ok(()) => tracing::info!("configuration reloaded successfully"),
                    Err(e) => tracing::error!(error = %e, "configuration reload failed (keeping old config)"),
                }
            }
            res = &mut api => {
                api_result = Some(res);
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down...");
                break;
            }
        }
    }

    token.cancel();
    let api_result = match api_result {
        Some(res) => res,
        None => api.await,
    };
    engine.shutdown().await;

    api_result??;
    Ok(())
}
