//! Site Inspector Bot Entry Point
//!
//! Loads settings, wires the pipeline components, then runs the Telegram
//! long-poll loop next to the health/metrics server until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use site_inspector_agent::{HandlerComponents, HandlerConfig, MessageHandler};
use site_inspector_config::{load_settings, Settings};
use site_inspector_core::ChatId;
use site_inspector_llm::{AnalysisService, AnalysisServiceConfig, OpenAIBackend, OpenAIConfig};
use site_inspector_persistence::build_log;
use site_inspector_pipeline::{
    ValidationLimits, Validator, VoiceProcessor, VoiceProcessorConfig, WhisperConfig, WhisperStt,
};
use site_inspector_rag::build_retriever;
use site_inspector_server::{
    create_router, init_metrics, AppState, BotApiConfig, Dispatcher, Poller, TelegramBot,
    TelegramOps,
};

/// Time given to running events after a shutdown signal
const DRAIN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "site-inspector-bot", version, about = "Construction site violation bot")]
struct Args {
    /// Configuration overlay loaded after config/default.*
    #[arg(long, env = "SITE_INSPECTOR_ENV")]
    env: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let config = match load_settings(args.env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized
            eprintln!(
                "Loaded configuration from files (env: {})",
                args.env.as_deref().unwrap_or("default")
            );
            settings
        },
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };

    init_tracing(&config);

    tracing::info!("Starting Site Inspector Bot v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?config.environment,
        log_backend = ?config.log_sink.backend,
        index_backend = ?config.rag.backend,
        model = %config.llm.model,
        "Configuration loaded"
    );

    config.validate().context("invalid configuration")?;
    if args.check_config {
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    let metrics_handle = if config.server.enabled && config.observability.metrics_enabled {
        let handle = init_metrics()?;
        tracing::info!("Initialized Prometheus metrics at /metrics");
        Some(handle)
    } else {
        None
    };

    let config = Arc::new(config);

    let bot = Arc::new(TelegramBot::new(BotApiConfig::from_settings(&config))?);
    match bot.get_me().await {
        Ok(me) => tracing::info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or("-"),
            "Telegram bot authenticated"
        ),
        Err(e) => anyhow::bail!("Telegram token check failed: {}", e),
    }

    let stt = Arc::new(WhisperStt::new(WhisperConfig::from_settings(&config))?);
    let voice = VoiceProcessor::new(stt, VoiceProcessorConfig::from_settings(&config));

    let retriever = Arc::new(
        build_retriever(&config)
            .await
            .context("failed to open the regulation index")?,
    );

    let backend = Arc::new(OpenAIBackend::new(OpenAIConfig::from_settings(&config))?);
    let analyzer = Arc::new(AnalysisService::new(
        backend,
        AnalysisServiceConfig::from_settings(&config),
    ));

    let log = build_log(&config)
        .await
        .context("failed to open the interaction log")?;
    match log.health_check().await {
        Ok(()) => tracing::info!(backend = log.name(), "Interaction log reachable"),
        Err(e) => tracing::warn!(
            backend = log.name(),
            error = %e,
            "Interaction log not reachable; rows may fail until it recovers"
        ),
    }

    let ops = Arc::new(TelegramOps::new(
        Arc::clone(&bot),
        config.telegram.admin_chat_id.map(ChatId),
    ));

    let handler = MessageHandler::new(
        HandlerComponents {
            validator: Validator::new(ValidationLimits::from_settings(&config)),
            voice,
            fetcher: bot.clone(),
            retriever,
            analyzer,
            log: log.clone(),
            replies: bot.clone(),
            ops,
        },
        HandlerConfig::from_settings(&config),
    );
    let dispatcher = Dispatcher::new(Arc::new(handler));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let poller = Poller::new(Arc::clone(&bot), dispatcher.clone());
    let polling = tokio::spawn(poller.run(shutdown_rx.clone()));

    if config.server.enabled {
        let mut state = AppState::new(Arc::clone(&config), log, dispatcher.clone());
        if let Some(handle) = metrics_handle {
            state = state.with_metrics(handle);
        }
        let app = create_router(state);

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .context("invalid server address")?;
        tracing::info!("Health server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        let mut server_shutdown = shutdown_rx.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            })
            .await?;
    }

    if let Err(e) = polling.await {
        tracing::error!(error = %e, "Polling task failed");
    }
    dispatcher.drain(DRAIN_GRACE).await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(config: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.observability.log_level;
        format!("site_inspector={},ops=warn,tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if config.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
