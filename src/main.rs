mod chat;
mod config;
mod device;
mod handlers;
mod pipeline;
mod replies;
mod router;
mod services;
mod utils;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat::ChatClient;
use config::{Config, Credentials};
use device::SshSessionFactory;
use pipeline::RunSettings;
use services::{CommandService, SenderPolicy};

/// Application state shared across handlers
pub struct AppState {
    pub commands: Arc<CommandService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confbot=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let cfg = Config::load();
    if cfg.access_token.is_empty() {
        tracing::warn!("CHAT_ACCESS_TOKEN not set - chat API calls will be rejected");
    }
    if cfg.allowed_domain.is_empty() {
        tracing::warn!("ALLOWED_DOMAIN not set - all commands will be ignored");
    }
    tracing::info!("Starting confbot");
    tracing::info!("Core device: {} (VLAN {})", cfg.core_device, cfg.core_vlan);
    tracing::info!("Source configs: {}", cfg.source_config_dir.display());
    tracing::info!("Listen: {}", cfg.listen_addr);

    let credentials = Credentials::load(&cfg.credentials_file)?;

    for dir in [&cfg.source_config_dir, &cfg.inventory_dir, &cfg.running_config_dir] {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::warn!("Failed to create directory {}: {}", dir.display(), e);
        }
    }

    let chat = ChatClient::new(cfg.chat_api_url.clone(), cfg.access_token.clone())?;
    let sessions = SshSessionFactory::new(credentials, cfg.connect_timeout, cfg.command_timeout);

    let commands = CommandService::new(
        Arc::new(chat),
        Arc::new(sessions),
        SenderPolicy::new(cfg.bot_email.clone(), cfg.allowed_domain.clone()),
        RunSettings::from_config(&cfg),
    );

    let state = Arc::new(AppState {
        commands: Arc::new(commands),
    });

    // Build router
    let app = router::build(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("confbot listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("confbot shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
