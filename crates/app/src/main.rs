use std::sync::Arc;

use clap::Parser;
use migration::{Migrator, MigratorTrait};

mod settings;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("invalid settings: {0}")]
    Settings(#[from] config::ConfigError),
    #[error("database: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("engine: {0}")]
    Engine(#[from] engine::EngineError),
    #[error("parsing service client: {0}")]
    Extractor(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = settings::Cli::parse();
    let settings = settings::Settings::new(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "splitsphere={level},server={level},engine={level},tower_http={level}",
            level = settings.app.level
        ))
        .init();

    let db = connect_database(&settings.server.database).await?;

    let mut builder = engine::Engine::builder()
        .database(db)
        .config(settings.engine_config());
    if let Some(endpoint) = settings.parser.endpoint.as_deref() {
        tracing::info!("Found parser settings...");
        let extractor = server::HttpExtractor::new(
            endpoint,
            settings.parser.api_key.clone(),
            std::time::Duration::from_secs(settings.parser.timeout_secs),
        )
        .map_err(|err| AppError::Extractor(err.to_string()))?;
        builder = builder.extractor(Arc::new(extractor));
    }
    let engine = builder.build().await?;

    let addr = format!("{}:{}", settings.server.bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let state = server::ServerState::new(engine, settings.auth_config());
    server::run_with_listener(state, settings.server_config(), listener, shutdown_signal()).await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn connect_database(url: &str) -> Result<sea_orm::DatabaseConnection, AppError> {
    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested, draining connections");
}
