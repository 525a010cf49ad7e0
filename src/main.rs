//! Skilltree - gamified skill tracking API

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skilltree::{
    config::{Args, StoreKind},
    db::{MongoConnection, SkillStore, Store},
    logging::ActivityLogger,
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("skilltree={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Skilltree {}", env!("CARGO_PKG_VERSION"));
    info!("  commit {}", env!("GIT_COMMIT_SHORT"));
    info!("======================================");
    info!("Instance ID: {}", args.instance_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Store: {:?}", args.store_kind());
    info!("======================================");

    let jwt = args.jwt_validator()?;

    let store = match args.store_kind() {
        StoreKind::Memory => {
            warn!("Using in-memory store - data is lost on restart");
            Store::memory()
        }
        StoreKind::Mongo => {
            info!("MongoDB: {} (db: {})", args.mongodb_uri, args.mongodb_db);
            let connection = Arc::new(MongoConnection::new(&args.mongodb_uri, &args.mongodb_db));
            // A failed warm-up is retried by the first request
            match connection.ensure_connected().await {
                Ok(_) => info!("MongoDB connected successfully"),
                Err(e) => warn!("MongoDB not reachable yet, will retry on demand: {}", e),
            }
            Store::mongo(connection)
        }
    };
    let store = Arc::new(store);

    let activity = ActivityLogger::new(args.instance_id.to_string());
    if let Some(path) = args.activity_log.clone() {
        if let Err(e) = activity.init_file(path).await {
            warn!("Activity log disabled: {}", e);
        }
    }

    let state = Arc::new(AppState::new(args, Arc::clone(&store), jwt, activity));

    let result = server::run(state, shutdown_signal()).await;

    if let Err(e) = store.shutdown().await {
        warn!("Store shutdown failed: {}", e);
    }

    if let Err(e) = result {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    info!("Skilltree stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
