//! openBIS Server - Main entry point

use anyhow::Result;
use clap::Parser;
use openbis_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use openbis_server::{
    api,
    config::Config,
    db,
    features::{operation_executions::maintenance, queries::QueryDatabases, AppState},
    index::IndexSync,
};

/// openBIS V3 API server
#[derive(Parser, Debug)]
#[command(name = "openbis-server", version, about)]
struct Args {
    /// TOML file with query databases, maintenance and execution settings
    #[arg(short, long, env = "OPENBIS_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Address to bind, overrides OPENBIS_HOST
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides OPENBIS_PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_config = LogConfig::builder()
        .log_file_prefix("openbis-server".to_string())
        .filter_directives("openbis_server=debug,access_log=info,tower_http=debug,sqlx=warn".to_string())
        .build();

    // Environment variables take precedence
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    info!("Starting openBIS Server");

    let mut config = Config::load_from(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    let config = Arc::new(config);
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let pool = db::connect(&config.database).await?;
    info!("Database connection pool established");

    db::migrate(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    if let Some(password) = &config.session.admin_password {
        db::bootstrap_admin(&pool, &config.session.admin_user, password).await?;
    }

    maintenance::recover_interrupted(&pool).await?;

    let query_databases = QueryDatabases::connect(pool.clone(), &config).await?;
    info!(databases = query_databases.iter().count(), "Query databases ready");

    let cancel = CancellationToken::new();

    let index = IndexSync::new();
    index.rebuild(&pool).await?;
    let index_worker = index.spawn_worker(
        pool.clone(),
        Duration::from_millis(config.index.poll_interval_ms),
        cancel.clone(),
    );
    let maintenance_tasks = maintenance::spawn(&pool, &config.maintenance, cancel.clone());

    let state = AppState {
        db: pool.clone(),
        config: config.clone(),
        index,
        query_databases,
    };
    let app = api::create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    cancel.cancel();
    let _ = index_worker.await;
    for task in maintenance_tasks {
        let _ = task.await;
    }
    pool.close().await;

    info!("Server shut down gracefully");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
