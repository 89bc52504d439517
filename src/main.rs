use std::future::Future;
use std::io;

use anyhow::{anyhow, Context};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use academic_records::{config::AppConfig, db, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        environment = %config.environment,
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let migration_pool = pool.clone();
    let applied = tokio::task::spawn_blocking(move || {
        let mut conn = migration_pool
            .get()
            .map_err(|err| anyhow!("failed to acquire migration connection: {err}"))?;
        db::run_migrations(&mut conn)
    })
    .await
    .context("migration task panicked")??;
    tracing::info!(applied, "database schema up to date");

    let bind_target = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config);
    let app = routes::create_router(state);

    let listener = TcpListener::bind(bind_target.as_str())
        .await
        .with_context(|| format!("failed to bind {bind_target}"))?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    wait_for_shutdown(signal::ctrl_c()).await
}

/// Resolves once `signal` fires. A listener that fails to install never resolves.
async fn wait_for_shutdown<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => tracing::info!("received shutdown signal"),
        Err(err) => {
            tracing::error!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
