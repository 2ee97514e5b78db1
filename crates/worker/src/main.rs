use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use testrun_db::PgStore;
use testrun_worker::config::WorkerConfig;
use testrun_worker::executor::Executor;
use testrun_worker::queue::PgCommandSource;
use testrun_worker::runner::TestRunner;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "testrun_worker=debug,testrun_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    tracing::info!(
        worker = %config.worker_name,
        runner = %config.test_runner.join(" "),
        app_root = %config.app_root.display(),
        "Loaded worker configuration",
    );

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = testrun_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    testrun_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    let executor = Executor::new(
        config.worker_name.clone(),
        config.poll_interval,
        config.app_root.clone(),
        Arc::new(PgCommandSource::new(pool.clone())),
        Arc::new(PgStore::new(pool)),
        TestRunner::new(&config.test_runner, config.run_timeout),
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    executor.run(cancel).await;
    tracing::info!("Worker stopped");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
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
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), stopping"),
        () = terminate => tracing::info!("Received SIGTERM, stopping"),
    }
}
