use image2taxonomy::{
    app_state::AppState,
    config::AppConfig,
    db,
    routes,
    services::{engine::LlamaEngine, processor, queue::JobQueue},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting image2taxonomy worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    describe_metrics();

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!(queue = %config.queue_name, "Connecting to Redis job queue");
    let queue = Arc::new(
        JobQueue::new(&config.redis_url, &config.queue_name).expect("Failed to initialize job queue"),
    );

    // Start the inference server; fatal if it never becomes healthy
    let mut engine = match LlamaEngine::start(config.engine_config()).await {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "Inference engine failed to start");
            std::process::exit(1);
        }
    };

    let state = AppState::new(db_pool.clone(), queue.clone(), engine.client().clone());
    let app = routes::ops_router(state, prometheus_handle);
    let ops_addr = config.ops_bind_addr.clone();
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(&ops_addr).await {
            Ok(listener) => {
                tracing::info!("Ops endpoints listening on {}", ops_addr);
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = %e, "Ops server error");
                }
            }
            Err(e) => tracing::error!(error = %e, addr = %ops_addr, "Failed to bind ops endpoints"),
        }
    });

    tracing::info!(queue = %queue.key(), "Worker ready, starting job processing loop");

    processor::run(queue.as_ref(), &engine, &db_pool, async {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, finishing current job");
    })
    .await;

    engine.shutdown().await;
    tracing::info!("Worker stopped");
}

fn describe_metrics() {
    metrics::describe_counter!(
        "classification_jobs_total",
        "Product analysis jobs picked up by this worker"
    );
    metrics::describe_counter!(
        "classification_jobs_completed",
        "Jobs persisted with status complete"
    );
    metrics::describe_counter!(
        "classification_jobs_failed",
        "Jobs persisted with status failed"
    );
    metrics::describe_counter!(
        "classification_jobs_ignored",
        "Queue entries skipped as foreign or malformed"
    );
    metrics::describe_histogram!(
        "classification_inference_seconds",
        "Time spent in a single classification request"
    );
    metrics::describe_gauge!(
        "classification_queue_depth",
        "Entries waiting in the job queue"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
