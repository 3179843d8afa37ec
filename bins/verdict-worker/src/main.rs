mod coordinator;
mod demux;
mod executor;
#[cfg(test)]
mod grading_tests;
mod harness;
mod progress;
mod sandbox;

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Semaphore;
use tracing::{error, info};
use verdict_common::config::Config;
use verdict_common::queue;
use verdict_common::store::SubmissionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Verdict worker booting...");

    let config = Config::from_env()?;

    let store = SubmissionStore::connect(&config.mongo_uri, &config.mongo_db)
        .await
        .context("Failed to connect to MongoDB")?;
    info!("Connected to MongoDB: {}", config.mongo_uri);

    let redis_url = config.redis_url();
    let client = redis::Client::open(redis_url.as_str())?;
    let mut redis_conn = redis::aio::ConnectionManager::new(client).await?;
    info!("Connected to Redis: {}", redis_url);

    let sandbox = sandbox::DockerSandbox::connect(&config.docker_socket)
        .context("Failed to connect to Docker daemon")?;
    info!("Connected to Docker daemon: {}", config.docker_socket);

    let executor = executor::Executor::new(sandbox, executor::ExecutorConfig::from_config(&config));
    let emitter = progress::ProgressEmitter::new(config.push_endpoints.clone());
    let coordinator = Arc::new(coordinator::Coordinator::new(store, executor, emitter));

    info!(
        concurrency = config.worker_concurrency,
        queue = queue::SUBMISSION_QUEUE,
        "Worker ready"
    );

    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("Received shutdown signal, draining queue...");
    };

    tokio::select! {
        result = worker_loop(&mut redis_conn, coordinator, config.worker_concurrency) => result?,
        _ = shutdown => {}
    }

    info!("Worker shutdown complete");
    Ok(())
}

async fn worker_loop(
    redis_conn: &mut redis::aio::ConnectionManager,
    coordinator: Arc<coordinator::Coordinator<sandbox::DockerSandbox>>,
    concurrency: usize,
) -> anyhow::Result<()> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    loop {
        // Take a slot before popping so jobs are never held outside a
        // grading task.
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");

        // BLPOP with a timeout so shutdown is polled between jobs.
        match queue::pop_job(redis_conn, 5.0).await {
            Ok(Some(job)) => {
                info!(
                    submission_id = %job.submission_id,
                    language = %job.language,
                    test_count = job.problem.testcases.len(),
                    "Received job"
                );
                let coordinator = coordinator.clone();
                tokio::spawn(async move {
                    coordinator.handle_job(&job).await;
                    drop(permit);
                });
            }
            Ok(None) => drop(permit),
            Err(e) => {
                drop(permit);
                error!(error = %e, "Redis error");
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            }
        }
    }
}
