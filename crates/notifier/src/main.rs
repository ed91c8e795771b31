//! Herald notification worker binary.

use std::sync::Arc;
use std::time::Duration;

use herald_common::config::AppConfig;
use herald_common::logging::init_tracing;
use herald_notifier::NotificationWorker;
use herald_queue::{QueueProcessor, RedisQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("herald_notifier=info,herald_queue=info,herald_common=info");

    tracing::info!("Herald notifier starting...");

    let config = AppConfig::from_env()?;

    let queue = match RedisQueue::connect(&config.redis_url).await {
        Ok(queue) => queue,
        Err(e) => {
            tracing::error!(error = %e, "Redis client not connected to the server");
            return Err(e);
        }
    };

    // Jobs a previous worker was holding when it died go back on the wait list.
    queue.recover(&config.queue_name).await?;

    let processor = QueueProcessor::new(
        Arc::new(queue),
        Duration::from_secs(config.poll_timeout_secs),
    );
    let worker = NotificationWorker::from_config(&config);

    let runner = processor.clone();
    let queue_name = config.queue_name.clone();
    let concurrency = config.concurrency;
    let mut run = tokio::spawn(async move { worker.run(&runner, &queue_name, concurrency).await });

    // Run until the worker exits or Ctrl+C, then let in-flight jobs finish.
    tokio::select! {
        result = &mut run => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, draining in-flight jobs...");
            processor.shutdown();
            run.await??;
        }
    }

    tracing::info!("Herald notifier stopped.");
    Ok(())
}
