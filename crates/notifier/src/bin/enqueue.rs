//! Push a notification job onto the notifier's queue.
//!
//! Usage: `herald-enqueue <phone_number> <message>`

use herald_common::config::AppConfig;
use herald_common::logging::init_tracing;
use herald_common::types::NotificationData;
use herald_queue::{JobQueue, RedisQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("herald_queue=info");

    let mut args = std::env::args().skip(1);
    let (Some(phone_number), Some(message)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: herald-enqueue <phone_number> <message>");
    };

    let config = AppConfig::from_env()?;
    let queue = RedisQueue::connect(&config.redis_url).await?;

    let data = serde_json::to_value(NotificationData {
        phone_number,
        message,
    })?;
    let job = queue.enqueue(&config.queue_name, data).await?;

    tracing::info!(job_id = %job.id, queue = %config.queue_name, "Notification job created");
    Ok(())
}
