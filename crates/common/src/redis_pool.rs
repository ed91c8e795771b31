use redis::Client;
use redis::aio::ConnectionManager;

/// Create a Redis connection manager for async operations.
///
/// The manager reconnects transparently, so callers clone it freely instead
/// of pooling connections.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!(redis_url, "Redis client connected to the server");
    Ok(manager)
}
