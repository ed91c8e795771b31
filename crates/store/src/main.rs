//! Herald store demo binary.
//!
//! Usage: `herald-store [school|schools-hash]` (default: both).

use herald_common::config::AppConfig;
use herald_common::logging::init_tracing;
use herald_common::redis_pool::create_redis_pool;
use herald_store::RedisStore;
use herald_store::schools::{run_school_demo, run_schools_hash_demo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("herald_store=info,herald_common=info");

    let config = AppConfig::from_env()?;

    let redis = match create_redis_pool(&config.redis_url).await {
        Ok(redis) => redis,
        Err(e) => {
            tracing::error!(error = %e, "Redis client not connected to the server");
            return Err(e);
        }
    };
    let store = RedisStore::new(redis);

    let command = std::env::args().nth(1).unwrap_or_else(|| "all".to_string());

    match command.as_str() {
        "school" => run_school_demo(&store).await?,
        "schools-hash" => {
            run_schools_hash_demo(&store).await?;
        }
        "all" => {
            run_school_demo(&store).await?;
            run_schools_hash_demo(&store).await?;
        }
        other => anyhow::bail!("unknown command '{}', expected school or schools-hash", other),
    }

    Ok(())
}
