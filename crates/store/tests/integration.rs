//! Integration tests for the Redis store.
//!
//! Requires a running Redis with `REDIS_URL` set. Run with:
//!
//! ```bash
//! REDIS_URL="redis://localhost:6379" \
//!   cargo test -p herald-store --test integration -- --ignored --nocapture
//! ```

use herald_common::redis_pool::create_redis_pool;
use herald_store::RedisStore;
use herald_store::schools::{SCHOOLS, run_schools_hash_demo};
use uuid::Uuid;

async fn store() -> RedisStore {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    RedisStore::new(create_redis_pool(&url).await.unwrap())
}

fn unique_key(prefix: &str) -> String {
    format!("test:{}:{}", prefix, Uuid::new_v4())
}

#[tokio::test]
#[ignore]
async fn test_set_then_get() {
    let store = store().await;
    let key = unique_key("school");

    assert_eq!(store.get(&key).await.unwrap(), None);
    store.set(&key, "100").await.unwrap();
    assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("100"));
}

#[tokio::test]
#[ignore]
async fn test_hash_set_and_get_all() {
    let store = store().await;
    let key = unique_key("hash");

    store
        .hash_set(&key, &[("Portland", "50"), ("Seattle", "80")])
        .await
        .unwrap();

    let data = store.hash_get_all(&key).await.unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data["Portland"], "50");
    assert_eq!(data["Seattle"], "80");
}

#[tokio::test]
#[ignore]
async fn test_missing_hash_is_empty() {
    let store = store().await;
    let data = store.hash_get_all(&unique_key("missing")).await.unwrap();
    assert!(data.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_schools_hash_demo_seeds_every_campus() {
    let store = store().await;
    let data = run_schools_hash_demo(&store).await.unwrap();

    for (campus, value) in SCHOOLS {
        assert_eq!(data[campus], value.to_string());
    }
}
