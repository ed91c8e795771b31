//! Demo flows that exercise the store: a single school value and a hash of
//! school campus sizes.

use std::collections::HashMap;

use herald_common::error::Result;

use crate::client::RedisStore;

/// Hash key holding the campus table.
pub const SCHOOLS_HASH_KEY: &str = "HolbertonSchools";

/// Campus name → value seeded into [`SCHOOLS_HASH_KEY`].
pub const SCHOOLS: [(&str, u32); 6] = [
    ("Portland", 50),
    ("Seattle", 80),
    ("New York", 20),
    ("Bogota", 20),
    ("Cali", 40),
    ("Paris", 2),
];

/// Read a school's value and log it.
pub async fn display_school_value(store: &RedisStore, school: &str) -> Result<Option<String>> {
    let value = store.get(school).await?;
    match &value {
        Some(v) => tracing::info!(school, value = %v, "School value"),
        None => tracing::info!(school, "School value not set"),
    }
    Ok(value)
}

pub async fn set_new_school(store: &RedisStore, school: &str, value: &str) -> Result<()> {
    store.set(school, value).await
}

/// Read, write, then read back a single school value.
pub async fn run_school_demo(store: &RedisStore) -> Result<()> {
    display_school_value(store, "Holberton").await?;
    set_new_school(store, "HolbertonSanFrancisco", "100").await?;
    display_school_value(store, "HolbertonSanFrancisco").await?;
    Ok(())
}

/// Seed the campus hash and return its full contents.
pub async fn run_schools_hash_demo(store: &RedisStore) -> Result<HashMap<String, String>> {
    store.hash_set(SCHOOLS_HASH_KEY, &SCHOOLS).await?;

    let data = store.hash_get_all(SCHOOLS_HASH_KEY).await?;
    tracing::info!(key = SCHOOLS_HASH_KEY, ?data, "Hash data");
    Ok(data)
}
