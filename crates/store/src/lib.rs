//! Key-value and hash operations against Redis.

pub mod client;
pub mod schools;

pub use client::RedisStore;
