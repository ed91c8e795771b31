//! Shared building blocks for the Herald crates: configuration, the common
//! error type, Redis connection setup, logging bootstrap and queue types.

pub mod config;
pub mod error;
pub mod logging;
pub mod redis_pool;
pub mod types;
