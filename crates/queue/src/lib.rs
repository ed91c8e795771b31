//! Named job queues with progress reporting and a bounded-concurrency
//! processor.
//!
//! - [`JobQueue`]: the storage/transport contract (enqueue, reliable dequeue,
//!   progress, complete/fail)
//! - [`RedisQueue`]: Redis lists + per-job hashes
//! - [`MemoryQueue`]: in-process queue for tests and local runs
//! - [`QueueProcessor`]: runs a handler over a category with at most N jobs in
//!   flight and turns each handler result into exactly one terminal report

pub mod memory;
pub mod processor;
pub mod queue;
pub mod redis_queue;

pub use memory::MemoryQueue;
pub use processor::{JobContext, ProcessorMetrics, QueueProcessor};
pub use queue::JobQueue;
pub use redis_queue::RedisQueue;
