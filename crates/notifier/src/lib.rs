//! Push notification delivery worker.
//!
//! Consumes notification jobs from a named queue, runs a timed countdown of
//! simulated delivery work per job with progress reporting, rejects
//! blacklisted recipients and reports one terminal outcome per job.

pub mod blacklist;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod worker;

pub use blacklist::Blacklist;
pub use delivery::{DeliveryAttempt, TickOutcome, TickReport};
pub use dispatch::{Dispatcher, LogDispatcher};
pub use error::DeliveryError;
pub use worker::NotificationWorker;
