//! Countdown state for a single delivery.
//!
//! A delivery is `total` units of simulated work, one unit per tick. Each tick:
//!
//! 1. report progress `(consumed, total)` once at least half the work is consumed
//! 2. fail if the recipient is blacklisted (checked before the success path)
//! 3. on the first tick only, send the notification
//! 4. consume one unit; when none remain the delivery succeeded
//!
//! `total` is simulated work, not a retry budget. Nothing is re-enqueued.

use herald_common::types::JobProgress;

/// Units of simulated work per delivery unless configured otherwise.
pub const DEFAULT_WORK_UNITS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Delivered,
    Blacklisted,
}

/// Everything one tick asks the caller to do, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub progress: Option<JobProgress>,
    pub send: bool,
    /// Set on the tick that ends the delivery.
    pub outcome: Option<TickOutcome>,
}

/// Per-invocation countdown. Owned by the job invocation and dropped with it.
#[derive(Debug, Clone)]
pub struct DeliveryAttempt {
    total: u32,
    remaining: u32,
    finished: bool,
}

impl DeliveryAttempt {
    pub fn new(total: u32) -> Self {
        Self {
            total,
            remaining: total,
            finished: false,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn consumed(&self) -> u32 {
        self.total - self.remaining
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advance one tick. Ticking a finished attempt is a no-op.
    pub fn tick(&mut self, recipient_blacklisted: bool) -> TickReport {
        if self.finished {
            return TickReport::default();
        }

        let consumed = self.consumed();
        let mut report = TickReport::default();

        // consumed >= total / 2 without integer truncation
        if u64::from(consumed) * 2 >= u64::from(self.total) {
            report.progress = Some(JobProgress {
                current: consumed,
                total: self.total,
            });
        }

        if recipient_blacklisted {
            self.finished = true;
            report.outcome = Some(TickOutcome::Blacklisted);
            return report;
        }

        report.send = consumed == 0;

        // Saturating so total = 0 still finishes on the first tick.
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.finished = true;
            report.outcome = Some(TickOutcome::Delivered);
        }

        report
    }
}

impl Default for DeliveryAttempt {
    fn default() -> Self {
        Self::new(DEFAULT_WORK_UNITS)
    }
}
