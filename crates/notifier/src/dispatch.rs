use herald_common::types::NotificationData;

/// The actual "send" step of a delivery. Called at most once per job.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, notification: &NotificationData);
}

/// Simulated delivery: logs the notification and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

impl Dispatcher for LogDispatcher {
    fn dispatch(&self, notification: &NotificationData) {
        tracing::info!(
            phone_number = %notification.phone_number,
            message = %notification.message,
            "Sending notification to {}, with message: {}",
            notification.phone_number,
            notification.message
        );
    }
}
