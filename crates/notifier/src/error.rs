use thiserror::Error;

/// Terminal delivery failures. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Phone number {phone_number} is blacklisted")]
    RecipientBlacklisted { phone_number: String },

    #[error("Invalid notification payload: {0}")]
    InvalidPayload(String),
}
