use thiserror::Error;

use crate::level::LevelOutOfBounds;

/// Precondition failures; protocol outcomes are never errors.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("email address is empty")]
    EmptyEmail,
    #[error(transparent)]
    Level(#[from] LevelOutOfBounds),
    #[error("max recipients per connection must be at least 1")]
    InvalidRecipientCap,
}
