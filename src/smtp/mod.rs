//! SMTP client session for recipient probing.
//!
//! One [`SmtpSession`] drives one TCP connection: greeting, EHLO/HELO with
//! capability discovery, the envelope commands used for verification, an
//! optional STARTTLS upgrade, and QUIT. No message data is ever sent.

mod capability;
mod error;
mod reply;
mod session;
mod stream;

pub use capability::{Capability, HelloKind};
pub use error::SmtpError;
pub use reply::SmtpReply;
pub use session::{
    LastError, SmtpSession, TransferLogEntry, CONNECT_LOG_COMMAND, DEFAULT_TIMEOUT,
    DEFAULT_TIME_LIMIT,
};
