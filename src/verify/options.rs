use std::borrow::Cow;
use std::time::Duration;

use crate::level::ValidationLevel;
use crate::smtp::{DEFAULT_TIMEOUT, DEFAULT_TIME_LIMIT};

/// Knobs for [`Verifier`](crate::verify::Verifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Deepest level to probe. `Ok` is never a valid request.
    pub validation_level: ValidationLevel,
    /// Identity announced in EHLO/HELO; empty means the recipient's domain.
    pub hello_domain: String,
    /// Envelope sender; empty means `user@<hello host>`.
    pub mail_from: String,
    /// TCP connect timeout and per-read inactivity limit.
    pub timeout: Duration,
    /// Overall limit for a single read phase.
    pub time_limit: Duration,
    /// RCPT ceiling before a fresh session is opened in bulk mode.
    pub max_recipients_per_connection: usize,
    /// SMTP port; anything but 25 is for tests and odd setups.
    pub port: u16,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            validation_level: ValidationLevel::SendAttempt,
            hello_domain: String::new(),
            mail_from: String::new(),
            timeout: DEFAULT_TIMEOUT,
            time_limit: DEFAULT_TIME_LIMIT,
            max_recipients_per_connection: 50,
            port: 25,
        }
    }
}

impl VerifyOptions {
    /// The EHLO/HELO host, falling back to the recipient's domain.
    pub fn hello_host<'a>(&'a self, fallback: &'a str) -> Cow<'a, str> {
        if self.hello_domain.trim().is_empty() {
            Cow::Borrowed(fallback)
        } else {
            Cow::Borrowed(self.hello_domain.as_str())
        }
    }

    /// The envelope sender, synthesized from the hello host when unset.
    pub fn sender(&self, hello_host: &str) -> String {
        if self.mail_from.is_empty() {
            format!("user@{hello_host}")
        } else {
            self.mail_from.clone()
        }
    }
}
