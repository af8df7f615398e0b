//! The staged verification engine.
//!
//! [`Verifier::verify`] escalates through syntax, MX, TCP and RCPT probing
//! up to the requested depth and reports the deepest level that failed, or
//! [`ValidationLevel::Ok`] when the requested depth succeeded.
//! [`Verifier::verify_bulk`] runs the same escalation once per domain and
//! amortizes one SMTP session across the domain's recipients.

mod error;
mod options;
#[cfg(test)]
mod tests;

pub use error::VerifyError;
pub use options::VerifyOptions;

use std::collections::HashMap;
use std::time::Duration;

use crate::address::{AddressCollection, EmailAddress};
use crate::dns::DnsFacade;
use crate::level::{LevelOutOfBounds, ValidationLevel};
use crate::smtp::{LastError, SmtpSession, TransferLogEntry};
use crate::validator::check_email;

/// Outcome of probing a single MX host for one recipient.
enum ProbeOutcome {
    Accepted,
    ConnectFailed,
    CommandFailed,
}

pub struct Verifier {
    dns: DnsFacade,
    options: VerifyOptions,
    transfer_logs: HashMap<String, Vec<TransferLogEntry>>,
    last_error: Option<LastError>,
}

impl Verifier {
    pub fn new(dns: DnsFacade) -> Self {
        Self {
            dns,
            options: VerifyOptions::default(),
            transfer_logs: HashMap::new(),
            last_error: None,
        }
    }

    /// Engine over the system resolver with default options.
    pub fn system() -> Self {
        Self::new(DnsFacade::system())
    }

    /// Validates `options` up front; the setters enforce the same rules.
    pub fn with_options(dns: DnsFacade, options: VerifyOptions) -> Result<Self, VerifyError> {
        options.validation_level.bounds_check()?;
        if options.max_recipients_per_connection == 0 {
            return Err(VerifyError::InvalidRecipientCap);
        }
        Ok(Self {
            dns,
            options,
            transfer_logs: HashMap::new(),
            last_error: None,
        })
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    pub fn set_validation_level(
        &mut self,
        level: ValidationLevel,
    ) -> Result<(), LevelOutOfBounds> {
        level.bounds_check()?;
        self.options.validation_level = level;
        Ok(())
    }

    pub fn set_hello_domain(&mut self, hello_domain: impl Into<String>) {
        self.options.hello_domain = hello_domain.into();
    }

    pub fn set_mail_from(&mut self, mail_from: impl Into<String>) {
        self.options.mail_from = mail_from.into();
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.options.timeout = timeout;
    }

    pub fn set_time_limit(&mut self, time_limit: Duration) {
        self.options.time_limit = time_limit;
    }

    pub fn set_max_recipients_per_connection(&mut self, cap: usize) -> Result<(), VerifyError> {
        if cap == 0 {
            return Err(VerifyError::InvalidRecipientCap);
        }
        self.options.max_recipients_per_connection = cap;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) {
        self.options.port = port;
    }

    /// Transfer logs captured during the most recent verification, keyed by
    /// MX host. Chunked bulk sessions against the same host append.
    pub fn transfer_logs(&self) -> &HashMap<String, Vec<TransferLogEntry>> {
        &self.transfer_logs
    }

    pub fn transfer_log(&self, host: &str) -> Option<&[TransferLogEntry]> {
        self.transfer_logs.get(host).map(Vec::as_slice)
    }

    /// Diagnostic detail from the last failing session, if any.
    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    /// Verifies one address up to the configured depth.
    ///
    /// Protocol failures are not errors: the return value is the deepest
    /// level that failed, or `Ok` when the requested depth succeeded.
    pub fn verify(&mut self, email: &str) -> Result<ValidationLevel, VerifyError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(VerifyError::EmptyEmail);
        }
        self.transfer_logs.clear();
        self.last_error = None;
        let requested = self.options.validation_level;

        if !check_email(email) {
            return Ok(ValidationLevel::SyntaxCheck);
        }
        if requested == ValidationLevel::SyntaxCheck {
            return Ok(ValidationLevel::Ok);
        }

        let hosts = self.dns.mx_hosts_for_email(email).unwrap_or_default();
        if hosts.is_empty() {
            return Ok(ValidationLevel::DnsQuery);
        }
        if requested == ValidationLevel::DnsQuery {
            return Ok(ValidationLevel::Ok);
        }

        let domain = EmailAddress::parse(email)
            .map(|address| address.canonical_domain().to_string())
            .unwrap_or_else(|_| {
                email
                    .rsplit_once('@')
                    .map(|(_, domain)| domain.to_string())
                    .unwrap_or_default()
            });

        let mut current = ValidationLevel::SmtpConnection;
        for host in &hosts {
            match self.probe_mx(host, &domain, email) {
                ProbeOutcome::Accepted => return Ok(ValidationLevel::Ok),
                ProbeOutcome::ConnectFailed => {}
                ProbeOutcome::CommandFailed => current = ValidationLevel::SendAttempt,
            }
        }
        Ok(current)
    }

    /// Verifies a whole collection, grouped by canonical domain.
    ///
    /// Every input address appears exactly once in the result map;
    /// addresses failing syntax never generate network traffic.
    pub fn verify_bulk(
        &mut self,
        addresses: &AddressCollection,
    ) -> Result<HashMap<String, ValidationLevel>, VerifyError> {
        self.transfer_logs.clear();
        self.last_error = None;
        let requested = self.options.validation_level;
        let mut results = HashMap::new();

        for domain in addresses.domains() {
            let emails = addresses.emails_in_domain(&domain);
            let (valid, invalid): (Vec<String>, Vec<String>) =
                emails.into_iter().partition(|email| check_email(email));
            for email in invalid {
                results.insert(email, ValidationLevel::SyntaxCheck);
            }
            if valid.is_empty() {
                continue;
            }
            if requested == ValidationLevel::SyntaxCheck {
                record_all(&mut results, &valid, ValidationLevel::Ok);
                continue;
            }

            let hosts = self.dns.mx_hosts_for_domain(&domain).unwrap_or_default();
            if hosts.is_empty() {
                record_all(&mut results, &valid, ValidationLevel::DnsQuery);
                continue;
            }
            if requested == ValidationLevel::DnsQuery {
                record_all(&mut results, &valid, ValidationLevel::Ok);
                continue;
            }

            self.probe_domain_bulk(&domain, &hosts, &valid, &mut results);
        }
        Ok(results)
    }

    fn new_session(&self) -> SmtpSession {
        SmtpSession::with_timeouts(self.options.timeout, self.options.time_limit)
    }

    fn capture_log(&mut self, host: &str, session: &mut SmtpSession) {
        self.transfer_logs
            .entry(host.to_string())
            .or_default()
            .extend(session.take_transfer_log());
    }

    /// One MX attempt for a single recipient. The session is closed on
    /// every path, and its log always lands under `host`.
    fn probe_mx(&mut self, host: &str, domain: &str, email: &str) -> ProbeOutcome {
        let hello_host = self.options.hello_host(domain).into_owned();
        let sender = self.options.sender(&hello_host);

        let mut session = self.new_session();
        if session.connect(host, self.options.port).is_err() {
            self.last_error = session.take_last_error();
            return ProbeOutcome::ConnectFailed;
        }
        if self.options.validation_level == ValidationLevel::SmtpConnection {
            self.capture_log(host, &mut session);
            session.close();
            return ProbeOutcome::Accepted;
        }

        let accepted = session.hello(&hello_host).is_ok()
            && session.mail_from(&sender).is_ok()
            && session.rcpt_to(email).is_ok();
        let failure = session.last_error().cloned();
        let _ = session.quit();
        self.capture_log(host, &mut session);
        session.close();
        self.last_error = failure;

        if accepted {
            ProbeOutcome::Accepted
        } else {
            ProbeOutcome::CommandFailed
        }
    }

    /// Escalation for one domain's recipients. The first MX that accepts
    /// EHLO + MAIL FROM claims them all; recipients beyond the
    /// per-connection cap go through fresh sessions to the same host.
    fn probe_domain_bulk(
        &mut self,
        domain: &str,
        hosts: &[String],
        emails: &[String],
        results: &mut HashMap<String, ValidationLevel>,
    ) {
        let requested = self.options.validation_level;
        let mut current = ValidationLevel::SmtpConnection;

        for host in hosts {
            let mut session = self.new_session();
            if session.connect(host, self.options.port).is_err() {
                self.last_error = session.take_last_error();
                record_all(results, emails, current);
                continue;
            }
            if requested == ValidationLevel::SmtpConnection {
                record_all(results, emails, ValidationLevel::Ok);
                self.capture_log(host, &mut session);
                session.close();
                return;
            }

            current = ValidationLevel::SendAttempt;
            let hello_host = self.options.hello_host(domain).into_owned();
            let sender = self.options.sender(&hello_host);
            if session.hello(&hello_host).is_err() || session.mail_from(&sender).is_err() {
                self.last_error = session.last_error().cloned();
                record_all(results, emails, current);
                self.capture_log(host, &mut session);
                session.close();
                continue;
            }

            // this MX claims the domain
            let cap = self.options.max_recipients_per_connection.max(1);
            let mut chunks = emails.chunks(cap);
            if let Some(first) = chunks.next() {
                self.rcpt_all(&mut session, first, current, results);
            }
            let _ = session.quit();
            self.capture_log(host, &mut session);
            session.close();

            for chunk in chunks {
                self.probe_chunk(host, domain, chunk, current, results);
            }
            return;
        }
    }

    /// A fresh session for one overflow chunk: connect, greet, MAIL FROM,
    /// then RCPT per recipient.
    fn probe_chunk(
        &mut self,
        host: &str,
        domain: &str,
        chunk: &[String],
        current: ValidationLevel,
        results: &mut HashMap<String, ValidationLevel>,
    ) {
        let mut session = self.new_session();
        if session.connect(host, self.options.port).is_err() {
            self.last_error = session.take_last_error();
            record_all(results, chunk, current);
            return;
        }
        let hello_host = self.options.hello_host(domain).into_owned();
        let sender = self.options.sender(&hello_host);
        if session.hello(&hello_host).is_err() || session.mail_from(&sender).is_err() {
            self.last_error = session.last_error().cloned();
            record_all(results, chunk, current);
            self.capture_log(host, &mut session);
            session.close();
            return;
        }
        self.rcpt_all(&mut session, chunk, current, results);
        let _ = session.quit();
        self.capture_log(host, &mut session);
        session.close();
    }

    fn rcpt_all(
        &mut self,
        session: &mut SmtpSession,
        emails: &[String],
        current: ValidationLevel,
        results: &mut HashMap<String, ValidationLevel>,
    ) {
        for email in emails {
            let level = if session.rcpt_to(email).is_ok() {
                ValidationLevel::Ok
            } else {
                current
            };
            results.insert(email.clone(), level);
        }
        self.last_error = session.last_error().cloned();
    }
}

fn record_all(
    results: &mut HashMap<String, ValidationLevel>,
    emails: &[String],
    level: ValidationLevel,
) {
    for email in emails {
        results.insert(email.clone(), level);
    }
}
