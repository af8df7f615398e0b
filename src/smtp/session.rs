use std::collections::HashMap;
use std::time::Duration;

use super::capability::{parse_capabilities, Capability, HelloKind};
use super::error::SmtpError;
use super::reply::SmtpReply;
use super::stream::SmtpStream;

/// Default TCP-connect and per-read idle timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default overall limit for one read phase.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(300);

/// Pseudo-command under which the greeting exchange is logged.
pub const CONNECT_LOG_COMMAND: &str = "<CONNECT>";

/// One command/response pair, in wire order.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLogEntry {
    pub command: String,
    pub response: String,
    pub code: u16,
    pub success: bool,
}

/// Diagnostic detail for the most recent failure.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub message: String,
    pub detail: String,
    pub code: u16,
    pub enhanced_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Disconnected,
    Connected,
    Closed,
}

/// A single client session against one SMTP server.
///
/// Drives the verification subset of RFC 5321: EHLO/HELO with capability
/// discovery, MAIL/RCPT, NOOP, RSET, VRFY, STARTTLS and QUIT. Every
/// exchange lands in the transfer log; failures additionally populate the
/// last-error slot, which successful commands clear.
pub struct SmtpSession {
    state: SessionState,
    stream: Option<SmtpStream>,
    hello: Option<HelloKind>,
    capabilities: Option<HashMap<String, Capability>>,
    transfer_log: Vec<TransferLogEntry>,
    last_error: Option<LastError>,
    timeout: Duration,
    time_limit: Duration,
}

impl Default for SmtpSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpSession {
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_TIMEOUT, DEFAULT_TIME_LIMIT)
    }

    /// `timeout` bounds the TCP connect and each socket read;
    /// `time_limit` bounds a whole read phase.
    pub fn with_timeouts(timeout: Duration, time_limit: Duration) -> Self {
        Self {
            state: SessionState::Disconnected,
            stream: None,
            hello: None,
            capabilities: None,
            transfer_log: Vec::new(),
            last_error: None,
            timeout,
            time_limit,
        }
    }

    pub fn connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Opens the session and reads the server greeting.
    ///
    /// The greeting is logged under [`CONNECT_LOG_COMMAND`] with
    /// `success = (code == 220)`; a sour greeting does not fail the
    /// connect itself, the next command will. Session state (transfer
    /// log, last error, capabilities) resets here.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), SmtpError> {
        if self.connected() {
            self.last_error = Some(LastError {
                message: "connect failed".to_string(),
                detail: "session is already connected".to_string(),
                code: 0,
                enhanced_code: None,
            });
            return Err(SmtpError::AlreadyConnected);
        }

        self.transfer_log.clear();
        self.last_error = None;
        self.hello = None;
        self.capabilities = None;

        let mut stream = match SmtpStream::connect(host, port, self.timeout) {
            Ok(stream) => stream,
            Err(err) => {
                self.last_error = Some(LastError {
                    message: "connect failed".to_string(),
                    detail: err.to_string(),
                    code: 0,
                    enhanced_code: None,
                });
                return Err(err);
            }
        };

        let raw = stream.read_response(self.time_limit);
        let reply = SmtpReply::parse(&raw);
        self.transfer_log.push(TransferLogEntry {
            command: CONNECT_LOG_COMMAND.to_string(),
            response: raw,
            code: reply.code,
            success: reply.code == 220,
        });

        self.stream = Some(stream);
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Closes the session. Idempotent; reachable from any state.
    pub fn close(&mut self) {
        self.stream = None;
        self.state = SessionState::Closed;
    }

    /// Sends one command line and checks the reply code against `expect`.
    ///
    /// The exchange is logged either way. A payload carrying CR or LF is
    /// rejected before anything reaches the wire.
    pub fn command(
        &mut self,
        name: &str,
        raw: &str,
        expect: &[u16],
    ) -> Result<SmtpReply, SmtpError> {
        if !self.connected() {
            self.last_error = Some(LastError {
                message: format!("{name} command failed"),
                detail: "session is not connected".to_string(),
                code: 0,
                enhanced_code: None,
            });
            return Err(SmtpError::NotConnected);
        }
        if raw.contains('\r') || raw.contains('\n') {
            self.last_error = Some(LastError {
                message: format!("{name} command failed"),
                detail: "command contains CR or LF".to_string(),
                code: 0,
                enhanced_code: None,
            });
            return Err(SmtpError::CrlfInjection {
                name: name.to_string(),
            });
        }

        let stream = self.stream.as_mut().ok_or(SmtpError::NotConnected)?;
        if let Err(err) = stream.send_line(raw) {
            self.transfer_log.push(TransferLogEntry {
                command: raw.to_string(),
                response: String::new(),
                code: 0,
                success: false,
            });
            self.last_error = Some(LastError {
                message: format!("{name} command failed"),
                detail: err.to_string(),
                code: 0,
                enhanced_code: None,
            });
            return Err(err);
        }

        let raw_reply = stream.read_response(self.time_limit);
        let reply = SmtpReply::parse(&raw_reply);
        let success = expect.contains(&reply.code);
        self.transfer_log.push(TransferLogEntry {
            command: raw.to_string(),
            response: raw_reply,
            code: reply.code,
            success,
        });

        if success {
            self.last_error = None;
            Ok(reply)
        } else {
            self.last_error = Some(LastError {
                message: format!("{name} command failed"),
                detail: reply.detail.clone(),
                code: reply.code,
                enhanced_code: reply.enhanced_code.clone(),
            });
            Err(SmtpError::Command {
                name: name.to_string(),
                code: reply.code,
            })
        }
    }

    /// Greets the server: EHLO first, HELO when the server refuses it.
    /// On success the reply is parsed into the capability map.
    pub fn hello(&mut self, host: &str) -> Result<(), SmtpError> {
        match self.command("EHLO", &format!("EHLO {host}"), &[250]) {
            Ok(reply) => {
                self.hello = Some(HelloKind::Ehlo);
                self.capabilities = Some(parse_capabilities(HelloKind::Ehlo, &reply));
                Ok(())
            }
            Err(SmtpError::CrlfInjection { name }) => Err(SmtpError::CrlfInjection { name }),
            Err(_) => {
                let reply = self.command("HELO", &format!("HELO {host}"), &[250])?;
                self.hello = Some(HelloKind::Helo);
                self.capabilities = Some(parse_capabilities(HelloKind::Helo, &reply));
                Ok(())
            }
        }
    }

    /// Looks up a capability recorded by [`SmtpSession::hello`].
    ///
    /// `Ok(None)` means the server did not advertise it. Asking for
    /// `"HELO"` after an EHLO greeting yields the server identifier;
    /// asking for anything beyond the identifier after a HELO greeting is
    /// an error, because plain HELO carries no extension info.
    pub fn server_capability(&mut self, name: &str) -> Result<Option<Capability>, SmtpError> {
        let Some(kind) = self.hello else {
            self.last_error = Some(LastError {
                message: "no HELO/EHLO was sent".to_string(),
                detail: String::new(),
                code: 0,
                enhanced_code: None,
            });
            return Err(SmtpError::NoHello);
        };
        let capabilities = self.capabilities.as_ref().ok_or(SmtpError::NoHello)?;

        if let Some(value) = capabilities.get(name) {
            return Ok(Some(value.clone()));
        }
        match (name, kind) {
            ("HELO", HelloKind::Ehlo) => Ok(capabilities.get("EHLO").cloned()),
            ("EHLO", HelloKind::Helo) => Ok(None),
            (_, HelloKind::Helo) => {
                self.last_error = Some(LastError {
                    message: "HELO handshake was used; no extension info".to_string(),
                    detail: String::new(),
                    code: 0,
                    enhanced_code: None,
                });
                Err(SmtpError::HeloNoExtensions)
            }
            (_, HelloKind::Ehlo) => Ok(None),
        }
    }

    pub fn mail_from(&mut self, sender: &str) -> Result<SmtpReply, SmtpError> {
        self.command("MAIL FROM", &format!("MAIL FROM:<{sender}>"), &[250])
    }

    pub fn rcpt_to(&mut self, recipient: &str) -> Result<SmtpReply, SmtpError> {
        self.command("RCPT TO", &format!("RCPT TO:<{recipient}>"), &[250, 251])
    }

    pub fn noop(&mut self) -> Result<SmtpReply, SmtpError> {
        self.command("NOOP", "NOOP", &[250])
    }

    pub fn rset(&mut self) -> Result<SmtpReply, SmtpError> {
        self.command("RSET", "RSET", &[250])
    }

    pub fn vrfy(&mut self, name: &str) -> Result<SmtpReply, SmtpError> {
        self.command("VRFY", &format!("VRFY {name}"), &[250, 251])
    }

    /// Negotiates STARTTLS and upgrades the transport. Capabilities are
    /// discarded on success; the caller re-issues EHLO over TLS.
    pub fn starttls(&mut self, domain: &str) -> Result<(), SmtpError> {
        self.command("STARTTLS", "STARTTLS", &[220])?;
        let stream = self.stream.as_mut().ok_or(SmtpError::NotConnected)?;
        if let Err(err) = stream.upgrade_tls(domain, self.timeout) {
            self.last_error = Some(LastError {
                message: "STARTTLS command failed".to_string(),
                detail: err.to_string(),
                code: 0,
                enhanced_code: None,
            });
            return Err(err);
        }
        self.hello = None;
        self.capabilities = None;
        Ok(())
    }

    /// Sends QUIT and closes the socket regardless of the reply.
    pub fn quit(&mut self) -> Result<SmtpReply, SmtpError> {
        let result = self.command("QUIT", "QUIT", &[221]);
        self.close();
        result
    }

    pub fn transfer_log(&self) -> &[TransferLogEntry] {
        &self.transfer_log
    }

    /// Drains the transfer log, leaving the session's copy empty.
    pub fn take_transfer_log(&mut self) -> Vec<TransferLogEntry> {
        std::mem::take(&mut self.transfer_log)
    }

    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    pub fn take_last_error(&mut self) -> Option<LastError> {
        self.last_error.take()
    }
}
