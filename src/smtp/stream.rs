use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use native_tls::{HandshakeError, Protocol, TlsConnector, TlsStream};

use super::error::SmtpError;

#[derive(Debug)]
enum StreamState {
    Plain(TcpStream),
    Tls(TlsStream<TcpStream>),
    Invalid,
}

/// The transport under an SMTP session: a TCP stream, optionally upgraded
/// to TLS, with line-oriented reads bounded by an idle timeout and an
/// overall time limit.
#[derive(Debug)]
pub(crate) struct SmtpStream {
    state: StreamState,
    buffer: Vec<u8>,
}

impl SmtpStream {
    /// Connects to `host:port`, trying each resolved address in turn.
    /// `timeout` bounds the TCP connect and every subsequent read.
    pub(crate) fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, SmtpError> {
        let target = format!("{host}:{port}");
        let addrs = target.to_socket_addrs().map_err(|source| SmtpError::Connect {
            host: target.clone(),
            source,
        })?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(timeout))
                        .map_err(|source| SmtpError::Io { source })?;
                    stream
                        .set_write_timeout(Some(timeout))
                        .map_err(|source| SmtpError::Io { source })?;
                    return Ok(Self {
                        state: StreamState::Plain(stream),
                        buffer: Vec::new(),
                    });
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(SmtpError::Connect {
            host: target,
            source: last_err.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address resolved")
            }),
        })
    }

    /// Writes `line` followed by CRLF. The caller has already vetted the
    /// payload for CR/LF injection.
    pub(crate) fn send_line(&mut self, line: &str) -> Result<(), SmtpError> {
        let mut data = line.as_bytes().to_vec();
        data.extend_from_slice(b"\r\n");
        match &mut self.state {
            StreamState::Plain(stream) => write_all(stream, &data),
            StreamState::Tls(stream) => write_all(stream, &data),
            StreamState::Invalid => Err(SmtpError::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotConnected, "stream invalid"),
            }),
        }
    }

    /// Reads one reply: lines accumulate until a terminal line (4th char a
    /// space, or length ≤ 3). Returns whatever arrived when the idle
    /// timeout or `time_limit` expires, which may be an empty string.
    pub(crate) fn read_response(&mut self, time_limit: Duration) -> String {
        let deadline = Instant::now() + time_limit;
        let mut lines: Vec<String> = Vec::new();
        loop {
            let Some(line) = self.read_line(deadline) else {
                break;
            };
            let terminal = line.len() <= 3 || line.as_bytes()[3] == b' ';
            lines.push(line);
            if terminal {
                break;
            }
        }
        lines.join("\n")
    }

    fn read_line(&mut self, deadline: Instant) -> Option<String> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
                let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
                if line.ends_with(b"\n") {
                    line.pop();
                }
                if line.ends_with(b"\r") {
                    line.pop();
                }
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            if Instant::now() >= deadline {
                return None;
            }

            let mut buf = [0u8; 512];
            let read = match &mut self.state {
                StreamState::Plain(stream) => stream.read(&mut buf),
                StreamState::Tls(stream) => stream.read(&mut buf),
                StreamState::Invalid => return None,
            };
            match read {
                Ok(0) => return None,
                Ok(n) => self.buffer.extend_from_slice(&buf[..n]),
                // idle timeout or hard error: hand back what we have
                Err(_) => return None,
            }
        }
    }

    /// Upgrades the transport to TLS (1.2 minimum). A no-op when the
    /// stream is already encrypted.
    pub(crate) fn upgrade_tls(&mut self, domain: &str, timeout: Duration) -> Result<(), SmtpError> {
        let mut state = StreamState::Invalid;
        std::mem::swap(&mut self.state, &mut state);
        let plain = match state {
            StreamState::Plain(stream) => stream,
            StreamState::Tls(stream) => {
                self.state = StreamState::Tls(stream);
                return Ok(());
            }
            StreamState::Invalid => {
                return Err(SmtpError::Io {
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotConnected,
                        "stream invalid",
                    ),
                });
            }
        };

        let connector = TlsConnector::builder()
            .min_protocol_version(Some(Protocol::Tlsv12))
            .build()
            .map_err(|source| SmtpError::TlsSetup { source })?;

        let tls = complete_handshake(&connector, domain, plain)?;
        tls.get_ref()
            .set_read_timeout(Some(timeout))
            .map_err(|source| SmtpError::Io { source })?;
        tls.get_ref()
            .set_write_timeout(Some(timeout))
            .map_err(|source| SmtpError::Io { source })?;
        self.state = StreamState::Tls(tls);
        Ok(())
    }
}

fn write_all<S: Write>(stream: &mut S, data: &[u8]) -> Result<(), SmtpError> {
    stream
        .write_all(data)
        .and_then(|()| stream.flush())
        .map_err(|source| SmtpError::Io { source })
}

fn complete_handshake(
    connector: &TlsConnector,
    domain: &str,
    stream: TcpStream,
) -> Result<TlsStream<TcpStream>, SmtpError> {
    match connector.connect(domain, stream) {
        Ok(tls) => Ok(tls),
        Err(HandshakeError::Failure(source)) => Err(SmtpError::Tls { source }),
        Err(HandshakeError::WouldBlock(mut mid)) => loop {
            match mid.handshake() {
                Ok(tls) => break Ok(tls),
                Err(HandshakeError::Failure(source)) => break Err(SmtpError::Tls { source }),
                Err(HandshakeError::WouldBlock(next)) => mid = next,
            }
        },
    }
}
