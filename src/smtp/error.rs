use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmtpError {
    #[error("session is already connected")]
    AlreadyConnected,
    #[error("session is not connected")]
    NotConnected,
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} command contains CR or LF")]
    CrlfInjection { name: String },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("TLS handshake failed: {source}")]
    Tls {
        #[source]
        source: native_tls::Error,
    },
    #[error("TLS connector could not be built: {source}")]
    TlsSetup {
        #[source]
        source: native_tls::Error,
    },
    #[error("{name} command failed with status {code}")]
    Command { name: String, code: u16 },
    #[error("no HELO/EHLO was sent")]
    NoHello,
    #[error("HELO handshake was used; no extension info")]
    HeloNoExtensions,
}
