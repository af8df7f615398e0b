use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::address::AddressCollection;
use crate::dns::{DnsError, DnsFacade, DnsSource, MemoryCache, MxRecord};
use crate::level::ValidationLevel;
use crate::smtp::CONNECT_LOG_COMMAND;

use super::{Verifier, VerifyError, VerifyOptions};

type MxLookupFn = dyn Fn(&str) -> Result<Vec<MxRecord>, DnsError> + Send + Sync;

struct StubSource {
    on_mx: Box<MxLookupFn>,
}

impl StubSource {
    fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<MxRecord>, DnsError> + Send + Sync + 'static,
    {
        Self { on_mx: Box::new(f) }
    }
}

impl DnsSource for StubSource {
    fn mx_lookup(&self, fqdn: &str) -> Result<Vec<MxRecord>, DnsError> {
        (self.on_mx)(fqdn)
    }

    fn host_exists(&self, _name: &str) -> Result<bool, DnsError> {
        Ok(false)
    }
}

fn verifier_with_mx<F>(lookup: F) -> Verifier
where
    F: Fn(&str) -> Result<Vec<MxRecord>, DnsError> + Send + Sync + 'static,
{
    let dns = DnsFacade::from_parts(
        Some(Box::new(StubSource::new(lookup))),
        Box::new(MemoryCache::new()),
    );
    let options = VerifyOptions {
        timeout: Duration::from_secs(5),
        time_limit: Duration::from_secs(10),
        ..VerifyOptions::default()
    };
    Verifier::with_options(dns, options).expect("valid options")
}

fn loopback_mx(port_host: &str) -> Vec<MxRecord> {
    vec![MxRecord::new(10, port_host)]
}

/// A free loopback port with nothing listening on it.
fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}

type Responder = Arc<dyn Fn(&str) -> String + Send + Sync>;
type SessionLog = Arc<Mutex<Vec<Vec<String>>>>;

/// Loopback SMTP fake: answers per command through `responder`, records
/// every received command line grouped by session.
fn spawn_mock(accept: usize, responder: Responder) -> (u16, SessionLog, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
    let port = listener.local_addr().expect("addr").port();
    let sessions: SessionLog = Arc::new(Mutex::new(Vec::new()));
    let log = sessions.clone();
    let (ready_tx, ready_rx) = mpsc::channel();
    let handle = thread::spawn(move || {
        ready_tx.send(()).ok();
        for _ in 0..accept {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut commands = Vec::new();
            let _ = serve_session(&mut stream, &responder, &mut commands);
            if let Ok(mut all) = log.lock() {
                all.push(commands);
            }
        }
    });
    ready_rx.recv().expect("server ready");
    (port, sessions, handle)
}

fn serve_session(
    stream: &mut TcpStream,
    responder: &Responder,
    commands: &mut Vec<String>,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    stream.write_all(b"220 mock.test ESMTP\r\n")?;
    stream.flush()?;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let command = line.trim_end().to_string();
        commands.push(command.clone());
        let response = responder(&command);
        stream.write_all(response.as_bytes())?;
        stream.flush()?;
        if command.eq_ignore_ascii_case("QUIT") {
            return Ok(());
        }
    }
}

/// The compliant server: everything succeeds, RCPT optionally filtered.
fn accepting_responder(reject_marker: Option<&'static str>) -> Responder {
    Arc::new(move |command: &str| {
        if command.starts_with("EHLO") {
            "250-mock.test greets you\r\n250-SIZE 35882577\r\n250 HELP\r\n".to_string()
        } else if command.starts_with("HELO") {
            "250 mock.test\r\n".to_string()
        } else if command.starts_with("MAIL FROM:") {
            "250 2.1.0 Ok\r\n".to_string()
        } else if command.starts_with("RCPT TO:") {
            match reject_marker {
                Some(marker) if command.contains(marker) => {
                    "550 5.1.1 No such user\r\n".to_string()
                }
                _ => "250 2.1.5 Ok\r\n".to_string(),
            }
        } else if command.eq_ignore_ascii_case("QUIT") {
            "221 2.0.0 Bye\r\n".to_string()
        } else {
            "250 Ok\r\n".to_string()
        }
    })
}

/// A server that refuses both greeting forms.
fn greeting_refusing_responder() -> Responder {
    Arc::new(|command: &str| {
        if command.starts_with("EHLO") || command.starts_with("HELO") {
            "502 5.5.1 not welcome here\r\n".to_string()
        } else if command.eq_ignore_ascii_case("QUIT") {
            "221 Bye\r\n".to_string()
        } else {
            "503 5.5.1 bad sequence\r\n".to_string()
        }
    })
}

fn collection(addresses: &[&str]) -> AddressCollection {
    let mut set = AddressCollection::new();
    set.add_many(addresses.iter().copied()).expect("valid addresses");
    set
}

#[test]
fn empty_input_is_an_argument_error() {
    let mut verifier = verifier_with_mx(|_| panic!("no DNS expected"));
    assert!(matches!(
        verifier.verify("   "),
        Err(VerifyError::EmptyEmail)
    ));
}

#[test]
fn syntax_failure_short_circuits() {
    let mut verifier = verifier_with_mx(|_| panic!("no DNS expected"));
    let level = verifier.verify("not-an-email").expect("verdict");
    assert_eq!(level, ValidationLevel::SyntaxCheck);
    assert!(verifier.transfer_logs().is_empty());
}

#[test]
fn syntax_depth_stops_before_dns() {
    let mut verifier = verifier_with_mx(|_| panic!("no DNS expected"));
    verifier
        .set_validation_level(ValidationLevel::SyntaxCheck)
        .expect("in bounds");
    let level = verifier.verify("user@no-mx.test").expect("verdict");
    assert_eq!(level, ValidationLevel::Ok);
}

#[test]
fn missing_mx_stops_at_dns_query() {
    let mut verifier = verifier_with_mx(|_| Ok(Vec::new()));
    verifier
        .set_validation_level(ValidationLevel::DnsQuery)
        .expect("in bounds");
    let level = verifier.verify("user@no-mx.test").expect("verdict");
    assert_eq!(level, ValidationLevel::DnsQuery);
}

#[test]
fn dns_depth_succeeds_once_mx_exists() {
    let mut verifier = verifier_with_mx(|_| Ok(vec![MxRecord::new(10, "mx.example.test")]));
    verifier
        .set_validation_level(ValidationLevel::DnsQuery)
        .expect("in bounds");
    let level = verifier.verify("user@example.test").expect("verdict");
    assert_eq!(level, ValidationLevel::Ok);
}

#[test]
fn sentinel_level_cannot_be_requested() {
    let mut verifier = verifier_with_mx(|_| Ok(Vec::new()));
    assert!(verifier.set_validation_level(ValidationLevel::Ok).is_err());
    assert!(Verifier::with_options(
        DnsFacade::from_parts(None, Box::new(MemoryCache::new())),
        VerifyOptions {
            validation_level: ValidationLevel::Ok,
            ..VerifyOptions::default()
        },
    )
    .is_err());
}

#[test]
fn recipient_cap_must_be_positive() {
    let mut verifier = verifier_with_mx(|_| Ok(Vec::new()));
    assert!(matches!(
        verifier.set_max_recipients_per_connection(0),
        Err(VerifyError::InvalidRecipientCap)
    ));
    assert!(verifier.set_max_recipients_per_connection(1).is_ok());
}

#[test]
fn connect_depth_logs_only_the_greeting() {
    let (port, sessions, handle) = spawn_mock(1, accepting_responder(None));
    let mut verifier = verifier_with_mx(|_| Ok(loopback_mx("127.0.0.1")));
    verifier.set_port(port);
    verifier
        .set_validation_level(ValidationLevel::SmtpConnection)
        .expect("in bounds");

    let level = verifier.verify("user@example.test").expect("verdict");
    assert_eq!(level, ValidationLevel::Ok);

    let log = verifier.transfer_log("127.0.0.1").expect("captured");
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].command, CONNECT_LOG_COMMAND);
    assert_eq!(log[0].code, 220);
    assert!(log[0].success);

    handle.join().expect("server thread");
    assert!(sessions.lock().expect("log")[0].is_empty());
}

#[test]
fn send_attempt_succeeds_on_the_preferred_host_only() {
    let (port, sessions, handle) = spawn_mock(1, accepting_responder(None));
    // the unreachable host has the worse preference and must never be tried
    let mut verifier = verifier_with_mx(|_| {
        Ok(vec![
            MxRecord::new(20, "192.0.2.1"),
            MxRecord::new(10, "127.0.0.1"),
        ])
    });
    verifier.set_port(port);
    verifier.set_hello_domain("probe.test");

    let level = verifier.verify("user@example.test").expect("verdict");
    assert_eq!(level, ValidationLevel::Ok);
    assert!(verifier.last_error().is_none());
    assert!(verifier.transfer_log("192.0.2.1").is_none());

    handle.join().expect("server thread");
    let sessions = sessions.lock().expect("log");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0][0], "EHLO probe.test");
    assert_eq!(sessions[0][1], "MAIL FROM:<user@probe.test>");
    assert_eq!(sessions[0][2], "RCPT TO:<user@example.test>");
    assert_eq!(sessions[0][3], "QUIT");
}

#[test]
fn rejected_recipient_reports_send_attempt_with_code() {
    let (port, _sessions, handle) = spawn_mock(1, accepting_responder(Some("ghost@")));
    let mut verifier = verifier_with_mx(|_| Ok(loopback_mx("127.0.0.1")));
    verifier.set_port(port);

    let level = verifier.verify("ghost@example.test").expect("verdict");
    assert_eq!(level, ValidationLevel::SendAttempt);

    let last = verifier.last_error().expect("recorded failure");
    assert_eq!(last.code, 550);
    assert_eq!(last.enhanced_code.as_deref(), Some("5.1.1"));
    assert_eq!(last.message, "RCPT TO command failed");

    // the full exchange is in the captured log, QUIT included
    let log = verifier.transfer_log("127.0.0.1").expect("captured");
    let commands: Vec<&str> = log.iter().map(|entry| entry.command.as_str()).collect();
    assert_eq!(
        commands,
        [
            CONNECT_LOG_COMMAND,
            "EHLO example.test",
            "MAIL FROM:<user@example.test>",
            "RCPT TO:<ghost@example.test>",
            "QUIT",
        ]
    );
    handle.join().expect("server thread");
}

#[test]
fn unreachable_hosts_report_smtp_connection() {
    let port = dead_port();
    let mut verifier = verifier_with_mx(|_| {
        Ok(vec![
            MxRecord::new(10, "127.0.0.1"),
            MxRecord::new(20, "127.0.0.1"),
        ])
    });
    verifier.set_port(port);
    let level = verifier.verify("user@example.test").expect("verdict");
    assert_eq!(level, ValidationLevel::SmtpConnection);
    assert!(verifier.last_error().is_some());
}

#[test]
fn greeting_refusal_reports_send_attempt() {
    let (port, _sessions, handle) = spawn_mock(1, greeting_refusing_responder());
    let mut verifier = verifier_with_mx(|_| Ok(loopback_mx("127.0.0.1")));
    verifier.set_port(port);
    let level = verifier.verify("user@example.test").expect("verdict");
    assert_eq!(level, ValidationLevel::SendAttempt);
    handle.join().expect("server thread");
}

#[test]
fn bulk_results_are_total_and_grouped() {
    let (port, sessions, handle) = spawn_mock(1, accepting_responder(Some("ghost@")));
    let mut verifier = verifier_with_mx(|fqdn| {
        if fqdn == "example.test." {
            Ok(loopback_mx("127.0.0.1"))
        } else {
            Ok(Vec::new())
        }
    });
    verifier.set_port(port);

    let addresses = collection(&[
        "alice@example.test",
        "ghost@example.test",
        "bob@no-mx.test",
    ]);
    let results = verifier.verify_bulk(&addresses).expect("results");

    assert_eq!(results.len(), 3);
    assert_eq!(results["alice@example.test"], ValidationLevel::Ok);
    assert_eq!(results["ghost@example.test"], ValidationLevel::SendAttempt);
    assert_eq!(results["bob@no-mx.test"], ValidationLevel::DnsQuery);

    handle.join().expect("server thread");
    // one domain probed over a single session: one MAIL FROM, two RCPTs
    let sessions = sessions.lock().expect("log");
    assert_eq!(sessions.len(), 1);
    let mail_count = sessions[0]
        .iter()
        .filter(|c| c.starts_with("MAIL FROM:"))
        .count();
    let rcpt_count = sessions[0]
        .iter()
        .filter(|c| c.starts_with("RCPT TO:"))
        .count();
    assert_eq!(mail_count, 1);
    assert_eq!(rcpt_count, 2);
}

#[test]
fn bulk_chunks_respect_the_recipient_cap() {
    let (port, sessions, handle) = spawn_mock(3, accepting_responder(None));
    let mut verifier = verifier_with_mx(|_| Ok(loopback_mx("127.0.0.1")));
    verifier.set_port(port);
    verifier
        .set_max_recipients_per_connection(50)
        .expect("valid cap");

    let mut addresses = AddressCollection::new();
    let emails: Vec<String> = (0..120).map(|i| format!("user{i}@example.test")).collect();
    addresses.add_many(&emails).expect("valid addresses");

    let results = verifier.verify_bulk(&addresses).expect("results");
    assert_eq!(results.len(), 120);
    assert!(results.values().all(|level| *level == ValidationLevel::Ok));

    handle.join().expect("server thread");
    let sessions = sessions.lock().expect("log");
    assert_eq!(sessions.len(), 3, "50 + 50 + 20 recipients");
    let mut seen_rcpts = 0;
    for commands in sessions.iter() {
        let mails = commands.iter().filter(|c| c.starts_with("MAIL FROM:")).count();
        let rcpts = commands.iter().filter(|c| c.starts_with("RCPT TO:")).count();
        assert_eq!(mails, 1, "exactly one MAIL FROM per session");
        assert!(rcpts <= 50, "RCPT ceiling respected");
        seen_rcpts += rcpts;
    }
    assert_eq!(seen_rcpts, 120);
}

#[test]
fn bulk_connect_failure_marks_smtp_connection() {
    let port = dead_port();
    let mut verifier = verifier_with_mx(|_| Ok(loopback_mx("127.0.0.1")));
    verifier.set_port(port);

    let addresses = collection(&["a@example.test", "b@example.test"]);
    let results = verifier.verify_bulk(&addresses).expect("results");
    assert_eq!(results.len(), 2);
    assert!(results
        .values()
        .all(|level| *level == ValidationLevel::SmtpConnection));
}

#[test]
fn bulk_greeting_refusal_marks_send_attempt() {
    let (port, _sessions, handle) = spawn_mock(1, greeting_refusing_responder());
    let mut verifier = verifier_with_mx(|_| Ok(loopback_mx("127.0.0.1")));
    verifier.set_port(port);

    let addresses = collection(&["a@example.test", "b@example.test"]);
    let results = verifier.verify_bulk(&addresses).expect("results");
    assert!(results
        .values()
        .all(|level| *level == ValidationLevel::SendAttempt));
    handle.join().expect("server thread");
}

#[test]
fn bulk_connect_depth_accepts_on_connection() {
    let (port, _sessions, handle) = spawn_mock(1, accepting_responder(None));
    let mut verifier = verifier_with_mx(|_| Ok(loopback_mx("127.0.0.1")));
    verifier.set_port(port);
    verifier
        .set_validation_level(ValidationLevel::SmtpConnection)
        .expect("in bounds");

    let addresses = collection(&["a@example.test", "b@example.test"]);
    let results = verifier.verify_bulk(&addresses).expect("results");
    assert_eq!(results.len(), 2);
    assert!(results.values().all(|level| *level == ValidationLevel::Ok));
    handle.join().expect("server thread");
}

#[test]
fn bulk_syntax_depth_never_touches_the_network() {
    let mut verifier = verifier_with_mx(|_| panic!("no DNS expected"));
    verifier
        .set_validation_level(ValidationLevel::SyntaxCheck)
        .expect("in bounds");
    let addresses = collection(&["a@example.test", "b@other.test"]);
    let results = verifier.verify_bulk(&addresses).expect("results");
    assert_eq!(results.len(), 2);
    assert!(results.values().all(|level| *level == ValidationLevel::Ok));
}

#[test]
fn verify_is_monotone_in_requested_level() {
    // the fake accepts everything, so every depth must report Ok
    let levels = [
        ValidationLevel::SyntaxCheck,
        ValidationLevel::DnsQuery,
        ValidationLevel::SmtpConnection,
        ValidationLevel::SendAttempt,
    ];
    let (port, _sessions, handle) = spawn_mock(2, accepting_responder(None));
    let mut verifier = verifier_with_mx(|_| Ok(loopback_mx("127.0.0.1")));
    verifier.set_port(port);
    for level in levels {
        verifier.set_validation_level(level).expect("in bounds");
        assert_eq!(
            verifier.verify("user@example.test").expect("verdict"),
            ValidationLevel::Ok,
            "depth {level} must succeed"
        );
    }
    handle.join().expect("server thread");
}
