//! Command-line front end for the mailprobe library.

use std::collections::HashMap;
use std::io::{self, BufRead};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use mailprobe::{
    AddressCollection, DnsFacade, EmailAddress, LastError, TransferLogEntry, ValidationLevel,
    Verifier, VerifyOptions,
};

#[derive(Parser)]
#[command(name = "mailprobe-cli", version, about = "Staged email deliverability probing")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a single address up to the requested depth
    Verify {
        email: String,
        #[command(flatten)]
        probe: ProbeArgs,
    },
    /// Verify addresses read from stdin, one per line, batched by domain
    Bulk {
        #[command(flatten)]
        probe: ProbeArgs,
    },
    /// Resolve the MX exchanges of a domain, preference order
    Mx {
        domain: String,
        /// output format (human|json)
        #[arg(long, default_value = "human")]
        format: String,
    },
    /// Check an IPv4 address against the configured realtime blacklists
    Rbl {
        ip: String,
        /// output format (human|json)
        #[arg(long, default_value = "human")]
        format: String,
    },
}

#[derive(Args)]
struct ProbeArgs {
    /// probing depth: syntax|dns|connect|send
    #[arg(long, default_value = "send")]
    level: String,
    /// identity announced in EHLO/HELO (default: recipient's domain)
    #[arg(long)]
    helo: Option<String>,
    /// envelope sender (default: user@<helo host>)
    #[arg(long = "from")]
    mail_from: Option<String>,
    /// connect and per-read timeout, seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    /// RCPT ceiling per SMTP session in bulk mode
    #[arg(long = "max-rcpt", default_value_t = 50)]
    max_rcpt: usize,
    /// SMTP port
    #[arg(long, default_value_t = 25)]
    port: u16,
    /// output format (human|json)
    #[arg(long, default_value = "human")]
    format: String,
    /// include the per-host SMTP transfer log
    #[arg(long = "show-log")]
    show_log: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Verify { email, probe } => run_verify(&email, &probe),
        Commands::Bulk { probe } => run_bulk(&probe),
        Commands::Mx { domain, format } => run_mx(&domain, &format),
        Commands::Rbl { ip, format } => run_rbl(&ip, &format),
    }
}

fn build_verifier(probe: &ProbeArgs) -> Result<Verifier> {
    let level: ValidationLevel = probe
        .level
        .parse()
        .map_err(|err: String| anyhow::anyhow!(err))?;
    let options = VerifyOptions {
        validation_level: level,
        hello_domain: probe.helo.clone().unwrap_or_default(),
        mail_from: probe.mail_from.clone().unwrap_or_default(),
        timeout: Duration::from_secs(probe.timeout),
        max_recipients_per_connection: probe.max_rcpt,
        port: probe.port,
        ..VerifyOptions::default()
    };
    Ok(Verifier::with_options(DnsFacade::system(), options)?)
}

#[derive(Serialize)]
struct VerifyPayload<'a> {
    email: &'a str,
    level: ValidationLevel,
    deliverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<&'a LastError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transfer_logs: Option<&'a HashMap<String, Vec<TransferLogEntry>>>,
}

fn run_verify(email: &str, probe: &ProbeArgs) -> Result<ExitCode> {
    let mut verifier = build_verifier(probe)?;
    let level = verifier.verify(email)?;
    let deliverable = level == ValidationLevel::Ok;

    match probe.format.as_str() {
        "human" => {
            if deliverable {
                println!("[OK]    {email}");
            } else {
                println!("[FAIL]  {email} stopped at {level}");
            }
            if let Some(last) = verifier.last_error() {
                println!("        {}: {} {}", last.message, last.code, last.detail);
            }
            if probe.show_log {
                print_transfer_logs(&verifier);
            }
        }
        "json" => {
            let payload = VerifyPayload {
                email,
                level,
                deliverable,
                last_error: verifier.last_error(),
                transfer_logs: probe.show_log.then(|| verifier.transfer_logs()),
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        other => bail!("unknown format '{other}', use human|json"),
    }
    Ok(exit_for(deliverable))
}

#[derive(Serialize)]
struct BulkRow<'a> {
    email: &'a str,
    level: ValidationLevel,
    deliverable: bool,
}

fn run_bulk(probe: &ProbeArgs) -> Result<ExitCode> {
    let mut addresses = AddressCollection::new();
    let mut rejected: Vec<String> = Vec::new();
    for line in io::stdin().lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match EmailAddress::parse(trimmed) {
            Ok(address) => {
                addresses.add(address);
            }
            Err(_) => rejected.push(trimmed.to_string()),
        }
    }

    let mut verifier = build_verifier(probe)?;
    let mut results = verifier.verify_bulk(&addresses)?;
    for email in rejected {
        results.insert(email, ValidationLevel::SyntaxCheck);
    }

    let all_ok = results.values().all(|level| *level == ValidationLevel::Ok);
    match probe.format.as_str() {
        "human" => {
            for (email, level) in &results {
                if *level == ValidationLevel::Ok {
                    println!("[OK]    {email}");
                } else {
                    println!("[FAIL]  {email} stopped at {level}");
                }
            }
            if probe.show_log {
                print_transfer_logs(&verifier);
            }
        }
        "json" => {
            for (email, level) in &results {
                let row = BulkRow {
                    email,
                    level: *level,
                    deliverable: *level == ValidationLevel::Ok,
                };
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        other => bail!("unknown format '{other}', use human|json"),
    }
    Ok(exit_for(all_ok))
}

fn run_mx(domain: &str, format: &str) -> Result<ExitCode> {
    let facade = DnsFacade::system();
    let hosts = facade.mx_hosts_for_domain(domain)?;
    match format {
        "human" => {
            if hosts.is_empty() {
                println!("no MX records for {domain}");
            } else {
                for host in &hosts {
                    println!("{host}");
                }
            }
        }
        "json" => println!("{}", serde_json::to_string(&hosts)?),
        other => bail!("unknown format '{other}', use human|json"),
    }
    Ok(exit_for(!hosts.is_empty()))
}

fn run_rbl(ip: &str, format: &str) -> Result<ExitCode> {
    let facade = DnsFacade::system();
    let status = facade.check_rbl(ip)?;
    match format {
        "human" => match &status {
            mailprobe::RblStatus::NotListed => println!("{ip} is not listed"),
            mailprobe::RblStatus::Listed { server, lookup_url } => {
                println!("{ip} is listed on {server}");
                println!("review: {lookup_url}");
            }
        },
        "json" => println!("{}", serde_json::to_string(&status)?),
        other => bail!("unknown format '{other}', use human|json"),
    }
    Ok(exit_for(!status.is_listed()))
}

fn print_transfer_logs(verifier: &Verifier) {
    for (host, entries) in verifier.transfer_logs() {
        println!("--- {host}");
        for entry in entries {
            let marker = if entry.success { "ok" } else { "!!" };
            println!("  [{marker}] {} -> {} {}", entry.command, entry.code, entry.response);
        }
    }
}

fn exit_for(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
