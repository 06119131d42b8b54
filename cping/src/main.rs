use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use std::io::{self, Write};
use tracing::{debug, info, warn};

use cping::config::{self, Config, DEFAULT_PAYLOAD};
use cping::{EchoSender, PingError};

#[derive(Parser, Debug)]
#[command(name = "cping")]
#[command(about = "Send ICMP echo requests and report like a router would")]
#[command(version)]
struct Args {
    /// Send ICMPv4 echo requests (default)
    #[arg(long, conflicts_with = "ipv6")]
    ipv4: bool,

    /// Send ICMPv6 echo requests
    #[arg(long)]
    ipv6: bool,

    /// Number of echo requests to send
    #[arg(short, long, default_value = "5")]
    count: u32,

    /// Datagram size in bytes, IP header included
    #[arg(short, long, default_value = "100")]
    size: usize,

    /// Payload pattern repeated to fill each request (default: 0xABCD)
    #[arg(short, long, value_parser = clap::builder::NonEmptyStringValueParser::new())]
    payload: Option<String>,

    /// Outgoing TTL / hop limit
    #[arg(long, default_value = "64")]
    ttl: u32,

    /// Seconds to wait for each reply
    #[arg(short, long, default_value = "2")]
    timeout: u64,

    /// Verbose logging (default: false)
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Destination address
    destination: String,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Config {
            ip_version: if args.ipv6 { 6 } else { 4 },
            dest: args.destination.clone(),
            count: args.count,
            size: args.size,
            payload: args
                .payload
                .as_ref()
                .map(|p| p.as_bytes().to_vec())
                .unwrap_or_else(|| DEFAULT_PAYLOAD.to_vec()),
            ttl: args.ttl,
            timeout_secs: args.timeout,
        }
    }
}

fn parse_args<I: IntoIterator<Item = String>>(raw: I) -> Result<Args, clap::Error> {
    let argv = std::iter::once("cping".to_string()).chain(config::normalize_args(raw));
    Args::try_parse_from(argv)
}

/// Run every attempt, printing one glyph each. Stops at the first fatal error.
fn run(sender: &mut EchoSender) -> Result<()> {
    let mut stdout = io::stdout();

    for attempt in 1..=sender.config().count {
        let glyph = match sender.send_and_receive() {
            Ok(()) => '!',
            Err(PingError::Echo(failure)) => failure.glyph(),
            Err(e) => {
                println!();
                warn!("Aborting run at attempt {}: {}", attempt, e);
                return Err(e).with_context(|| format!("echo attempt {} failed", attempt));
            }
        };

        print!("{}", glyph);
        stdout.flush()?;
    }

    println!();
    println!("{}", sender.summary());
    Ok(())
}

fn main() -> Result<()> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.is_empty() {
        Args::command().print_help()?;
        return Ok(());
    }

    let args = parse_args(raw).unwrap_or_else(|e| e.exit());

    let log_level = if args.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .init();

    let config = Config::from(&args);
    if !config.valid_ip() {
        bail!("malformed ip address");
    }
    info!("Pinging {} over IPv{} (ttl {})", config.dest, config.ip_version, config.ttl);

    println!(
        "Sending {}, {}-byte ICMP Echos to {}, timeout is {} seconds:",
        config.count, config.size, config.dest, config.timeout_secs
    );

    let mut sender: EchoSender = EchoSender::new(config);
    let result = run(&mut sender);

    if let Err(e) = sender.close() {
        debug!("Nothing to close: {}", e);
    }

    result
}
