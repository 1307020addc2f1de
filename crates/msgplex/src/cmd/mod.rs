use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use msgplex_transport::SocketAddress;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

use serve::BindingSpec;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve one or more addresses, each with its own handler.
    Serve(ServeArgs),
    /// Send one message and print the response.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// ADDRESS=HANDLER pairs, e.g. unix:/tmp/a.sock=echo tcp:127.0.0.1:9000=ack
    /// tcp6:[::1]:9000=prefix:OK:. Handlers: echo, ack, prefix:TEXT.
    #[arg(required = true, value_name = "ADDRESS=HANDLER")]
    pub bindings: Vec<BindingSpec>,
    /// Longest single readiness wait (e.g. 250ms, 1s).
    #[arg(long, default_value = "250ms")]
    pub tick: String,
    /// Exit after handling N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Listen backlog.
    #[arg(long, default_value_t = msgplex_transport::DEFAULT_BACKLOG)]
    pub backlog: i32,
    /// Reject frames whose declared length exceeds this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_payload: Option<u64>,
    /// Log request and response contents at debug level.
    #[arg(long)]
    pub log_payloads: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to (unix:PATH, /path, tcp:HOST:PORT, tcp4:..., tcp6:...).
    pub address: SocketAddress,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Read and write timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Reject a response whose declared length exceeds this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_payload: Option<u64>,
    /// Log request and response contents at debug level.
    #[arg(long)]
    pub log_payloads: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `250ms`, `5s`, `2m` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split);

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input:?}")))?;
    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "" | "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        other => {
            return Err(CliError::new(
                USAGE,
                format!("unsupported duration unit {other:?} in {input:?}"),
            ))
        }
    };

    if duration.is_zero() {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(duration)
}
