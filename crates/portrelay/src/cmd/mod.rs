use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use portrelay_peer::{PeerConfig, RelayPeer, Role};
use portrelay_transport::DialPolicy;

use crate::exit::{io_error, peer_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode a command and write the frame to stdout.
    Encode(EncodeArgs),
    /// Decode one frame from stdin or a file.
    Decode(DecodeArgs),
    /// Connect, send a single command, optionally wait for one back.
    Send(SendArgs),
    /// Connect and print received commands.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Command name.
    pub name: String,
    /// Command arguments.
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Read the frame from a file instead of stdin.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Command name.
    pub name: String,
    /// Command arguments.
    pub args: Vec<String>,
    /// Wait for one inbound command and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Exit after receiving N commands.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RoleArg {
    Client,
    Server,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Client => Role::Client,
            RoleArg::Server => Role::Server,
        }
    }
}

/// Endpoint and retry flags shared by the connecting subcommands.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Relay host. Falls back to BOT_CLIENT_HOST / BOT_SERVER_HOST.
    #[arg(long)]
    pub host: Option<String>,
    /// Relay port. Falls back to BOT_CLIENT_PORT / BOT_SERVER_PORT.
    #[arg(long)]
    pub port: Option<String>,
    /// Which environment variables to fall back to.
    #[arg(long, value_enum, default_value = "client")]
    pub role: RoleArg,
    /// Dial deadline for each attempt (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub dial_timeout: String,
    /// Connection attempts before giving up.
    #[arg(long, default_value = "1")]
    pub retries: u32,
}

impl ConnectArgs {
    pub fn peer_config(&self) -> CliResult<PeerConfig> {
        Ok(PeerConfig {
            role: self.role.into(),
            dial: DialPolicy {
                timeout: Some(parse_duration(&self.dial_timeout)?),
                ..DialPolicy::default()
            },
            ..PeerConfig::default()
        })
    }

    pub fn build_peer(&self) -> CliResult<RelayPeer> {
        Ok(RelayPeer::new(self.peer_config()?))
    }

    /// Connect `peer`, retrying connection failures `--retries` times.
    pub async fn start(&self, peer: &RelayPeer) -> CliResult<()> {
        peer.start_with_retry(
            self.host.as_deref().unwrap_or_default(),
            self.port.as_deref().unwrap_or_default(),
            self.retries.max(1),
        )
        .await
        .map_err(|err| peer_error("connect failed", err))
    }

    /// `host:port` as given on the command line, for output.
    pub fn describe(&self) -> String {
        format!(
            "{}:{}",
            self.host.as_deref().unwrap_or("$host"),
            self.port.as_deref().unwrap_or("$port")
        )
    }
}

pub fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start async runtime", err))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
