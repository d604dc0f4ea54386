mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "portrelay", version, about = "Length-prefixed command relay CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "portrelay",
            "send",
            "--host",
            "127.0.0.1",
            "--port",
            "7000",
            "say",
            "hello",
            "world",
            "--wait",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.name, "say");
        assert_eq!(args.args, vec!["hello", "world"]);
        assert!(args.wait);
        assert_eq!(args.connect.retries, 1);
    }

    #[test]
    fn send_requires_command_name() {
        let err = Cli::try_parse_from(["portrelay", "send", "--host", "h"])
            .expect_err("missing name should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parses_listen_with_server_role() {
        let cli = Cli::try_parse_from([
            "portrelay",
            "listen",
            "--role",
            "server",
            "--count",
            "2",
            "--format",
            "json",
        ])
        .expect("listen args should parse");
        let Command::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(args.count, Some(2));
        assert!(matches!(args.connect.role, cmd::RoleArg::Server));
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn parses_encode_and_decode() {
        let cli = Cli::try_parse_from(["portrelay", "encode", "ping"]).expect("encode");
        assert!(matches!(cli.command, Command::Encode(_)));
        let cli = Cli::try_parse_from(["portrelay", "decode", "--file", "/tmp/frame.bin"])
            .expect("decode");
        assert!(matches!(cli.command, Command::Decode(_)));
    }
}
