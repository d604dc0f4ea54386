use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use portrelay_frame::{encode, Command};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    command: &'a str,
    args: Vec<String>,
    wire_size: usize,
    source: &'a str,
    timestamp: String,
}

/// Print one command; `source` names where it came from (an endpoint or a
/// file).
pub fn print_command(command: &Command, source: &str, format: OutputFormat) {
    let args: Vec<String> = command
        .arguments()
        .iter()
        .map(|arg| argument_preview(arg))
        .collect();

    match format {
        OutputFormat::Json => {
            let out = CommandOutput {
                command: command.name(),
                args,
                wire_size: command.wire_size(),
                source,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "ARGS", "SIZE", "SOURCE"])
                .add_row(vec![
                    command.name().to_string(),
                    args.join("\n"),
                    command.wire_size().to_string(),
                    source.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "command={} args={:?} size={} source={}",
                command.name(),
                args,
                command.wire_size(),
                source
            );
        }
        OutputFormat::Raw => {
            print_raw(&encode(command));
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn argument_preview(arg: &[u8]) -> String {
    match std::str::from_utf8(arg) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", arg.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
