mod cmd;
mod exit;
mod logging;
mod output;

use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use netcomm_peer::ConnectionConfig;

use crate::cmd::{parse_duration, Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "netcomm",
    version,
    about = "Send and receive typed command messages over TCP and UDP"
)]
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

    /// How long a partial frame may stall before it is reported.
    #[arg(
        long,
        value_name = "DURATION",
        env = "NETCOMM_STALL_TIMEOUT",
        default_value = "15s",
        value_parser = parse_duration,
        global = true
    )]
    stall_timeout: Duration,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit::SUCCESS,
                _ => exit::USAGE,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_logging(cli.log_format, cli.log_level);

    let ctx = Context {
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
        connection: ConnectionConfig::default().with_stall_timeout(cli.stall_timeout),
    };

    match cmd::run(cli.command, &ctx) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
