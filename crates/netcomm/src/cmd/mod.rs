use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use netcomm_frame::TypedValue;
use netcomm_peer::{Connection, ConnectionConfig, ConnectionEvent, EventHandler};
use netcomm_transport::SocketAddress;
use tracing::{info, warn};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::{print_received, OutputFormat, Received};

pub mod demo;
pub mod listen;
pub mod send;
pub mod udp;
pub mod version;

const PRINT_POLL: Duration = Duration::from_millis(200);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept TCP connections and print received messages.
    Listen(ListenArgs),
    /// Bind a UDP endpoint and print received messages.
    Udp(UdpArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Exchange a sample message over UDP and TCP on loopback.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Settings shared by every subcommand.
pub struct Context {
    pub format: OutputFormat,
    pub connection: ConnectionConfig,
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, ctx),
        Command::Udp(args) => udp::run(args, ctx),
        Command::Send(args) => send::run(args, ctx),
        Command::Demo(args) => demo::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (host:port).
    pub address: SocketAddress,
    /// Send every received message back to its sender.
    #[arg(long)]
    pub echo: bool,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct UdpArgs {
    /// Address to bind (host:port).
    pub address: SocketAddress,
    /// Send every received message back to its sender.
    #[arg(long)]
    pub echo: bool,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination address (host:port).
    pub address: SocketAddress,
    /// Command byte (0-255).
    #[arg(long, short = 'c')]
    pub command: i64,
    /// Typed argument as KIND:VALUE, repeatable and kept in order.
    /// Kinds: int, float, bool, str, bytes (hex).
    #[arg(long = "arg", short = 'a', value_name = "KIND:VALUE", value_parser = parse_typed_arg)]
    pub args: Vec<TypedValue>,
    /// Send as a UDP datagram instead of over TCP.
    #[arg(long)]
    pub udp: bool,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub wait_timeout: Duration,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Address shared by the UDP endpoint and the TCP server.
    #[arg(long, default_value = "127.0.0.1:10010")]
    pub address: SocketAddress,
    /// Pause between rounds (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub interval: Duration,
    /// Number of rounds; 0 runs until interrupted.
    #[arg(long, default_value_t = 0)]
    pub rounds: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `150ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration value: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Parse one `KIND:VALUE` message argument.
pub fn parse_typed_arg(input: &str) -> Result<TypedValue, String> {
    let (kind, value) = input
        .split_once(':')
        .ok_or_else(|| format!("expected KIND:VALUE, got '{input}'"))?;

    match kind {
        "int" | "i" => value
            .parse::<i64>()
            .map(TypedValue::Integer)
            .map_err(|err| format!("invalid integer '{value}': {err}")),
        "float" | "f" => value
            .parse::<f64>()
            .map(TypedValue::Float)
            .map_err(|err| format!("invalid float '{value}': {err}")),
        "bool" | "b" => match value {
            "true" | "1" => Ok(TypedValue::Boolean(true)),
            "false" | "0" => Ok(TypedValue::Boolean(false)),
            other => Err(format!("invalid boolean '{other}'")),
        },
        "str" | "s" => Ok(TypedValue::String(value.to_string())),
        "bytes" | "x" => parse_hex(value).map(TypedValue::ByteArray),
        other => Err(format!(
            "unknown argument kind '{other}' (int, float, bool, str, bytes)"
        )),
    }
}

fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = input
        .trim_start_matches("0x")
        .bytes()
        .filter(|b| !matches!(b, b',' | b' ' | b'_'))
        .collect();
    if let Some(bad) = digits.iter().find(|b| !b.is_ascii_hexdigit()) {
        return Err(format!(
            "invalid hex digit '{}' in '{input}'",
            char::from(*bad).escape_default()
        ));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{input}'"));
    }
    Ok(digits
        .chunks_exact(2)
        .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
        .collect())
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

/// Event handler shared by the receiving subcommands.
///
/// Completed messages are forwarded to the printing thread (and echoed when
/// asked). Terminal events close the connection.
pub fn forward_events(tx: Sender<Received>, echo: bool) -> EventHandler {
    Arc::new(move |connection: &Connection, event: ConnectionEvent| match event {
        ConnectionEvent::Completed { message, remote } => {
            if echo {
                if let Err(err) = connection.send_to(&message, &remote) {
                    warn!(%remote, error = %err, "echo failed");
                }
            }
            let _ = tx.send(Received {
                protocol: connection.protocol(),
                remote,
                message,
            });
        }
        ConnectionEvent::Interrupted { remote } => {
            info!(%remote, "interrupted");
        }
        ConnectionEvent::ParsingError { error, remote } => {
            warn!(%remote, %error, "parsing error");
            connection.close();
        }
        ConnectionEvent::Closed { remote } => {
            info!(%remote, "closed");
            connection.close();
        }
    })
}

/// Print received messages until `count` is reached, Ctrl-C, or every
/// sender is gone. Returns how many were printed.
pub fn print_until(
    rx: &Receiver<Received>,
    count: Option<usize>,
    running: &AtomicBool,
    format: OutputFormat,
) -> usize {
    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        if count.is_some_and(|count| printed >= count) {
            break;
        }
        match rx.recv_timeout(PRINT_POLL) {
            Ok(received) => {
                print_received(&received, format);
                printed = printed.saturating_add(1);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    printed
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
