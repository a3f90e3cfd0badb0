use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use netcomm_frame::{Message, TypedValue};
use netcomm_transport::{Protocol, SocketAddress};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

/// A completed message as handed from a receive thread to the printer.
#[derive(Debug)]
pub struct Received {
    pub protocol: Protocol,
    pub remote: SocketAddress,
    pub message: Message,
}

#[derive(Serialize)]
struct ArgOutput {
    kind: &'static str,
    value: Value,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    protocol: &'a str,
    remote: String,
    command: u8,
    args: Vec<ArgOutput>,
    timestamp: String,
}

pub fn print_received(received: &Received, format: OutputFormat) {
    let message = &received.message;
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                protocol: received.protocol.as_str(),
                remote: received.remote.to_string(),
                command: message.command(),
                args: message.args().iter().map(arg_output).collect(),
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
                .set_header(vec!["PROTOCOL", "REMOTE", "COMMAND", "ARGS"])
                .add_row(vec![
                    received.protocol.to_string(),
                    received.remote.to_string(),
                    format!("0x{:02X}", message.command()),
                    args_line(message.args()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", pretty_line(received)),
    }
}

/// `TCP 127.0.0.1:10010 0x88 (-256, true, Hello, -1.100000, [0x41,0x42,0x43])`
pub fn pretty_line(received: &Received) -> String {
    format!(
        "{} {} 0x{:02X} ({})",
        received.protocol,
        received.remote,
        received.message.command(),
        args_line(received.message.args())
    )
}

fn args_line(args: &[TypedValue]) -> String {
    args.iter()
        .map(|arg| match arg {
            TypedValue::ByteArray(_) => format!("[{arg}]"),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn arg_output(arg: &TypedValue) -> ArgOutput {
    let value = match arg {
        TypedValue::Integer(v) => Value::from(*v),
        // NaN and infinities have no JSON form and become null.
        TypedValue::Float(v) => Value::from(*v),
        TypedValue::Boolean(v) => Value::from(*v),
        TypedValue::String(v) => Value::from(v.as_str()),
        TypedValue::ByteArray(v) => Value::from(v.clone()),
    };
    ArgOutput {
        kind: arg.kind().as_str(),
        value,
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
