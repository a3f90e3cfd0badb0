#![cfg(feature = "cli")]

use std::io;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use netcomm_frame::{Message, TypedValue};
use netcomm_peer::{connect, Connection, ConnectionEvent, Listener};
use netcomm_transport::SocketAddress;

const WAIT: Duration = Duration::from_secs(5);

fn netcomm() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_netcomm"));
    cmd.args(["--log-level", "error"]);
    cmd
}

fn free_tcp_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("ephemeral port should be available")
}

fn wait_for_connect(address: &SocketAddress, timeout: Duration) -> io::Result<Connection> {
    let start = Instant::now();
    loop {
        match connect(address) {
            Ok(connection) => return Ok(connection),
            Err(err) => {
                if start.elapsed() >= timeout {
                    return Err(io::Error::other(format!("connect timeout: {err}")));
                }
                thread::sleep(Duration::from_millis(25));
            }
        }
    }
}

#[test]
fn version_prints_name() {
    let output = netcomm()
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("netcomm "), "stdout: {stdout}");
}

#[test]
fn send_delivers_typed_arguments_in_order() {
    let listener = Listener::bind(&SocketAddress::new("127.0.0.1", 0)).unwrap();
    let address = listener.local_address().clone();
    let (tx, rx) = mpsc::channel();
    let handle = listener
        .spawn(move |connection| {
            let tx = tx.clone();
            connection
                .start_receiving(move |_, event| {
                    if let ConnectionEvent::Completed { message, .. } = event {
                        let _ = tx.send(message);
                    }
                })
                .unwrap();
        })
        .unwrap();

    let status = netcomm()
        .args(["send", &address.to_string(), "--command", "136"])
        .args(["--arg", "int:-256", "--arg", "bool:true", "--arg", "str:Hello"])
        .args(["--arg", "bytes:414243"])
        .status()
        .expect("send should run");
    assert!(status.success());

    let message = rx.recv_timeout(WAIT).expect("message should arrive");
    assert_eq!(message.command(), 0x88);
    assert_eq!(
        message.args(),
        &[
            TypedValue::Integer(-256),
            TypedValue::Boolean(true),
            TypedValue::String("Hello".to_string()),
            TypedValue::ByteArray(vec![0x41, 0x42, 0x43]),
        ]
    );

    handle.close();
    handle.join().unwrap();
}

#[test]
fn send_wait_prints_echoed_reply() {
    let listener = Listener::bind(&SocketAddress::new("127.0.0.1", 0)).unwrap();
    let address = listener.local_address().clone();
    let handle = listener
        .spawn(|connection| {
            connection
                .start_receiving(|connection, event| {
                    if let ConnectionEvent::Completed { message, .. } = event {
                        let _ = connection.send(&message);
                    }
                })
                .unwrap();
        })
        .unwrap();

    let output = netcomm()
        .args(["--format", "json", "send", &address.to_string()])
        .args(["--command", "7", "--arg", "int:42", "--wait"])
        .output()
        .expect("send should run");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("reply should be one JSON line");
    assert_eq!(line["protocol"], "TCP");
    assert_eq!(line["command"], 7);
    assert_eq!(line["args"][0]["value"], 42);

    handle.close();
    handle.join().unwrap();
}

#[test]
fn send_wait_times_out_without_reply() {
    let listener = Listener::bind(&SocketAddress::new("127.0.0.1", 0)).unwrap();
    let address = listener.local_address().clone();
    let handle = listener
        .spawn(|connection| {
            connection.start_receiving(|_, _| {}).unwrap();
        })
        .unwrap();

    let output = netcomm()
        .args(["send", &address.to_string(), "--command", "1"])
        .args(["--wait", "--wait-timeout", "200ms"])
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(124));

    handle.close();
    handle.join().unwrap();
}

#[test]
fn listen_prints_received_message_and_exits_at_count() {
    let address = SocketAddress::new("127.0.0.1", free_tcp_port());
    let child = netcomm()
        .args(["--format", "pretty", "listen", &address.to_string()])
        .args(["--count", "1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen should start");

    let client = wait_for_connect(&address, Duration::from_secs(3))
        .expect("client should connect to listener");
    client
        .send(
            &Message::new(0x88, vec![])
                .with_arg(-256i64)
                .with_arg("Hello"),
        )
        .unwrap();

    let output = child.wait_with_output().expect("listen should exit");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("TCP ") && stdout.contains("0x88 (-256, Hello)"),
        "stdout: {stdout}"
    );
    client.close();
}

#[test]
fn demo_exchanges_sample_over_both_transports() {
    let output = netcomm()
        .args(["--format", "json", "demo", "--address", "127.0.0.1:0"])
        .args(["--interval", "100ms", "--rounds", "2"])
        .output()
        .expect("demo should run");
    assert!(output.status.success());

    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|line| line["command"] == 136));
    assert_eq!(lines.iter().filter(|line| line["protocol"] == "UDP").count(), 2);
    assert_eq!(lines.iter().filter(|line| line["protocol"] == "TCP").count(), 2);
}

#[test]
fn malformed_argument_is_a_usage_error() {
    let output = netcomm()
        .args(["send", "127.0.0.1:1", "--command", "1", "--arg", "int:abc"])
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn command_out_of_range_is_a_usage_error() {
    let output = netcomm()
        .args(["send", "127.0.0.1:1", "--command", "300"])
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(64));
}
