//! Minimal echo server: every message received over TCP is sent back.
//!
//! Run with:
//!   cargo run --example echo-server --features peer
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:10010 \
//!     --command 136 --arg int:-256 --arg str:Hello --wait --wait-timeout 3s

use netcomm::peer::{ConnectionEvent, Listener};
use netcomm::transport::SocketAddress;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let address: SocketAddress = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:10010".to_string())
        .parse()?;

    let listener = Listener::bind(&address)?;
    eprintln!("Listening on {}", listener.local_address());

    listener.run(|connection| {
        eprintln!("Client connected: {}", connection.remote_address());
        let started = connection.start_receiving(|connection, event| match event {
            ConnectionEvent::Completed { message, remote } => {
                eprintln!("Received 0x{:02X} from {remote}", message.command());
                if let Err(err) = connection.send(&message) {
                    eprintln!("Echo failed: {err}");
                }
            }
            ConnectionEvent::Interrupted { remote } => eprintln!("Interrupted: {remote}"),
            ConnectionEvent::ParsingError { error, remote } => {
                eprintln!("Parsing error from {remote}: {error}");
                connection.close();
            }
            ConnectionEvent::Closed { remote } => eprintln!("Closed: {remote}"),
        });
        if let Err(err) = started {
            eprintln!("Receive worker failed: {err}");
        }
    });

    Ok(())
}
