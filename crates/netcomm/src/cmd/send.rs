use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use netcomm_frame::Message;
use netcomm_peer::{bind_datagram_with_config, connect_with_config, Connection, ConnectionEvent};
use netcomm_transport::{Protocol, SocketAddress};
use tracing::debug;

use crate::cmd::{Context, SendArgs};
use crate::exit::{
    frame_error, peer_error, transport_error, CliError, CliResult, DATA_INVALID, FAILURE,
    SUCCESS, TIMEOUT,
};
use crate::output::{print_received, Received};

pub fn run(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let message = Message::try_with_command(args.command, args.args)
        .map_err(|err| frame_error("invalid message", err))?;

    let connection = if args.udp {
        let local = local_endpoint_for(&args.address)?;
        bind_datagram_with_config(&local, ctx.connection.clone())
    } else {
        connect_with_config(&args.address, ctx.connection.clone())
    }
    .map_err(|err| peer_error("connect failed", err))?;

    let replies = if args.wait {
        Some(subscribe(&connection)?)
    } else {
        None
    };

    connection
        .send_to(&message, &args.address)
        .map_err(|err| peer_error("send failed", err))?;
    debug!(
        command = message.command(),
        args = message.len(),
        remote = %args.address,
        "message sent"
    );

    let result = match replies {
        Some(rx) => wait_for_reply(&rx, args.wait_timeout).map(|reply| {
            print_received(&reply, ctx.format);
            SUCCESS
        }),
        None => Ok(SUCCESS),
    };

    connection.close();
    result
}

/// A datagram endpoint on an ephemeral port in the destination's family.
fn local_endpoint_for(destination: &SocketAddress) -> CliResult<SocketAddress> {
    let resolved = destination
        .resolve()
        .map_err(|err| transport_error("resolve failed", err))?;
    let host = if resolved.is_ipv6() { "::" } else { "0.0.0.0" };
    Ok(SocketAddress::new(host, 0))
}

fn subscribe(connection: &Connection) -> CliResult<Receiver<(Protocol, ConnectionEvent)>> {
    let (tx, rx) = mpsc::channel();
    connection
        .start_receiving(move |connection, event| {
            let _ = tx.send((connection.protocol(), event));
        })
        .map_err(|err| peer_error("receive failed", err))?;
    Ok(rx)
}

fn wait_for_reply(
    rx: &Receiver<(Protocol, ConnectionEvent)>,
    timeout: Duration,
) -> CliResult<Received> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let (protocol, event) = match rx.recv_timeout(remaining) {
            Ok(item) => item,
            Err(RecvTimeoutError::Timeout) => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no reply within {}ms", timeout.as_millis()),
                ))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::new(FAILURE, "receive worker stopped"))
            }
        };

        match event {
            ConnectionEvent::Completed { message, remote } => {
                return Ok(Received {
                    protocol,
                    remote,
                    message,
                })
            }
            ConnectionEvent::Interrupted { remote } => {
                debug!(%remote, "reply stalled, still waiting");
            }
            ConnectionEvent::ParsingError { error, .. } => {
                return Err(CliError::new(
                    DATA_INVALID,
                    format!("invalid reply: {error}"),
                ))
            }
            ConnectionEvent::Closed { .. } => {
                return Err(CliError::new(
                    FAILURE,
                    "connection closed before a reply arrived",
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_endpoint_follows_destination_family() {
        let v4 = local_endpoint_for(&SocketAddress::new("127.0.0.1", 10010)).unwrap();
        assert_eq!(v4, SocketAddress::new("0.0.0.0", 0));
        let v6 = local_endpoint_for(&SocketAddress::new("::1", 10010)).unwrap();
        assert_eq!(v6, SocketAddress::new("::", 0));
    }

    #[test]
    fn wait_times_out_without_reply() {
        let (_tx, rx) = mpsc::channel::<(Protocol, ConnectionEvent)>();
        let err = wait_for_reply(&rx, Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn wait_skips_interrupted_and_fails_on_close() {
        let (tx, rx) = mpsc::channel();
        let remote = SocketAddress::new("127.0.0.1", 1);
        tx.send((
            Protocol::Tcp,
            ConnectionEvent::Interrupted {
                remote: remote.clone(),
            },
        ))
        .unwrap();
        tx.send((Protocol::Tcp, ConnectionEvent::Closed { remote }))
            .unwrap();
        let err = wait_for_reply(&rx, Duration::from_secs(1)).unwrap_err();
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn wait_returns_completed_message() {
        let (tx, rx) = mpsc::channel();
        tx.send((
            Protocol::Udp,
            ConnectionEvent::Completed {
                message: Message::new(0x88, vec![]),
                remote: SocketAddress::new("127.0.0.1", 1),
            },
        ))
        .unwrap();
        let reply = wait_for_reply(&rx, Duration::from_secs(1)).unwrap();
        assert_eq!(reply.protocol, Protocol::Udp);
        assert_eq!(reply.message.command(), 0x88);
    }
}
