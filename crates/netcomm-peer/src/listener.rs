use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use netcomm_transport::{SocketAddress, TcpAcceptor};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{PeerError, Result};

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Accepts TCP connections and hands each one to a callback.
pub struct Listener {
    acceptor: TcpAcceptor,
    config: ConnectionConfig,
    closed: Arc<AtomicBool>,
}

impl Listener {
    /// Bind with default connection configuration.
    pub fn bind(address: &SocketAddress) -> Result<Self> {
        Self::bind_with_config(address, ConnectionConfig::default())
    }

    /// Bind; every accepted connection gets a copy of `config`.
    pub fn bind_with_config(address: &SocketAddress, config: ConnectionConfig) -> Result<Self> {
        let acceptor = TcpAcceptor::bind(address)?;
        Ok(Self {
            acceptor,
            config,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The bound address (with the real port when bound to port 0).
    pub fn local_address(&self) -> &SocketAddress {
        self.acceptor.local_address()
    }

    /// Accept one connection (blocking). It is not receiving yet.
    pub fn accept(&self) -> Result<Connection> {
        let socket = self.acceptor.accept()?;
        Connection::from_socket(socket, self.config.clone())
    }

    /// Accept connections until the listener is closed through a
    /// [`ListenerHandle`].
    ///
    /// Accept failures are logged and the loop keeps waiting. `on_accept`
    /// decides whether to call `start_receiving` on each connection.
    pub fn run<F>(&self, on_accept: F)
    where
        F: Fn(Connection),
    {
        info!(local = %self.local_address(), "accept loop started");

        while !self.closed.load(Ordering::Acquire) {
            match self.accept() {
                Ok(connection) => {
                    if self.closed.load(Ordering::Acquire) {
                        connection.close();
                        break;
                    }
                    info!(
                        id = connection.id(),
                        remote = %connection.remote_address(),
                        "connection accepted"
                    );
                    on_accept(connection);
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    thread::sleep(ACCEPT_RETRY_DELAY);
                }
            }
        }

        debug!(local = %self.local_address(), "accept loop stopped");
    }

    /// Run the accept loop on its own thread.
    pub fn spawn<F>(self, on_accept: F) -> Result<ListenerHandle>
    where
        F: Fn(Connection) + Send + 'static,
    {
        let local = self.local_address().clone();
        let closed = Arc::clone(&self.closed);

        let thread = thread::Builder::new()
            .name(format!("netcomm-listener-{}", local.port()))
            .spawn(move || self.run(on_accept))
            .map_err(PeerError::Thread)?;

        Ok(ListenerHandle {
            local,
            closed,
            thread: Some(thread),
        })
    }
}

/// Control handle for a spawned accept loop.
pub struct ListenerHandle {
    local: SocketAddress,
    closed: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn local_address(&self) -> &SocketAddress {
        &self.local
    }

    /// Stop accepting. Idempotent.
    ///
    /// The blocked accept is woken with a throwaway loopback connection.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(err) = TcpAcceptor::connect(&wake_address(&self.local)) {
            debug!(error = %err, "listener wake-up connect failed");
        }
    }

    /// Wait for the accept loop thread to finish.
    pub fn join(mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| PeerError::Thread(std::io::Error::other("listener thread panicked"))),
            None => Ok(()),
        }
    }
}

fn wake_address(local: &SocketAddress) -> SocketAddress {
    match local.host() {
        "0.0.0.0" => SocketAddress::new("127.0.0.1", local.port()),
        "::" => SocketAddress::new("::1", local.port()),
        _ => local.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::mpsc;

    use netcomm_frame::{build_frame, Message};

    use super::*;
    use crate::connector::connect;
    use crate::event::ConnectionEvent;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn accept_returns_connection() {
        let listener = Listener::bind(&SocketAddress::new("127.0.0.1", 0)).unwrap();
        let client = connect(listener.local_address()).unwrap();
        let accepted = listener.accept().unwrap();

        assert_eq!(accepted.remote_address(), client.local_address());
        assert_eq!(accepted.local_address(), listener.local_address());
    }

    #[test]
    fn spawned_listener_serves_clients() {
        let listener = Listener::bind(&SocketAddress::new("127.0.0.1", 0)).unwrap();
        let (tx, rx) = mpsc::channel();

        let handle = listener
            .spawn(move |connection| {
                let tx = tx.clone();
                connection
                    .start_receiving(move |_, event| {
                        if let ConnectionEvent::Completed { message, .. } = event {
                            let _ = tx.send(message.command());
                        }
                    })
                    .unwrap();
            })
            .unwrap();

        for command in [1u8, 2, 3] {
            let client = connect(handle.local_address()).unwrap();
            client.send(&Message::new(command, vec![])).unwrap();
        }

        let mut received: Vec<u8> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        received.sort_unstable();
        assert_eq!(received, vec![1, 2, 3]);

        handle.close();
        handle.join().unwrap();
    }

    #[test]
    fn close_stops_accept_loop() {
        let listener = Listener::bind(&SocketAddress::new("127.0.0.1", 0)).unwrap();
        let (tx, rx) = mpsc::channel::<u64>();
        let handle = listener
            .spawn(move |connection| {
                let _ = tx.send(connection.id());
            })
            .unwrap();

        handle.close();
        handle.close();
        handle.join().unwrap();

        // The wake-up connection is not handed to the callback.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn handler_sees_raw_client_frames() {
        let listener = Listener::bind(&SocketAddress::new("127.0.0.1", 0)).unwrap();
        let address = listener.local_address().clone();
        let (tx, rx) = mpsc::channel();
        let handle = listener
            .spawn(move |connection| {
                let tx = tx.clone();
                connection
                    .start_receiving(move |_, event| {
                        let _ = tx.send(event.name());
                    })
                    .unwrap();
            })
            .unwrap();

        let mut raw = TcpAcceptor::connect(&address).unwrap();
        raw.write_all(&build_frame(&Message::new(9, vec![])).unwrap())
            .unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "completed");
        drop(raw);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), "closed");

        handle.close();
        handle.join().unwrap();
    }

    #[test]
    fn wake_address_maps_unspecified_hosts() {
        assert_eq!(
            wake_address(&SocketAddress::new("0.0.0.0", 7)),
            SocketAddress::new("127.0.0.1", 7)
        );
        assert_eq!(
            wake_address(&SocketAddress::new("::", 7)),
            SocketAddress::new("::1", 7)
        );
    }
}
