use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use netcomm_frame::{build_frame, write_all_retrying, FrameParser, Message, Progress};
use netcomm_transport::{NetSocket, Protocol, SocketAddress};
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::{PeerError, Result};
use crate::event::{ConnectionEvent, EventHandler};
use crate::watchdog::Watchdog;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Largest UDP payload; a shorter receive buffer truncates datagrams.
const MAX_DATAGRAM_SIZE: usize = 65536;

struct Inner {
    id: u64,
    socket: NetSocket,
    local: SocketAddress,
    remote: SocketAddress,
    config: ConnectionConfig,
    connected: AtomicBool,
    receiving: AtomicBool,
}

/// One open socket (TCP stream or UDP endpoint) with its receive worker.
///
/// `Connection` is a cheap handle; clones share the socket. Handlers get a
/// reference to it so they can reply or close from inside the callback.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub(crate) fn from_socket(socket: NetSocket, config: ConnectionConfig) -> Result<Self> {
        let local = socket.local_address()?;
        let remote = match socket.protocol() {
            Protocol::Tcp => socket.peer_address().unwrap_or_else(SocketAddress::unspecified),
            Protocol::Udp => SocketAddress::unspecified(),
        };

        // Streams wake from a blocked read on shutdown; datagram endpoints
        // have to poll for a local close.
        match socket.protocol() {
            Protocol::Tcp => socket.set_read_timeout(None)?,
            Protocol::Udp => socket.set_read_timeout(Some(config.poll_interval))?,
        }
        socket.set_write_timeout(config.frame.write_timeout)?;

        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(id, protocol = %socket.protocol(), %local, %remote, "connection opened");

        Ok(Self {
            inner: Arc::new(Inner {
                id,
                socket,
                local,
                remote,
                config,
                connected: AtomicBool::new(true),
                receiving: AtomicBool::new(false),
            }),
        })
    }

    /// Process-unique connection number.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn protocol(&self) -> Protocol {
        self.inner.socket.protocol()
    }

    pub fn local_address(&self) -> &SocketAddress {
        &self.inner.local
    }

    /// TCP peer address. Datagram endpoints report `0.0.0.0:0`.
    pub fn remote_address(&self) -> &SocketAddress {
        &self.inner.remote
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Close the socket. Safe to call more than once and from a handler.
    ///
    /// A receiving connection delivers `Closed` and its loop exits.
    pub fn close(&self) {
        if !self.inner.connected.swap(false, Ordering::AcqRel) {
            return;
        }
        debug!(id = self.inner.id, "closing connection");
        if let Err(err) = self.inner.socket.shutdown() {
            debug!(id = self.inner.id, error = %err, "shutdown failed");
        }
    }

    /// Send one message to the TCP peer.
    ///
    /// Datagram endpoints need a destination: use [`send_to`](Self::send_to).
    pub fn send(&self, message: &Message) -> Result<()> {
        if self.protocol() == Protocol::Udp {
            return Err(PeerError::DestinationRequired);
        }
        self.send_frame(message, None)
    }

    /// Send one message to `address`. Stream connections ignore the address.
    pub fn send_to(&self, message: &Message, address: &SocketAddress) -> Result<()> {
        let dest = match self.protocol() {
            Protocol::Tcp => None,
            Protocol::Udp => Some(address.resolve()?),
        };
        self.send_frame(message, dest)
    }

    fn send_frame(&self, message: &Message, dest: Option<std::net::SocketAddr>) -> Result<()> {
        if !self.is_connected() {
            return Err(PeerError::NotConnected);
        }

        let frame = build_frame(message)?;
        write_all_retrying(&frame, |chunk| self.inner.socket.send(chunk, dest))?;

        trace!(
            id = self.inner.id,
            command = message.command(),
            len = frame.len(),
            "sent frame"
        );
        Ok(())
    }

    /// Start the receive worker.
    ///
    /// `handler` is called on the worker thread for every completed frame and
    /// for the final `Closed` or `ParsingError`, and on the watchdog thread
    /// for `Interrupted`.
    pub fn start_receiving<F>(&self, handler: F) -> Result<JoinHandle<()>>
    where
        F: Fn(&Connection, ConnectionEvent) + Send + Sync + 'static,
    {
        self.start_receiving_shared(Arc::new(handler))
    }

    /// [`start_receiving`](Self::start_receiving) with a handler shared
    /// across connections.
    pub fn start_receiving_shared(&self, handler: EventHandler) -> Result<JoinHandle<()>> {
        if self.inner.receiving.swap(true, Ordering::AcqRel) {
            return Err(PeerError::AlreadyReceiving);
        }

        let id = self.inner.id;
        let watchdog = {
            let connection = self.clone();
            let handler = Arc::clone(&handler);
            Watchdog::spawn(
                format!("netcomm-watchdog-{id}"),
                self.inner.config.stall_timeout,
                move |remote| {
                    warn!(id, %remote, "frame stalled");
                    handler(&connection, ConnectionEvent::Interrupted { remote });
                },
            )
        };
        let watchdog = match watchdog {
            Ok(watchdog) => watchdog,
            Err(err) => {
                self.inner.receiving.store(false, Ordering::Release);
                return Err(PeerError::Thread(err));
            }
        };

        let connection = self.clone();
        thread::Builder::new()
            .name(format!("netcomm-conn-{id}"))
            .spawn(move || connection.receive_loop(&handler, &watchdog))
            .map_err(|err| {
                self.inner.receiving.store(false, Ordering::Release);
                PeerError::Thread(err)
            })
    }

    fn receive_loop(&self, handler: &EventHandler, watchdog: &Watchdog) {
        let inner = &self.inner;
        let protocol = inner.socket.protocol();
        let mut parser = FrameParser::with_config(&inner.config.frame);
        let buf_len = match protocol {
            Protocol::Tcp => inner.config.read_chunk_size.max(1),
            Protocol::Udp => MAX_DATAGRAM_SIZE,
        };
        let mut buf = vec![0u8; buf_len];
        let mut remote = inner.remote.clone();

        debug!(id = inner.id, %protocol, "receive loop started");

        'receive: loop {
            let (read, from) = match inner.socket.recv(&mut buf) {
                Ok(received) => received,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if self.is_connected() {
                        continue;
                    }
                    break;
                }
                Err(err) if protocol == Protocol::Udp && self.is_connected() => {
                    // ICMP errors from earlier sends surface here on some
                    // platforms; the endpoint itself is still usable.
                    debug!(id = inner.id, error = %err, "datagram receive error");
                    continue;
                }
                Err(err) => {
                    debug!(id = inner.id, error = %err, "receive failed");
                    break;
                }
            };

            if !self.is_connected() {
                break;
            }
            if read == 0 {
                if protocol == Protocol::Udp {
                    continue;
                }
                break;
            }
            if let Some(from) = from {
                remote = from;
            }

            trace!(id = inner.id, len = read, "received bytes");
            parser.append(&buf[..read]);

            loop {
                // The handler may have closed the connection mid-batch.
                if !self.is_connected() {
                    break 'receive;
                }
                match parser.advance() {
                    Ok(Progress::Completed(message)) => {
                        watchdog.disarm();
                        trace!(id = inner.id, command = message.command(), "frame completed");
                        handler(
                            self,
                            ConnectionEvent::Completed {
                                message,
                                remote: remote.clone(),
                            },
                        );
                    }
                    Ok(Progress::AwaitingMore) => {
                        watchdog.arm(remote.clone());
                        break;
                    }
                    Ok(Progress::NoData) => {
                        watchdog.disarm();
                        break;
                    }
                    Err(error) => {
                        watchdog.disarm();
                        warn!(id = inner.id, %remote, %error, "parsing error");
                        handler(self, ConnectionEvent::ParsingError { error, remote });
                        return;
                    }
                }
            }
        }

        watchdog.disarm();
        if protocol == Protocol::Tcp {
            inner.connected.store(false, Ordering::Release);
        }
        debug!(id = inner.id, %remote, "receive loop closed");
        handler(self, ConnectionEvent::Closed { remote });
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("protocol", &self.protocol())
            .field("local", &format_args!("{}", self.inner.local))
            .field("remote", &format_args!("{}", self.inner.remote))
            .field("connected", &self.is_connected())
            .finish()
    }
}
