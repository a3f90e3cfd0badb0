//! Threaded connection workers for netcomm frames.
//!
//! This is the layer applications use. A [`Connection`] owns one TCP stream
//! or UDP endpoint; `start_receiving` runs a dedicated thread that reads,
//! feeds the frame parser and reports [`ConnectionEvent`]s to a callback,
//! while a watchdog thread reports frames that stall halfway. A
//! [`Listener`] accepts TCP connections on its own thread.

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod event;
pub mod listener;
mod watchdog;

pub use config::{
    ConnectionConfig, DEFAULT_POLL_INTERVAL, DEFAULT_READ_CHUNK_SIZE, DEFAULT_STALL_TIMEOUT,
};
pub use connection::Connection;
pub use connector::{bind_datagram, bind_datagram_with_config, connect, connect_with_config};
pub use error::{PeerError, Result};
pub use event::{AcceptHandler, ConnectionEvent, EventHandler};
pub use listener::{Listener, ListenerHandle};
