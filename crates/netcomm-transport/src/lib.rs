//! Blocking TCP/UDP transport for netcomm.
//!
//! This is the lowest layer of netcomm. It knows nothing about frames: it
//! opens sockets, reports their addresses, and moves bytes. Everything else
//! builds on top of the [`NetSocket`] type provided here.

pub mod address;
pub mod error;
pub mod socket;
pub mod tcp;
pub mod udp;

pub use address::SocketAddress;
pub use error::{Result, TransportError};
pub use socket::{NetSocket, Protocol};
pub use tcp::TcpAcceptor;
pub use udp::bind_datagram;
