use std::net::UdpSocket;

use tracing::info;

use crate::address::SocketAddress;
use crate::error::{Result, TransportError};
use crate::socket::NetSocket;

/// Bind a datagram endpoint on `address` (blocking socket).
pub fn bind_datagram(address: &SocketAddress) -> Result<NetSocket> {
    let resolved = address.resolve()?;
    let socket = UdpSocket::bind(resolved).map_err(|e| TransportError::Bind {
        address: address.clone(),
        source: e,
    })?;
    let local = SocketAddress::from(socket.local_addr()?);

    info!(%local, "bound udp socket");

    Ok(NetSocket::from_udp(socket))
}
