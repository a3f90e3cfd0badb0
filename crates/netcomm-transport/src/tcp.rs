use std::net::{TcpListener, TcpStream};

use tracing::{debug, info};

use crate::address::SocketAddress;
use crate::error::{Result, TransportError};
use crate::socket::NetSocket;

/// TCP transport.
///
/// Provides bind/accept/connect over IPv4/IPv6 stream sockets. Every call
/// blocks the calling thread.
pub struct TcpAcceptor {
    listener: TcpListener,
    local: SocketAddress,
}

impl TcpAcceptor {
    /// Bind and listen on `address`.
    ///
    /// Port `0` asks the OS for an ephemeral port; [`local_address`] reports
    /// the one actually bound.
    ///
    /// [`local_address`]: TcpAcceptor::local_address
    pub fn bind(address: &SocketAddress) -> Result<Self> {
        let resolved = address.resolve()?;
        let listener = TcpListener::bind(resolved).map_err(|e| TransportError::Bind {
            address: address.clone(),
            source: e,
        })?;
        let local = SocketAddress::from(listener.local_addr()?);

        info!(%local, "listening on tcp socket");

        Ok(Self { listener, local })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<NetSocket> {
        let (stream, remote) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%remote, "accepted connection");
        Ok(NetSocket::from_tcp(stream))
    }

    /// Connect to a listening TCP socket (blocking).
    pub fn connect(address: &SocketAddress) -> Result<NetSocket> {
        let resolved = address.resolve()?;
        let stream = TcpStream::connect(resolved).map_err(|e| TransportError::Connect {
            address: address.clone(),
            source: e,
        })?;
        debug!(%address, "connected to tcp socket");
        Ok(NetSocket::from_tcp(stream))
    }

    /// The address this acceptor is bound to.
    pub fn local_address(&self) -> &SocketAddress {
        &self.local
    }
}
