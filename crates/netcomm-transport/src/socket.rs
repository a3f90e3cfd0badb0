use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, UdpSocket};
use std::time::Duration;

use crate::address::SocketAddress;
use crate::error::Result;

/// Which transport a [`NetSocket`] runs over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open socket: a connected TCP byte stream or a bound UDP endpoint.
///
/// All operations take `&self` so the socket can be shared between the
/// receiving worker and any thread that sends on it.
pub struct NetSocket {
    inner: NetSocketInner,
}

enum NetSocketInner {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl NetSocket {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: NetSocketInner::Tcp(stream),
        }
    }

    pub(crate) fn from_udp(socket: UdpSocket) -> Self {
        Self {
            inner: NetSocketInner::Udp(socket),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match &self.inner {
            NetSocketInner::Tcp(_) => Protocol::Tcp,
            NetSocketInner::Udp(_) => Protocol::Udp,
        }
    }

    /// Local address the socket is bound to.
    pub fn local_address(&self) -> Result<SocketAddress> {
        let addr = match &self.inner {
            NetSocketInner::Tcp(stream) => stream.local_addr()?,
            NetSocketInner::Udp(socket) => socket.local_addr()?,
        };
        Ok(addr.into())
    }

    /// Remote address of a TCP stream. Datagram endpoints have no fixed peer.
    pub fn peer_address(&self) -> Option<SocketAddress> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => stream.peer_addr().ok().map(Into::into),
            NetSocketInner::Udp(socket) => socket.peer_addr().ok().map(Into::into),
        }
    }

    /// Blocking receive.
    ///
    /// Returns the byte count and, for datagrams, the sender's address.
    /// A zero count on a stream means the peer closed the connection.
    pub fn recv(&self, buf: &mut [u8]) -> std::io::Result<(usize, Option<SocketAddress>)> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => {
                let mut stream = stream;
                stream.read(buf).map(|n| (n, None))
            }
            NetSocketInner::Udp(socket) => socket
                .recv_from(buf)
                .map(|(n, from)| (n, Some(SocketAddress::from(from)))),
        }
    }

    /// Single write attempt; may transmit fewer bytes than requested.
    ///
    /// `dest` is only used by datagram endpoints; without it the datagram
    /// goes to the connected peer, if any.
    pub fn send(&self, buf: &[u8], dest: Option<SocketAddr>) -> std::io::Result<usize> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => {
                let mut stream = stream;
                stream.write(buf)
            }
            NetSocketInner::Udp(socket) => match dest {
                Some(dest) => socket.send_to(buf, dest),
                None => socket.send(buf),
            },
        }
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            NetSocketInner::Udp(socket) => socket.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            NetSocketInner::Udp(socket) => socket.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this socket (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => Ok(Self::from_tcp(stream.try_clone()?)),
            NetSocketInner::Udp(socket) => Ok(Self::from_udp(socket.try_clone()?)),
        }
    }

    /// Shut down both directions of a TCP stream.
    ///
    /// A blocked reader on the same stream wakes up with a zero-length read.
    /// Datagram endpoints have nothing to shut down; their readers rely on a
    /// read timeout instead.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => match stream.shutdown(Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
            NetSocketInner::Udp(_) => Ok(()),
        }
    }
}

impl Read for NetSocket {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.recv(buf).map(|(n, _)| n)
    }
}

impl Write for NetSocket {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.send(buf, None)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            NetSocketInner::Tcp(stream) => stream.flush(),
            NetSocketInner::Udp(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for NetSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("NetSocket");
        dbg.field("protocol", &self.protocol());
        if let Ok(local) = self.local_address() {
            dbg.field("local", &format_args!("{local}"));
        }
        dbg.finish()
    }
}
