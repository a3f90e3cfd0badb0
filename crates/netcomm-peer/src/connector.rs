use netcomm_transport::{SocketAddress, TcpAcceptor};
use tracing::info;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::Result;

/// Connect to a TCP listener with default configuration.
pub fn connect(address: &SocketAddress) -> Result<Connection> {
    connect_with_config(address, ConnectionConfig::default())
}

/// Connect to a TCP listener.
pub fn connect_with_config(address: &SocketAddress, config: ConnectionConfig) -> Result<Connection> {
    let socket = TcpAcceptor::connect(address)?;
    let connection = Connection::from_socket(socket, config)?;
    info!(
        id = connection.id(),
        local = %connection.local_address(),
        remote = %connection.remote_address(),
        "tcp connected"
    );
    Ok(connection)
}

/// Bind a UDP endpoint with default configuration.
pub fn bind_datagram(address: &SocketAddress) -> Result<Connection> {
    bind_datagram_with_config(address, ConnectionConfig::default())
}

/// Bind a UDP endpoint. Its receive loop accepts datagrams from any sender.
pub fn bind_datagram_with_config(
    address: &SocketAddress,
    config: ConnectionConfig,
) -> Result<Connection> {
    let socket = netcomm_transport::bind_datagram(address)?;
    Connection::from_socket(socket, config)
}
