use crate::address::SocketAddress;

/// Errors that can occur in socket transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host/port pair did not resolve to any socket address.
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        address: SocketAddress,
        source: std::io::Error,
    },

    /// Failed to bind to the specified address.
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: SocketAddress,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: SocketAddress,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The address string is not `host:port`.
    #[error("invalid socket address '{0}' (expected host:port)")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
