/// Errors that can occur in connection and listener operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] netcomm_transport::TransportError),

    /// Frame-level error (building or writing a message).
    #[error("frame error: {0}")]
    Frame(#[from] netcomm_frame::FrameError),

    /// `start_receiving` was already called on this connection.
    #[error("connection is already receiving")]
    AlreadyReceiving,

    /// The connection was closed.
    #[error("connection is not connected")]
    NotConnected,

    /// A datagram send needs an explicit destination address.
    #[error("datagram send requires a destination address")]
    DestinationRequired,

    /// A worker thread could not be spawned or joined.
    #[error("worker thread error: {0}")]
    Thread(std::io::Error),
}

pub type Result<T> = std::result::Result<T, PeerError>;
