use std::sync::Arc;

use netcomm_frame::{FrameError, Message};
use netcomm_transport::SocketAddress;

use crate::connection::Connection;

/// Something that happened on a receiving connection.
///
/// `Closed` and `ParsingError` are terminal: the receive loop exits right
/// after delivering one of them.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A frame arrived and decoded cleanly.
    Completed {
        message: Message,
        remote: SocketAddress,
    },
    /// Part of a frame has been buffered longer than the stall timeout.
    Interrupted { remote: SocketAddress },
    /// The byte stream is malformed; nothing more is read.
    ParsingError {
        error: FrameError,
        remote: SocketAddress,
    },
    /// The remote end closed, or the connection was closed locally.
    Closed { remote: SocketAddress },
}

impl ConnectionEvent {
    /// The TCP peer, or the source of the most recent datagram.
    pub fn remote(&self) -> &SocketAddress {
        match self {
            ConnectionEvent::Completed { remote, .. }
            | ConnectionEvent::Interrupted { remote }
            | ConnectionEvent::ParsingError { remote, .. }
            | ConnectionEvent::Closed { remote } => remote,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectionEvent::Completed { .. } => "completed",
            ConnectionEvent::Interrupted { .. } => "interrupted",
            ConnectionEvent::ParsingError { .. } => "parsing-error",
            ConnectionEvent::Closed { .. } => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionEvent::ParsingError { .. } | ConnectionEvent::Closed { .. }
        )
    }
}

/// Shared event callback. Invoked from the connection's receive thread and
/// from its watchdog thread.
pub type EventHandler = Arc<dyn Fn(&Connection, ConnectionEvent) + Send + Sync>;

/// Callback for connections accepted by a listener.
pub type AcceptHandler = Arc<dyn Fn(Connection) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let remote = SocketAddress::new("127.0.0.1", 10010);
        let event = ConnectionEvent::Interrupted {
            remote: remote.clone(),
        };
        assert_eq!(event.remote(), &remote);
        assert_eq!(event.name(), "interrupted");
        assert!(!event.is_terminal());

        let event = ConnectionEvent::ParsingError {
            error: FrameError::UnknownTag(0x66),
            remote,
        };
        assert_eq!(event.name(), "parsing-error");
        assert!(event.is_terminal());
    }
}
