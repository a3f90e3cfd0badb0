use std::fmt;
use std::io;

use netcomm_frame::FrameError;
use netcomm_peer::PeerError;
use netcomm_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { .. } | TransportError::Connect { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        TransportError::Accept(source) | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidAddress(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::Resolve { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        FrameError::CommandOverflow(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::NotConnected => CliError::new(FAILURE, format!("{context}: {err}")),
        PeerError::DestinationRequired => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_exit_codes() {
        let timeout = io_error("recv", io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(timeout.code, TIMEOUT);
        let refused = io_error("connect", io::Error::from(io::ErrorKind::ConnectionRefused));
        assert_eq!(refused.code, TRANSPORT_ERROR);
        assert!(refused.message.starts_with("connect: "));
    }

    #[test]
    fn frame_errors_are_data_invalid() {
        let err = frame_error("send", FrameError::UnknownTag(0x66));
        assert_eq!(err.code, DATA_INVALID);
        let err = frame_error("build", FrameError::CommandOverflow(300));
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn peer_errors_unwrap_layers() {
        let err = peer_error(
            "connect",
            PeerError::Transport(TransportError::InvalidAddress("nope".into())),
        );
        assert_eq!(err.code, USAGE);
        let err = peer_error("send", PeerError::DestinationRequired);
        assert_eq!(err.code, USAGE);
    }
}
