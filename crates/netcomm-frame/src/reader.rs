use std::io::{ErrorKind, Read};

use netcomm_transport::NetSocket;

use crate::codec::{FrameConfig, Message};
use crate::error::{FrameError, Result};
use crate::parser::{FrameParser, Progress};

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete messages from any `Read` stream.
///
/// Partial reads are buffered in a [`FrameParser`]; callers only ever see
/// whole messages.
pub struct FrameReader<T> {
    inner: T,
    parser: FrameParser,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            parser: FrameParser::with_config(&config),
            config,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, with
    /// or without a partial frame buffered.
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Progress::Completed(message) = self.parser.advance()? {
                return Ok(message);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.parser.append(&chunk[..read]);
        }
    }

    /// Bytes received but not yet returned as a message.
    pub fn buffered(&self) -> usize {
        self.parser.buffered()
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<NetSocket> {
    /// Create a reader for a stream socket and apply the read timeout from
    /// config.
    pub fn with_config_net(inner: NetSocket, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: netcomm_transport::TransportError) -> FrameError {
    use netcomm_transport::TransportError;

    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Resolve { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
