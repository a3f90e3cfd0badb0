use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use netcomm_transport::NetSocket;

use crate::codec::{encode_message, FrameConfig, Message};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Push all of `bytes` through `write_fn`, retrying short writes.
///
/// `Interrupted` is retried. `WouldBlock` and `TimedOut` mean the socket's
/// write timeout expired and are returned as errors. A zero-length write
/// means the peer is gone.
pub fn write_all_retrying(
    bytes: &[u8],
    mut write_fn: impl FnMut(&[u8]) -> std::io::Result<usize>,
) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match write_fn(&bytes[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send one message (blocking).
    ///
    /// Nothing is written when the message cannot be encoded.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        self.buf.clear();
        encode_message(message, &mut self.buf)?;

        let inner = &mut self.inner;
        write_all_retrying(&self.buf, |chunk| inner.write(chunk))?;

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
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

impl FrameWriter<NetSocket> {
    /// Create a writer for a stream socket and apply the write timeout from
    /// config.
    pub fn with_config_net(inner: NetSocket, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::{build_frame, ARG_MAX};
    use crate::reader::FrameReader;
    use crate::value::TypedValue;

    #[test]
    fn written_bytes_match_build_frame() {
        let message = Message::new(0x21, vec!["abc".into(), 7i64.into()]);
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(&message).unwrap();

        let written = writer.into_inner().into_inner();
        assert_eq!(written, build_frame(&message).unwrap().to_vec());
    }

    #[test]
    fn written_messages_read_back() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(&Message::new(1, vec!["one".into()])).unwrap();
        writer.send(&Message::new(2, vec![false.into()])).unwrap();

        let mut reader = FrameReader::new(Cursor::new(writer.into_inner().into_inner()));
        assert_eq!(reader.read_message().unwrap().command(), 1);
        assert_eq!(
            reader.read_message().unwrap().args(),
            &[TypedValue::Boolean(false)]
        );
    }

    #[test]
    fn unencodable_message_writes_nothing() {
        let message = Message::new(1, vec![TypedValue::ByteArray(vec![0; ARG_MAX + 1])]);
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let err = writer.send(&message).unwrap_err();
        assert!(matches!(err, FrameError::ArgumentTooLong { kind: "bytearray", .. }));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(&Message::new(1, vec![])).unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn short_writes_are_completed() {
        let mut writer = FrameWriter::new(TrickleWriter {
            data: Vec::new(),
            calls: 0,
        });
        let message = Message::new(5, vec!["retry".into()]);
        writer.send(&message).unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data, build_frame(&message).unwrap().to_vec());
        assert!(inner.calls >= inner.data.len() / 3);
    }

    #[test]
    fn retries_interrupted() {
        let mut errors = vec![ErrorKind::Interrupted, ErrorKind::Interrupted];
        let mut out = Vec::new();
        write_all_retrying(b"payload", |chunk| match errors.pop() {
            Some(kind) => Err(std::io::Error::from(kind)),
            None => {
                out.extend_from_slice(chunk);
                Ok(chunk.len())
            }
        })
        .unwrap();
        assert_eq!(out, b"payload");
    }

    #[test]
    fn write_timeout_is_returned() {
        for kind in [ErrorKind::WouldBlock, ErrorKind::TimedOut] {
            let mut calls = 0usize;
            let err = write_all_retrying(b"payload", |chunk| {
                calls += 1;
                if calls == 1 {
                    Ok(chunk.len() / 2)
                } else {
                    Err(std::io::Error::from(kind))
                }
            })
            .unwrap_err();
            assert!(matches!(err, FrameError::Io(e) if e.kind() == kind));
            assert_eq!(calls, 2);
        }
    }

    #[test]
    fn flush_timeout_is_returned() {
        let mut writer = FrameWriter::new(StalledFlushWriter);
        let err = writer.send(&Message::new(1, vec![])).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn zero_write_is_connection_closed() {
        let err = write_all_retrying(b"x", |_| Ok(0)).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn other_errors_propagate() {
        let err = write_all_retrying(b"x", |_| Err(std::io::Error::from(ErrorKind::BrokenPipe)))
            .unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Accepts writes but never finishes a flush.
    struct StalledFlushWriter;

    impl Write for StalledFlushWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }

    /// Accepts at most three bytes per call.
    struct TrickleWriter {
        data: Vec<u8>,
        calls: usize,
    }

    impl Write for TrickleWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.calls += 1;
            let n = buf.len().min(3);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
