use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_message, FrameConfig, Message};
use crate::error::{FrameError, Result};
use crate::parser::{FrameParser, Progress};

/// `tokio_util` codec over the incremental parser.
///
/// Use with `FramedRead`/`FramedWrite` or `Framed` on any async byte stream.
#[derive(Debug, Default)]
pub struct MessageCodec {
    parser: FrameParser,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            parser: FrameParser::with_config(config),
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        if !src.is_empty() {
            self.parser.append(src);
            src.clear();
        }

        match self.parser.advance()? {
            Progress::Completed(message) => Ok(Some(message)),
            Progress::AwaitingMore | Progress::NoData => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if self.parser.buffered() > 0 => Err(FrameError::ConnectionClosed),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        encode_message(&item, dst)
    }
}

impl Encoder<&Message> for MessageCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<()> {
        encode_message(item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::build_frame;

    #[tokio::test]
    async fn framed_roundtrip() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, MessageCodec::new());
        let mut stream = FramedRead::new(server, MessageCodec::new());

        let sent = vec![
            Message::new(1, vec!["first".into(), 1i64.into()]),
            Message::new(2, vec![vec![0u8; 300].into()]),
            Message::new(3, vec![]),
        ];

        let writer = {
            let sent = sent.clone();
            tokio::spawn(async move {
                for message in sent {
                    sink.send(message).await.unwrap();
                }
            })
        };

        for expected in &sent {
            let received = stream.next().await.unwrap().unwrap();
            assert_eq!(&received, expected);
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn eof_mid_frame_is_error() {
        let (mut client, server) = tokio::io::duplex(64);
        let frame = build_frame(&Message::new(9, vec!["partial".into()])).unwrap();
        client.write_all(&frame[..5]).await.unwrap();
        drop(client);

        let mut stream = FramedRead::new(server, MessageCodec::new());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[tokio::test]
    async fn clean_eof_ends_stream() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);

        let mut stream = FramedRead::new(server, MessageCodec::new());
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn decode_drains_pipelined_frames() {
        let mut codec = MessageCodec::new();
        let mut src = BytesMut::new();
        codec
            .encode(Message::new(1, vec![true.into()]), &mut src)
            .unwrap();
        codec
            .encode(&Message::new(2, vec![false.into()]), &mut src)
            .unwrap();

        assert_eq!(codec.decode(&mut src).unwrap().unwrap().command(), 1);
        assert_eq!(codec.decode(&mut src).unwrap().unwrap().command(), 2);
        assert!(codec.decode(&mut src).unwrap().is_none());
        assert!(src.is_empty());
    }
}
