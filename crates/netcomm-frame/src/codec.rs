use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::value::{length_width, put_length, TypedValue, TAG_TEXT_LENGTH};

/// Start of frame.
pub const SOH: u8 = 0x01;
/// Start of text region.
pub const STX: u8 = 0x02;
/// End of text region.
pub const ETX: u8 = 0x03;
/// End of frame.
pub const EOT: u8 = 0x04;

/// Size of the CHK field.
pub const CHECKSUM_SIZE: usize = 1;

/// Maximum byte length of a single string or byte-array argument.
pub const ARG_MAX: usize = 0x7F_FFFF - 5;

/// Maximum byte length of a complete frame, envelope included.
pub const TXT_MAX: usize = 0x7FFF_FFFF - 10;

/// A command byte with its ordered arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    command: u8,
    args: Vec<TypedValue>,
}

impl Message {
    /// Create a message.
    pub fn new(command: u8, args: Vec<TypedValue>) -> Self {
        Self { command, args }
    }

    /// Create a message from a command held in a wider integer.
    ///
    /// Values outside 0..=255 fail with [`FrameError::CommandOverflow`].
    pub fn try_with_command(command: i64, args: Vec<TypedValue>) -> Result<Self> {
        let command = u8::try_from(command).map_err(|_| FrameError::CommandOverflow(command))?;
        Ok(Self::new(command, args))
    }

    /// Append one argument (builder style).
    pub fn with_arg(mut self, value: impl Into<TypedValue>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn args(&self) -> &[TypedValue] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&TypedValue> {
        self.args.get(index)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn into_parts(self) -> (u8, Vec<TypedValue>) {
        (self.command, self.args)
    }

    /// Byte length of the text region (command + arguments).
    pub fn text_len(&self) -> usize {
        1 + self.args.iter().map(TypedValue::encoded_len).sum::<usize>()
    }

    /// The total wire size of this message's frame.
    pub fn wire_size(&self) -> usize {
        envelope_size(self.text_len())
    }
}

/// XOR of every byte in `text`.
pub fn checksum(text: &[u8]) -> u8 {
    text.iter().fold(0u8, |acc, b| acc ^ b)
}

fn envelope_size(text_len: usize) -> usize {
    // SOH + OTL tag + OTL length + STX + text + ETX + CHK + EOT
    1 + 1 + length_width(text_len) + 1 + text_len + 1 + CHECKSUM_SIZE + 1
}

/// Encode a message as one frame appended to `dst`.
///
/// Wire format:
/// ```text
/// ┌─────┬─────────┬────────────┬─────┬─────────┬──────────┬─────┬─────┬─────┐
/// │ SOH │ OTL tag │ OTL length │ STX │ command │ args...  │ ETX │ CHK │ EOT │
/// │ 01  │ 11/12/14│ 1/2/4B BE  │ 02  │ 1B      │ tag+data │ 03  │ XOR │ 04  │
/// └─────┴─────────┴────────────┴─────┴─────────┴──────────┴─────┴─────┴─────┘
///                                    └──── text region (OTL length) ─┘
/// ```
///
/// On error `dst` is left exactly as it was.
pub fn encode_message(message: &Message, dst: &mut BytesMut) -> Result<()> {
    let text_len = message.text_len();
    let total = envelope_size(text_len);
    if total > TXT_MAX {
        return Err(FrameError::FrameTooLong {
            len: total,
            max: TXT_MAX,
        });
    }

    let mut text = BytesMut::with_capacity(text_len);
    text.put_u8(message.command);
    for arg in &message.args {
        arg.encode(&mut text)?;
    }

    dst.reserve(total);
    dst.put_u8(SOH);
    put_length(dst, TAG_TEXT_LENGTH, text.len());
    dst.put_u8(STX);
    dst.put_slice(&text);
    dst.put_u8(ETX);
    dst.put_u8(checksum(&text));
    dst.put_u8(EOT);
    Ok(())
}

/// Build the standalone frame for one message.
pub fn build_frame(message: &Message) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    encode_message(message, &mut buf)?;
    Ok(buf.freeze())
}

/// Configuration for the frame parser and the blocking reader/writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest text region the parser accepts. Default: [`TXT_MAX`].
    pub max_text_len: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_text_len: TXT_MAX,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
