//! Typed, checksummed message framing.
//!
//! Every message is a command byte plus an ordered list of typed arguments,
//! wrapped in a fixed envelope:
//! - `SOH`, a tagged big-endian length of the text region, `STX`
//! - the text region: command byte, then each argument as tag + payload
//! - `ETX`, one XOR checksum byte over the text region, `EOT`
//!
//! [`FrameParser`] consumes bytes incrementally and survives arbitrary
//! fragmentation; [`build_frame`] produces the bytes for one message.

pub mod codec;
pub mod error;
pub mod parser;
pub mod reader;
pub mod value;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    build_frame, checksum, encode_message, FrameConfig, Message, ARG_MAX, CHECKSUM_SIZE, EOT,
    ETX, SOH, STX, TXT_MAX,
};
pub use error::{FrameError, Result};
pub use parser::{FrameParser, ParseStep, Progress};
pub use reader::FrameReader;
pub use value::{TypedValue, ValueKind};
pub use writer::{write_all_retrying, FrameWriter};

#[cfg(feature = "async")]
pub use async_codec::MessageCodec;
