//! Incremental frame parser.
//!
//! The parser owns a growing byte buffer and a cursor into it. Callers
//! [`append`](FrameParser::append) whatever bytes arrived and then call
//! [`advance`](FrameParser::advance) until it stops returning
//! [`Progress::Completed`]. Each step needs a minimum number of buffered
//! bytes; when they are not there yet the step is kept and re-entered on the
//! next call, so a frame can be split across any number of reads.
//!
//! Steps, strictly in order:
//! - `Soh`: one byte, must be 0x01
//! - `Otl`: length tag 0x11/0x12/0x14 plus its 1/2/4 byte length field
//! - `Stx`: one byte, must be 0x02
//! - `Etx`: the whole text region plus the byte after it, which must be 0x03
//! - `Chk`: one byte, must equal the XOR of the text region
//! - `Eot`: one byte; the verified text region is decoded into arguments,
//!   then the byte must be 0x04 and the frame is complete
//!
//! Errors are terminal. The parser never scans forward for the next SOH, and
//! calling `advance` again after an error reports the same error.

use bytes::{Buf, BytesMut};

use crate::codec::{checksum, FrameConfig, Message, EOT, ETX, SOH, STX};
use crate::error::{FrameError, Result};
use crate::value::{read_length, TypedValue};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Current position of the parser inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStep {
    Soh,
    Otl,
    Stx,
    Etx,
    Chk,
    Eot,
}

/// Outcome of one [`FrameParser::advance`] call.
#[derive(Debug, PartialEq)]
pub enum Progress {
    /// A frame completed; its bytes have been dropped from the buffer.
    Completed(Message),
    /// Part of a frame is buffered but the current step needs more bytes.
    AwaitingMore,
    /// Nothing is buffered.
    NoData,
}

/// Per-connection parse state.
#[derive(Debug)]
pub struct FrameParser {
    buf: BytesMut,
    pos: usize,
    step: ParseStep,
    text_start: usize,
    text_len: usize,
    checksum: u8,
    max_text_len: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a parser with default configuration.
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Create a parser with explicit configuration.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            pos: 0,
            step: ParseStep::Soh,
            text_start: 0,
            text_len: 0,
            checksum: 0,
            max_text_len: config.max_text_len,
        }
    }

    /// Append received bytes to the buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Current step.
    pub fn step(&self) -> ParseStep {
        self.step
    }

    /// Bytes currently held, including those of the in-progress frame
    /// already walked over.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Run the state machine as far as the buffered bytes allow.
    ///
    /// Returns at the first completed frame; call again to drain frames
    /// that arrived in the same read.
    pub fn advance(&mut self) -> Result<Progress> {
        loop {
            let available = self.buf.len() - self.pos;

            let moved = match self.step {
                ParseStep::Soh => {
                    if available == 0 {
                        false
                    } else {
                        self.expect_marker("SOH", SOH)?;
                        self.step = ParseStep::Otl;
                        true
                    }
                }
                ParseStep::Otl => {
                    if available == 0 {
                        false
                    } else {
                        self.read_text_length()?
                    }
                }
                ParseStep::Stx => {
                    if available == 0 {
                        false
                    } else {
                        self.expect_marker("STX", STX)?;
                        self.step = ParseStep::Etx;
                        true
                    }
                }
                ParseStep::Etx => {
                    if available <= self.text_len {
                        false
                    } else {
                        let found = self.buf[self.pos + self.text_len];
                        if found != ETX {
                            return Err(FrameError::InvalidMarker {
                                marker: "ETX",
                                expected: ETX,
                                found,
                            });
                        }
                        self.text_start = self.pos;
                        self.checksum = checksum(&self.buf[self.pos..self.pos + self.text_len]);
                        self.pos += self.text_len + 1;
                        self.step = ParseStep::Chk;
                        true
                    }
                }
                ParseStep::Chk => {
                    if available == 0 {
                        false
                    } else {
                        let received = self.buf[self.pos];
                        if received != self.checksum {
                            return Err(FrameError::ChecksumMismatch {
                                computed: self.checksum,
                                received,
                            });
                        }
                        self.pos += 1;
                        self.step = ParseStep::Eot;
                        true
                    }
                }
                ParseStep::Eot => {
                    if available == 0 {
                        false
                    } else {
                        let message = self.decode_text()?;
                        self.expect_marker("EOT", EOT)?;
                        self.reset_for_next_frame();
                        return Ok(Progress::Completed(message));
                    }
                }
            };

            if !moved {
                return Ok(if self.buf.is_empty() {
                    Progress::NoData
                } else {
                    Progress::AwaitingMore
                });
            }
        }
    }

    fn expect_marker(&mut self, marker: &'static str, expected: u8) -> Result<()> {
        let found = self.buf[self.pos];
        if found != expected {
            return Err(FrameError::InvalidMarker {
                marker,
                expected,
                found,
            });
        }
        self.pos += 1;
        Ok(())
    }

    fn read_text_length(&mut self) -> Result<bool> {
        let tag = self.buf[self.pos];
        if !matches!(tag, 0x11 | 0x12 | 0x14) {
            return Err(FrameError::InvalidLengthTag(tag));
        }
        let width = (tag & 0x0F) as usize;
        let Some(len) = read_length(&self.buf[self.pos + 1..], width)? else {
            return Ok(false);
        };
        if len == 0 {
            // The text region always holds at least the command byte.
            return Err(FrameError::InvalidLength(0));
        }
        if len > self.max_text_len {
            return Err(FrameError::FrameTooLong {
                len,
                max: self.max_text_len,
            });
        }
        self.text_len = len;
        self.pos += 1 + width;
        self.step = ParseStep::Stx;
        Ok(true)
    }

    fn decode_text(&self) -> Result<Message> {
        let text = &self.buf[self.text_start..self.text_start + self.text_len];
        let command = text[0];
        let mut args = Vec::new();
        let mut pos = 1;
        while pos < text.len() {
            let (value, next) = TypedValue::decode(text, pos)?;
            args.push(value);
            pos = next;
        }
        Ok(Message::new(command, args))
    }

    fn reset_for_next_frame(&mut self) {
        self.buf.advance(self.pos);
        self.pos = 0;
        self.text_start = 0;
        self.text_len = 0;
        self.checksum = 0;
        self.step = ParseStep::Soh;
    }
}
