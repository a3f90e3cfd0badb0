/// Errors that can occur while building or parsing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The command value does not fit in one byte.
    #[error("command value {0} out of range (0-255)")]
    CommandOverflow(i64),

    /// A string or byte-array argument is longer than `ARG_MAX`.
    #[error("{kind} argument too long ({len} bytes, max {max})")]
    ArgumentTooLong {
        kind: &'static str,
        len: usize,
        max: usize,
    },

    /// The complete frame would exceed the total length limit.
    #[error("frame too long ({len} bytes, max {max})")]
    FrameTooLong { len: usize, max: usize },

    /// A fixed envelope byte did not have its expected value.
    #[error("invalid {marker} marker (expected 0x{expected:02X}, found 0x{found:02X})")]
    InvalidMarker {
        marker: &'static str,
        expected: u8,
        found: u8,
    },

    /// The text length tag is not one of 0x11, 0x12, 0x14.
    #[error("invalid text length tag 0x{0:02X}")]
    InvalidLengthTag(u8),

    /// A length field decoded to a negative value.
    #[error("invalid length field ({0})")]
    InvalidLength(i64),

    /// An argument starts with a tag byte no value kind uses.
    #[error("unknown argument tag 0x{0:02X}")]
    UnknownTag(u8),

    /// The CHK byte does not match the XOR of the text region.
    #[error("checksum mismatch (computed 0x{computed:02X}, received 0x{received:02X})")]
    ChecksumMismatch { computed: u8, received: u8 },

    /// An argument's declared size runs past the end of the text region.
    #[error("argument at offset {offset} overruns the text region")]
    ArgumentOverrun { offset: usize },

    /// A string argument is not valid UTF-8.
    #[error("string argument is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
