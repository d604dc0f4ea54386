use std::fmt;

/// Where in a frame decoding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading the `*<count>` line.
    ReadCount,
    /// Parsing the `*<count>` line.
    ParseCount,
    /// Reading a `$<length>` line.
    ReadLength,
    /// Parsing a `$<length>` line.
    ParseLength,
    /// Reading the raw element bytes.
    ReadData,
    /// Checking the `\n` that terminates an element.
    ValidateTrailingNewline,
    /// Interpreting element 0 as a UTF-8 command name.
    DecodeName,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ReadCount => "read count",
            Stage::ParseCount => "parse count",
            Stage::ReadLength => "read length",
            Stage::ParseLength => "parse length",
            Stage::ReadData => "read data",
            Stage::ValidateTrailingNewline => "validate trailing newline",
            Stage::DecodeName => "decode name",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The lower-level reason a decode failed.
#[derive(Debug, thiserror::Error)]
pub enum DecodeCause {
    /// The stream ended before the frame was complete.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// Reading from the underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A `*<count>` or `$<length>` line did not match the grammar.
    #[error("malformed header {line:?}")]
    MalformedHeader { line: String },

    /// A declared count or length is outside the configured bounds.
    #[error("{what} {value} exceeds limit {max}")]
    LimitExceeded {
        what: &'static str,
        value: usize,
        max: usize,
    },

    /// The byte following element data was not `\n`.
    #[error("expected '\\n', found byte {found:#04x}")]
    UnexpectedByte { found: u8 },

    /// The command name is not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// A frame could not be decoded.
///
/// Always names the stage that broke and, for element-specific stages, the
/// element index (0 is the command name).
#[derive(Debug, thiserror::Error)]
#[error("decode error at stage \"{stage}\"{}: {details}", fmt_index(.index))]
pub struct DecodeError {
    pub stage: Stage,
    pub index: Option<usize>,
    pub details: String,
    #[source]
    pub cause: DecodeCause,
}

impl DecodeError {
    pub fn new(
        stage: Stage,
        index: Option<usize>,
        details: impl Into<String>,
        cause: impl Into<DecodeCause>,
    ) -> Self {
        Self {
            stage,
            index,
            details: details.into(),
            cause: cause.into(),
        }
    }

    /// True when the stream ended before a complete frame arrived.
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self.cause, DecodeCause::UnexpectedEof)
    }
}

fn fmt_index(index: &Option<usize>) -> String {
    match index {
        Some(index) => format!(" (element {index})"),
        None => String::new(),
    }
}

/// Errors produced by the streaming codec.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The bytes on the stream are not a valid frame.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
