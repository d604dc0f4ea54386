//! Length-prefixed command framing for the portrelay wire protocol.
//!
//! Every frame carries one [`Command`]: a count header followed by that many
//! length-prefixed elements. Element 0 is the command name, the rest are
//! arguments in order.
//!
//! ```text
//! *<count>\n
//! $<len>\n<len raw bytes>\n      (name)
//! $<len>\n<len raw bytes>\n      (argument 1)
//! ...
//! ```
//!
//! Payloads are never escaped, so arguments may carry arbitrary bytes,
//! including `\n`.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod command;
pub mod error;
pub mod reader;

#[cfg(feature = "async")]
pub use async_codec::CommandCodec;
pub use codec::{
    decode_frame, encode, encode_into, CodecConfig, DEFAULT_MAX_ELEMENTS,
    DEFAULT_MAX_ELEMENT_SIZE, MAX_HEADER_LINE,
};
pub use command::Command;
pub use error::{DecodeCause, DecodeError, FrameError, Result, Stage};
pub use reader::{decode, decode_bytes, decode_str, CommandReader};
