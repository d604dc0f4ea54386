//! `tokio_util` codec for streaming commands over async transports.
//!
//! Use [`CommandCodec`] with [`tokio_util::codec::FramedRead`] for inbound
//! frames and [`tokio_util::codec::FramedWrite`] for outbound ones. Both
//! directions share the incremental parser in [`crate::codec`], so the
//! async path accepts and rejects exactly what the blocking reader does.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_into, truncated_frame, CodecConfig};
use crate::command::Command;
use crate::error::{DecodeCause, FrameError};

/// Streaming codec for [`Command`] frames.
#[derive(Debug, Clone, Default)]
pub struct CommandCodec {
    config: CodecConfig,
}

impl CommandCodec {
    /// Create a codec with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit limits.
    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Current codec limits.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}

impl Decoder for CommandCodec {
    type Item = Command;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Command>, FrameError> {
        Ok(decode_frame(src, &self.config)?)
    }

    /// A clean end of stream between frames yields `Ok(None)`; leftover bytes
    /// fail at the stage the partial frame stopped in.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Command>, FrameError> {
        match self.decode(src)? {
            Some(command) => Ok(Some(command)),
            None if src.is_empty() => Ok(None),
            None => Err(truncated_frame(src, &self.config, DecodeCause::UnexpectedEof).into()),
        }
    }
}

impl Encoder<Command> for CommandCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_into(&item, dst);
        Ok(())
    }
}

impl Encoder<&Command> for CommandCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Command, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_into(item, dst);
        Ok(())
    }
}
