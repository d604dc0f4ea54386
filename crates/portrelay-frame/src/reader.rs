use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_frame, truncated_frame, CodecConfig};
use crate::command::Command;
use crate::error::{DecodeCause, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Decode a single command from a byte stream.
///
/// Bytes read past the end of the frame are discarded; use [`CommandReader`]
/// to read several frames from one stream.
pub fn decode<R: Read>(reader: R) -> Result<Command> {
    CommandReader::new(reader).read_command()
}

/// Decode a single command from an in-memory buffer.
pub fn decode_bytes(bytes: &[u8]) -> Result<Command> {
    decode(bytes)
}

/// Decode a single command from a string.
pub fn decode_str(text: &str) -> Result<Command> {
    decode_bytes(text.as_bytes())
}

/// Reads complete commands from any `Read` stream.
///
/// Handles partial reads internally: callers always get complete frames.
pub struct CommandReader<T> {
    inner: T,
    buf: BytesMut,
    config: CodecConfig,
}

impl<T: Read> CommandReader<T> {
    /// Create a new command reader with default limits.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, CodecConfig::default())
    }

    /// Create a new command reader with explicit limits.
    pub fn with_config(inner: T, config: CodecConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete command (blocking).
    ///
    /// End of stream before a complete frame fails at the stage the frame
    /// stopped in, with [`DecodeCause::UnexpectedEof`] as the cause.
    pub fn read_command(&mut self) -> Result<Command> {
        loop {
            if let Some(command) = decode_frame(&mut self.buf, &self.config)? {
                return Ok(command);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    return Err(truncated_frame(
                        &self.buf,
                        &self.config,
                        DecodeCause::Io(err),
                    ))
                }
            };

            if read == 0 {
                return Err(truncated_frame(
                    &self.buf,
                    &self.config,
                    DecodeCause::UnexpectedEof,
                ));
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current codec limits.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }
}
