use std::ops::Range;

use bytes::{BufMut, Bytes, BytesMut};

use crate::command::Command;
use crate::error::{DecodeCause, DecodeError, Result, Stage};

/// Default maximum number of elements per frame (name included).
pub const DEFAULT_MAX_ELEMENTS: usize = 1024;

/// Default maximum size of a single element: 16 MiB.
pub const DEFAULT_MAX_ELEMENT_SIZE: usize = 16 * 1024 * 1024;

/// Longest accepted `*<count>` / `$<length>` line, newline included.
pub const MAX_HEADER_LINE: usize = 32;

const COUNT_MARKER: u8 = b'*';
const LENGTH_MARKER: u8 = b'$';
const TERMINATOR: u8 = b'\n';

/// Configuration for the command codec.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Maximum declared element count. Default: 1024.
    pub max_elements: usize,
    /// Maximum declared element length in bytes. Default: 16 MiB.
    pub max_element_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_elements: DEFAULT_MAX_ELEMENTS,
            max_element_size: DEFAULT_MAX_ELEMENT_SIZE,
        }
    }
}

/// Encode a command into its wire representation.
pub fn encode(command: &Command) -> Bytes {
    let mut dst = BytesMut::with_capacity(command.wire_size());
    encode_into(command, &mut dst);
    dst.freeze()
}

/// Append the wire representation of `command` to `dst`.
///
/// Wire format:
/// ```text
/// *<1 + args>\n
/// $<name len>\n<name>\n
/// $<arg len>\n<arg bytes>\n   (per argument)
/// ```
pub fn encode_into(command: &Command, dst: &mut BytesMut) {
    dst.reserve(command.wire_size());
    put_header(dst, COUNT_MARKER, command.element_count());
    put_element(dst, command.name().as_bytes());
    for argument in command.arguments() {
        put_element(dst, argument);
    }
}

fn put_header(dst: &mut BytesMut, marker: u8, value: usize) {
    dst.put_u8(marker);
    dst.put_slice(value.to_string().as_bytes());
    dst.put_u8(TERMINATOR);
}

fn put_element(dst: &mut BytesMut, data: &[u8]) {
    put_header(dst, LENGTH_MARKER, data.len());
    dst.put_slice(data);
    dst.put_u8(TERMINATOR);
}

/// Decode one command from the front of a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, config: &CodecConfig) -> Result<Option<Command>> {
    let layout = match scan_frame(src, config)? {
        Scan::Complete(layout) => layout,
        Scan::Incomplete(_) => return Ok(None),
    };

    let frame = src.split_to(layout.len).freeze();
    let mut elements = layout.elements.into_iter();
    let name_range = elements.next().unwrap_or(0..0);
    let name = std::str::from_utf8(&frame[name_range])
        .map_err(|err| {
            DecodeError::new(
                Stage::DecodeName,
                Some(0),
                "command name is not valid UTF-8",
                err,
            )
        })?
        .to_owned();
    let arguments: Vec<Bytes> = elements.map(|range| frame.slice(range)).collect();

    tracing::trace!(
        command = %name,
        arguments = arguments.len(),
        bytes = frame.len(),
        "decoded frame"
    );
    Ok(Some(Command::from_parts(name, arguments)))
}

/// Build the error for a buffer that holds only part of a frame.
///
/// Called once the stream can no longer grow the buffer: `cause` is either
/// [`DecodeCause::UnexpectedEof`] or the I/O error that stopped the read.
pub(crate) fn truncated_frame(
    src: &[u8],
    config: &CodecConfig,
    cause: DecodeCause,
) -> DecodeError {
    match scan_frame(src, config) {
        Ok(Scan::Incomplete(pending)) => {
            DecodeError::new(pending.stage, pending.index, pending.details, cause)
        }
        Ok(Scan::Complete(_)) => DecodeError::new(
            Stage::ReadCount,
            None,
            "stream stopped after a complete frame",
            cause,
        ),
        Err(err) => err,
    }
}

enum Scan {
    Complete(FrameLayout),
    Incomplete(Pending),
}

/// Element byte ranges of one complete frame, relative to the frame start.
struct FrameLayout {
    elements: Vec<Range<usize>>,
    len: usize,
}

/// Where a partial frame stopped.
struct Pending {
    stage: Stage,
    index: Option<usize>,
    details: String,
}

fn incomplete(stage: Stage, index: Option<usize>, details: impl Into<String>) -> Scan {
    Scan::Incomplete(Pending {
        stage,
        index,
        details: details.into(),
    })
}

/// Walk one frame without consuming it.
///
/// Grammar errors fail immediately; running out of bytes yields
/// [`Scan::Incomplete`] with the stage the next byte is needed for.
fn scan_frame(src: &[u8], config: &CodecConfig) -> Result<Scan> {
    let mut pos = 0usize;

    let Some(line) = next_line(src, &mut pos, Stage::ParseCount, None)? else {
        return Ok(incomplete(
            Stage::ReadCount,
            None,
            "could not read '*<count>' line",
        ));
    };
    let count = parse_header(line, COUNT_MARKER, Stage::ParseCount, None)?;
    if count == 0 {
        return Err(DecodeError::new(
            Stage::ParseCount,
            None,
            "element count must be at least 1 (the command name)",
            DecodeCause::MalformedHeader {
                line: String::from_utf8_lossy(line).into_owned(),
            },
        ));
    }
    if count > config.max_elements {
        return Err(DecodeError::new(
            Stage::ParseCount,
            None,
            format!("declared {count} elements"),
            DecodeCause::LimitExceeded {
                what: "element count",
                value: count,
                max: config.max_elements,
            },
        ));
    }

    let mut elements = Vec::with_capacity(count.min(64));
    for index in 0..count {
        let Some(line) = next_line(src, &mut pos, Stage::ParseLength, Some(index))? else {
            return Ok(incomplete(
                Stage::ReadLength,
                Some(index),
                "could not read '$<length>' line",
            ));
        };
        let len = parse_header(line, LENGTH_MARKER, Stage::ParseLength, Some(index))?;
        if len > config.max_element_size {
            return Err(DecodeError::new(
                Stage::ParseLength,
                Some(index),
                format!("declared element of {len} bytes"),
                DecodeCause::LimitExceeded {
                    what: "element length",
                    value: len,
                    max: config.max_element_size,
                },
            ));
        }

        let available = src.len() - pos;
        if available < len {
            return Ok(incomplete(
                Stage::ReadData,
                Some(index),
                format!("expected {len} bytes, got {available}"),
            ));
        }
        elements.push(pos..pos + len);
        pos += len;

        match src.get(pos) {
            None => {
                return Ok(incomplete(
                    Stage::ValidateTrailingNewline,
                    Some(index),
                    "missing newline after element data",
                ))
            }
            Some(&TERMINATOR) => pos += 1,
            Some(&found) => {
                return Err(DecodeError::new(
                    Stage::ValidateTrailingNewline,
                    Some(index),
                    "element data not followed by newline",
                    DecodeCause::UnexpectedByte { found },
                ))
            }
        }
    }

    Ok(Scan::Complete(FrameLayout { elements, len: pos }))
}

/// Take the next `\n`-terminated line starting at `pos`, without the newline.
fn next_line<'a>(
    src: &'a [u8],
    pos: &mut usize,
    parse_stage: Stage,
    index: Option<usize>,
) -> Result<Option<&'a [u8]>> {
    let rest = &src[*pos..];
    let window = &rest[..rest.len().min(MAX_HEADER_LINE)];
    match window.iter().position(|&b| b == TERMINATOR) {
        Some(end) => {
            *pos += end + 1;
            Ok(Some(&rest[..end]))
        }
        None if rest.len() >= MAX_HEADER_LINE => Err(DecodeError::new(
            parse_stage,
            index,
            format!("header line exceeds {MAX_HEADER_LINE} bytes"),
            DecodeCause::MalformedHeader {
                line: String::from_utf8_lossy(window).into_owned(),
            },
        )),
        None => Ok(None),
    }
}

/// Parse `<marker><decimal>` into a count or length.
fn parse_header(line: &[u8], marker: u8, stage: Stage, index: Option<usize>) -> Result<usize> {
    let malformed = || {
        let text = String::from_utf8_lossy(line).into_owned();
        DecodeError::new(
            stage,
            index,
            format!("invalid line: {text:?}"),
            DecodeCause::MalformedHeader { line: text },
        )
    };

    let digits = match line.split_first() {
        Some((&first, digits)) if first == marker && !digits.is_empty() => digits,
        _ => return Err(malformed()),
    };

    digits
        .iter()
        .try_fold(0usize, |acc, &digit| {
            if !digit.is_ascii_digit() {
                return None;
            }
            acc.checked_mul(10)?.checked_add(usize::from(digit - b'0'))
        })
        .ok_or_else(malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Result<Option<Command>> {
        let mut buf = BytesMut::from(input);
        decode_frame(&mut buf, &CodecConfig::default())
    }

    #[test]
    fn encode_command_without_arguments() {
        let encoded = encode(&Command::new("TestCommand"));
        assert_eq!(encoded.as_ref(), b"*1\n$11\nTestCommand\n");
    }

    #[test]
    fn encode_command_with_arguments() {
        let cmd = Command::with_args("TestCommand", ["-t", "TestArgument"]);
        assert_eq!(
            encode(&cmd).as_ref(),
            b"*3\n$11\nTestCommand\n$2\n-t\n$12\nTestArgument\n"
        );
    }

    #[test]
    fn encode_command_with_spaces() {
        let cmd = Command::with_args("Test Command", ["arg 1", "arg 2"]);
        assert_eq!(
            encode(&cmd).as_ref(),
            b"*3\n$12\nTest Command\n$5\narg 1\n$5\narg 2\n"
        );
    }

    #[test]
    fn encode_empty_command() {
        assert_eq!(encode(&Command::default()).as_ref(), b"*1\n$0\n\n");
    }

    #[test]
    fn encode_length_counts_bytes_not_chars() {
        let encoded = encode(&Command::new("héllo"));
        assert_eq!(encoded.as_ref(), "*1\n$6\nhéllo\n".as_bytes());
    }

    #[test]
    fn encode_into_appends() {
        let mut buf = BytesMut::from(&b"prefix"[..]);
        encode_into(&Command::new("a"), &mut buf);
        assert_eq!(buf.as_ref(), b"prefix*1\n$1\na\n");
    }

    #[test]
    fn roundtrip_preserves_embedded_newlines_and_binary() {
        let cmd = Command::with_args(
            "multi\nline",
            [
                b"a\nb\n".to_vec(),
                Vec::new(),
                vec![0x00, 0xff, b'\n', b'$', b'*'],
            ],
        );
        let mut buf = BytesMut::from(encode(&cmd).as_ref());
        let decoded = decode_frame(&mut buf, &CodecConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(decoded, cmd);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_consumes_exactly_one_frame() {
        let mut buf = BytesMut::new();
        encode_into(&Command::new("first"), &mut buf);
        encode_into(&Command::with_args("second", ["x"]), &mut buf);

        let config = CodecConfig::default();
        let first = decode_frame(&mut buf, &config).unwrap().unwrap();
        let second = decode_frame(&mut buf, &config).unwrap().unwrap();

        assert_eq!(first.name(), "first");
        assert_eq!(second.name(), "second");
        assert_eq!(second.argument_str(0), Some("x"));
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_frames_wait_for_more_bytes() {
        let full = encode(&Command::with_args("TestCommand", ["-t", "TestArgument"]));
        for cut in 0..full.len() {
            let mut buf = BytesMut::from(&full[..cut]);
            let result = decode_frame(&mut buf, &CodecConfig::default()).unwrap();
            assert!(result.is_none(), "cut at {cut} should be incomplete");
            assert_eq!(buf.len(), cut, "incomplete decode must not consume");
        }
    }

    #[test]
    fn zero_count_rejected() {
        let err = decode_all(b"*0\n").unwrap_err();
        assert_eq!(err.stage, Stage::ParseCount);
        assert_eq!(err.index, None);
    }

    #[test]
    fn malformed_count_rejected() {
        for input in [&b"Invalid Input\n"[..], b"*\n", b"*-1\n", b"* 3\n", b"$1\n"] {
            let err = decode_all(input).unwrap_err();
            assert_eq!(err.stage, Stage::ParseCount, "{input:?}");
            assert!(matches!(err.cause, DecodeCause::MalformedHeader { .. }));
        }
    }

    #[test]
    fn overflowing_count_rejected() {
        let err = decode_all(b"*99999999999999999999999\n").unwrap_err();
        assert_eq!(err.stage, Stage::ParseCount);
    }

    #[test]
    fn malformed_length_reports_index() {
        let err = decode_all(b"*2\n$1\na\n$x\n").unwrap_err();
        assert_eq!(err.stage, Stage::ParseLength);
        assert_eq!(err.index, Some(1));
    }

    #[test]
    fn wrong_terminator_rejected() {
        let err = decode_all(b"*1\n$2\nabX").unwrap_err();
        assert_eq!(err.stage, Stage::ValidateTrailingNewline);
        assert_eq!(err.index, Some(0));
        assert!(matches!(
            err.cause,
            DecodeCause::UnexpectedByte { found: b'X' }
        ));
    }

    #[test]
    fn overlong_header_line_rejected() {
        let input = vec![b'*'; MAX_HEADER_LINE + 1];
        let err = decode_all(&input).unwrap_err();
        assert_eq!(err.stage, Stage::ParseCount);
    }

    #[test]
    fn element_limits_enforced() {
        let config = CodecConfig {
            max_elements: 2,
            max_element_size: 4,
        };

        let mut buf = BytesMut::from(&b"*3\n"[..]);
        let err = decode_frame(&mut buf, &config).unwrap_err();
        assert_eq!(err.stage, Stage::ParseCount);
        assert!(matches!(err.cause, DecodeCause::LimitExceeded { value: 3, .. }));

        let mut buf = BytesMut::from(&b"*1\n$5\n"[..]);
        let err = decode_frame(&mut buf, &config).unwrap_err();
        assert_eq!(err.stage, Stage::ParseLength);
        assert_eq!(err.index, Some(0));
    }

    #[test]
    fn non_utf8_name_rejected() {
        let err = decode_all(b"*1\n$2\n\xff\xfe\n").unwrap_err();
        assert_eq!(err.stage, Stage::DecodeName);
        assert_eq!(err.index, Some(0));
    }

    #[test]
    fn truncated_frame_names_the_stage() {
        let config = CodecConfig::default();
        let cases: [(&[u8], Stage, Option<usize>); 5] = [
            (b"", Stage::ReadCount, None),
            (b"*3", Stage::ReadCount, None),
            (b"*5\n$11\nTestCommand\n$2\n-t\n", Stage::ReadLength, Some(2)),
            (b"*1\n$11\nTest", Stage::ReadData, Some(0)),
            (
                b"*3\n$11\nTestCommand\n$2\n-t\n$12\nTestArgument",
                Stage::ValidateTrailingNewline,
                Some(2),
            ),
        ];

        for (input, stage, index) in cases {
            let err = truncated_frame(input, &config, DecodeCause::UnexpectedEof);
            assert_eq!(err.stage, stage, "{input:?}");
            assert_eq!(err.index, index, "{input:?}");
            assert!(err.is_unexpected_eof());
        }
    }
}
