//! Splitting a connection's read buffer into commands.
//!
//! A single TCP read can carry several concatenated commands, and on a
//! replica the master's RDB transfer arrives on the same socket as the
//! command stream. The parser scans the buffer left to right: a `*`
//! starts an array-framed command, a `$` starts the snapshot transfer,
//! and anything else (stray CRLF between pipelined commands) is skipped
//! one byte at a time. Complete frames are drained from the front of the
//! buffer; an incomplete trailing frame is retained for the next read.

use bytes::{Buf, BytesMut};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum RequestError {
    #[error("invalid array header")]
    InvalidArrayHeader,
    #[error("invalid bulk string header")]
    InvalidBulkHeader,
    #[error("bulk string length mismatch")]
    BulkLengthMismatch,
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
}

/// A single client command decoded from an array frame.
#[derive(Debug, PartialEq, Clone)]
pub struct Command {
    /// Lowercased command name.
    pub name: String,
    pub arguments: Vec<String>,
    /// Bytes occupied on the wire, from the leading `*` through the CRLF
    /// after the last argument. Feeds the replication offset a replica
    /// reports via REPLCONF GETACK.
    pub wire_len: usize,
}

/// One unit produced by the request parser.
#[derive(Debug, PartialEq)]
pub enum Frame {
    Command(Command),
    /// The master's snapshot transfer that follows a FULLRESYNC reply.
    /// The declared length covers the whole payload; there is no
    /// terminator of its own.
    RdbTransfer { len: usize },
}

/// Drains every complete frame from the front of `buffer`.
pub fn parse_frames(buffer: &mut BytesMut) -> Result<Vec<Frame>, RequestError> {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset < buffer.len() {
        match buffer[offset] {
            b'*' => match parse_command(&buffer[offset..])? {
                Some((command, consumed)) => {
                    frames.push(Frame::Command(command));
                    offset += consumed;
                }
                None => break,
            },
            b'$' => match parse_rdb_transfer(&buffer[offset..])? {
                Some((len, consumed)) => {
                    frames.push(Frame::RdbTransfer { len });
                    offset += consumed;
                }
                None => break,
            },
            _ => offset += 1,
        }
    }

    buffer.advance(offset);

    Ok(frames)
}

fn find_crlf(input: &[u8]) -> Option<usize> {
    input.windows(2).position(|window| window == b"\r\n")
}

/// Parses one array-framed command. Returns `None` when the buffer does
/// not yet hold the whole frame.
fn parse_command(input: &[u8]) -> Result<Option<(Command, usize)>, RequestError> {
    let Some(header_end) = find_crlf(input) else {
        return Ok(None);
    };

    let header =
        str::from_utf8(&input[1..header_end]).map_err(|_| RequestError::InvalidArrayHeader)?;
    let count = header
        .parse::<usize>()
        .map_err(|_| RequestError::InvalidArrayHeader)?;

    if count == 0 {
        return Err(RequestError::InvalidArrayHeader);
    }

    let mut cursor = header_end + 2;
    let mut parts = Vec::with_capacity(count);

    for _ in 0..count {
        let Some((part, consumed)) = parse_bulk(&input[cursor..])? else {
            return Ok(None);
        };
        cursor += consumed;
        parts.push(part);
    }

    let mut parts = parts.into_iter();
    let Some(name) = parts.next() else {
        return Err(RequestError::InvalidArrayHeader);
    };
    let name = name.to_lowercase();

    Ok(Some((
        Command {
            name,
            arguments: parts.collect(),
            wire_len: cursor,
        },
        cursor,
    )))
}

fn parse_bulk(input: &[u8]) -> Result<Option<(String, usize)>, RequestError> {
    let Some(header_end) = find_crlf(input) else {
        return Ok(None);
    };

    if input.first() != Some(&b'$') {
        return Err(RequestError::InvalidBulkHeader);
    }

    let header =
        str::from_utf8(&input[1..header_end]).map_err(|_| RequestError::InvalidBulkHeader)?;
    let length = header
        .parse::<usize>()
        .map_err(|_| RequestError::InvalidBulkHeader)?;

    let body_start = header_end + 2;
    let body_end = body_start + length;

    if input.len() < body_end + 2 {
        return Ok(None);
    }

    if &input[body_end..body_end + 2] != b"\r\n" {
        return Err(RequestError::BulkLengthMismatch);
    }

    let content =
        str::from_utf8(&input[body_start..body_end]).map_err(|_| RequestError::InvalidUtf8)?;

    Ok(Some((content.to_string(), body_end + 2)))
}

/// Parses the RDB transfer frame: `$<len>\r\n` followed by exactly `len`
/// raw bytes and nothing else.
fn parse_rdb_transfer(input: &[u8]) -> Result<Option<(usize, usize)>, RequestError> {
    let Some(header_end) = find_crlf(input) else {
        return Ok(None);
    };

    let header =
        str::from_utf8(&input[1..header_end]).map_err(|_| RequestError::InvalidBulkHeader)?;
    let length = header
        .parse::<usize>()
        .map_err(|_| RequestError::InvalidBulkHeader)?;

    let body_start = header_end + 2;

    if input.len() < body_start + length {
        return Ok(None);
    }

    Ok(Some((length, body_start + length)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str, arguments: &[&str], wire_len: usize) -> Frame {
        Frame::Command(Command {
            name: name.to_string(),
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
            wire_len,
        })
    }

    #[test]
    fn test_parse_single_command() {
        let input = "*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n";
        let mut buffer = BytesMut::from(input.as_bytes());

        let frames = parse_frames(&mut buffer).unwrap();

        assert_eq!(
            frames,
            vec![command("set", &["foo", "bar"], input.len())]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_parse_concatenated_commands() {
        let mut buffer = BytesMut::from(
            "*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n".as_bytes(),
        );

        let frames = parse_frames(&mut buffer).unwrap();

        assert_eq!(
            frames,
            vec![
                command("ping", &[], 14),
                command("echo", &["hey"], 23),
            ]
        );
    }

    #[test]
    fn test_parse_skips_stray_bytes() {
        let mut buffer = BytesMut::from("\r\n*1\r\n$4\r\nPING\r\n".as_bytes());

        let frames = parse_frames(&mut buffer).unwrap();

        assert_eq!(frames, vec![command("ping", &[], 14)]);
    }

    #[test]
    fn test_incomplete_command_is_retained() {
        let mut buffer = BytesMut::from("*2\r\n$4\r\nECHO\r\n$3\r\nhe".as_bytes());

        let frames = parse_frames(&mut buffer).unwrap();
        assert!(frames.is_empty());
        assert_eq!(&buffer[..], b"*2\r\n$4\r\nECHO\r\n$3\r\nhe");

        buffer.extend_from_slice(b"y\r\n");
        let frames = parse_frames(&mut buffer).unwrap();
        assert_eq!(frames, vec![command("echo", &["hey"], 23)]);
    }

    #[test]
    fn test_parse_rdb_transfer_then_commands() {
        let mut input = crate::resp::encode_rdb_frame(&crate::resp::empty_rdb_bytes());
        input.extend_from_slice(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
        let mut buffer = BytesMut::from(&input[..]);

        let frames = parse_frames(&mut buffer).unwrap();

        assert_eq!(
            frames,
            vec![
                Frame::RdbTransfer { len: 90 },
                command("set", &["foo", "bar"], 31),
            ]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_rdb_transfer_is_retained() {
        let frame = crate::resp::encode_rdb_frame(&crate::resp::empty_rdb_bytes());
        let mut buffer = BytesMut::from(&frame[..40]);

        let frames = parse_frames(&mut buffer).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.len(), 40);

        buffer.extend_from_slice(&frame[40..]);
        let frames = parse_frames(&mut buffer).unwrap();
        assert_eq!(frames, vec![Frame::RdbTransfer { len: 90 }]);
    }

    #[test]
    fn test_getack_wire_length() {
        let input = "*3\r\n$8\r\nREPLCONF\r\n$6\r\nGETACK\r\n$1\r\n*\r\n";
        let mut buffer = BytesMut::from(input.as_bytes());

        let frames = parse_frames(&mut buffer).unwrap();

        assert_eq!(
            frames,
            vec![command("replconf", &["GETACK", "*"], 37)]
        );
        assert_eq!(input.len(), 37);
    }

    #[test]
    fn test_malformed_frames() {
        let test_cases = vec![
            ("*x\r\n$4\r\nPING\r\n", RequestError::InvalidArrayHeader),
            ("*0\r\n", RequestError::InvalidArrayHeader),
            ("*1\r\n+PING\r\n", RequestError::InvalidBulkHeader),
            ("*1\r\n$3\r\nPING\r\n", RequestError::BulkLengthMismatch),
        ];

        for (input, expected) in test_cases {
            let mut buffer = BytesMut::from(input.as_bytes());
            assert_eq!(
                parse_frames(&mut buffer),
                Err(expected),
                "parsing {:?}",
                input
            );
        }
    }
}
