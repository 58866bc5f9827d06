//! RESP wire format encoding and decoding.
//!
//! Replies are built from [`RespValue`] and rendered with [`encode`];
//! the decoder is used by the replication handshake and keeps the two
//! directions honest in tests. The RDB transfer that follows a PSYNC is
//! not a regular frame and has its own encoder, [`encode_rdb_frame`].
//!
//! [`encode`]: RespValue::encode

use thiserror::Error;

/// The empty snapshot a master streams in response to PSYNC, and the
/// baseline a freshly synced replica starts from. Decodes to 88 bytes.
pub const EMPTY_RDB_HEX: &str = "524544495330303131fa0972656469732d76657205372e322e30fa0a72656469732d62697473c040fa056374696d65c26d08bc65fa08757365642d6d656dc2b0c41000fa08616f662d62617365c000fff06e3bfec0ff5aa2";

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("unknown RESP frame type")]
    UnknownFrameType,
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid bulk string")]
    InvalidBulkString,
    #[error("invalid array")]
    InvalidArray,
    #[error("incomplete frame")]
    IncompleteFrame,
}

/// A single RESP frame.
///
/// `Null` is the null bulk string (`$-1\r\n`) that commands return when a
/// key is absent or expired.
#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    Null,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Renders the frame in its on-wire form.
    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(value) => format!("+{}\r\n", value),
            RespValue::Error(message) => format!("-{}\r\n", message),
            RespValue::Integer(value) => format!(":{}\r\n", value),
            RespValue::BulkString(value) => {
                if value.is_empty() {
                    // Historical quirk: an empty bulk payload renders as
                    // the null bulk.
                    "$-1\r\n".to_string()
                } else {
                    format!("${}\r\n{}\r\n", value.len(), value)
                }
            }
            RespValue::Null => "$-1\r\n".to_string(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len());
                for element in elements {
                    encoded.push_str(&element.encode());
                }
                encoded
            }
        }
    }

    /// Decodes one frame from the front of `input`, returning the value
    /// and the number of bytes consumed.
    pub fn decode(input: &[u8]) -> Result<(Self, usize), RespError> {
        let Some(first) = input.first() else {
            return Err(RespError::IncompleteFrame);
        };

        match *first {
            b'+' => {
                let (line, consumed) = split_line(input)?;
                Ok((RespValue::SimpleString(line[1..].to_string()), consumed))
            }
            b'-' => {
                let (line, consumed) = split_line(input)?;
                Ok((RespValue::Error(line[1..].to_string()), consumed))
            }
            b':' => {
                let (line, consumed) = split_line(input)?;
                let value = line[1..]
                    .parse::<i64>()
                    .map_err(|_| RespError::FailedToParseInteger)?;
                Ok((RespValue::Integer(value), consumed))
            }
            b'$' => {
                let (line, header_len) = split_line(input)?;
                let declared = line[1..]
                    .parse::<i64>()
                    .map_err(|_| RespError::InvalidBulkString)?;

                if declared == -1 {
                    return Ok((RespValue::Null, header_len));
                }

                let length = usize::try_from(declared).map_err(|_| RespError::InvalidBulkString)?;
                let body_end = header_len + length;

                if input.len() < body_end + 2 {
                    return Err(RespError::IncompleteFrame);
                }

                if &input[body_end..body_end + 2] != b"\r\n" {
                    return Err(RespError::InvalidBulkString);
                }

                let content = str::from_utf8(&input[header_len..body_end])
                    .map_err(|_| RespError::InvalidUtf8)?;

                Ok((RespValue::BulkString(content.to_string()), body_end + 2))
            }
            b'*' => {
                let (line, header_len) = split_line(input)?;
                let count = line[1..]
                    .parse::<usize>()
                    .map_err(|_| RespError::InvalidArray)?;

                let mut elements = Vec::with_capacity(count);
                let mut cursor = header_len;

                for _ in 0..count {
                    let (element, consumed) = Self::decode(&input[cursor..])?;
                    cursor += consumed;
                    elements.push(element);
                }

                Ok((RespValue::Array(elements), cursor))
            }
            _ => Err(RespError::UnknownFrameType),
        }
    }
}

fn split_line(input: &[u8]) -> Result<(&str, usize), RespError> {
    let position = input
        .windows(2)
        .position(|window| window == b"\r\n")
        .ok_or(RespError::IncompleteFrame)?;

    let line = str::from_utf8(&input[..position]).map_err(|_| RespError::InvalidUtf8)?;

    Ok((line, position + 2))
}

/// The decoded empty-RDB baseline.
pub fn empty_rdb_bytes() -> Vec<u8> {
    hex::decode(EMPTY_RDB_HEX).expect("embedded empty RDB payload is valid hex")
}

/// Encodes an RDB transfer frame: a bulk-string-like header whose declared
/// length covers the raw bytes plus a trailing CRLF, with no terminator of
/// its own beyond that declared length.
pub fn encode_rdb_frame(raw: &[u8]) -> Vec<u8> {
    let mut frame = format!("${}\r\n", raw.len() + 2).into_bytes();
    frame.extend_from_slice(raw);
    frame.extend_from_slice(b"\r\n");
    frame
}
