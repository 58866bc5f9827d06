//! The XADD command.
//!
//! Appends an entry to a stream, creating the stream on first use.
//! Entry ids must be strictly increasing per stream as `(ms, seq)`
//! pairs, and `0-0` is never a valid id. The id argument comes in three
//! forms: `*` (take the current clock and auto-assign the sequence),
//! `<ms>-*` (auto-assign the sequence under an explicit timestamp) and
//! `<ms>-<seq>` (fully explicit).

use std::sync::Arc;

use crate::resp::RespValue;
use crate::server::RedisServer;
use crate::store::{Stream, StreamEntry, StreamId, now_millis};

use super::command_error::CommandError;
use super::executor::CommandResult;

const ID_TOO_SMALL: &str =
    "The ID specified in XADD is equal or smaller than the target stream top item";
const ID_NOT_ABOVE_ZERO: &str = "The ID specified in XADD must be greater than 0-0";
const ID_INVALID_FORMAT: &str = "Invalid stream ID format";

pub struct XaddArguments {
    key: String,
    requested_id: String,
    fields: Vec<(String, String)>,
}

impl XaddArguments {
    /// Parses `key id field value [field value ...]`; at least one pair
    /// is required and pairs must be complete.
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() < 4 || arguments[2..].len() % 2 != 0 {
            return Err(CommandError::InvalidXAddCommand);
        }

        Ok(Self {
            key: arguments[0].clone(),
            requested_id: arguments[1].clone(),
            fields: arguments[2..]
                .chunks(2)
                .map(|chunk| (chunk[0].clone(), chunk[1].clone()))
                .collect(),
        })
    }
}

/// Handles the XADD command, replying with the assigned id as a bulk
/// string.
pub async fn xadd(
    server: &Arc<RedisServer>,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let xadd_arguments = XaddArguments::parse(arguments)?;

    let mut streams = server.streams.guard().await;

    let last_id = streams.get(&xadd_arguments.key).and_then(Stream::last_id);
    let assigned = assign_stream_id(&xadd_arguments.requested_id, last_id, now_millis() as u128)?;

    streams
        .entry(xadd_arguments.key)
        .or_default()
        .entries
        .push(StreamEntry {
            id: assigned,
            fields: xadd_arguments.fields,
        });

    Ok(CommandResult::Response(
        RespValue::BulkString(assigned.to_string()).encode(),
    ))
}

/// Resolves a requested entry id against the stream tail.
///
/// A bare `*` takes the current clock for the timestamp and then follows
/// the same sequence rules as `<ms>-*`: the first entry of a stream gets
/// sequence 1, a later timestamp restarts at 0, and the same timestamp
/// continues at `last_seq + 1`.
fn assign_stream_id(
    requested: &str,
    last_id: Option<StreamId>,
    now_ms: u128,
) -> Result<StreamId, CommandError> {
    let (ms, sequence) = if requested == "*" {
        (now_ms, None)
    } else {
        parse_requested_id(requested)?
    };

    if ms == 0 && sequence == Some(0) {
        return Err(CommandError::InvalidStreamId(ID_NOT_ABOVE_ZERO.to_string()));
    }

    let Some(last) = last_id else {
        return Ok(StreamId {
            ms,
            seq: sequence.unwrap_or(1),
        });
    };

    if ms > last.ms {
        return Ok(StreamId {
            ms,
            seq: sequence.unwrap_or(0),
        });
    }

    if ms == last.ms {
        match sequence {
            None => {
                return Ok(StreamId {
                    ms,
                    seq: last.seq + 1,
                });
            }
            Some(seq) if seq > last.seq => return Ok(StreamId { ms, seq }),
            Some(_) => {}
        }
    }

    Err(CommandError::InvalidStreamId(ID_TOO_SMALL.to_string()))
}

/// Splits `<ms>-<seq>` into its parts; the sequence may be `*`.
fn parse_requested_id(requested: &str) -> Result<(u128, Option<u128>), CommandError> {
    let parts = requested.split('-').collect::<Vec<&str>>();

    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(CommandError::InvalidStreamId(ID_INVALID_FORMAT.to_string()));
    }

    let ms = parts[0]
        .parse::<u128>()
        .map_err(|_| CommandError::InvalidStreamId(ID_NOT_ABOVE_ZERO.to_string()))?;

    if parts[1] == "*" {
        return Ok((ms, None));
    }

    let seq = parts[1]
        .parse::<u128>()
        .map_err(|_| CommandError::InvalidStreamId(ID_NOT_ABOVE_ZERO.to_string()))?;

    Ok((ms, Some(seq)))
}
