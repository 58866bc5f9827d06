use std::sync::Arc;

use tracing::{debug, warn};

use crate::connection::write_to_stream;
use crate::replication::SharedWriter;
use crate::resp::{RespValue, empty_rdb_bytes, encode_rdb_frame};
use crate::server::RedisServer;

use super::command_error::CommandError;
use super::executor::CommandResult;

pub struct PsyncArguments {
    repl_id: String,
    offset: i64,
}

impl PsyncArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidPsyncCommand);
        }

        let offset = arguments[1]
            .parse::<i64>()
            .map_err(|_| CommandError::InvalidPsyncOffset)?;

        Ok(Self {
            repl_id: arguments[0].clone(),
            offset,
        })
    }
}

/// Handles the PSYNC command on the master side.
///
/// Every resynchronization is full: the reply is `+FULLRESYNC <id> 0`
/// followed by the empty baseline snapshot as an RDB transfer frame, and
/// the connection is registered as a replica so future writes reach it.
/// Both frames are written directly on the connection, so the executor
/// has nothing left to send.
pub async fn psync(
    server: &Arc<RedisServer>,
    client_address: &str,
    writer: &SharedWriter,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let psync_arguments = PsyncArguments::parse(arguments)?;

    if psync_arguments.repl_id != "?" && psync_arguments.repl_id != server.repl_id {
        return Err(CommandError::InvalidPsyncReplicationId);
    }

    debug!(
        "PSYNC from {} at offset {}",
        client_address, psync_arguments.offset
    );

    let full_resync = RespValue::SimpleString(format!(
        "FULLRESYNC {} {}",
        server.repl_id, server.repl_offset
    ))
    .encode();

    if let Err(e) = write_to_stream(writer, full_resync.as_bytes()).await {
        warn!("failed to send FULLRESYNC to {}: {}", client_address, e);
        return Ok(CommandResult::NoResponse);
    }

    let snapshot = encode_rdb_frame(&empty_rdb_bytes());

    if let Err(e) = write_to_stream(writer, &snapshot).await {
        warn!("failed to stream snapshot to {}: {}", client_address, e);
        return Ok(CommandResult::NoResponse);
    }

    if !server.is_slave() {
        server
            .replicas
            .register(client_address.to_string(), Arc::clone(writer))
            .await;
        debug!("registered replica {}", client_address);
    }

    Ok(CommandResult::NoResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_psync_arguments() {
        let parsed = PsyncArguments::parse(&string_args(&["?", "-1"])).unwrap();
        assert_eq!(parsed.repl_id, "?");
        assert_eq!(parsed.offset, -1);

        let test_cases = vec![
            (string_args(&[]), CommandError::InvalidPsyncCommand),
            (string_args(&["?"]), CommandError::InvalidPsyncCommand),
            (
                string_args(&["?", "offset"]),
                CommandError::InvalidPsyncOffset,
            ),
        ];

        for (arguments, expected) in test_cases {
            assert_eq!(
                PsyncArguments::parse(&arguments).err(),
                Some(expected),
                "args: {:?}",
                arguments
            );
        }
    }
}
