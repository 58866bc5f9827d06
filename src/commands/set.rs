use std::sync::Arc;

use crate::resp::RespValue;
use crate::server::RedisServer;
use crate::store::{Item, NO_EXPIRY};

use super::command_error::CommandError;
use super::executor::CommandResult;

/// Represents the parsed arguments for the SET command.
pub struct SetArguments {
    key: String,
    value: String,
    /// Relative time-to-live in milliseconds, or [`NO_EXPIRY`].
    ttl_ms: i64,
}

impl SetArguments {
    /// Parses `key value` or `key value PX <milliseconds>`.
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 2 && arguments.len() != 4 {
            return Err(CommandError::InvalidSetCommand);
        }

        let mut ttl_ms = NO_EXPIRY;

        if arguments.len() == 4 {
            if !arguments[2].eq_ignore_ascii_case("px") {
                return Err(CommandError::InvalidSetCommandArgument);
            }

            ttl_ms = arguments[3]
                .parse::<i64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(CommandError::InvalidSetCommandExpiration)?;
        }

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            ttl_ms,
        })
    }
}

/// Handles the SET command.
///
/// Stores the value, arms a deletion timer when a TTL was given, and on a
/// master fans the write out to every replica connection before the `+OK`
/// goes back to the client. The propagated frame carries only `SET key
/// value`; the TTL is not forwarded. A replica applies the write silently
/// since only the master acknowledges.
pub async fn set(
    server: &Arc<RedisServer>,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    let generation = server.next_generation();
    let item = Item::with_ttl(set_arguments.value.clone(), set_arguments.ttl_ms, generation);
    let expiry = item.expiry;

    server.items.store(set_arguments.key.clone(), item).await;

    if expiry != NO_EXPIRY {
        server.schedule_expiry(set_arguments.key.clone(), expiry, generation);
    }

    if server.is_slave() {
        return Ok(CommandResult::NoResponse);
    }

    server
        .replicas
        .propagate(
            &RespValue::Array(vec![
                RespValue::BulkString("SET".to_string()),
                RespValue::BulkString(set_arguments.key),
                RespValue::BulkString(set_arguments.value),
            ])
            .encode(),
        )
        .await;

    Ok(CommandResult::Response(
        RespValue::SimpleString("OK".to_string()).encode(),
    ))
}
