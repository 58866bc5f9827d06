use std::sync::Arc;

use crate::resp::RespValue;
use crate::server::RedisServer;

use super::command_error::CommandError;
use super::executor::CommandResult;

/// Handles the GET command.
///
/// An item past its expiry is treated as absent and removed lazily; the
/// deletion re-checks the generation so a concurrent overwrite survives.
pub async fn get(
    server: &Arc<RedisServer>,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::InvalidGetCommand);
    }

    let key = &arguments[0];

    match server.items.load(key).await {
        Some(item) if item.is_expired() => {
            server
                .items
                .delete_if(key, |current| current.generation == item.generation)
                .await;

            Ok(CommandResult::Response(RespValue::Null.encode()))
        }
        Some(item) => Ok(CommandResult::Response(
            RespValue::BulkString(item.value).encode(),
        )),
        None => Ok(CommandResult::Response(RespValue::Null.encode())),
    }
}
