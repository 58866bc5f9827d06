use crate::resp::RespValue;

use super::command_error::CommandError;
use super::executor::CommandResult;

/// Handles the PING command: replies PONG when the server is alive.
pub fn ping(arguments: &[String]) -> Result<CommandResult, CommandError> {
    if !arguments.is_empty() {
        return Err(CommandError::InvalidPingCommand);
    }

    Ok(CommandResult::Response(
        RespValue::SimpleString("PONG".to_string()).encode(),
    ))
}
