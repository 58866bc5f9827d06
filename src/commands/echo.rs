use crate::resp::RespValue;

use super::command_error::CommandError;
use super::executor::CommandResult;

/// Handles the ECHO command: replies with the given message as a bulk
/// string.
pub fn echo(arguments: &[String]) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::InvalidEchoCommand);
    }

    Ok(CommandResult::Response(
        RespValue::BulkString(arguments[0].clone()).encode(),
    ))
}
