use std::sync::Arc;

use crate::resp::RespValue;
use crate::server::RedisServer;

use super::command_error::CommandError;
use super::executor::CommandResult;

struct InfoArguments {
    section: Option<String>,
}

impl InfoArguments {
    fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() > 1 {
            return Err(CommandError::InvalidInfoCommand);
        }

        Ok(InfoArguments {
            section: arguments.first().cloned(),
        })
    }
}

/// Handles the INFO command.
///
/// The `replication` section reports role, replication id and offset;
/// every other section collapses to `role:master`.
pub async fn info(
    server: &Arc<RedisServer>,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let info_arguments = InfoArguments::parse(arguments)?;

    let payload = match info_arguments.section.as_deref() {
        Some(section) if section.eq_ignore_ascii_case("replication") => format!(
            "role:{}\r\nmaster_replid:{}\r\nmaster_repl_offset:{}",
            server.role.as_string(),
            server.repl_id,
            server.repl_offset
        ),
        _ => "role:master".to_string(),
    };

    Ok(CommandResult::Response(
        RespValue::BulkString(payload).encode(),
    ))
}
