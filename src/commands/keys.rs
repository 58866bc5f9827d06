use std::sync::Arc;

use globset::Glob;

use crate::resp::RespValue;
use crate::server::RedisServer;

use super::command_error::CommandError;
use super::executor::CommandResult;

pub struct KeysArguments {
    pattern: String,
}

impl KeysArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::InvalidKeysCommand);
        }

        Ok(KeysArguments {
            pattern: arguments[0].clone(),
        })
    }
}

/// Handles the KEYS command.
///
/// Glob-matches the live item keyspace, which right after startup holds
/// exactly the names restored from the RDB snapshot. Expired entries are
/// skipped. No matches renders the null bulk rather than an empty array.
pub async fn keys(
    server: &Arc<RedisServer>,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let keys_arguments = KeysArguments::parse(arguments)?;

    let matcher = Glob::new(&keys_arguments.pattern)
        .map_err(|e| CommandError::InvalidGlobPattern(e.to_string()))?
        .compile_matcher();

    let names: Vec<RespValue> = {
        let entries = server.items.guard().await;

        entries
            .iter()
            .filter(|(key, item)| !item.is_expired() && matcher.is_match(key.as_str()))
            .map(|(key, _)| RespValue::BulkString(key.clone()))
            .collect()
    };

    if names.is_empty() {
        return Ok(CommandResult::Response(RespValue::Null.encode()));
    }

    Ok(CommandResult::Response(RespValue::Array(names).encode()))
}
