use std::sync::Arc;

use crate::resp::RespValue;
use crate::server::RedisServer;

use super::command_error::CommandError;
use super::executor::CommandResult;

/// Handles the TYPE command.
///
/// Items and streams live in separate keyspaces, so both stores are
/// consulted: a live item wins, then a stream, then `none`.
pub async fn type_command(
    server: &Arc<RedisServer>,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    if arguments.len() != 1 {
        return Err(CommandError::InvalidTypeCommand);
    }

    let key = &arguments[0];

    if let Some(item) = server.items.load(key).await {
        if !item.is_expired() {
            return Ok(CommandResult::Response(
                RespValue::SimpleString(item.kind).encode(),
            ));
        }
    }

    if server.streams.contains(key).await {
        return Ok(CommandResult::Response(
            RespValue::SimpleString("stream".to_string()).encode(),
        ));
    }

    Ok(CommandResult::Response(
        RespValue::SimpleString("none".to_string()).encode(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Item, NO_EXPIRY, Stream, now_millis};

    fn string_args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_type_command() {
        let server = Arc::new(RedisServer::new(vec!["resp-node".to_string()]).unwrap());
        server
            .items
            .store(
                "fruit".to_string(),
                Item::with_ttl("mango".to_string(), NO_EXPIRY, 0),
            )
            .await;
        server
            .items
            .store(
                "stale".to_string(),
                Item::expiring_at("gone".to_string(), now_millis() - 10, 1),
            )
            .await;
        server
            .streams
            .store("events".to_string(), Stream::default())
            .await;

        let test_cases = vec![
            ("fruit", "+string\r\n"),
            ("events", "+stream\r\n"),
            ("stale", "+none\r\n"),
            ("missing", "+none\r\n"),
        ];

        for (key, expected) in test_cases {
            assert_eq!(
                type_command(&server, &string_args(&[key])).await,
                Ok(CommandResult::Response(expected.to_string())),
                "key: {}",
                key
            );
        }

        assert_eq!(
            type_command(&server, &[]).await,
            Err(CommandError::InvalidTypeCommand)
        );
    }
}
