use std::sync::Arc;

use crate::resp::RespValue;
use crate::server::RedisServer;

use super::command_error::CommandError;
use super::executor::CommandResult;

pub struct ConfigGetArguments {
    parameter: String,
}

impl ConfigGetArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 2 || !arguments[0].eq_ignore_ascii_case("get") {
            return Err(CommandError::InvalidConfigGetCommand);
        }

        Ok(Self {
            parameter: arguments[1].to_lowercase(),
        })
    }
}

/// Handles CONFIG GET for the two recognized parameters, `dir` and
/// `dbfilename`, replying with a `[parameter, value]` array.
pub async fn config_get(
    server: &Arc<RedisServer>,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let config_arguments = ConfigGetArguments::parse(arguments)?;

    let value = match config_arguments.parameter.as_str() {
        "dir" => server.rdb_directory.clone(),
        "dbfilename" => server.rdb_filename.clone(),
        _ => {
            return Err(CommandError::InvalidConfigGetCommandArgument(
                config_arguments.parameter,
            ));
        }
    };

    Ok(CommandResult::Response(
        RespValue::Array(vec![
            RespValue::BulkString(config_arguments.parameter),
            RespValue::BulkString(value),
        ])
        .encode(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_config_get_rdb_settings() {
        let server = Arc::new(
            RedisServer::new(vec![
                "resp-node".to_string(),
                "-dir".to_string(),
                "/data".to_string(),
                "-dbfilename".to_string(),
                "dump.rdb".to_string(),
            ])
            .unwrap(),
        );

        assert_eq!(
            config_get(&server, &string_args(&["GET", "dir"])).await,
            Ok(CommandResult::Response(
                "*2\r\n$3\r\ndir\r\n$5\r\n/data\r\n".to_string()
            ))
        );
        assert_eq!(
            config_get(&server, &string_args(&["get", "dbfilename"])).await,
            Ok(CommandResult::Response(
                "*2\r\n$10\r\ndbfilename\r\n$8\r\ndump.rdb\r\n".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_config_get_rejects_unknown_input() {
        let server = Arc::new(RedisServer::new(vec!["resp-node".to_string()]).unwrap());

        assert_eq!(
            config_get(&server, &string_args(&["GET", "maxmemory"])).await,
            Err(CommandError::InvalidConfigGetCommandArgument(
                "maxmemory".to_string()
            ))
        );
        assert_eq!(
            config_get(&server, &string_args(&["SET", "dir"])).await,
            Err(CommandError::InvalidConfigGetCommand)
        );
        assert_eq!(
            config_get(&server, &string_args(&["GET"])).await,
            Err(CommandError::InvalidConfigGetCommand)
        );
    }
}
