//! REPLCONF subcommand handling.
//!
//! REPLCONF carries three very different duties on this node: handshake
//! configuration (listening-port and capa, acknowledged with OK), the
//! master-side ACK bookkeeping that feeds the WAIT rendezvous, and the
//! replica-side GETACK reply that reports the replication offset.

use std::sync::Arc;

use crate::resp::RespValue;
use crate::server::RedisServer;

use super::command_error::CommandError;
use super::executor::CommandResult;

pub struct ReplconfArguments {
    subcommand: String,
}

impl ReplconfArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        let Some(subcommand) = arguments.first() else {
            return Err(CommandError::InvalidReplconfCommand);
        };

        Ok(Self {
            subcommand: subcommand.to_lowercase(),
        })
    }
}

/// Handles the REPLCONF command.
pub async fn replconf(
    server: &Arc<RedisServer>,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let replconf_arguments = ReplconfArguments::parse(arguments)?;

    match replconf_arguments.subcommand.as_str() {
        "ack" => {
            if server.is_slave() {
                // The only ACK a replica ever sees is the GETACK answer it
                // wrote itself, echoed through the parser.
                return Ok(CommandResult::NoResponse);
            }

            server.replicas.handle_ack().await;

            // The acknowledging replica gets nothing back; a waiting WAIT
            // client is answered through the rendezvous.
            Ok(CommandResult::NoResponse)
        }
        "getack" => {
            let offset = server.link.acked_offset().await;

            Ok(CommandResult::Response(
                RespValue::Array(vec![
                    RespValue::BulkString("REPLCONF".to_string()),
                    RespValue::BulkString("ACK".to_string()),
                    RespValue::BulkString(offset.to_string()),
                ])
                .encode(),
            ))
        }
        _ => Ok(CommandResult::Response(
            RespValue::SimpleString("OK".to_string()).encode(),
        )),
    }
}
