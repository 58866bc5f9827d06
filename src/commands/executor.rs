//! Command dispatch.
//!
//! Routes a parsed command to its handler by lowercased name. The one
//! cross-cutting rule lives here: a replica that has completed its
//! handshake never answers PING, ECHO, PSYNC or unknown commands, since
//! those arrive mirrored from the master and replying would corrupt the
//! replication stream.

use std::sync::Arc;

use crate::replication::SharedWriter;
use crate::request::Command;
use crate::resp::RespValue;
use crate::server::RedisServer;

use super::command_error::CommandError;
use super::config_get::config_get;
use super::echo::echo;
use super::get::get;
use super::info::info;
use super::keys::keys;
use super::ping::ping;
use super::psync::psync;
use super::replconf::replconf;
use super::set::set;
use super::type_command::type_command;
use super::wait::wait;
use super::xadd::xadd;

/// What the connection loop should do with a handled command.
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Write this encoded reply back on the connection.
    Response(String),
    /// Nothing goes back on the wire (silent replica paths, commands that
    /// wrote to the connection themselves, deferred WAIT replies).
    NoResponse,
}

/// Applies one parsed command against node state and produces its reply.
pub async fn execute_command(
    server: &Arc<RedisServer>,
    client_address: &str,
    writer: &SharedWriter,
    command: &Command,
) -> Result<CommandResult, CommandError> {
    let silent = server.is_silent_replica().await;

    match command.name.as_str() {
        "ping" if silent => Ok(CommandResult::NoResponse),
        "ping" => ping(&command.arguments),
        "echo" if silent => Ok(CommandResult::NoResponse),
        "echo" => echo(&command.arguments),
        "set" => set(server, &command.arguments).await,
        "get" => get(server, &command.arguments).await,
        "info" => info(server, &command.arguments).await,
        "replconf" => replconf(server, &command.arguments).await,
        "psync" if silent => Ok(CommandResult::NoResponse),
        "psync" => psync(server, client_address, writer, &command.arguments).await,
        "wait" => wait(server, writer, &command.arguments).await,
        "config" => config_get(server, &command.arguments).await,
        "keys" => keys(server, &command.arguments).await,
        "type" => type_command(server, &command.arguments).await,
        "xadd" => xadd(server, &command.arguments).await,
        _ if silent => Ok(CommandResult::NoResponse),
        _ => Ok(CommandResult::Response(
            RespValue::SimpleString("Unknown command".to_string()).encode(),
        )),
    }
}
