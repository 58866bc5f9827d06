//! The WAIT command.
//!
//! WAIT blocks its client until at least N replicas have acknowledged
//! all prior writes or the deadline passes, and answers with the count
//! of replicas known to have acknowledged. The GETACK broadcast, the ACK
//! counting and the single-shot release live in
//! [`crate::replication::ReplicaSet`]; this module parses arguments,
//! answers the `N == 0` case inline and spawns the deadline task.

use std::sync::Arc;
use std::time::Duration;

use crate::replication::SharedWriter;
use crate::resp::RespValue;
use crate::server::RedisServer;

use super::command_error::CommandError;
use super::executor::CommandResult;

pub struct WaitArguments {
    num_replicas: usize,
    timeout: Duration,
}

impl WaitArguments {
    pub fn parse(arguments: &[String]) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::InvalidWaitCommand);
        }

        let num_replicas = arguments[0]
            .parse::<usize>()
            .map_err(|_| CommandError::InvalidWaitCommandArgument)?;

        let timeout_ms = arguments[1]
            .parse::<u64>()
            .map_err(|_| CommandError::InvalidWaitCommandArgument)?;

        Ok(Self {
            num_replicas,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Handles the WAIT command on the dispatching connection's task.
///
/// The reply is deferred: either the ACK threshold answers the client
/// through the rendezvous, or the deadline task does. Only `WAIT 0 …`
/// is answered inline with the current replica count.
pub async fn wait(
    server: &Arc<RedisServer>,
    writer: &SharedWriter,
    arguments: &[String],
) -> Result<CommandResult, CommandError> {
    let wait_arguments = WaitArguments::parse(arguments)?;

    let replica_count = server.replicas.begin_wait(Arc::clone(writer)).await;

    if wait_arguments.num_replicas == 0 {
        server.replicas.cancel_wait().await;

        return Ok(CommandResult::Response(
            RespValue::Integer(replica_count as i64).encode(),
        ));
    }

    server.replicas.arm(wait_arguments.num_replicas).await;

    let server = Arc::clone(server);
    tokio::spawn(async move {
        server
            .replicas
            .release_or_timeout(wait_arguments.timeout)
            .await;
    });

    Ok(CommandResult::NoResponse)
}
