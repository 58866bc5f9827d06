//! Per-connection read/parse/dispatch loops.
//!
//! Every accepted socket gets its own task running
//! [`handle_client_connection`]; a replica additionally runs
//! [`handle_master_link`] over its outbound connection once the
//! handshake is through. Both loops share the executor, so commands
//! streamed from a master are applied with exactly the same semantics as
//! commands typed by a client.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::commands::{CommandResult, execute_command};
use crate::replication::SharedWriter;
use crate::request::{Frame, parse_frames};
use crate::server::RedisServer;

/// Writes a full response through a shared writer half.
pub async fn write_to_stream(writer: &SharedWriter, response: &[u8]) -> tokio::io::Result<()> {
    let mut writer_guard = writer.write().await;
    writer_guard.write_all(response).await?;
    writer_guard.flush().await?;

    Ok(())
}

/// Serves one accepted client until EOF, a read/write failure or a
/// protocol violation. Command errors are answered with a simple-error
/// frame and the connection keeps going; everything else tears down only
/// this connection.
pub async fn handle_client_connection(
    stream: TcpStream,
    server: Arc<RedisServer>,
    client_address: String,
) {
    let (mut reader, writer) = stream.into_split();
    let writer: SharedWriter = Arc::new(RwLock::new(writer));
    let mut buffer = BytesMut::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    'connection: loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) => {
                warn!("read error on {}: {}", client_address, e);
                break;
            }
        };
        buffer.extend_from_slice(&chunk[..read]);

        let frames = match parse_frames(&mut buffer) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("protocol error on {}: {}", client_address, e);
                break;
            }
        };

        for frame in frames {
            let command = match frame {
                Frame::Command(command) => command,
                Frame::RdbTransfer { len } => {
                    // Snapshot transfers only mean something on a
                    // replica's master link.
                    debug!(
                        "ignoring {} byte snapshot transfer from client {}",
                        len, client_address
                    );
                    continue;
                }
            };

            let response = match execute_command(&server, &client_address, &writer, &command).await
            {
                Ok(CommandResult::Response(response)) => response,
                Ok(CommandResult::NoResponse) => continue,
                Err(e) => e.as_string(),
            };

            if let Err(e) = write_to_stream(&writer, response.as_bytes()).await {
                warn!("write error on {}: {}", client_address, e);
                break 'connection;
            }
        }
    }

    // The connection may have been registered as a replica by PSYNC.
    server.replicas.deregister(&client_address).await;
}

/// Applies the replication stream on a replica.
///
/// `buffer` carries whatever the handshake read past the FULLRESYNC
/// line, usually the beginning of the RDB transfer. The transfer frame
/// completes the handshake and zeroes the byte counters; every array
/// command is accounted before it is executed so REPLCONF GETACK reports
/// the offset up to but excluding itself. Only GETACK produces bytes
/// back to the master.
pub async fn handle_master_link(stream: TcpStream, server: Arc<RedisServer>, mut buffer: BytesMut) {
    let master_address = stream
        .peer_addr()
        .map(|address| address.to_string())
        .unwrap_or_else(|_| "master".to_string());

    let (mut reader, writer) = stream.into_split();
    let writer: SharedWriter = Arc::new(RwLock::new(writer));
    let mut chunk = [0u8; 1024];

    loop {
        let frames = match parse_frames(&mut buffer) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("protocol error on master link {}: {}", master_address, e);
                return;
            }
        };

        for frame in frames {
            match frame {
                Frame::RdbTransfer { len } => {
                    debug!("received {} byte snapshot from master", len);
                    server.link.complete_handshake().await;
                }
                Frame::Command(command) => {
                    server.link.record_command(command.wire_len).await;

                    match execute_command(&server, &master_address, &writer, &command).await {
                        Ok(CommandResult::Response(response)) => {
                            if let Err(e) = write_to_stream(&writer, response.as_bytes()).await {
                                warn!("write error on master link: {}", e);
                                return;
                            }
                        }
                        Ok(CommandResult::NoResponse) => {}
                        Err(e) => {
                            debug!("error applying command from master: {}", e);
                        }
                    }
                }
            }
        }

        let read = match reader.read(&mut chunk).await {
            Ok(0) => {
                warn!("master link to {} closed", master_address);
                return;
            }
            Ok(read) => read,
            Err(e) => {
                warn!("read error on master link {}: {}", master_address, e);
                return;
            }
        };
        buffer.extend_from_slice(&chunk[..read]);
    }
}
