//! Master-replica replication.
//!
//! The master side keeps a [`ReplicaSet`]: the writer half of every
//! replica connection plus the WAIT/ACK rendezvous state. The replica
//! side keeps a [`ReplicationLink`]: whether the master's snapshot
//! transfer has been observed, and the byte accounting behind REPLCONF
//! GETACK. The outbound [`handshake`] is the scripted exchange a replica
//! performs right after connecting to its master.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use regex::Regex;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::warn;

use crate::connection::write_to_stream;
use crate::resp::RespValue;
use crate::server::RedisServer;

/// The writer half of a connection, shareable across tasks.
pub type SharedWriter = Arc<RwLock<OwnedWriteHalf>>;

#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("I/O error: {0}")]
    Io(#[from] tokio::io::Error),
    #[error("connection closed by master")]
    ConnectionClosed,
    #[error("invalid response from master")]
    InvalidResponseFromMaster,
}

#[derive(Debug, Default)]
struct RendezvousState {
    conns: HashMap<String, SharedWriter>,
    num_wait: usize,
    num_ack: usize,
    waiter: Option<SharedWriter>,
}

/// The master's live replica connections and the WAIT rendezvous.
///
/// The release channel has capacity one and is consumed by at most one
/// timeout task at a time; together with taking the waiter single-shot
/// this keeps a satisfied WAIT from being answered twice by late ACKs.
#[derive(Debug)]
pub struct ReplicaSet {
    state: Mutex<RendezvousState>,
    release_tx: mpsc::Sender<()>,
    release_rx: Mutex<mpsc::Receiver<()>>,
}

impl ReplicaSet {
    pub fn new() -> Self {
        let (release_tx, release_rx) = mpsc::channel(1);

        ReplicaSet {
            state: Mutex::new(RendezvousState::default()),
            release_tx,
            release_rx: Mutex::new(release_rx),
        }
    }

    /// Registers a connection that completed PSYNC as a replica.
    pub async fn register(&self, address: String, writer: SharedWriter) {
        self.state.lock().await.conns.insert(address, writer);
    }

    pub async fn deregister(&self, address: &str) {
        self.state.lock().await.conns.remove(address);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.conns.len()
    }

    /// Writes an already-encoded command to every replica connection. A
    /// failed write is logged and the remaining replicas still receive
    /// the payload.
    pub async fn propagate(&self, payload: &str) {
        let state = self.state.lock().await;

        for (address, writer) in &state.conns {
            if let Err(e) = write_to_stream(writer, payload.as_bytes()).await {
                warn!("failed to propagate to replica {}: {}", address, e);
            }
        }
    }

    /// Starts a WAIT: zeroes the acknowledgment count, remembers the
    /// waiting client, drains any stale release signal and broadcasts
    /// `REPLCONF GETACK *` to every replica. Returns the replica count.
    pub async fn begin_wait(&self, waiter: SharedWriter) -> usize {
        {
            let mut state = self.state.lock().await;
            state.num_ack = 0;
            state.num_wait = 0;
            state.waiter = Some(waiter);
        }

        // A release left over from an already-answered WAIT must not
        // satisfy this one.
        if let Ok(mut release_rx) = self.release_rx.try_lock() {
            while release_rx.try_recv().is_ok() {}
        }

        let getack = RespValue::Array(vec![
            RespValue::BulkString("REPLCONF".to_string()),
            RespValue::BulkString("GETACK".to_string()),
            RespValue::BulkString("*".to_string()),
        ])
        .encode();

        let state = self.state.lock().await;

        for (address, writer) in &state.conns {
            if let Err(e) = write_to_stream(writer, getack.as_bytes()).await {
                warn!("failed to send GETACK to replica {}: {}", address, e);
            }
        }

        state.conns.len()
    }

    /// Abandons a WAIT that was answered inline (the `N == 0` case).
    pub async fn cancel_wait(&self) {
        let mut state = self.state.lock().await;
        state.waiter = None;
        state.num_wait = 0;
    }

    /// Arms the rendezvous threshold. ACKs may have raced in between the
    /// GETACK broadcast and this point, so the threshold is also checked
    /// immediately.
    pub async fn arm(&self, num_wait: usize) {
        let mut state = self.state.lock().await;
        state.num_wait = num_wait;

        if state.num_ack >= state.num_wait {
            let _ = self.release_tx.try_send(());
            Self::answer_waiter(&mut state).await;
        }
    }

    /// Records one REPLCONF ACK. Reaching the armed threshold answers
    /// the waiting client with the acknowledgment count and resets the
    /// rendezvous; the release signal stops the timeout task.
    pub async fn handle_ack(&self) {
        let mut state = self.state.lock().await;
        state.num_ack += 1;

        if state.num_wait > 0 && state.num_ack >= state.num_wait {
            let _ = self.release_tx.try_send(());
            Self::answer_waiter(&mut state).await;
        }
    }

    async fn answer_waiter(state: &mut RendezvousState) {
        if let Some(waiter) = state.waiter.take() {
            let reply = RespValue::Integer(state.num_ack as i64).encode();

            if let Err(e) = write_to_stream(&waiter, reply.as_bytes()).await {
                warn!("failed to answer WAIT client: {}", e);
            }
        }

        state.num_ack = 0;
        state.num_wait = 0;
    }

    /// Runs the WAIT deadline: whichever of the release signal and the
    /// timer fires first wins. On timeout the waiting client receives the
    /// acknowledgment count, or the replica count when no ACK arrived.
    pub async fn release_or_timeout(&self, timeout: Duration) {
        let mut release_rx = self.release_rx.lock().await;

        tokio::select! {
            _ = release_rx.recv() => {}
            _ = tokio::time::sleep(timeout) => {
                drop(release_rx);

                let mut state = self.state.lock().await;

                if let Some(waiter) = state.waiter.take() {
                    let count = if state.num_ack == 0 {
                        state.conns.len()
                    } else {
                        state.num_ack
                    };
                    let reply = RespValue::Integer(count as i64).encode();

                    if let Err(e) = write_to_stream(&waiter, reply.as_bytes()).await {
                        warn!("failed to answer WAIT client: {}", e);
                    }

                    state.num_ack = 0;
                    state.num_wait = 0;
                }
            }
        }
    }
}

impl Default for ReplicaSet {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct LinkState {
    handshake_done: bool,
    bytes_all: usize,
    bytes_curr: usize,
}

/// Replica-side bookkeeping for the connection to the master.
#[derive(Debug, Default)]
pub struct ReplicationLink {
    state: Mutex<LinkState>,
}

impl ReplicationLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the master's snapshot transfer as observed and zeroes the
    /// byte counters, so reported offsets count from the end of the
    /// handshake.
    pub async fn complete_handshake(&self) {
        let mut state = self.state.lock().await;
        state.handshake_done = true;
        state.bytes_all = 0;
        state.bytes_curr = 0;
    }

    pub async fn is_handshake_done(&self) -> bool {
        self.state.lock().await.handshake_done
    }

    /// Accounts one fully parsed command from the replication stream.
    pub async fn record_command(&self, wire_len: usize) {
        let mut state = self.state.lock().await;
        state.bytes_all += wire_len;
        state.bytes_curr = wire_len;
    }

    /// The offset REPLCONF GETACK reports: everything processed on the
    /// link minus the GETACK command currently being serviced.
    pub async fn acked_offset(&self) -> usize {
        let state = self.state.lock().await;
        state.bytes_all - state.bytes_curr
    }
}

/// Performs the scripted replica-to-master handshake, reading one reply
/// between each write. Returns the bytes read past the FULLRESYNC line;
/// the RDB transfer usually trails it in the same segment and belongs to
/// the master-link loop.
pub async fn handshake(
    stream: &mut TcpStream,
    server: &RedisServer,
) -> Result<BytesMut, HandshakeError> {
    let mut buffer = BytesMut::with_capacity(1024);

    let reply = exchange(
        stream,
        &mut buffer,
        RespValue::Array(vec![RespValue::BulkString("PING".to_string())]),
    )
    .await?;
    if reply != "+PONG" {
        return Err(HandshakeError::InvalidResponseFromMaster);
    }

    let reply = exchange(
        stream,
        &mut buffer,
        RespValue::Array(vec![
            RespValue::BulkString("REPLCONF".to_string()),
            RespValue::BulkString("listening-port".to_string()),
            RespValue::BulkString(server.port.to_string()),
        ]),
    )
    .await?;
    if reply != "+OK" {
        return Err(HandshakeError::InvalidResponseFromMaster);
    }

    let reply = exchange(
        stream,
        &mut buffer,
        RespValue::Array(vec![
            RespValue::BulkString("REPLCONF".to_string()),
            RespValue::BulkString("capa".to_string()),
            RespValue::BulkString("psync2".to_string()),
        ]),
    )
    .await?;
    if reply != "+OK" {
        return Err(HandshakeError::InvalidResponseFromMaster);
    }

    let reply = exchange(
        stream,
        &mut buffer,
        RespValue::Array(vec![
            RespValue::BulkString("PSYNC".to_string()),
            RespValue::BulkString("?".to_string()),
            RespValue::BulkString("-1".to_string()),
        ]),
    )
    .await?;
    if !is_valid_fullresync(&reply) {
        return Err(HandshakeError::InvalidResponseFromMaster);
    }

    Ok(buffer)
}

fn is_valid_fullresync(reply: &str) -> bool {
    let Some(rest) = reply.strip_prefix('+') else {
        return false;
    };

    let parts: Vec<&str> = rest.split_whitespace().collect();

    parts.len() == 3
        && parts[0] == "FULLRESYNC"
        && is_valid_repl_id(parts[1])
        && parts[2].parse::<i64>().is_ok()
}

fn is_valid_repl_id(repl_id: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9]{40}$").unwrap();
    re.is_match(repl_id)
}

async fn exchange(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    command: RespValue,
) -> Result<String, HandshakeError> {
    stream.write_all(command.encode().as_bytes()).await?;
    stream.flush().await?;

    read_reply_line(stream, buffer).await
}

/// Reads one CRLF-terminated reply line, leaving anything past the line
/// in `buffer`.
async fn read_reply_line(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
) -> Result<String, HandshakeError> {
    let mut chunk = [0u8; 1024];

    loop {
        if let Some(position) = buffer.windows(2).position(|window| window == b"\r\n") {
            let line = buffer.split_to(position + 2);
            let line = str::from_utf8(&line[..position])
                .map_err(|_| HandshakeError::InvalidResponseFromMaster)?;

            return Ok(line.to_string());
        }

        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(HandshakeError::ConnectionClosed);
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
}
