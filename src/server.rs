//! Node configuration and the accept loop.
//!
//! This module contains command-line argument parsing, role management
//! (master/replica) and the server loop that accepts incoming client
//! connections. The [`RedisServer`] aggregate carries every mutable
//! subsystem (the two stores, the replica registry, the replication-link
//! counters), each behind its own lock, so handlers only ever take the
//! locks they need.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::RngCore;
use regex::Regex;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use crate::connection::{handle_client_connection, handle_master_link};
use crate::replication::{self, ReplicaSet, ReplicationLink};
use crate::store::{Item, Store, Stream, now_millis};

/// Errors that can occur during command-line argument parsing.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("invalid port flag value")]
    InvalidPortFlagValue,
    #[error("invalid master address")]
    InvalidMasterAddress,
    #[error("invalid master port")]
    InvalidMasterPort,
}

/// The role a node runs in.
///
/// A master accepts writes and fans them out to its replicas; a replica
/// connects out to the master at the given (host, port) and applies the
/// replication stream.
#[derive(Debug, PartialEq, Clone)]
pub enum RedisRole {
    Master,
    Replica((String, u32)),
}

impl RedisRole {
    /// The role name INFO reports; replicas use the historical "slave"
    /// wording.
    pub fn as_string(&self) -> &str {
        match self {
            RedisRole::Master => "master",
            RedisRole::Replica(_) => "slave",
        }
    }
}

/// A configured RESP node: settings plus every mutable subsystem.
#[derive(Debug)]
pub struct RedisServer {
    /// The TCP port this node listens on.
    pub port: u32,
    pub role: RedisRole,
    /// Stable 40-character hexadecimal replication identifier.
    pub repl_id: String,
    /// Replication offset reported by INFO and FULLRESYNC.
    pub repl_offset: u64,
    /// Directory and filename of the RDB snapshot restored at startup;
    /// both may be empty.
    pub rdb_directory: String,
    pub rdb_filename: String,
    pub items: Store<Item>,
    pub streams: Store<Stream>,
    /// Master side: replica connections and the WAIT rendezvous.
    pub replicas: ReplicaSet,
    /// Replica side: handshake progress and GETACK byte accounting.
    pub link: ReplicationLink,
    generation: AtomicU64,
}

impl RedisServer {
    /// Creates a node from command-line arguments.
    ///
    /// # Supported arguments
    ///
    /// * `-port <port>` - port to listen on (default: 6379)
    /// * `-replicaof <host>` - run as a replica; the master port is taken
    ///   from the first positional argument, or from a combined
    ///   `"<host> <port>"` value
    /// * `-dir <path>` - directory containing the RDB snapshot
    /// * `-dbfilename <name>` - RDB snapshot file name
    ///
    /// Flags are accepted with one or two leading dashes.
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let mut iter = command_line_args.into_iter().skip(1);
        let mut port: Option<u32> = None;
        let mut master_host: Option<String> = None;
        let mut master_port: Option<u32> = None;
        let mut rdb_directory = String::new();
        let mut rdb_filename = String::new();
        let mut positional: Vec<String> = Vec::new();

        while let Some(arg) = iter.next() {
            let flag = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'));

            match flag {
                Some("port") => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    port = Some(validate_port_flag(&value)?);
                }
                Some("replicaof") => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    if value.contains(char::is_whitespace) {
                        let (host, validated_port) = validate_master_address(&value)?;
                        master_host = Some(host);
                        master_port = Some(validated_port);
                    } else {
                        master_host = Some(validate_master_host(&value)?);
                    }
                }
                Some("dir") => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    rdb_directory = value;
                }
                Some("dbfilename") => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    rdb_filename = value;
                }
                Some(_) => return Err(CliError::InvalidCommandLineFlag),
                None => positional.push(arg),
            }
        }

        let role = match master_host {
            Some(host) => {
                let master_port = match master_port {
                    Some(validated_port) => validated_port,
                    None => {
                        // The historical invocation passes the master port
                        // as the first positional argument after the flags.
                        let Some(value) = positional.first() else {
                            return Err(CliError::InvalidMasterPort);
                        };

                        validate_master_port(value)?
                    }
                };

                RedisRole::Replica((host, master_port))
            }
            None => RedisRole::Master,
        };

        let mut id_bytes = [0u8; 20];
        rand::rng().fill_bytes(&mut id_bytes);

        Ok(RedisServer {
            port: port.unwrap_or(6379),
            role,
            repl_id: hex::encode(id_bytes),
            repl_offset: 0,
            rdb_directory,
            rdb_filename,
            items: Store::new(),
            streams: Store::new(),
            replicas: ReplicaSet::new(),
            link: ReplicationLink::new(),
            generation: AtomicU64::new(0),
        })
    }

    pub fn is_slave(&self) -> bool {
        matches!(self.role, RedisRole::Replica(_))
    }

    /// True once this node is a replica that has observed its master's
    /// snapshot transfer. Such a node stays silent for PING, ECHO, PSYNC
    /// and unknown commands.
    pub async fn is_silent_replica(&self) -> bool {
        self.is_slave() && self.link.is_handshake_done().await
    }

    /// Whether an RDB snapshot location was configured.
    pub fn has_rdb_file(&self) -> bool {
        !self.rdb_directory.is_empty() && !self.rdb_filename.is_empty()
    }

    /// The monotonically increasing tag attached to every write.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed)
    }

    /// Arms a deletion for `key` at the absolute `deadline` (milliseconds
    /// since the epoch). The write generation is re-checked at deletion
    /// time so a timer armed for an overwritten value leaves the newer
    /// one alone.
    pub fn schedule_expiry(self: &Arc<Self>, key: String, deadline: i64, generation: u64) {
        let server = Arc::clone(self);

        tokio::spawn(async move {
            let delay = (deadline - now_millis()).max(0) as u64;
            tokio::time::sleep(Duration::from_millis(delay)).await;

            server
                .items
                .delete_if(&key, |item| item.generation == generation)
                .await;
        });
    }

    /// Runs the node: connects out to the master when configured as a
    /// replica, then accepts client connections until the process exits.
    /// Returns an error only when the listener cannot be bound.
    pub async fn run(self: Arc<Self>) -> tokio::io::Result<()> {
        if let RedisRole::Replica((host, master_port)) = &self.role {
            let master_address = format!("{}:{}", host, master_port);
            let server = Arc::clone(&self);

            tokio::spawn(async move {
                connect_to_master(master_address, server).await;
            });
        }

        let listener = TcpListener::bind(format!("127.0.0.1:{}", self.port)).await?;
        info!("listening on port {} as {}", self.port, self.role.as_string());

        loop {
            match listener.accept().await {
                Ok((stream, client_address)) => {
                    let server = Arc::clone(&self);

                    tokio::spawn(async move {
                        handle_client_connection(stream, server, client_address.to_string()).await;
                    });
                }
                Err(e) => {
                    error!("error accepting connection: {}", e);
                }
            }
        }
    }
}

async fn connect_to_master(master_address: String, server: Arc<RedisServer>) {
    let mut stream = match TcpStream::connect(&master_address).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("failed to connect to master at {}: {}", master_address, e);
            return;
        }
    };

    match replication::handshake(&mut stream, &server).await {
        Ok(leftover) => {
            info!("completed handshake with master at {}", master_address);
            handle_master_link(stream, server, leftover).await;
        }
        Err(e) => {
            error!("handshake with master at {} failed: {}", master_address, e);
        }
    }
}

fn validate_port_flag(port: &str) -> Result<u32, CliError> {
    validate_port_with_error(port, CliError::InvalidPortFlagValue)
}

fn validate_master_port(port: &str) -> Result<u32, CliError> {
    validate_port_with_error(port, CliError::InvalidMasterPort)
}

fn validate_port_with_error(port: &str, error: CliError) -> Result<u32, CliError> {
    let port_number = port.parse::<u32>().map_err(|_| error.clone())?;

    if port_number < 1 || port_number > 65535 {
        return Err(error);
    }

    Ok(port_number)
}

/// Validates a master host: an IPv4 address with in-range octets, or a
/// plain hostname.
fn validate_master_host(host: &str) -> Result<String, CliError> {
    let ipv4_regex = Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").unwrap();
    let hostname_regex = Regex::new(r"^[a-zA-Z0-9\-\.]+$").unwrap();

    let valid = if let Some(caps) = ipv4_regex.captures(host) {
        caps.iter().skip(1).all(|octet| {
            octet
                .map(|m| m.as_str().parse::<u16>().map(|v| v <= 255).unwrap_or(false))
                .unwrap_or(false)
        })
    } else {
        hostname_regex.is_match(host)
    };

    if !valid {
        return Err(CliError::InvalidMasterAddress);
    }

    Ok(host.to_string())
}

/// Validates a combined `"<host> <port>"` master address.
fn validate_master_address(master_address: &str) -> Result<(String, u32), CliError> {
    let split_address = master_address.split_whitespace().collect::<Vec<&str>>();

    if split_address.len() != 2 {
        return Err(CliError::InvalidMasterAddress);
    }

    let host = validate_master_host(split_address[0])?;
    let port_number = validate_master_port(split_address[1])?;

    Ok((host, port_number))
}
