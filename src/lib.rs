//! A Redis-compatible RESP server.
//!
//! This crate implements a minimal Redis-compatible in-memory key-value
//! node that supports:
//!
//! - String operations with optional expiry (GET, SET with PX)
//! - Keyspace introspection (KEYS, TYPE, CONFIG GET, INFO)
//! - Stream appends (XADD)
//! - Master-replica replication (REPLCONF, PSYNC, WAIT)
//! - Restoring the keyspace from an on-disk RDB snapshot at startup
//!
//! Clients speak the Redis Serialization Protocol (RESP) over TCP. The
//! server handles concurrent connections through async/await with Tokio,
//! one task per connection.

pub mod commands;
pub mod connection;
pub mod rdb;
pub mod replication;
pub mod request;
pub mod resp;
pub mod server;
pub mod store;
