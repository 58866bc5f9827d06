//! End-to-end tests over real sockets.
//!
//! Each test boots one or more nodes on a dedicated localhost port and
//! drives them with raw RESP the way a redis-cli or a peer node would.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

use resp_node::rdb;
use resp_node::resp::RespValue;
use resp_node::server::RedisServer;
use resp_node::store::now_millis;

async fn start_server(arguments: &[&str]) -> Arc<RedisServer> {
    let mut all = vec!["resp-node".to_string()];
    all.extend(arguments.iter().map(|a| a.to_string()));

    let server = Arc::new(RedisServer::new(all).unwrap());
    let server_clone = Arc::clone(&server);

    tokio::spawn(async move {
        server_clone.run().await.unwrap();
    });

    sleep(Duration::from_millis(200)).await;

    server
}

fn encode_command(parts: &[&str]) -> String {
    RespValue::Array(
        parts
            .iter()
            .map(|part| RespValue::BulkString(part.to_string()))
            .collect(),
    )
    .encode()
}

async fn read_reply(stream: &mut TcpStream) -> String {
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf).await.unwrap();
    assert!(n > 0, "connection closed while waiting for a reply");

    String::from_utf8_lossy(&buf[..n]).to_string()
}

async fn send_command(stream: &mut TcpStream, parts: &[&str]) -> String {
    stream
        .write_all(encode_command(parts).as_bytes())
        .await
        .unwrap();

    read_reply(stream).await
}

/// Reads until `buffer` holds at least `wanted` bytes or the deadline
/// passes.
async fn read_at_least(stream: &mut TcpStream, buffer: &mut Vec<u8>, wanted: usize) {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut chunk = [0u8; 1024];

    while buffer.len() < wanted {
        assert!(
            Instant::now() < deadline,
            "timed out with {} of {} bytes: {:?}",
            buffer.len(),
            wanted,
            String::from_utf8_lossy(buffer)
        );

        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-read");
        buffer.extend_from_slice(&chunk[..n]);
    }
}

#[tokio::test]
async fn test_set_and_get() {
    start_server(&["-port", "7300"]).await;

    let mut client = TcpStream::connect("127.0.0.1:7300").await.unwrap();

    assert_eq!(send_command(&mut client, &["PING"]).await, "+PONG\r\n");
    assert_eq!(
        send_command(&mut client, &["ECHO", "hey"]).await,
        "$3\r\nhey\r\n"
    );
    assert_eq!(
        send_command(&mut client, &["SET", "foo", "bar"]).await,
        "+OK\r\n"
    );
    assert_eq!(
        send_command(&mut client, &["GET", "foo"]).await,
        "$3\r\nbar\r\n"
    );
    assert_eq!(send_command(&mut client, &["GET", "nope"]).await, "$-1\r\n");
    assert_eq!(
        send_command(&mut client, &["FLUSHALL"]).await,
        "+Unknown command\r\n"
    );
}

#[tokio::test]
async fn test_set_with_expiry() {
    start_server(&["-port", "7301"]).await;

    let mut client = TcpStream::connect("127.0.0.1:7301").await.unwrap();

    assert_eq!(
        send_command(&mut client, &["SET", "k", "v", "px", "50"]).await,
        "+OK\r\n"
    );
    assert_eq!(send_command(&mut client, &["GET", "k"]).await, "$1\r\nv\r\n");

    sleep(Duration::from_millis(100)).await;

    assert_eq!(send_command(&mut client, &["GET", "k"]).await, "$-1\r\n");
}

#[tokio::test]
async fn test_expiry_overwrite_keeps_newer_value() {
    start_server(&["-port", "7302"]).await;

    let mut client = TcpStream::connect("127.0.0.1:7302").await.unwrap();

    // The timer armed for the first write must not delete the second.
    send_command(&mut client, &["SET", "k", "v1", "px", "50"]).await;
    send_command(&mut client, &["SET", "k", "v2", "px", "10000"]).await;

    sleep(Duration::from_millis(120)).await;

    assert_eq!(
        send_command(&mut client, &["GET", "k"]).await,
        "$2\r\nv2\r\n"
    );
}

#[tokio::test]
async fn test_xadd_sequencing() {
    start_server(&["-port", "7303"]).await;

    let mut client = TcpStream::connect("127.0.0.1:7303").await.unwrap();

    assert_eq!(
        send_command(&mut client, &["XADD", "s", "5-*", "a", "1"]).await,
        "$3\r\n5-1\r\n"
    );
    assert_eq!(
        send_command(&mut client, &["XADD", "s", "5-*", "b", "2"]).await,
        "$3\r\n5-2\r\n"
    );
    assert_eq!(
        send_command(&mut client, &["XADD", "s", "4-0", "c", "3"]).await,
        "-ERR The ID specified in XADD is equal or smaller than the target stream top item\r\n"
    );
    assert_eq!(
        send_command(&mut client, &["XADD", "s", "0-0", "f", "v"]).await,
        "-ERR The ID specified in XADD must be greater than 0-0\r\n"
    );

    assert_eq!(send_command(&mut client, &["TYPE", "s"]).await, "+stream\r\n");
    assert_eq!(
        send_command(&mut client, &["TYPE", "missing"]).await,
        "+none\r\n"
    );

    // Full auto-generation stays monotonic within a single millisecond.
    let first = send_command(&mut client, &["XADD", "auto", "*", "f", "v"]).await;
    let second = send_command(&mut client, &["XADD", "auto", "*", "f", "v"]).await;
    assert!(first.starts_with('$'));
    assert!(second.starts_with('$'));
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_info_replication() {
    let server = start_server(&["-port", "7304"]).await;

    let mut client = TcpStream::connect("127.0.0.1:7304").await.unwrap();

    let reply = send_command(&mut client, &["INFO", "replication"]).await;
    assert!(reply.contains("role:master"));
    assert!(reply.contains(&format!("master_replid:{}", server.repl_id)));
    assert!(reply.contains("master_repl_offset:0"));
    assert_eq!(server.repl_id.len(), 40);

    assert_eq!(
        send_command(&mut client, &["INFO"]).await,
        "$11\r\nrole:master\r\n"
    );
    assert_eq!(
        send_command(&mut client, &["INFO", "keyspace"]).await,
        "$11\r\nrole:master\r\n"
    );
}

#[tokio::test]
async fn test_wait_without_replicas() {
    start_server(&["-port", "7305"]).await;

    let mut client = TcpStream::connect("127.0.0.1:7305").await.unwrap();

    let started = Instant::now();
    assert_eq!(send_command(&mut client, &["WAIT", "0", "100"]).await, ":0\r\n");
    assert!(started.elapsed() < Duration::from_millis(80), "WAIT 0 must not block");

    let started = Instant::now();
    assert_eq!(send_command(&mut client, &["WAIT", "3", "50"]).await, ":0\r\n");
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn test_getack_reports_zero_before_any_traffic() {
    start_server(&["-port", "7306"]).await;

    let mut client = TcpStream::connect("127.0.0.1:7306").await.unwrap();

    assert_eq!(
        send_command(&mut client, &["REPLCONF", "GETACK", "*"]).await,
        "*3\r\n$8\r\nREPLCONF\r\n$3\r\nACK\r\n$1\r\n0\r\n"
    );
    assert_eq!(
        send_command(&mut client, &["REPLCONF", "listening-port", "7307"]).await,
        "+OK\r\n"
    );
}

#[tokio::test]
async fn test_replica_handshake_wire_format() {
    start_server(&["-port", "7310"]).await;

    // Script the replica side of the handshake by hand.
    let mut replica = TcpStream::connect("127.0.0.1:7310").await.unwrap();

    assert_eq!(send_command(&mut replica, &["PING"]).await, "+PONG\r\n");
    assert_eq!(
        send_command(&mut replica, &["REPLCONF", "listening-port", "7311"]).await,
        "+OK\r\n"
    );
    assert_eq!(
        send_command(&mut replica, &["REPLCONF", "capa", "psync2"]).await,
        "+OK\r\n"
    );

    replica
        .write_all(encode_command(&["PSYNC", "?", "-1"]).as_bytes())
        .await
        .unwrap();

    let mut buffer = Vec::new();
    // +FULLRESYNC <40 hex> 0\r\n is 56 bytes, then $90\r\n and 90 bytes.
    read_at_least(&mut replica, &mut buffer, 56 + 5 + 90).await;

    let text = String::from_utf8_lossy(&buffer[..56]).to_string();
    assert!(text.starts_with("+FULLRESYNC "), "got {:?}", text);
    assert!(text.ends_with(" 0\r\n"), "got {:?}", text);
    let repl_id = &text[12..52];
    assert!(repl_id.chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(&buffer[56..61], b"$90\r\n");
    assert_eq!(&buffer[61..66], b"REDIS");
    assert_eq!(buffer.len(), 151);

    // The connection is now registered as a replica: a write from a
    // client must be propagated verbatim.
    let mut client = TcpStream::connect("127.0.0.1:7310").await.unwrap();
    assert_eq!(
        send_command(&mut client, &["SET", "foo", "bar"]).await,
        "+OK\r\n"
    );

    let mut propagated = Vec::new();
    read_at_least(&mut replica, &mut propagated, 31).await;
    assert_eq!(
        String::from_utf8_lossy(&propagated),
        "*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n"
    );
}

#[tokio::test]
async fn test_master_replica_replication() {
    let master = start_server(&["-port", "7320"]).await;
    let replica = start_server(&["-port", "7321", "-replicaof", "127.0.0.1", "7320"]).await;

    // Give the replica time to finish the handshake.
    sleep(Duration::from_millis(500)).await;
    assert!(replica.link.is_handshake_done().await);
    assert_eq!(master.replicas.len().await, 1);

    let mut master_client = TcpStream::connect("127.0.0.1:7320").await.unwrap();
    assert_eq!(
        send_command(&mut master_client, &["SET", "fruit", "mango"]).await,
        "+OK\r\n"
    );

    sleep(Duration::from_millis(300)).await;

    let mut replica_client = TcpStream::connect("127.0.0.1:7321").await.unwrap();
    assert_eq!(
        send_command(&mut replica_client, &["GET", "fruit"]).await,
        "$5\r\nmango\r\n"
    );

    // The replica acknowledges GETACK, so WAIT resolves with one replica.
    assert_eq!(
        send_command(&mut master_client, &["WAIT", "1", "1000"]).await,
        ":1\r\n"
    );

    let reply = send_command(&mut replica_client, &["INFO", "replication"]).await;
    assert!(reply.contains("role:slave"));
}

#[tokio::test]
async fn test_rdb_restore_end_to_end() {
    let dir = std::env::temp_dir();
    let filename = "resp-node-e2e-restore.rdb";

    // Magic + version, one entry with a far-future ms expiry, EOF.
    let mut snapshot = b"REDIS0011".to_vec();
    snapshot.push(0xFC);
    let future = (now_millis() + 120_000) as u64;
    snapshot.extend_from_slice(&future.to_le_bytes());
    snapshot.push(0x00);
    snapshot.extend_from_slice(b"\x05hello\x05world");
    snapshot.push(0xFF);
    snapshot.extend_from_slice(&[0u8; 8]);

    tokio::fs::write(dir.join(filename), &snapshot).await.unwrap();

    let dir_flag = dir.display().to_string();
    let server = start_server(&["-port", "7330", "-dir", &dir_flag, "-dbfilename", filename]).await;
    rdb::restore(&server).await.unwrap();

    let mut client = TcpStream::connect("127.0.0.1:7330").await.unwrap();

    assert_eq!(
        send_command(&mut client, &["GET", "hello"]).await,
        "$5\r\nworld\r\n"
    );
    assert_eq!(
        send_command(&mut client, &["KEYS", "*"]).await,
        "*1\r\n$5\r\nhello\r\n"
    );

    let reply = send_command(&mut client, &["CONFIG", "GET", "dbfilename"]).await;
    assert_eq!(
        reply,
        format!("*2\r\n$10\r\ndbfilename\r\n${}\r\n{}\r\n", filename.len(), filename)
    );
}
