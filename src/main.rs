use std::process;
use std::sync::Arc;

use tracing::{error, warn};

use resp_node::rdb;
use resp_node::server::RedisServer;

/// Entry point: configure the node from the command line, restore the
/// RDB snapshot when one is configured, then serve until killed. Exits
/// with status 1 when the arguments are invalid or the listener cannot
/// be bound; a failed restore only costs the snapshot.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let server = match RedisServer::new(std::env::args()) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("failed to configure server: {}", e);
            process::exit(1);
        }
    };

    if server.has_rdb_file() {
        if let Err(e) = rdb::restore(&server).await {
            warn!("failed to restore snapshot: {}", e);
        }
    }

    if let Err(e) = server.run().await {
        error!("failed to bind TCP listener: {}", e);
        process::exit(1);
    }
}
