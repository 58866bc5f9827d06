use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::rdb::{RdbError, Record, check_header, read_record};
use crate::server::RedisServer;
use crate::store::{Item, NO_EXPIRY, now_millis};

/// Loads the configured snapshot into the item store, returning the
/// number of keys restored.
///
/// Future expiries arm a deletion timer; entries already past due are
/// still inserted and left to lazy expiry on read. A failure here is
/// reported to the caller, which logs it and keeps serving with an empty
/// keyspace.
pub async fn restore(server: &Arc<RedisServer>) -> Result<usize, RdbError> {
    let path = Path::new(&server.rdb_directory).join(&server.rdb_filename);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RdbError::FileNotFound(path.display().to_string()),
        _ => RdbError::Io(e.to_string()),
    })?;

    let mut cursor = check_header(&bytes)?;
    let mut restored = 0;

    while cursor < bytes.len() {
        let (record, consumed) = read_record(&bytes, cursor)?;
        cursor += consumed;

        match record {
            Record::Entry { key, value, expiry } => {
                let generation = server.next_generation();

                server
                    .items
                    .store(key.clone(), Item::expiring_at(value, expiry, generation))
                    .await;

                if expiry != NO_EXPIRY && expiry > now_millis() {
                    server.schedule_expiry(key, expiry, generation);
                }

                restored += 1;
            }
            Record::Aux { key, value } => {
                debug!("snapshot aux field {}={}", key, value);
            }
            Record::SelectDb { db_number } => {
                debug!("selecting database {}", db_number);
            }
            Record::ResizeDb {
                key_count,
                expiry_count,
            } => {
                debug!(
                    "database sized for {} keys, {} expiries",
                    key_count, expiry_count
                );
            }
            Record::Eof => break,
        }
    }

    info!("restored {} keys from {}", restored, path.display());

    Ok(restored)
}
