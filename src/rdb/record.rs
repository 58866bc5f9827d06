//! Snapshot records.
//!
//! After the header, the file is a flat sequence of records whose first
//! byte is an opcode. Value records under the selected database carry no
//! dedicated opcode; any byte that is not one of the markers below is
//! the value-type tag of a plain entry.

use crate::rdb::RdbError;
use crate::rdb::length::{read_length_int, read_string};
use crate::store::NO_EXPIRY;

const AUX_OPCODE: u8 = 0xFA;
const RESIZE_DB_OPCODE: u8 = 0xFB;
const EXPIRY_MS_OPCODE: u8 = 0xFC;
const EXPIRY_SECONDS_OPCODE: u8 = 0xFD;
const SELECT_DB_OPCODE: u8 = 0xFE;
const EOF_OPCODE: u8 = 0xFF;

/// One decoded snapshot record.
#[derive(Debug, PartialEq)]
pub enum Record {
    /// Auxiliary metadata field; read and discarded.
    Aux { key: String, value: String },
    ResizeDb {
        key_count: usize,
        expiry_count: usize,
    },
    SelectDb { db_number: usize },
    /// A restorable key with its value and absolute-ms expiry
    /// ([`NO_EXPIRY`] for none).
    Entry {
        key: String,
        value: String,
        expiry: i64,
    },
    Eof,
}

/// Validates the magic string and the four ASCII version digits;
/// returns the header length.
pub fn check_header(bytes: &[u8]) -> Result<usize, RdbError> {
    let magic = bytes.get(..5).ok_or(RdbError::UnexpectedEof)?;

    if magic != b"REDIS" {
        return Err(RdbError::InvalidMagic);
    }

    let version = bytes.get(5..9).ok_or(RdbError::UnexpectedEof)?;
    let version = str::from_utf8(version).map_err(|_| RdbError::InvalidVersion)?;
    version
        .parse::<u32>()
        .map_err(|_| RdbError::InvalidVersion)?;

    Ok(9)
}

fn get_array<const N: usize>(bytes: &[u8], cursor: usize) -> Result<[u8; N], RdbError> {
    bytes
        .get(cursor..cursor + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(RdbError::UnexpectedEof)
}

/// Reads one record at `cursor`, returning it and the bytes consumed.
pub fn read_record(bytes: &[u8], cursor: usize) -> Result<(Record, usize), RdbError> {
    let opcode = *bytes.get(cursor).ok_or(RdbError::UnexpectedEof)?;
    let mut consumed = 1;

    let record = match opcode {
        AUX_OPCODE => {
            let (key, key_len) = read_string(bytes, cursor + consumed)?;
            consumed += key_len;
            let (value, value_len) = read_string(bytes, cursor + consumed)?;
            consumed += value_len;

            Record::Aux { key, value }
        }
        RESIZE_DB_OPCODE => {
            let (key_count, key_len) = read_length_int(bytes, cursor + consumed)?;
            consumed += key_len;
            let (expiry_count, expiry_len) = read_length_int(bytes, cursor + consumed)?;
            consumed += expiry_len;

            Record::ResizeDb {
                key_count,
                expiry_count,
            }
        }
        EXPIRY_MS_OPCODE => {
            let stamp: [u8; 8] = get_array(bytes, cursor + consumed)?;
            consumed += 8;
            let expiry = u64::from_le_bytes(stamp) as i64;

            // Value-type tag; only strings are restored.
            let _ = bytes.get(cursor + consumed).ok_or(RdbError::UnexpectedEof)?;
            consumed += 1;

            let (key, key_len) = read_string(bytes, cursor + consumed)?;
            consumed += key_len;
            let (value, value_len) = read_string(bytes, cursor + consumed)?;
            consumed += value_len;

            Record::Entry { key, value, expiry }
        }
        EXPIRY_SECONDS_OPCODE => {
            // Four little-endian bytes, carried over as an absolute-ms
            // stamp rather than seconds.
            let stamp: [u8; 4] = get_array(bytes, cursor + consumed)?;
            consumed += 4;
            let expiry = u32::from_le_bytes(stamp) as i64;

            let _ = bytes.get(cursor + consumed).ok_or(RdbError::UnexpectedEof)?;
            consumed += 1;

            let (key, key_len) = read_string(bytes, cursor + consumed)?;
            consumed += key_len;
            let (value, value_len) = read_string(bytes, cursor + consumed)?;
            consumed += value_len;

            Record::Entry { key, value, expiry }
        }
        SELECT_DB_OPCODE => {
            let (db_number, db_len) = read_length_int(bytes, cursor + consumed)?;
            consumed += db_len;

            Record::SelectDb { db_number }
        }
        EOF_OPCODE => {
            let _checksum: [u8; 8] = get_array(bytes, cursor + consumed)?;
            consumed += 8;

            Record::Eof
        }
        _ => {
            // The opcode byte is the value-type tag of a record in the
            // selected database.
            let (key, key_len) = read_string(bytes, cursor + consumed)?;
            consumed += key_len;
            let (value, value_len) = read_string(bytes, cursor + consumed)?;
            consumed += value_len;

            Record::Entry {
                key,
                value,
                expiry: NO_EXPIRY,
            }
        }
    };

    Ok((record, consumed))
}
