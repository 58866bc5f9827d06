//! Read-only RDB snapshot decoding.
//!
//! The on-disk snapshot begins with the magic string and four version
//! digits, followed by a sequence of opcode-keyed records up to the EOF
//! marker. Only what the startup restore needs is decoded: string
//! records and their expiries; auxiliary metadata is read and dropped.
//! Nothing is ever written back.

use thiserror::Error;

mod length;
mod record;
mod restore;

pub use length::{RdbLength, read_length, read_string};
pub use record::{Record, check_header, read_record};
pub use restore::restore;

#[derive(Error, Debug, PartialEq)]
pub enum RdbError {
    #[error("invalid magic string")]
    InvalidMagic,
    #[error("invalid version")]
    InvalidVersion,
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("compressed strings are not supported")]
    UnsupportedEncoding,
    #[error("invalid length encoding")]
    InvalidLengthEncoding,
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("snapshot not found: {0}")]
    FileNotFound(String),
    #[error("I/O error: {0}")]
    Io(String),
}
