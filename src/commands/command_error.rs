use thiserror::Error;

use crate::resp::RespValue;

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("invalid PING command")]
    InvalidPingCommand,
    #[error("invalid ECHO command")]
    InvalidEchoCommand,
    #[error("invalid GET command")]
    InvalidGetCommand,
    #[error("invalid SET command")]
    InvalidSetCommand,
    #[error("invalid SET command argument")]
    InvalidSetCommandArgument,
    #[error("invalid SET command expiration")]
    InvalidSetCommandExpiration,
    #[error("invalid INFO command")]
    InvalidInfoCommand,
    #[error("invalid REPLCONF command")]
    InvalidReplconfCommand,
    #[error("invalid PSYNC command")]
    InvalidPsyncCommand,
    #[error("invalid PSYNC replication ID")]
    InvalidPsyncReplicationId,
    #[error("invalid PSYNC offset")]
    InvalidPsyncOffset,
    #[error("invalid WAIT command")]
    InvalidWaitCommand,
    #[error("invalid WAIT command argument")]
    InvalidWaitCommandArgument,
    #[error("invalid CONFIG GET command")]
    InvalidConfigGetCommand,
    #[error("unknown CONFIG parameter {0}")]
    InvalidConfigGetCommandArgument(String),
    #[error("invalid KEYS command")]
    InvalidKeysCommand,
    #[error("{0}")]
    InvalidGlobPattern(String),
    #[error("invalid TYPE command")]
    InvalidTypeCommand,
    #[error("invalid XADD command")]
    InvalidXAddCommand,
    #[error("{0}")]
    InvalidStreamId(String),
}

impl CommandError {
    /// The RESP simple-error frame this error is reported as.
    pub fn as_string(&self) -> String {
        match self {
            CommandError::InvalidPingCommand => {
                RespValue::Error("ERR Invalid PING command".to_string()).encode()
            }
            CommandError::InvalidEchoCommand => {
                RespValue::Error("ERR Invalid ECHO command".to_string()).encode()
            }
            CommandError::InvalidGetCommand => {
                RespValue::Error("ERR Invalid GET command".to_string()).encode()
            }
            CommandError::InvalidSetCommand => {
                RespValue::Error("ERR Invalid SET command".to_string()).encode()
            }
            CommandError::InvalidSetCommandArgument => {
                RespValue::Error("ERR Invalid SET command argument".to_string()).encode()
            }
            CommandError::InvalidSetCommandExpiration => {
                RespValue::Error("ERR Invalid SET command expiration".to_string()).encode()
            }
            CommandError::InvalidInfoCommand => {
                RespValue::Error("ERR Invalid INFO command".to_string()).encode()
            }
            CommandError::InvalidReplconfCommand => {
                RespValue::Error("ERR Invalid REPLCONF command".to_string()).encode()
            }
            CommandError::InvalidPsyncCommand => {
                RespValue::Error("ERR Invalid PSYNC command".to_string()).encode()
            }
            CommandError::InvalidPsyncReplicationId => {
                RespValue::Error("ERR Invalid PSYNC replication ID".to_string()).encode()
            }
            CommandError::InvalidPsyncOffset => {
                RespValue::Error("ERR Invalid PSYNC offset".to_string()).encode()
            }
            CommandError::InvalidWaitCommand => {
                RespValue::Error("ERR Invalid WAIT command".to_string()).encode()
            }
            CommandError::InvalidWaitCommandArgument => {
                RespValue::Error("ERR Invalid WAIT command argument".to_string()).encode()
            }
            CommandError::InvalidConfigGetCommand => {
                RespValue::Error("ERR Invalid CONFIG GET command".to_string()).encode()
            }
            CommandError::InvalidConfigGetCommandArgument(parameter) => {
                RespValue::Error(format!("ERR Unknown CONFIG parameter {}", parameter)).encode()
            }
            CommandError::InvalidKeysCommand => {
                RespValue::Error("ERR Invalid KEYS command".to_string()).encode()
            }
            CommandError::InvalidGlobPattern(message) => {
                RespValue::Error(format!("ERR {}", message)).encode()
            }
            CommandError::InvalidTypeCommand => {
                RespValue::Error("ERR Invalid TYPE command".to_string()).encode()
            }
            CommandError::InvalidXAddCommand => {
                RespValue::Error("ERR Invalid XADD command".to_string()).encode()
            }
            CommandError::InvalidStreamId(message) => {
                RespValue::Error(format!("ERR {}", message)).encode()
            }
        }
    }
}
