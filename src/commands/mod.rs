mod command_error;
mod config_get;
mod echo;
mod executor;
mod get;
mod info;
mod keys;
mod ping;
mod psync;
mod replconf;
mod set;
mod type_command;
mod wait;
mod xadd;

pub use command_error::CommandError;
pub use executor::{CommandResult, execute_command};
