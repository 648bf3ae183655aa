//! CLI module for arcvault
//!
//! Operates on the local archive described by a configuration file:
//! - init: Create directory structure
//! - claim: Claim the next version of a content unit
//! - put / copy / get / contains / delete: Element store operations
//! - usage: Disk usage
//! - transitions: List stored ACL transitions

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
