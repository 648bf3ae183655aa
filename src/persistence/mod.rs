//! # Persistence
//!
//! Durable JSON documents backing the claim, transition and managed ACL
//! stores, and the cross-process lock guarding them.

pub mod errors;
mod file_lock;
mod json_file;

pub use errors::{PersistenceError, PersistenceResult};
pub use file_lock::FileLock;
pub use json_file::JsonFile;
