//! # Resource Locking
//!
//! Per-key exclusion for work that shares a logical resource (a content unit
//! id, a series id) while unrelated keys proceed concurrently.

mod resource_lock;

pub use resource_lock::ResourceLock;
