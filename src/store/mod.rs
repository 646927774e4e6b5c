//! Object Store Module
//!
//! The capability surface the WAL needs from blob storage.
//!
//! ## Responsibilities
//! - `put`: store a whole object under a key (overwrite allowed)
//! - `get`: fetch a whole object
//! - `list`: enumerate keys under a prefix, in no particular order
//! - `delete`: remove an object
//!
//! Every call may fail transiently. The WAL retries; implementations should
//! not. Nothing is assumed to be atomic across keys.

mod fs;
mod memory;

use std::io;

use bytes::Bytes;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

/// Key-addressed blob storage used by the WAL
pub trait ObjectStore: Send + Sync {
    /// Store `payload` under `key`, replacing any previous object
    fn put(&self, key: &str, payload: &[u8]) -> io::Result<()>;

    /// Fetch the object stored under `key`
    fn get(&self, key: &str) -> io::Result<Bytes>;

    /// List every key starting with `prefix`
    fn list(&self, prefix: &str) -> io::Result<Vec<String>>;

    /// Remove the object stored under `key`
    fn delete(&self, key: &str) -> io::Result<()>;
}
