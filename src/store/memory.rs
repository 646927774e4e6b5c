//! In-memory object store
//!
//! BTreeMap behind an RwLock. Used by tests, benchmarks and embedders that
//! only need a scratch namespace.

use std::collections::BTreeMap;
use std::io;

use bytes::Bytes;
use parking_lot::RwLock;

use super::ObjectStore;

/// Object store that keeps every object in process memory
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, payload: &[u8]) -> io::Result<()> {
        self.objects
            .write()
            .insert(key.to_string(), Bytes::copy_from_slice(payload));
        Ok(())
    }

    fn get(&self, key: &str) -> io::Result<Bytes> {
        self.objects.read().get(key).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no object at {}", key))
        })
    }

    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let objects = self.objects.read();
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        self.objects.write().remove(key);
        Ok(())
    }
}
