//! Local filesystem object store
//!
//! Maps keys onto files below a root directory:
//!   key "test/wal.log.0"  →  {root}/test/wal.log.0
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader never observes a half-written object.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

use super::ObjectStore;

/// Suffix of in-flight writes; such files are never listed
const TMP_SUFFIX: &str = ".tmp";

/// Object store rooted at a local directory
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open or create a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Get the root directory path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path below the root, rejecting escapes
    fn object_path(&self, key: &str) -> io::Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid object key: {:?}", key),
            ));
        }
        Ok(self.root.join(relative))
    }

    /// Recursively collect keys of regular files below `dir`
    fn collect_keys(&self, dir: &Path, prefix: &str, keys: &mut Vec<String>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                self.collect_keys(&path, prefix, keys)?;
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let Some(key) = self.key_for(&path) else {
                continue;
            };
            if key.ends_with(TMP_SUFFIX) {
                continue;
            }
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(())
    }

    /// "{root}/test/wal.log.0" → Some("test/wal.log.0")
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, key: &str, payload: &[u8]) -> io::Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut tmp_name = path.clone().into_os_string();
        tmp_name.push(TMP_SUFFIX);
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp_path)?;
        file.write_all(payload)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &path)
    }

    fn get(&self, key: &str) -> io::Result<Bytes> {
        let path = self.object_path(key)?;
        Ok(Bytes::from(fs::read(path)?))
    }

    fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let mut keys = Vec::new();
        if self.root.is_dir() {
            self.collect_keys(&self.root, prefix, &mut keys)?;
        }
        keys.sort();
        Ok(keys)
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
