//! Configuration for tablewal
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{Result, WalError};
use crate::wal::{FRAME_PREFIX_SIZE, SEGMENT_HEADER_SIZE};

/// Configuration for one WAL namespace
#[derive(Debug, Clone)]
pub struct WalConfig {
    // -------------------------------------------------------------------------
    // Namespace Configuration
    // -------------------------------------------------------------------------
    /// Prefix prepended to every segment key.
    /// Segment keys look like:
    ///   {key_prefix}wal.log.0
    ///   {key_prefix}wal.log.1
    ///   ...
    pub key_prefix: String,

    // -------------------------------------------------------------------------
    // Framing Configuration
    // -------------------------------------------------------------------------
    /// Max size of one frame payload (in bytes)
    pub block_size: usize,

    /// Max size of one segment object, header included (in bytes)
    pub max_segment_size: usize,

    /// Compress segment bodies with lz4
    pub compression: bool,

    // -------------------------------------------------------------------------
    // Retention / Retry Configuration
    // -------------------------------------------------------------------------
    /// Max number of segments kept in the object store
    pub retention_count: usize,

    /// Max attempts per physical object store call
    pub retry_count: u32,

    // -------------------------------------------------------------------------
    // Writer Configuration
    // -------------------------------------------------------------------------
    /// How long the writer keeps collecting entries before uploading
    pub flush_interval: Duration,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            block_size: 64 * 1024,             // 64 KB
            max_segment_size: 4 * 1024 * 1024, // 4 MB
            compression: false,
            retention_count: 16,
            retry_count: 3,
            flush_interval: Duration::from_millis(10),
        }
    }
}

impl WalConfig {
    /// Create a new config builder
    pub fn builder() -> WalConfigBuilder {
        WalConfigBuilder::default()
    }

    /// Check the options against each other
    ///
    /// Any frame that passes append-time validation must fit into an empty
    /// segment, so `block_size` plus framing overhead is bounded by
    /// `max_segment_size`.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(WalError::Config("block_size must be positive".to_string()));
        }
        if self.block_size > u32::MAX as usize {
            return Err(WalError::Config(format!(
                "block_size {} does not fit a u32 length prefix",
                self.block_size
            )));
        }
        if self.retention_count == 0 {
            return Err(WalError::Config(
                "retention_count must be at least 1".to_string(),
            ));
        }
        if self.retry_count == 0 {
            return Err(WalError::Config("retry_count must be at least 1".to_string()));
        }

        let min_segment = SEGMENT_HEADER_SIZE + FRAME_PREFIX_SIZE + self.block_size;
        if self.max_segment_size < min_segment {
            return Err(WalError::Config(format!(
                "max_segment_size {} cannot hold one full block (need at least {})",
                self.max_segment_size, min_segment
            )));
        }

        Ok(())
    }

    /// Object store key of the segment with the given sequence
    pub fn segment_key(&self, sequence: u64) -> String {
        format!("{}{}{}", self.key_prefix, SEGMENT_KEY_STEM, sequence)
    }

    /// Parse a segment sequence out of an object key
    /// "test/wal.log.42" → Some(42)
    pub fn parse_segment_key(&self, key: &str) -> Option<u64> {
        let rest = key.strip_prefix(self.key_prefix.as_str())?;
        let digits = rest.strip_prefix(SEGMENT_KEY_STEM)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// Fixed part of every segment key between prefix and sequence
const SEGMENT_KEY_STEM: &str = "wal.log.";

/// Builder for WalConfig
#[derive(Default)]
pub struct WalConfigBuilder {
    config: WalConfig,
}

impl WalConfigBuilder {
    /// Set the key prefix (namespace) for segment objects
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// Set the max frame payload size (in bytes)
    pub fn block_size(mut self, size: usize) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the segment rotation threshold (in bytes)
    pub fn max_segment_size(mut self, size: usize) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Enable or disable lz4 compression of segment bodies
    pub fn compression(mut self, enabled: bool) -> Self {
        self.config.compression = enabled;
        self
    }

    /// Set the max number of retained segments
    pub fn retention_count(mut self, count: usize) -> Self {
        self.config.retention_count = count;
        self
    }

    /// Set the max attempts per physical I/O call
    pub fn retry_count(mut self, count: u32) -> Self {
        self.config.retry_count = count;
        self
    }

    /// Set the writer batching window
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    pub fn build(self) -> WalConfig {
        self.config
    }
}
