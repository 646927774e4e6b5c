//! # tablewal
//!
//! Write-ahead log for a table-oriented datastore, kept in an object store:
//! - Append-time validation of schema and record sizes
//! - Entries split into bounded frames, frames packed into segments
//! - Segment rotation and retention
//! - Bounded retries on every object store call
//! - Recovery scan that replays frames in write order
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Producers (any thread)                      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ append (validate, enqueue)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      WalManager                              │
//! │            (crossbeam channel, FIFO order)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Writer    │          │  read_all   │
//!   │  (thread)   │          │  (caller)   │
//!   └──────┬──────┘          └──────┬──────┘
//!          │ frames → segments      │ segments → frames
//!          ▼                         ▼
//!   ┌─────────────────────────────────────┐
//!   │            ObjectStore              │
//!   │        put / get / list / delete    │
//!   └─────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod buffer;
pub mod store;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use buffer::BufferPool;
pub use config::WalConfig;
pub use error::{Result, WalError};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore};
pub use wal::{WalEntry, WalManager, WalReader};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tablewal
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
