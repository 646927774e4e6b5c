//! Write-Ahead Log (WAL) Module
//!
//! Durable, ordered log of table mutations kept in an object store.
//!
//! ## Responsibilities
//! - Validate entries before they are queued
//! - Split large entries into frames no bigger than the block size
//! - Pack frames into size-bounded, sequence-numbered segments
//! - Retry every object store call a bounded number of times
//! - Replay all retained segments in write order
//!
//! ## Layout
//! ```text
//! {prefix}wal.log.0   ┌────────────────┬─────────────────────────────────┐
//! {prefix}wal.log.1   │ Header (8)     │ Frame | Frame | Frame | ...     │
//! {prefix}wal.log.2   └────────────────┴─────────────────────────────────┘
//!                                       Frame = Len (4, BE) + Payload
//! ```

mod codec;
mod entry;
mod manager;
mod reader;
mod retry;
mod segment;
mod writer;

pub use codec::{
    decode_frame, encode_entry, encode_fragment, encoded_len, EntrySplitter, FragmentPlan,
    FrameDecoder, SizedEntry,
};
pub use entry::{Column, ColumnSchema, ColumnType, EntryType, Record, TableSchema, WalEntry};
pub use manager::WalManager;
pub use reader::{SegmentInfo, SegmentScan, WalIterator, WalReader};
pub use segment::{seal, unseal, SegmentHeader};

/// Length prefix in front of every frame payload
pub const FRAME_PREFIX_SIZE: usize = 4;

/// Header in front of every segment body
pub const SEGMENT_HEADER_SIZE: usize = 8;
