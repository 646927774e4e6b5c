//! Frame codec
//!
//! Turns one `WalEntry` into one or more length-prefixed frames and back.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────────────────────────────────────────┐
//! │ Len (4)  │ Payload (bincode WalEntry fragment)          │
//! │ u32, BE  │ type | table | schema? | records[from..to]   │
//! └──────────┴──────────────────────────────────────────────┘
//! ```
//!
//! ## Splitting
//! bincode sizes are additive: a fragment's payload is a fixed overhead
//! (type, table name, optional schema, record count) plus the sum of its
//! record sizes. Sizes are measured once at append time, so packing never
//! has to re-serialize. Only the first fragment of an entry carries the
//! schema.

use std::ops::Range;

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use crate::buffer::BufferPool;
use crate::error::{Result, WalError};

use super::entry::{EntryType, Record, TableSchema, WalEntry};
use super::FRAME_PREFIX_SIZE;

/// Borrowed view serialized in place of a `WalEntry`.
///
/// Field order and types must stay wire-compatible with `WalEntry`.
#[derive(Serialize)]
struct FrameRef<'a> {
    entry_type: EntryType,
    table_name: &'a str,
    table_schema: Option<&'a TableSchema>,
    records: &'a [Record],
}

fn serialized_len<T: Serialize + ?Sized>(value: &T) -> Result<usize> {
    Ok(bincode::serialized_size(value)? as usize)
}

// =============================================================================
// Validation
// =============================================================================

/// An entry that passed append-time validation, with its measured sizes
#[derive(Debug)]
pub struct SizedEntry {
    entry: WalEntry,
    /// Payload of a fragment with schema and no records
    head_size: usize,
    /// Payload of a fragment without schema and no records
    tail_size: usize,
    record_sizes: Vec<usize>,
}

impl SizedEntry {
    /// Measure an entry and check it against `block_size`
    ///
    /// Fails with `WalError::Validation` when the frame header (table name
    /// and schema) or any single record could never be placed in a frame of
    /// `block_size` bytes.
    pub fn new(entry: WalEntry, block_size: usize) -> Result<Self> {
        let head_size = serialized_len(&FrameRef {
            entry_type: entry.entry_type,
            table_name: &entry.table_name,
            table_schema: entry.table_schema.as_ref(),
            records: &[],
        })?;
        let tail_size = serialized_len(&FrameRef {
            entry_type: entry.entry_type,
            table_name: &entry.table_name,
            table_schema: None,
            records: &[],
        })?;

        if head_size > block_size {
            let part = if entry.table_schema.is_some() {
                "header with schema"
            } else {
                "header"
            };
            return Err(WalError::Validation(format!(
                "frame {} of table {} needs {} bytes, block size is {}",
                part, entry.table_name, head_size, block_size
            )));
        }

        let mut record_sizes = Vec::with_capacity(entry.records.len());
        for (i, record) in entry.records.iter().enumerate() {
            let size = serialized_len(record)?;
            if tail_size + size > block_size {
                return Err(WalError::Validation(format!(
                    "record {} of table {} needs {} bytes, block size is {}",
                    i,
                    entry.table_name,
                    tail_size + size,
                    block_size
                )));
            }
            record_sizes.push(size);
        }

        Ok(Self {
            entry,
            head_size,
            tail_size,
            record_sizes,
        })
    }

    pub fn entry(&self) -> &WalEntry {
        &self.entry
    }

    pub fn into_entry(self) -> WalEntry {
        self.entry
    }

    /// Payload size if the entry were written as a single frame
    pub fn unsplit_len(&self) -> usize {
        self.head_size + self.record_sizes.iter().sum::<usize>()
    }
}

// =============================================================================
// Splitting
// =============================================================================

/// Records and schema placement of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentPlan {
    pub records: Range<usize>,
    pub with_schema: bool,
    pub payload_len: usize,
}

/// Cursor over an entry that hands out fragments greedily
pub struct EntrySplitter<'a> {
    sized: &'a SizedEntry,
    cursor: usize,
    first: bool,
}

impl<'a> EntrySplitter<'a> {
    pub fn new(sized: &'a SizedEntry) -> Self {
        Self {
            sized,
            cursor: 0,
            first: true,
        }
    }

    /// True once every record (and the schema) has been placed
    pub fn is_done(&self) -> bool {
        !self.first && self.cursor >= self.sized.record_sizes.len()
    }

    /// Plan the next frame for at most `capacity` payload bytes
    ///
    /// Returns `None` when nothing useful fits; the caller should rotate to
    /// a fresh segment and ask again. `allow_empty` lets the first fragment
    /// go out with its schema alone when not even one record fits next to it,
    /// which is only sensible at the start of a segment.
    pub fn next_fragment(&mut self, capacity: usize, allow_empty: bool) -> Option<FragmentPlan> {
        if self.is_done() {
            return None;
        }

        let overhead = if self.first {
            self.sized.head_size
        } else {
            self.sized.tail_size
        };
        if overhead > capacity {
            return None;
        }

        let sizes = &self.sized.record_sizes;
        let start = self.cursor;
        let mut end = start;
        let mut payload_len = overhead;
        while end < sizes.len() && payload_len + sizes[end] <= capacity {
            payload_len += sizes[end];
            end += 1;
        }

        let nothing_placed = end == start && start < sizes.len();
        if nothing_placed && !(self.first && allow_empty) {
            return None;
        }

        let plan = FragmentPlan {
            records: start..end,
            with_schema: self.first,
            payload_len,
        };
        self.cursor = end;
        self.first = false;
        Some(plan)
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode one planned fragment, length prefix included, into a pooled buffer
pub fn encode_fragment(sized: &SizedEntry, plan: &FragmentPlan, pool: &BufferPool) -> Result<BytesMut> {
    let entry = sized.entry();
    let frame = FrameRef {
        entry_type: entry.entry_type,
        table_name: &entry.table_name,
        table_schema: if plan.with_schema {
            entry.table_schema.as_ref()
        } else {
            None
        },
        records: &entry.records[plan.records.clone()],
    };

    let mut buf = pool.allocate(FRAME_PREFIX_SIZE + plan.payload_len);
    buf.put_u32(plan.payload_len as u32);
    bincode::serialize_into((&mut buf).writer(), &frame)?;

    let written = buf.len() - FRAME_PREFIX_SIZE;
    if written != plan.payload_len {
        pool.release(buf);
        return Err(WalError::Serialization(format!(
            "frame payload is {} bytes, planned {}",
            written, plan.payload_len
        )));
    }
    Ok(buf)
}

/// Encode a whole entry as a single frame, ignoring block limits
pub fn encode_entry(entry: &WalEntry) -> Result<Vec<u8>> {
    let payload = bincode::serialize(entry)?;
    let mut frame = Vec::with_capacity(FRAME_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Payload length of `entry` written as a single frame
pub fn encoded_len(entry: &WalEntry) -> Result<usize> {
    serialized_len(entry)
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode the frame starting at `*pos`, advancing `*pos` past it
///
/// Returns `Ok(None)` at the exact end of `body`.
pub fn decode_frame(body: &[u8], pos: &mut usize) -> Result<Option<WalEntry>> {
    if *pos == body.len() {
        return Ok(None);
    }
    if body.len() - *pos < FRAME_PREFIX_SIZE {
        return Err(WalError::Corruption(format!(
            "truncated frame prefix at offset {}",
            *pos
        )));
    }

    let prefix = [body[*pos], body[*pos + 1], body[*pos + 2], body[*pos + 3]];
    let len = u32::from_be_bytes(prefix) as usize;
    let start = *pos + FRAME_PREFIX_SIZE;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= body.len())
        .ok_or_else(|| {
            WalError::Corruption(format!(
                "frame at offset {} claims {} bytes, only {} left",
                *pos,
                len,
                body.len() - start
            ))
        })?;

    let entry: WalEntry = bincode::deserialize(&body[start..end]).map_err(|e| {
        WalError::Corruption(format!("undecodable frame at offset {}: {}", *pos, e))
    })?;
    *pos = end;
    Ok(Some(entry))
}

/// Iterator over every frame of a segment body
pub struct FrameDecoder<'a> {
    body: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> FrameDecoder<'a> {
    pub fn new(body: &'a [u8]) -> Self {
        Self {
            body,
            pos: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for FrameDecoder<'a> {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match decode_frame(self.body, &mut self.pos) {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
