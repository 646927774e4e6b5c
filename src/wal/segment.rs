//! WAL Segment object format
//!
//! A segment is stored as one object. The writer keeps the raw frames in
//! memory and seals them into this layout on every upload; the reader
//! unseals it back into a frame body.
//!
//! ```text
//! ┌───────────┬────────────┬──────────┬──────────────┬─────────────────────┐
//! │ Magic (2) │ Version(1) │ Flags(1) │ Body CRC (4) │ Body                │
//! │   "TW"    │     1      │ bit0=lz4 │ crc32, LE    │ frames (raw or lz4) │
//! └───────────┴────────────┴──────────┴──────────────┴─────────────────────┘
//! ```
//!
//! The CRC covers the body as stored. Size limits apply to the header plus
//! the raw (uncompressed) body.

use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::BufferPool;
use crate::error::{Result, WalError};

use super::SEGMENT_HEADER_SIZE;

/// Magic bytes at the start of each segment object
const SEGMENT_MAGIC: &[u8; 2] = b"TW";

/// Segment format version
const SEGMENT_VERSION: u8 = 1;

/// Flag bit: body is lz4 compressed with its raw size prepended
const FLAG_LZ4: u8 = 0x01;

/// Parsed segment header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub compressed: bool,
    pub body_crc: u32,
}

impl SegmentHeader {
    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut bytes = [0u8; SEGMENT_HEADER_SIZE];
        bytes[0..2].copy_from_slice(SEGMENT_MAGIC);
        bytes[2] = SEGMENT_VERSION;
        bytes[3] = if self.compressed { FLAG_LZ4 } else { 0 };
        bytes[4..8].copy_from_slice(&self.body_crc.to_le_bytes());
        bytes
    }

    /// Parse header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SEGMENT_HEADER_SIZE {
            return Err(WalError::Corruption(format!(
                "segment header too short: {} bytes",
                bytes.len()
            )));
        }

        if &bytes[0..2] != SEGMENT_MAGIC {
            return Err(WalError::Corruption(format!(
                "invalid segment magic: {:?}",
                &bytes[0..2]
            )));
        }

        if bytes[2] != SEGMENT_VERSION {
            return Err(WalError::Corruption(format!(
                "unsupported segment version: {}",
                bytes[2]
            )));
        }

        let flags = bytes[3];
        if flags & !FLAG_LZ4 != 0 {
            return Err(WalError::Corruption(format!(
                "unknown segment flags: 0x{:02x}",
                flags
            )));
        }

        Ok(Self {
            compressed: flags & FLAG_LZ4 != 0,
            body_crc: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }
}

/// Build the stored object for a raw frame body
pub fn seal(body: &[u8], compression: bool, pool: &BufferPool) -> BytesMut {
    let compressed;
    let stored: &[u8] = if compression {
        compressed = lz4_flex::compress_prepend_size(body);
        &compressed
    } else {
        body
    };

    let header = SegmentHeader {
        compressed: compression,
        body_crc: crc32fast::hash(stored),
    };

    let mut object = pool.allocate(SEGMENT_HEADER_SIZE + stored.len());
    object.put_slice(&header.to_bytes());
    object.put_slice(stored);
    object
}

/// Verify a stored object and return its raw frame body
///
/// Uncompressed bodies are returned as a zero-copy slice of `object`.
pub fn unseal(object: Bytes) -> Result<Bytes> {
    let header = SegmentHeader::from_bytes(&object)?;
    let stored = object.slice(SEGMENT_HEADER_SIZE..);

    let crc = crc32fast::hash(&stored);
    if crc != header.body_crc {
        return Err(WalError::Corruption(format!(
            "segment checksum mismatch: stored {:08x}, computed {:08x}",
            header.body_crc, crc
        )));
    }

    if !header.compressed {
        return Ok(stored);
    }

    lz4_flex::decompress_size_prepended(&stored)
        .map(Bytes::from)
        .map_err(|e| WalError::Corruption(format!("segment decompression failed: {}", e)))
}
