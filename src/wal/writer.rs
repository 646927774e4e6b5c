//! WAL Writer
//!
//! The background writer thread and the segment state it owns.
//!
//! ## Responsibilities
//! - Pack validated entries into frames and frames into the open segment
//! - Rotate to the next sequence before a frame would overflow the segment
//! - Upload the open segment at the end of every batch (objects are
//!   rewritten whole, stores do not append)
//! - Prune segments beyond the retention count after each rotation
//!
//! All of this state lives on the writer thread. Producers only ever touch
//! the command channel.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};

use crate::buffer::BufferPool;
use crate::config::WalConfig;
use crate::error::{Result, WalError};
use crate::store::ObjectStore;

use super::codec::{encode_fragment, EntrySplitter, SizedEntry};
use super::retry::with_retry;
use super::segment;
use super::{FRAME_PREFIX_SIZE, SEGMENT_HEADER_SIZE};

/// Messages from the manager to the writer thread
pub(crate) enum WriterCommand {
    /// Write a validated entry
    Append(SizedEntry),

    /// Upload the open segment, then report the first unreported failure
    Flush(Sender<Result<()>>),

    /// Drain, upload and exit
    Shutdown,
}

/// State of the open segment and the namespace it belongs to
pub(crate) struct SegmentWriter {
    store: Arc<dyn ObjectStore>,
    pool: Arc<BufferPool>,
    config: WalConfig,

    /// Sequence of the open segment
    sequence: u64,

    /// Raw frames of the open segment
    body: BytesMut,

    /// Number of frames in `body`
    frames: usize,

    /// `body` changed since its last successful upload
    dirty: bool,

    /// First persistence failure not yet reported to a caller
    failure: Option<WalError>,
}

impl SegmentWriter {
    /// Find where the namespace left off and open the next segment
    ///
    /// The next sequence is one past the highest existing one, or 0 for a
    /// fresh namespace. Existing segments are never reopened.
    pub(crate) fn open(store: Arc<dyn ObjectStore>, pool: Arc<BufferPool>, config: WalConfig) -> Result<Self> {
        let keys = with_retry("list", &config.key_prefix, config.retry_count, || {
            store.list(&config.key_prefix)
        })?;

        let sequence = keys
            .iter()
            .filter_map(|key| config.parse_segment_key(key))
            .max()
            .map(|last| last + 1)
            .unwrap_or(0);

        let body = pool.allocate(initial_body_capacity(&config));

        tracing::info!(
            prefix = %config.key_prefix,
            next_sequence = sequence,
            "WAL segment writer opened"
        );

        Ok(Self {
            store,
            pool,
            config,
            sequence,
            body,
            frames: 0,
            dirty: false,
            failure: None,
        })
    }

    /// Sequence of the open segment
    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Payload bytes the next frame may use in the open segment
    fn frame_capacity(&self) -> usize {
        let used = SEGMENT_HEADER_SIZE + self.body.len() + FRAME_PREFIX_SIZE;
        self.config
            .max_segment_size
            .saturating_sub(used)
            .min(self.config.block_size)
    }

    /// Split an entry into frames and append them, rotating as needed
    pub(crate) fn write_entry(&mut self, sized: &SizedEntry) -> Result<()> {
        let mut splitter = EntrySplitter::new(sized);

        while !splitter.is_done() {
            let capacity = self.frame_capacity();
            match splitter.next_fragment(capacity, self.frames == 0) {
                Some(plan) => {
                    let frame = encode_fragment(sized, &plan, &self.pool)?;
                    self.write_frame(frame);
                }
                None if self.frames > 0 => self.rotate(),
                None => {
                    // Only reachable if the config let a block exceed an empty segment
                    return Err(WalError::Validation(format!(
                        "entry for table {} does not fit an empty segment",
                        sized.entry().table_name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Append one encoded frame to the open segment
    fn write_frame(&mut self, frame: BytesMut) {
        let would_be = SEGMENT_HEADER_SIZE + self.body.len() + frame.len();
        if self.frames > 0 && would_be > self.config.max_segment_size {
            self.rotate();
        }

        self.body.extend_from_slice(&frame);
        self.pool.release(frame);
        self.frames += 1;
        self.dirty = true;
    }

    /// Upload the open segment if it changed
    ///
    /// A segment whose upload exhausts its retries is lost for this run:
    /// the failure is kept for the next caller and writing moves on to the
    /// next sequence.
    pub(crate) fn flush(&mut self) {
        if let Err(e) = self.upload() {
            tracing::error!(
                sequence = self.sequence,
                frames = self.frames,
                error = %e,
                "WAL segment lost"
            );
            self.record_failure(e);
            self.open_next();
        }
    }

    /// Close the open segment and start the next one
    fn rotate(&mut self) {
        let closed = self.sequence;
        self.flush();
        if self.sequence == closed {
            self.open_next();
        }
        tracing::debug!(closed, opened = self.sequence, "WAL segment rotated");
    }

    /// Start an empty segment at the next sequence, then prune
    ///
    /// An earlier upload of the segment being left behind may still be in
    /// the store, so pruning runs on every path that opens a segment.
    fn open_next(&mut self) {
        self.sequence += 1;
        self.body.clear();
        self.frames = 0;
        self.dirty = false;
        self.enforce_retention();
    }

    fn upload(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let key = self.config.segment_key(self.sequence);
        let object = segment::seal(&self.body, self.config.compression, &self.pool);
        let result = with_retry("put", &key, self.config.retry_count, || {
            self.store.put(&key, &object)
        });
        let size = object.len();
        self.pool.release(object);
        result?;

        tracing::debug!(key = %key, frames = self.frames, size, "WAL segment uploaded");
        self.dirty = false;
        Ok(())
    }

    /// Delete the oldest segments so that at most `retention_count` remain,
    /// the open one included
    fn enforce_retention(&mut self) {
        let prefix = self.config.key_prefix.clone();
        let keys = match with_retry("list", &prefix, self.config.retry_count, || {
            self.store.list(&prefix)
        }) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "WAL retention skipped, listing failed");
                return;
            }
        };

        let mut closed: Vec<u64> = keys
            .iter()
            .filter_map(|key| self.config.parse_segment_key(key))
            .filter(|&seq| seq < self.sequence)
            .collect();
        closed.sort_unstable();

        let keep = self.config.retention_count.saturating_sub(1);
        let excess = closed.len().saturating_sub(keep);
        for &seq in &closed[..excess] {
            let key = self.config.segment_key(seq);
            match with_retry("delete", &key, self.config.retry_count, || {
                self.store.delete(&key)
            }) {
                Ok(()) => tracing::debug!(key = %key, "WAL segment pruned"),
                Err(e) => tracing::warn!(key = %key, error = %e, "WAL segment prune failed"),
            }
        }
    }

    fn record_failure(&mut self, error: WalError) {
        if self.failure.is_none() {
            self.failure = Some(error);
        }
    }

    /// Take the first failure not yet reported
    pub(crate) fn take_failure(&mut self) -> Option<WalError> {
        self.failure.take()
    }

    /// Upload what is left and give the staging buffer back to the pool
    ///
    /// The pool may be shared with other managers, so it is not cleared.
    fn finish(mut self) -> Option<WalError> {
        self.flush();
        let body = std::mem::take(&mut self.body);
        self.pool.release(body);
        self.failure.take()
    }
}

/// Starting capacity of the staging body; it grows on demand up to the
/// segment limit
fn initial_body_capacity(config: &WalConfig) -> usize {
    let segment_body = config.max_segment_size - SEGMENT_HEADER_SIZE;
    let few_blocks = config
        .block_size
        .saturating_add(FRAME_PREFIX_SIZE)
        .saturating_mul(4);
    segment_body.min(few_blocks)
}

/// Spawn the writer thread
///
/// The thread's return value is the first failure nobody has seen yet.
pub(crate) fn spawn(
    segments: SegmentWriter,
    receiver: Receiver<WriterCommand>,
    flush_interval: Duration,
) -> Result<JoinHandle<Option<WalError>>> {
    let handle = thread::Builder::new()
        .name("tablewal-writer".to_string())
        .spawn(move || run(segments, receiver, flush_interval))?;
    Ok(handle)
}

/// Writer loop: block for a command, keep collecting for up to
/// `flush_interval`, write everything, upload, repeat.
fn run(
    mut segments: SegmentWriter,
    receiver: Receiver<WriterCommand>,
    flush_interval: Duration,
) -> Option<WalError> {
    loop {
        let first = match receiver.recv() {
            Ok(command) => command,
            // Every sender is gone
            Err(_) => break,
        };

        let deadline = Instant::now() + flush_interval;
        let mut stop = handle(&mut segments, first);
        while !stop && Instant::now() < deadline {
            match receiver.recv_deadline(deadline) {
                Ok(command) => stop = handle(&mut segments, command),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => stop = true,
            }
        }

        segments.flush();
        if stop {
            break;
        }
    }

    // Anything enqueued before shutdown is still owed a write
    for command in receiver.try_iter() {
        if let WriterCommand::Append(sized) = command {
            write_or_log(&mut segments, &sized);
        }
    }

    tracing::info!(last_sequence = segments.sequence(), "WAL writer stopped");
    segments.finish()
}

/// Apply one command; returns true when the writer should stop
fn handle(segments: &mut SegmentWriter, command: WriterCommand) -> bool {
    match command {
        WriterCommand::Append(sized) => {
            write_or_log(segments, &sized);
            false
        }
        WriterCommand::Flush(ack) => {
            segments.flush();
            let result = segments.take_failure().map_or(Ok(()), Err);
            // The caller may have given up waiting
            let _ = ack.send(result);
            false
        }
        WriterCommand::Shutdown => true,
    }
}

fn write_or_log(segments: &mut SegmentWriter, sized: &SizedEntry) {
    if let Err(e) = segments.write_entry(sized) {
        tracing::error!(
            table = %sized.entry().table_name,
            error = %e,
            "WAL entry could not be written"
        );
        segments.record_failure(e);
    }
}
