//! WAL Manager
//!
//! The public façade: validates appends on the caller's thread, funnels them
//! to the single writer thread, and runs recovery scans.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, RwLock};

use crate::buffer::BufferPool;
use crate::config::WalConfig;
use crate::error::{Result, WalError};
use crate::store::ObjectStore;

use super::codec::SizedEntry;
use super::entry::WalEntry;
use super::reader::{WalIterator, WalReader};
use super::writer::{self, SegmentWriter, WriterCommand};

/// Write-ahead log over one object store namespace
///
/// ## Concurrency:
/// - `append`/`flush`: any thread; hold the sender read lock only to enqueue
/// - `terminate`: takes the sender under the write lock, so no append can
///   slip in behind the shutdown command
/// - Segment state: owned by the writer thread, never shared
pub struct WalManager {
    config: WalConfig,
    store: Arc<dyn ObjectStore>,

    /// Command channel to the writer; `None` once terminated
    sender: RwLock<Option<Sender<WriterCommand>>>,

    /// Writer thread; yields the first unreported failure when joined
    writer: Mutex<Option<JoinHandle<Option<WalError>>>>,
}

impl WalManager {
    /// Open a namespace and start its writer thread
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. List existing segments to find the next sequence
    /// 3. Spawn the writer
    pub fn open(store: Arc<dyn ObjectStore>, pool: Arc<BufferPool>, config: WalConfig) -> Result<Self> {
        config.validate()?;

        let segments = SegmentWriter::open(Arc::clone(&store), pool, config.clone())?;
        let (sender, receiver) = channel::unbounded();
        let handle = writer::spawn(segments, receiver, config.flush_interval)?;

        Ok(Self {
            config,
            store,
            sender: RwLock::new(Some(sender)),
            writer: Mutex::new(Some(handle)),
        })
    }

    /// Queue an entry for writing
    ///
    /// Size checks run here; an oversized schema or record fails with
    /// `WalError::Validation` and nothing is queued. Returns as soon as the
    /// entry is enqueued. Entries are written in the order they were
    /// enqueued, across all threads.
    pub fn append(&self, entry: WalEntry) -> Result<()> {
        let sized = SizedEntry::new(entry, self.config.block_size)?;
        self.send(WriterCommand::Append(sized))
    }

    /// Block until everything appended so far has been uploaded
    ///
    /// Returns the first persistence failure since the last `flush` or
    /// `terminate`, if any.
    pub fn flush(&self) -> Result<()> {
        let (ack, done) = channel::bounded(1);
        self.send(WriterCommand::Flush(ack))?;
        done.recv().map_err(|_| WalError::Closed)?
    }

    /// Drain the queue, upload the open segment and stop the writer
    ///
    /// Blocks until the writer has exited. Returns the first persistence
    /// failure nobody has seen yet. Calling it again is a no-op.
    pub fn terminate(&self) -> Result<()> {
        let Some(sender) = self.sender.write().take() else {
            return Ok(());
        };
        // The writer may already be gone; joining tells us why
        let _ = sender.send(WriterCommand::Shutdown);
        drop(sender);

        let Some(handle) = self.writer.lock().take() else {
            return Ok(());
        };
        match handle.join() {
            Ok(None) => {
                tracing::info!(prefix = %self.config.key_prefix, "WAL terminated");
                Ok(())
            }
            Ok(Some(e)) => Err(e),
            Err(_) => {
                tracing::error!(prefix = %self.config.key_prefix, "WAL writer thread panicked");
                Err(WalError::Closed)
            }
        }
    }

    /// Scan every retained segment in write order
    ///
    /// Only what the writer has uploaded is visible; call `flush` first to
    /// include this instance's own recent appends.
    pub fn read_all(&self) -> Result<WalIterator> {
        WalReader::new(Arc::clone(&self.store), self.config.clone()).read_all()
    }

    /// Get the configuration
    pub fn config(&self) -> &WalConfig {
        &self.config
    }

    fn send(&self, command: WriterCommand) -> Result<()> {
        let sender = self.sender.read();
        let sender = sender.as_ref().ok_or(WalError::Closed)?;
        sender.send(command).map_err(|_| WalError::Closed)
    }
}

impl Drop for WalManager {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            tracing::error!(error = %e, "WAL dropped with unreported failure");
        }
    }
}
