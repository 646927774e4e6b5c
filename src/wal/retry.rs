//! Bounded retry for object store calls
//!
//! Every physical call gets at most `attempts` tries, back to back. The last
//! failure is wrapped in `WalError::Persistence`.

use std::io;

use crate::error::{Result, WalError};

/// Run `call` until it succeeds or `attempts` tries have failed
pub(crate) fn with_retry<T, F>(op: &'static str, key: &str, attempts: u32, mut call: F) -> Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call() {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(op, key, attempt, "object store call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(op, key, attempt, error = %e, "object store call failed, retrying");
            }
            Err(e) => {
                tracing::error!(op, key, attempt, error = %e, "object store call failed, giving up");
                return Err(WalError::Persistence {
                    key: key.to_string(),
                    attempts: attempt,
                    source: e,
                });
            }
        }
    }
}
