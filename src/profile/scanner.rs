//! Cursor-driven batch scanning with cooperative cancellation

use crate::common::{Error, Pass, Result};
use crate::store::KeyStore;
use tokio_util::sync::CancellationToken;

/// Iterates a full SCAN of the store one batch at a time.
pub struct KeyScanner<'a, S: ?Sized> {
    store: &'a S,
    pattern: &'a str,
    batch_size: usize,
    pass: Pass,
    cursor: u64,
    done: bool,
    batches: u64,
}

impl<'a, S: KeyStore + ?Sized> KeyScanner<'a, S> {
    pub fn new(store: &'a S, pattern: &'a str, batch_size: usize, pass: Pass) -> Self {
        Self {
            store,
            pattern,
            batch_size,
            pass,
            cursor: 0,
            done: false,
            batches: 0,
        }
    }

    /// Fetch the next batch, or `None` once the store reports cursor 0.
    ///
    /// Cancellation is checked before each round trip, never during one.
    pub async fn next_batch(&mut self, cancel: &CancellationToken) -> Result<Option<Vec<Vec<u8>>>> {
        if self.done {
            return Ok(None);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled { pass: self.pass });
        }

        let page = self.store.scan(self.cursor, self.pattern, self.batch_size).await?;
        self.batches += 1;
        self.cursor = page.cursor;
        if self.cursor == 0 {
            self.done = true;
        }
        Ok(Some(page.keys))
    }

    /// Round trips made so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}
