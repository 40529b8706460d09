//! Key-value store access used by the profiler
//!
//! The profiler only needs cursor-based key scanning plus batched type and
//! size lookups. [`RedisStore`] speaks to a live server, [`MemoryStore`]
//! serves an in-process key-space.

pub mod memory;
pub mod remote;

pub use memory::MemoryStore;
pub use remote::RedisStore;

use crate::common::Result;
use crate::profile::ValueType;
use async_trait::async_trait;
use std::collections::HashMap;

/// One page of a cursor scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub keys: Vec<Vec<u8>>,
    /// Cursor for the next call; 0 means the scan is complete
    pub cursor: u64,
}

#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Return the next page of keys matching `pattern`, starting at `cursor`.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage>;

    /// Value type of each key, in one round trip. Keys whose reply could not
    /// be read may be missing from the result.
    async fn types(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, ValueType>>;

    /// Serialized size of each key, in one round trip. Keys whose reply could
    /// not be read may be missing from the result.
    async fn sizes(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, u64>>;
}

#[async_trait]
impl<S: KeyStore + ?Sized> KeyStore for std::sync::Arc<S> {
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        (**self).scan(cursor, pattern, count).await
    }

    async fn types(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, ValueType>> {
        (**self).types(keys).await
    }

    async fn sizes(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, u64>> {
        (**self).sizes(keys).await
    }
}
