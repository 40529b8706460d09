//! In-process key-space with SCAN-like cursor semantics

use crate::common::{Error, Result};
use crate::profile::ValueType;
use crate::store::{KeyStore, ScanPage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct Entry {
    key: Vec<u8>,
    ty: ValueType,
    value: Vec<u8>,
}

/// Sorted in-memory key-space.
///
/// The scan cursor is a position in key order. Like a real server, each
/// call examines up to `count` keys and returns only those that match the
/// pattern, so pages can be short or empty before the scan completes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Sorted by key, unique keys
    entries: Vec<Entry>,
    fail_scan_after: Option<usize>,
    fail_types: bool,
    fail_sizes: bool,
    scans: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every scan call after `pages` successful ones.
    pub fn with_scan_failure_after(mut self, pages: usize) -> Self {
        self.fail_scan_after = Some(pages);
        self
    }

    /// Fail every type and size round trip.
    pub fn with_failing_lookups(self) -> Self {
        self.with_failing_types().with_failing_sizes()
    }

    /// Fail every type round trip; sizes are still served.
    pub fn with_failing_types(mut self) -> Self {
        self.fail_types = true;
        self
    }

    /// Fail every size round trip; types are still served.
    pub fn with_failing_sizes(mut self) -> Self {
        self.fail_sizes = true;
        self
    }

    /// Insert or overwrite `key`.
    pub fn insert(&mut self, key: impl AsRef<[u8]>, ty: ValueType, value: Vec<u8>) {
        let key = key.as_ref();
        match self.position(key) {
            Ok(i) => {
                self.entries[i].ty = ty;
                self.entries[i].value = value;
            }
            Err(i) => self.entries.insert(
                i,
                Entry {
                    key: key.to_vec(),
                    ty,
                    value,
                },
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scan calls served so far, failed ones included.
    pub fn scan_calls(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    fn position(&self, key: &[u8]) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.as_slice().cmp(key))
    }

    fn get(&self, key: &[u8]) -> Option<&Entry> {
        self.position(key).ok().map(|i| &self.entries[i])
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        let calls = self.scans.fetch_add(1, Ordering::Relaxed);
        if let Some(limit) = self.fail_scan_after {
            if calls >= limit {
                return Err(Error::Transport(format!("scan at cursor {} refused", cursor)));
            }
        }

        let len = self.entries.len();
        let start = usize::try_from(cursor).unwrap_or(len).min(len);
        let end = start.saturating_add(count.max(1)).min(len);
        let keys = self.entries[start..end]
            .iter()
            .filter(|e| glob_match(pattern.as_bytes(), &e.key))
            .map(|e| e.key.clone())
            .collect();

        let cursor = if end >= len { 0 } else { end as u64 };
        Ok(ScanPage { keys, cursor })
    }

    async fn types(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, ValueType>> {
        if self.fail_types {
            return Err(Error::Transport("TYPE pipeline refused".into()));
        }
        Ok(keys
            .iter()
            .map(|key| {
                let ty = self.get(key).map(|e| e.ty).unwrap_or(ValueType::Unknown);
                (key.clone(), ty)
            })
            .collect())
    }

    async fn sizes(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, u64>> {
        if self.fail_sizes {
            return Err(Error::Transport("DUMP pipeline refused".into()));
        }
        Ok(keys
            .iter()
            .map(|key| {
                let size = self.get(key).map(|e| e.value.len() as u64).unwrap_or(0);
                (key.clone(), size)
            })
            .collect())
    }
}

/// Glob matching with the server's syntax: `*`, `?`, `[abc]`, `[^a-z]`, `\x`.
pub fn glob_match(pattern: &[u8], key: &[u8]) -> bool {
    let (mut p, mut k) = (0, 0);
    // Position after the last `*` and the key index it is trying to absorb.
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        let step = match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p + 1, k));
                p += 1;
                continue;
            }
            Some(b'?') => Some(p + 1),
            Some(b'[') => match_class(pattern, p, key[k]),
            Some(b'\\') if p + 1 < pattern.len() => (pattern[p + 1] == key[k]).then_some(p + 2),
            Some(&c) => (c == key[k]).then_some(p + 1),
            None => None,
        };

        match step {
            Some(next) => {
                p = next;
                k += 1;
            }
            None => match backtrack {
                Some((star_p, star_k)) => {
                    p = star_p;
                    k = star_k + 1;
                    backtrack = Some((star_p, star_k + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p.min(pattern.len())..].iter().all(|&c| c == b'*')
}

/// Match `byte` against the class starting at `pattern[start] == b'['`.
/// Returns the pattern index after the closing bracket on success.
fn match_class(pattern: &[u8], start: usize, byte: u8) -> Option<usize> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == byte;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = if pattern[i] <= pattern[i + 2] {
                (pattern[i], pattern[i + 2])
            } else {
                (pattern[i + 2], pattern[i])
            };
            matched |= (lo..=hi).contains(&byte);
            i += 3;
        } else {
            matched |= pattern[i] == byte;
            i += 1;
        }
    }

    // Unterminated class: treat the rest of the pattern as the class.
    let next = (i + 1).min(pattern.len());
    (matched != negate).then_some(next)
}
