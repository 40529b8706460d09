//! Attribution of scanned keys to discovered prefixes
//!
//! Each key counts towards the first summary prefix it starts with and
//! towards every detail prefix it starts with. Detail prefixes are expected
//! to be disjoint by construction, but overlaps are not rejected.

use crate::common::average;
use crate::profile::discover::PrefixSets;
use crate::profile::value_type::{TypeMask, ValueType};
use crate::store::KeyStore;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Prefix -> statistics, iterated in byte order.
pub type PrefixMap = BTreeMap<Vec<u8>, PrefixStats>;

/// Counters for one prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrefixStats {
    pub member_count: u64,
    /// Sum of serialized sizes, 0 when statistics are disabled
    pub total_size: u64,
    pub types: TypeMask,
}

impl PrefixStats {
    pub fn record(&mut self, ty: Option<ValueType>, size: u64) {
        self.member_count += 1;
        self.total_size += size;
        if let Some(ty) = ty {
            self.types.insert(ty);
        }
    }

    /// `total_size / member_count`, 0 for an empty prefix.
    pub fn average_size(&self) -> u64 {
        average(self.total_size, self.member_count)
    }
}

/// Type and size lookups for one batch, as returned by the two concurrent
/// round trips.
#[derive(Debug, Default)]
pub struct KeyStats {
    pub types: HashMap<Vec<u8>, ValueType>,
    pub sizes: HashMap<Vec<u8>, u64>,
}

impl KeyStats {
    /// Missing entries degrade to `Unknown`.
    pub fn type_of(&self, key: &[u8]) -> ValueType {
        self.types.get(key).copied().unwrap_or(ValueType::Unknown)
    }

    /// Missing entries degrade to 0.
    pub fn size_of(&self, key: &[u8]) -> u64 {
        self.sizes.get(key).copied().unwrap_or(0)
    }
}

/// Fetch value types and serialized sizes for `keys`.
///
/// The two lookups run concurrently, each filling its own map. A failed
/// round trip leaves its map empty so every key in the batch degrades.
pub async fn fetch_stats<S>(store: &S, keys: &[Vec<u8>]) -> KeyStats
where
    S: KeyStore + ?Sized,
{
    if keys.is_empty() {
        return KeyStats::default();
    }

    let (types, sizes) = tokio::join!(store.types(keys), store.sizes(keys));

    let types = types.unwrap_or_else(|e| {
        tracing::warn!("Type lookup failed for {} keys: {}", keys.len(), e);
        HashMap::new()
    });
    let sizes = sizes.unwrap_or_else(|e| {
        tracing::warn!("Size lookup failed for {} keys: {}", keys.len(), e);
        HashMap::new()
    });

    let degraded = keys
        .iter()
        .filter(|k| !types.contains_key(*k) || !sizes.contains_key(*k))
        .count();
    if degraded > 0 {
        tracing::debug!("{} of {} lookups degraded", degraded, keys.len());
    }

    KeyStats { types, sizes }
}

/// Accumulates per-prefix statistics during the aggregation pass.
#[derive(Debug, Default)]
pub struct Aggregator {
    sets: PrefixSets,
    keys_seen: u64,
    keys_matched: u64,
}

impl Aggregator {
    /// Start from discovered prefixes; counters are reset.
    pub fn new(mut sets: PrefixSets) -> Self {
        sets.reset();
        Self {
            sets,
            keys_seen: 0,
            keys_matched: 0,
        }
    }

    /// Does `key` start with any summary or detail prefix?
    pub fn matches(&self, key: &[u8]) -> bool {
        self.sets
            .summary
            .keys()
            .chain(self.sets.detail.keys())
            .any(|prefix| key.starts_with(prefix))
    }

    /// Keep only keys matching at least one prefix, counting the whole batch.
    pub fn prefilter(&mut self, batch: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        self.keys_seen += batch.len() as u64;
        batch.into_iter().filter(|key| self.matches(key)).collect()
    }

    /// Attribute one key. `ty` is `None` when statistics are disabled.
    pub fn record(&mut self, key: &[u8], ty: Option<ValueType>, size: u64) {
        let mut matched = false;

        if let Some((_, stats)) = self
            .sets
            .summary
            .iter_mut()
            .find(|(prefix, _)| key.starts_with(prefix))
        {
            stats.record(ty, size);
            matched = true;
        }

        for (prefix, stats) in self.sets.detail.iter_mut() {
            if key.starts_with(prefix) {
                stats.record(ty, size);
                matched = true;
            }
        }

        if matched {
            self.keys_matched += 1;
        }
    }

    /// Attribute a prefiltered batch, with optional looked-up statistics.
    pub fn attribute(&mut self, keys: &[Vec<u8>], stats: Option<&KeyStats>) {
        for key in keys {
            match stats {
                Some(stats) => self.record(key, Some(stats.type_of(key)), stats.size_of(key)),
                None => self.record(key, None, 0),
            }
        }
    }

    /// Keys offered through [`Aggregator::prefilter`].
    pub fn keys_seen(&self) -> u64 {
        self.keys_seen
    }

    /// Keys attributed to at least one prefix.
    pub fn keys_matched(&self) -> u64 {
        self.keys_matched
    }

    pub fn summary(&self) -> &PrefixMap {
        &self.sets.summary
    }

    pub fn detail(&self) -> &PrefixMap {
        &self.sets.detail
    }
}
