//! Adaptive sampling for the first scan pass
//!
//! Keys are inserted into a [`Trie`] batch by batch. Once more than
//! `sample_target` keys have been seen, sampling stops as soon as the trie's
//! first level shows at least `min_prefix_count` branches that look like real
//! prefixes rather than short whole keys.

use crate::profile::trie::Trie;

/// Sampler state for one profiling run.
#[derive(Debug)]
pub struct Sampler {
    trie: Trie,
    total_keys_seen: u64,
    sample_target: u64,
    min_prefix_count: u64,
    branch_suffix_threshold: usize,
    complete: bool,
}

impl Sampler {
    pub fn new(sample_target: u64, min_prefix_count: u64, branch_suffix_threshold: usize) -> Self {
        Self {
            trie: Trie::new(),
            total_keys_seen: 0,
            sample_target,
            min_prefix_count,
            branch_suffix_threshold,
            complete: false,
        }
    }

    /// Insert one scanned batch, then re-evaluate the stop condition.
    ///
    /// Once sampling is complete further batches are ignored.
    pub fn observe<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> bool {
        if self.complete {
            return true;
        }

        for key in keys {
            self.total_keys_seen += 1;
            self.trie.insert(key.as_ref());
        }

        self.complete = self.total_keys_seen > self.sample_target
            && self.valid_branch_count() >= self.min_prefix_count;
        self.complete
    }

    /// Mark sampling finished because the key-space is exhausted.
    pub fn finish(&mut self) {
        self.complete = true;
    }

    /// Root branches that are not a whole key and carry a suffix longer than
    /// the configured threshold.
    pub fn valid_branch_count(&self) -> u64 {
        self.trie
            .root_branches()
            .filter(|b| !b.terminal && b.suffix.len() > self.branch_suffix_threshold)
            .count() as u64
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Keys scanned so far, duplicates included.
    pub fn total_keys_seen(&self) -> u64 {
        self.total_keys_seen
    }

    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    /// Hand the finished trie to the discoverer.
    pub fn into_trie(self) -> Trie {
        self.trie
    }
}
