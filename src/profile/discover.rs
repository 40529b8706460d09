//! Prefix discovery over a sampled trie
//!
//! Summary prefixes come from the sample trie's first-level branches. Each
//! summary prefix with enough members is then refined: its members, with the
//! prefix stripped, go into a fresh scoped trie whose first-level branches
//! become detail prefixes, recursively.

use crate::common::ProfileConfig;
use crate::profile::aggregate::{PrefixMap, PrefixStats};
use crate::profile::trie::Trie;

/// Knobs for [`discover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Refine a prefix only if it has more members than this
    pub min_members: usize,
    /// Prefixes must be strictly shorter than this
    pub max_detect_length: usize,
    /// Keep a deeper refinement only if it produced more prefixes than this
    pub detail_level: usize,
    /// Root branch suffix length a summary prefix must exceed
    pub summary_suffix_threshold: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::from(&ProfileConfig::default())
    }
}

impl From<&ProfileConfig> for DiscoveryConfig {
    fn from(config: &ProfileConfig) -> Self {
        Self {
            min_members: config.min_members,
            max_detect_length: config.max_detect_length,
            detail_level: config.detail_level,
            summary_suffix_threshold: config.summary_suffix_threshold,
        }
    }
}

/// Summary and detail prefixes, all counters zeroed.
#[derive(Debug, Clone, Default)]
pub struct PrefixSets {
    pub summary: PrefixMap,
    pub detail: PrefixMap,
}

impl PrefixSets {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.detail.is_empty()
    }

    /// Zero every counter, keeping the prefixes.
    pub fn reset(&mut self) {
        for stats in self.summary.values_mut().chain(self.detail.values_mut()) {
            *stats = PrefixStats::default();
        }
    }
}

/// Walk a finished sample trie and produce the prefix sets.
pub fn discover(trie: &Trie, config: &DiscoveryConfig) -> PrefixSets {
    let mut sets = PrefixSets::default();

    for branch in trie.root_branches() {
        if branch.terminal || branch.suffix.len() <= config.summary_suffix_threshold {
            continue;
        }

        let prefix = branch.prefix();
        if trie.has_prefix(&prefix) {
            sets.summary.insert(prefix.clone(), PrefixStats::default());
        }

        let members = trie.list_members(&prefix);
        if members.len() > config.min_members {
            let local = strip(&members, prefix.len());
            for detail in refine(&prefix, &local, config) {
                sets.detail.insert(detail, PrefixStats::default());
            }
        }
    }

    sets
}

/// Refine `parent` using `members`, the keys below it with `parent` (and
/// any earlier local trim) already removed. Returns full prefixes.
pub fn refine(parent: &[u8], members: &[Vec<u8>], config: &DiscoveryConfig) -> Vec<Vec<u8>> {
    let scoped = Trie::from_keys(members);
    let mut found = Vec::new();

    for branch in scoped.root_branches() {
        if branch.terminal || branch.suffix.is_empty() {
            continue;
        }

        let local = branch.prefix();
        let candidate = [parent, local.as_slice()].concat();
        if candidate.len() >= config.max_detect_length || !scoped.has_prefix(&local) {
            continue;
        }
        found.push(candidate.clone());

        let sub_members = scoped.list_members(&local);
        if sub_members.len() > config.min_members {
            let deeper = refine(&candidate, &strip(&sub_members, local.len()), config);
            if deeper.len() > config.detail_level {
                found.extend(deeper);
            }
        }
    }

    found
}

fn strip(members: &[Vec<u8>], len: usize) -> Vec<Vec<u8>> {
    members.iter().map(|m| m[len..].to_vec()).collect()
}
