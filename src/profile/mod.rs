//! Key-space profiling
//!
//! A run makes two passes over the store:
//! 1. Sampling: scan until the [`Sampler`] is satisfied, building a trie.
//! 2. Aggregation: scan everything, attributing each key to the prefixes
//!    [`discover`] found in the trie and tallying size/type statistics.

pub mod aggregate;
pub mod discover;
pub mod report;
pub mod sampler;
pub mod scanner;
pub mod trie;
pub mod value_type;

#[cfg(test)]
mod proptests;

pub use aggregate::{fetch_stats, Aggregator, KeyStats, PrefixMap, PrefixStats};
pub use discover::{discover, refine, DiscoveryConfig, PrefixSets};
pub use report::{ProfileReport, ReportRow};
pub use sampler::Sampler;
pub use scanner::KeyScanner;
pub use trie::{Branch, Trie};
pub use value_type::{TypeMask, ValueType};

use crate::common::{Pass, ProfileConfig, Result};
use crate::store::KeyStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Prefixes found by the sampling pass, before any key is attributed.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub sampled_keys: u64,
    pub sets: PrefixSets,
}

impl Discovery {
    /// Report listing every discovered prefix with zero counts.
    pub fn report(&self, collect_stats: bool) -> ProfileReport {
        ProfileReport {
            sampled_keys: self.sampled_keys,
            scanned_keys: 0,
            matched_keys: 0,
            collect_stats,
            summary: report::rows(&self.sets.summary),
            detail: report::rows(&self.sets.detail),
        }
    }
}

/// Drives both passes against a store.
///
/// The outcome of the latest sampling pass stays available through
/// [`Profiler::discovered`] even if the aggregation pass is cancelled.
pub struct Profiler<S> {
    store: S,
    config: ProfileConfig,
    sampled_keys: AtomicU64,
    discovered: Mutex<Option<Discovery>>,
}

impl<S: KeyStore> Profiler<S> {
    pub fn new(store: S, config: ProfileConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            sampled_keys: AtomicU64::new(0),
            discovered: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Keys seen by the latest sampling pass, 0 before one has finished.
    pub fn sampled_keys(&self) -> u64 {
        self.sampled_keys.load(Ordering::Relaxed)
    }

    /// Prefixes of the latest finished sampling pass.
    pub fn discovered(&self) -> Option<Discovery> {
        self.discovered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sample, discover, then aggregate.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<ProfileReport> {
        let discovery = self.discover_prefixes(cancel).await?;
        self.complete(discovery, cancel).await
    }

    /// First pass plus discovery. The result is also kept for
    /// [`Profiler::discovered`].
    pub async fn discover_prefixes(&self, cancel: &CancellationToken) -> Result<Discovery> {
        let sampler = self.sample(cancel).await?;
        let discovery = Discovery {
            sampled_keys: sampler.total_keys_seen(),
            sets: discover(sampler.trie(), &DiscoveryConfig::from(&self.config)),
        };
        drop(sampler);

        tracing::info!(
            "Discovered {} summary and {} detail prefixes",
            discovery.sets.summary.len(),
            discovery.sets.detail.len()
        );
        for prefix in discovery.sets.summary.keys() {
            tracing::debug!("summary prefix {}", crate::common::display_key(prefix));
        }
        for prefix in discovery.sets.detail.keys() {
            tracing::debug!("detail prefix {}", crate::common::display_key(prefix));
        }

        self.sampled_keys
            .store(discovery.sampled_keys, Ordering::Relaxed);
        *self
            .discovered
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(discovery.clone());
        Ok(discovery)
    }

    /// Second pass over `discovery`, producing the final report.
    pub async fn complete(
        &self,
        discovery: Discovery,
        cancel: &CancellationToken,
    ) -> Result<ProfileReport> {
        let aggregator = self.aggregate(discovery.sets, cancel).await?;

        Ok(ProfileReport {
            sampled_keys: discovery.sampled_keys,
            scanned_keys: aggregator.keys_seen(),
            matched_keys: aggregator.keys_matched(),
            collect_stats: self.config.collect_stats,
            summary: report::rows(aggregator.summary()),
            detail: report::rows(aggregator.detail()),
        })
    }

    /// First pass: feed scanned batches to a [`Sampler`] until it is
    /// satisfied or the key-space is exhausted.
    pub async fn sample(&self, cancel: &CancellationToken) -> Result<Sampler> {
        tracing::info!(
            "Sampling at least {} keys matching {:?}",
            self.config.sample_target,
            self.config.pattern
        );

        let mut sampler = Sampler::new(
            self.config.sample_target,
            self.config.min_prefix_count,
            self.config.branch_suffix_threshold,
        );
        let mut scanner = KeyScanner::new(
            &self.store,
            &self.config.pattern,
            self.config.batch_size,
            Pass::Sampling,
        );

        while let Some(batch) = scanner.next_batch(cancel).await? {
            if sampler.observe(&batch) {
                break;
            }
        }
        if !sampler.is_complete() {
            tracing::info!("Key-space exhausted before the sample target was met");
            sampler.finish();
        }

        tracing::info!(
            "Sampled {} keys in {} batches ({} first-level prefixes)",
            sampler.total_keys_seen(),
            scanner.batches(),
            sampler.valid_branch_count()
        );
        Ok(sampler)
    }

    /// Second pass: attribute every scanned key to `sets`.
    pub async fn aggregate(&self, sets: PrefixSets, cancel: &CancellationToken) -> Result<Aggregator> {
        tracing::info!("Aggregating over all keys matching {:?}", self.config.pattern);

        let mut aggregator = Aggregator::new(sets);
        let mut scanner = KeyScanner::new(
            &self.store,
            &self.config.pattern,
            self.config.batch_size,
            Pass::Aggregation,
        );
        let interval = self.config.progress_interval;
        let mut next_progress = interval;

        while let Some(batch) = scanner.next_batch(cancel).await? {
            let keys = aggregator.prefilter(batch);
            if self.config.collect_stats {
                let stats = fetch_stats(&self.store, &keys).await;
                aggregator.attribute(&keys, Some(&stats));
            } else {
                aggregator.attribute(&keys, None);
            }

            if interval > 0 && aggregator.keys_seen() >= next_progress {
                tracing::info!("processed {} keys", aggregator.keys_seen());
                next_progress = (aggregator.keys_seen() / interval + 1) * interval;
            }
        }

        tracing::info!(
            "Visited {} keys, {} matched a prefix",
            aggregator.keys_seen(),
            aggregator.keys_matched()
        );
        Ok(aggregator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store_with(prefixes: &[(&str, usize)]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for (prefix, n) in prefixes {
            for i in 0..*n {
                store.insert(format!("{}{}", prefix, i), ValueType::String, vec![b'v'; 8]);
            }
        }
        store
    }

    #[tokio::test]
    async fn test_sampling_stops_early() {
        let store = store_with(&[("alpha:", 500), ("bravo:", 500)]);
        let config = ProfileConfig {
            sample_target: 50,
            min_prefix_count: 1,
            batch_size: 20,
            ..Default::default()
        };
        let profiler = Profiler::new(store, config).unwrap();
        let sampler = profiler.sample(&CancellationToken::new()).await.unwrap();
        // Store order is sorted, so the first 60 keys are all "alpha:".
        assert_eq!(sampler.total_keys_seen(), 60);
        assert!(sampler.is_complete());
    }

    #[tokio::test]
    async fn test_sampling_degenerates_to_full_scan() {
        let store = store_with(&[("alpha:", 30)]);
        let config = ProfileConfig {
            sample_target: 10,
            min_prefix_count: 5,
            batch_size: 7,
            ..Default::default()
        };
        let profiler = Profiler::new(store, config).unwrap();
        let sampler = profiler.sample(&CancellationToken::new()).await.unwrap();
        assert_eq!(sampler.total_keys_seen(), 30);
        assert!(sampler.is_complete());
    }

    #[tokio::test]
    async fn test_empty_filtered_pages_do_not_end_sampling() {
        // Every "a:" key sorts first, so the first ten pages match nothing
        // yet carry a non-zero cursor.
        let store = store_with(&[("a:", 100), ("zone:", 20)]);
        let config = ProfileConfig {
            pattern: "zone:*".into(),
            sample_target: 5,
            min_prefix_count: 1,
            batch_size: 10,
            ..Default::default()
        };
        let profiler = Profiler::new(store, config).unwrap();
        let discovery = profiler
            .discover_prefixes(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(profiler.store().scan_calls(), 11);
        assert_eq!(discovery.sampled_keys, 10);
        assert_eq!(profiler.sampled_keys(), 10);
        assert!(discovery.sets.summary.contains_key(b"zone:".as_slice()));
    }

    #[tokio::test]
    async fn test_discovery_report_has_zero_counts() {
        let store = store_with(&[("alpha:", 30), ("bravo:", 30)]);
        let config = ProfileConfig {
            sample_target: 1000,
            min_prefix_count: 1,
            ..Default::default()
        };
        let profiler = Profiler::new(store, config).unwrap();
        assert!(profiler.discovered().is_none());
        assert_eq!(profiler.sampled_keys(), 0);

        profiler
            .discover_prefixes(&CancellationToken::new())
            .await
            .unwrap();
        let report = profiler.discovered().unwrap().report(false);
        let prefixes: Vec<&str> = report.summary.iter().map(|r| r.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["alpha:", "bravo:"]);
        assert!(report.summary.iter().all(|r| r.member_count == 0));
        assert_eq!(report.sampled_keys, 60);
        assert_eq!(report.scanned_keys, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ProfileConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(Profiler::new(MemoryStore::new(), config).is_err());
    }
}
