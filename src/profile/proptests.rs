use super::*;

use proptest::prelude::*;
use std::collections::BTreeSet;

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    // Small alphabet so keys share prefixes often.
    prop::collection::vec(prop::sample::select(vec![b'a', b'b', b':', b'1', b'2']), 0..12)
}

fn keys_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(key_strategy(), 0..200)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_list_members_is_exact(keys in keys_strategy(), prefix in key_strategy()) {
        let trie = Trie::from_keys(&keys);
        let expected: BTreeSet<Vec<u8>> = keys
            .iter()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();

        let members = trie.list_members(&prefix);
        for member in &members {
            prop_assert!(member.starts_with(&prefix));
        }
        let got: BTreeSet<Vec<u8>> = members.into_iter().collect();
        prop_assert_eq!(&got, &expected);
        prop_assert_eq!(trie.has_prefix(&prefix), !expected.is_empty());
        prop_assert_eq!(trie.count_prefix(&prefix), expected.len());
    }

    #[test]
    fn prop_trie_len_counts_distinct_keys(keys in keys_strategy()) {
        let trie = Trie::from_keys(&keys);
        let distinct: BTreeSet<&Vec<u8>> = keys.iter().collect();
        prop_assert_eq!(trie.len(), distinct.len());
        for key in &keys {
            prop_assert!(trie.contains(key));
        }
    }

    #[test]
    fn prop_discovered_prefixes_respect_length_and_nesting(
        keys in keys_strategy(),
        max_detect_length in 1usize..10,
        min_members in 0usize..5,
    ) {
        let trie = Trie::from_keys(&keys);
        let config = DiscoveryConfig {
            min_members,
            max_detect_length,
            detail_level: 0,
            summary_suffix_threshold: 2,
        };
        let sets = discover(&trie, &config);

        for detail in sets.detail.keys() {
            prop_assert!(detail.len() < max_detect_length);
            let parent = sets
                .summary
                .keys()
                .find(|summary| detail.starts_with(summary));
            prop_assert!(parent.is_some());
            prop_assert!(detail.len() > parent.map(|p| p.len()).unwrap_or(0));
        }
        for summary in sets.summary.keys() {
            prop_assert!(trie.has_prefix(summary));
        }
    }

    #[test]
    fn prop_each_key_counts_once_in_summary(keys in keys_strategy()) {
        let trie = Trie::from_keys(&keys);
        let sets = discover(&trie, &DiscoveryConfig {
            min_members: 1,
            max_detect_length: 40,
            detail_level: 0,
            summary_suffix_threshold: 2,
        });
        let summaries: Vec<Vec<u8>> = sets.summary.keys().cloned().collect();

        let mut aggregator = Aggregator::new(sets);
        let kept = aggregator.prefilter(keys.clone());
        aggregator.attribute(&kept, None);

        let matching = keys
            .iter()
            .filter(|k| summaries.iter().any(|p| k.starts_with(p)))
            .count() as u64;
        let total: u64 = aggregator.summary().values().map(|s| s.member_count).sum();
        prop_assert_eq!(total, matching);
    }
}
