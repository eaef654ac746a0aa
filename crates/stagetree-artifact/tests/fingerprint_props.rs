//! Property tests for the lineage hasher.
//!
//! - The digest never depends on the order parents are supplied in.
//! - Changing any single parent fingerprint changes the digest.

use proptest::prelude::*;
use stagetree_artifact::{fingerprint, Fingerprint};
use std::collections::BTreeMap;

fn parent_map() -> impl Strategy<Value = BTreeMap<String, [u8; 32]>> {
    proptest::collection::btree_map("[a-z][a-z0-9_-]{0,8}", any::<[u8; 32]>(), 0..8)
}

proptest! {
    #[test]
    fn prop_parent_order_is_irrelevant(
        content in ".*",
        parents in parent_map(),
        seed in any::<u64>(),
    ) {
        let entries: Vec<(String, Fingerprint)> = parents
            .iter()
            .map(|(k, v)| (k.clone(), Fingerprint::new(*v)))
            .collect();

        let mut shuffled = entries.clone();
        // deterministic rotation + reversal stands in for a permutation
        if !shuffled.is_empty() {
            let len = shuffled.len();
            shuffled.rotate_left(usize::try_from(seed % len as u64).unwrap_or(0));
        }
        shuffled.reverse();

        let a = fingerprint(&content, entries.iter().map(|(k, v)| (k.as_str(), v)));
        let b = fingerprint(&content, shuffled.iter().map(|(k, v)| (k.as_str(), v)));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_any_parent_change_changes_digest(
        content in ".*",
        parents in parent_map().prop_filter("needs a parent", |m| !m.is_empty()),
        pick in any::<prop::sample::Index>(),
        flip in 0usize..32,
    ) {
        let entries: Vec<(String, Fingerprint)> = parents
            .iter()
            .map(|(k, v)| (k.clone(), Fingerprint::new(*v)))
            .collect();

        let target = pick.index(entries.len());
        let mut changed = entries.clone();
        let mut bytes = *changed[target].1.as_bytes();
        bytes[flip] ^= 0x01;
        changed[target].1 = Fingerprint::new(bytes);

        let before = fingerprint(&content, entries.iter().map(|(k, v)| (k.as_str(), v)));
        let after = fingerprint(&content, changed.iter().map(|(k, v)| (k.as_str(), v)));
        prop_assert_ne!(before, after);
    }
}
