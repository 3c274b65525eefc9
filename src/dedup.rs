//! Batch Deduplication Module
//!
//! Order-preserving, single-pass dedup for payload batches before they
//! reach the store. Usable independently of any cache instance.

use std::collections::HashSet;
use std::hash::Hash;

use serde_json::Value;

// == Dedup By Key ==
/// Removes items whose extracted key was already seen, preserving
/// first-seen order. Single O(n) pass over a seen-key set.
pub fn batch_dedup_by<T, K, F>(items: Vec<T>, mut key_fn: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(key_fn(item)))
        .collect()
}

// == Dedup ==
/// Structural-equality dedup for payload batches, used when the caller
/// supplies no key extractor. Equality is judged on the serialized form,
/// which is deterministic for JSON payloads.
pub fn batch_dedup(items: Vec<Value>) -> Vec<Value> {
    batch_dedup_by(items, |value| {
        serde_json::to_string(value).unwrap_or_default()
    })
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let items = vec![json!(3), json!(1), json!(3), json!(2), json!(1)];
        assert_eq!(batch_dedup(items), vec![json!(3), json!(1), json!(2)]);
    }

    #[test]
    fn test_dedup_structural_equality() {
        let items = vec![
            json!({"isin": "IE00B4L5Y983", "price": 101.2}),
            json!({"isin": "IE00B4L5Y983", "price": 101.2}),
            json!({"isin": "IE00B4L5Y983", "price": 101.3}),
        ];
        let deduped = batch_dedup(items);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_dedup_empty_batch() {
        assert!(batch_dedup(Vec::new()).is_empty());
    }

    #[test]
    fn test_dedup_by_custom_extractor() {
        let quotes = vec![
            json!({"isin": "A", "price": 1.0}),
            json!({"isin": "B", "price": 2.0}),
            json!({"isin": "A", "price": 3.0}),
        ];
        // Keyed on the instrument, later quotes for the same one drop out
        let deduped = batch_dedup_by(quotes, |q| {
            q.get("isin").and_then(|v| v.as_str()).unwrap_or("").to_string()
        });
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0]["price"], json!(1.0));
        assert_eq!(deduped[1]["isin"], json!("B"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // batch_dedup(batch_dedup(xs)) == batch_dedup(xs)
        #[test]
        fn prop_dedup_idempotence(values in prop::collection::vec(-50i64..50, 0..100)) {
            let items: Vec<_> = values.into_iter().map(|v| json!(v)).collect();
            let once = batch_dedup(items);
            let twice = batch_dedup(once.clone());
            prop_assert_eq!(once, twice);
        }

        // Dedup never reorders the survivors
        #[test]
        fn prop_dedup_is_a_subsequence(values in prop::collection::vec(-10i64..10, 0..60)) {
            let items: Vec<_> = values.into_iter().map(|v| json!(v)).collect();
            let deduped = batch_dedup(items.clone());

            let mut cursor = items.iter();
            for kept in &deduped {
                prop_assert!(cursor.any(|original| original == kept));
            }
        }
    }
}
