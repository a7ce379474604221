use std::collections::HashSet;

/// Matched values already reported in the current cycle. Exact-string equality.
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self, value: &str) -> bool {
        self.seen.contains(value)
    }

    /// Returns `true` when `value` had not been recorded before.
    pub fn record(&mut self, value: &str) -> bool {
        if self.seen.contains(value) {
            return false;
        }
        self.seen.insert(value.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn records_each_value_once() {
        let mut dedup = Deduplicator::new();
        assert!(!dedup.seen("ERROR"));
        assert!(dedup.record("ERROR"));
        assert!(dedup.seen("ERROR"));
        assert!(!dedup.record("ERROR"));
        assert!(dedup.record("error"));
        assert_eq!(dedup.len(), 2);
    }

    proptest! {
        #[test]
        fn accepted_values_are_exactly_the_distinct_inputs(
            values in proptest::collection::vec("[a-c]{1,3}", 0..50),
        ) {
            let mut dedup = Deduplicator::new();
            let accepted: Vec<_> = values
                .iter()
                .filter(|value| dedup.record(value))
                .cloned()
                .collect();
            let distinct: HashSet<_> = values.iter().cloned().collect();
            prop_assert_eq!(accepted.len(), distinct.len());
            prop_assert_eq!(dedup.len(), distinct.len());
        }
    }
}
