use std::collections::HashMap;

use bytes::Bytes;

use winstore_api::StoreError;

/// Per-`(key, window start)` sequence counters of one store instance.
///
/// The first sequence handed out for a bucket is 1; 0 is reserved for stores
/// that do not retain duplicates. With a retention period, buckets whose
/// window fell out of retention are forgotten, which keeps the map bounded
/// by the number of live windows. Forgotten buckets raise a floor: any bucket
/// without a counter continues above the highest sequence ever evicted, so a
/// late write to an evicted window never reuses a sequence.
#[derive(Debug, Default)]
pub(crate) struct SequenceTracker {
    counters: HashMap<(Bytes, i64), u32>,
    retention_ms: Option<i64>,
    observed_window_start: Option<i64>,
    /// Highest sequence of any evicted bucket.
    floor: u32,
}

impl SequenceTracker {
    pub(crate) fn new(retention_ms: Option<i64>) -> Self {
        Self {
            counters: HashMap::new(),
            retention_ms,
            observed_window_start: None,
            floor: 0,
        }
    }

    /// The sequence the next write to the bucket will use.
    pub(crate) fn peek_next(&self, key: &Bytes, window_start: i64) -> Result<u32, StoreError> {
        let current = self
            .counters
            .get(&(key.clone(), window_start))
            .copied()
            .unwrap_or(self.floor);
        current.checked_add(1).ok_or_else(|| {
            StoreError::usage(format!(
                "sequence space exhausted for window {window_start} of a {}-byte key",
                key.len()
            ))
        })
    }

    /// Record that `sequence` was used for the bucket.
    pub(crate) fn commit(&mut self, key: &Bytes, window_start: i64, sequence: u32) {
        self.counters.insert((key.clone(), window_start), sequence);

        let observed = self
            .observed_window_start
            .map_or(window_start, |seen| seen.max(window_start));
        self.observed_window_start = Some(observed);

        if let Some(retention) = self.retention_ms {
            let min_live = observed.saturating_sub(retention);
            let mut floor = self.floor;
            self.counters.retain(|(_, start), used| {
                let live = *start > min_live;
                if !live {
                    floor = floor.max(*used);
                }
                live
            });
            self.floor = floor;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.counters.clear();
        self.observed_window_start = None;
        self.floor = 0;
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.counters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &'static [u8]) -> Bytes {
        Bytes::from_static(k)
    }

    #[test]
    fn should_count_per_bucket_from_one() {
        // given
        let mut tracker = SequenceTracker::new(None);

        // when
        let a1 = tracker.peek_next(&key(b"a"), 0).unwrap();
        tracker.commit(&key(b"a"), 0, a1);
        let a2 = tracker.peek_next(&key(b"a"), 0).unwrap();
        tracker.commit(&key(b"a"), 0, a2);
        let b1 = tracker.peek_next(&key(b"b"), 0).unwrap();
        let a_other_window = tracker.peek_next(&key(b"a"), 10).unwrap();

        // then
        assert_eq!((a1, a2, b1, a_other_window), (1, 2, 1, 1));
    }

    #[test]
    fn should_not_advance_without_commit() {
        let tracker = SequenceTracker::new(None);

        assert_eq!(tracker.peek_next(&key(b"a"), 0).unwrap(), 1);
        assert_eq!(tracker.peek_next(&key(b"a"), 0).unwrap(), 1);
    }

    #[test]
    fn should_fail_when_sequence_space_is_exhausted() {
        // given
        let mut tracker = SequenceTracker::new(None);
        tracker.commit(&key(b"a"), 0, u32::MAX);

        // when
        let err = tracker.peek_next(&key(b"a"), 0).unwrap_err();

        // then
        assert!(err.is_fatal());
    }

    #[test]
    fn should_forget_buckets_outside_retention() {
        // given
        let mut tracker = SequenceTracker::new(Some(100));
        tracker.commit(&key(b"a"), 0, 1);
        tracker.commit(&key(b"a"), 50, 1);

        // when
        tracker.commit(&key(b"a"), 120, 1);

        // then
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.peek_next(&key(b"a"), 50).unwrap(), 2);
    }

    #[test]
    fn should_continue_above_evicted_sequences() {
        // given
        let mut tracker = SequenceTracker::new(Some(1_000));
        tracker.commit(&key(b"k"), 0, 1);
        tracker.commit(&key(b"k"), 0, 2);

        // when
        tracker.commit(&key(b"k"), 2_000, 1);
        let late = tracker.peek_next(&key(b"k"), 0).unwrap();
        let live = tracker.peek_next(&key(b"k"), 2_000).unwrap();

        // then
        assert_eq!(late, 3);
        assert_eq!(live, 2);
    }

    #[test]
    fn should_start_over_after_clear() {
        let mut tracker = SequenceTracker::new(Some(100));
        tracker.commit(&key(b"a"), 0, 7);
        tracker.commit(&key(b"a"), i64::MAX, 1);

        tracker.clear();

        assert_eq!(tracker.len(), 0);
        assert_eq!(tracker.peek_next(&key(b"a"), 0).unwrap(), 1);
    }
}
