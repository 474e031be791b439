use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `topic → (partition → offset)` as it travels on the wire.
pub type PositionMap = BTreeMap<String, BTreeMap<i32, i64>>;

/// Highest input offset reflected in a store, per source topic partition.
///
/// A position is never mutated in place: every operation returns a new value.
/// `merge` is a join (per-entry maximum), so it is commutative, associative and
/// idempotent, and `Position::empty()` is its identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PositionMap", into = "PositionMap")]
pub struct Position {
    positions: PositionMap,
}

impl Position {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a raw map. Topics without partitions are dropped so that
    /// equal positions compare equal.
    pub fn from_map(map: PositionMap) -> Self {
        let positions = map
            .into_iter()
            .filter(|(_, partitions)| !partitions.is_empty())
            .collect();
        Self { positions }
    }

    /// A copy of this position advanced to `offset` for `(topic, partition)`.
    /// Never moves an entry backwards.
    pub fn with_component(&self, topic: &str, partition: i32, offset: i64) -> Self {
        let mut positions = self.positions.clone();
        let slot = positions
            .entry(topic.to_string())
            .or_default()
            .entry(partition)
            .or_insert(offset);
        *slot = (*slot).max(offset);
        Self { positions }
    }

    pub fn merge(&self, other: &Position) -> Self {
        let mut positions = self.positions.clone();
        for (topic, partitions) in &other.positions {
            let merged = positions.entry(topic.clone()).or_default();
            for (&partition, &offset) in partitions {
                let slot = merged.entry(partition).or_insert(offset);
                *slot = (*slot).max(offset);
            }
        }
        Self { positions }
    }

    /// True when every entry of `other` is at or below the matching entry here.
    pub fn dominates(&self, other: &Position) -> bool {
        other.positions.iter().all(|(topic, partitions)| {
            partitions.iter().all(|(partition, offset)| {
                self.offset(topic, *partition).is_some_and(|own| own >= *offset)
            })
        })
    }

    pub fn offset(&self, topic: &str, partition: i32) -> Option<i64> {
        self.positions.get(topic)?.get(&partition).copied()
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    pub fn partition_positions(&self, topic: &str) -> Option<&BTreeMap<i32, i64>> {
        self.positions.get(topic)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl From<PositionMap> for Position {
    fn from(map: PositionMap) -> Self {
        Self::from_map(map)
    }
}

impl From<Position> for PositionMap {
    fn from(position: Position) -> Self {
        position.positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(entries: &[(&str, i32, i64)]) -> Position {
        entries
            .iter()
            .fold(Position::empty(), |p, (topic, partition, offset)| {
                p.with_component(topic, *partition, *offset)
            })
    }

    #[test]
    fn should_keep_highest_offset_per_partition() {
        // given
        let p = position(&[("input", 0, 5)]);

        // when
        let advanced = p.with_component("input", 0, 9);
        let stale = advanced.with_component("input", 0, 3);

        // then
        assert_eq!(p.offset("input", 0), Some(5));
        assert_eq!(advanced.offset("input", 0), Some(9));
        assert_eq!(stale.offset("input", 0), Some(9));
    }

    #[test]
    fn should_merge_by_taking_per_entry_maximum() {
        // given
        let a = position(&[("input", 0, 5), ("input", 1, 2)]);
        let b = position(&[("input", 0, 3), ("other", 0, 7)]);

        // when
        let merged = a.merge(&b);

        // then
        assert_eq!(merged, position(&[("input", 0, 5), ("input", 1, 2), ("other", 0, 7)]));
    }

    #[test]
    fn should_merge_commutatively_and_idempotently() {
        // given
        let a = position(&[("t", 0, 1), ("t", 1, 8)]);
        let b = position(&[("t", 0, 4), ("u", 3, 2)]);
        let c = position(&[("u", 3, 9)]);

        // then
        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        assert_eq!(a.merge(&a), a);
        assert_eq!(a.merge(&Position::empty()), a);
        assert_eq!(Position::empty().merge(&a), a);
    }

    #[test]
    fn should_drop_empty_topics_from_raw_map() {
        // given
        let mut map = PositionMap::new();
        map.insert("empty".to_string(), BTreeMap::new());

        // when
        let p = Position::from_map(map);

        // then
        assert!(p.is_empty());
        assert_eq!(p, Position::empty());
    }

    #[test]
    fn should_dominate_older_positions() {
        // given
        let newer = position(&[("t", 0, 10), ("t", 1, 4)]);
        let older = position(&[("t", 0, 7)]);

        // then
        assert!(newer.dominates(&older));
        assert!(!older.dominates(&newer));
        assert!(newer.dominates(&Position::empty()));
    }

    #[test]
    fn should_serialize_as_nested_json_map() {
        // given
        let p = position(&[("input", 0, 1)]);

        // when
        let json = serde_json::to_string(&p).unwrap();
        let back: Position = serde_json::from_str(&json).unwrap();

        // then
        assert_eq!(json, r#"{"input":{"0":1}}"#);
        assert_eq!(back, p);
    }
}
