//! Unordered SRV record collection keyed by [`RecordIdentity`]
//!
//! Records are bucketed by identity in a `BTreeMap`, so iteration is always
//! sorted by identity. Within a bucket, records are compared on their full
//! identity fields; a hash collision between two distinct records keeps both.

use super::{RecordIdentity, SrvRecord};
use std::collections::BTreeMap;

/// Set of SRV records sharing one owner name
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    buckets: BTreeMap<RecordIdentity, Vec<SrvRecord>>,
}

impl RecordSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record
    ///
    /// If an equal record (ignoring TTL) is already present, only its TTL is
    /// replaced.
    pub fn add(&mut self, record: SrvRecord) {
        let bucket = self.buckets.entry(record.identity()).or_default();
        match bucket.iter_mut().find(|r| r.same_record(&record)) {
            Some(existing) => existing.ttl = record.ttl,
            None => {
                bucket.push(record);
                bucket.sort_by(SrvRecord::field_cmp);
            }
        }
    }

    /// Whether an equal record (ignoring TTL) is present
    pub fn contains(&self, record: &SrvRecord) -> bool {
        self.buckets
            .get(&record.identity())
            .is_some_and(|bucket| bucket.iter().any(|r| r.same_record(record)))
    }

    /// Records of `self` that are absent from `other`
    pub fn difference(&self, other: &RecordSet) -> RecordSet {
        self.iter()
            .filter(|record| !other.contains(record))
            .cloned()
            .collect()
    }

    /// Records of either set; on overlap the TTL from `other` wins
    pub fn union(&self, other: &RecordSet) -> RecordSet {
        let mut merged = self.clone();
        merged.extend(other.iter().cloned());
        merged
    }

    /// Whether both sets hold the same records, ignoring TTL
    pub fn equals(&self, other: &RecordSet) -> bool {
        self.len() == other.len() && self.iter().all(|record| other.contains(record))
    }

    /// Smallest TTL in the set, `None` when empty
    pub fn min_ttl(&self) -> Option<u32> {
        self.iter().map(|record| record.ttl).min()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Iterate in identity order
    pub fn iter(&self) -> impl Iterator<Item = &SrvRecord> {
        self.buckets.values().flatten()
    }

    /// Records in identity order
    pub fn to_vec(&self) -> Vec<SrvRecord> {
        self.iter().cloned().collect()
    }
}

impl PartialEq for RecordSet {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for RecordSet {}

impl FromIterator<SrvRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = SrvRecord>>(iter: I) -> Self {
        let mut set = RecordSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<SrvRecord> for RecordSet {
    fn extend<I: IntoIterator<Item = SrvRecord>>(&mut self, iter: I) {
        for record in iter {
            self.add(record);
        }
    }
}

impl IntoIterator for RecordSet {
    type Item = SrvRecord;
    type IntoIter = std::iter::Flatten<std::collections::btree_map::IntoValues<RecordIdentity, Vec<SrvRecord>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.into_values().flatten()
    }
}
