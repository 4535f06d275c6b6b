//! Histogram model: bins counted by each source and their pairing across sources.
//!
//! A [`Histogram`] is what a [`crate::source::DataSource`] returns for one bin width. Two
//! histograms of the same width are combined by [`Histogram::merge`] into a
//! [`MergedHistogram`], whose [`MergedHistogram::unresolved_pairs`] are the ranges the
//! reconciler must look into more closely.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::bail;
use crate::error::{DiffResult, ErrorKind};

/// Integer identifier of a record, shared by both sources.
pub type RecordId = i64;

/// Record count observed over `[key, key + capacity)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bin {
    /// Inclusive lower bound of the bin.
    pub key: RecordId,
    /// Number of records observed in the bin.
    pub count: u64,
}

impl Bin {
    pub fn new(key: RecordId, count: u64) -> Self {
        Self { key, count }
    }

    /// Returns whether the bin holds as many records as its range can contain.
    pub fn is_full(&self, capacity: i64) -> bool {
        i64::try_from(self.count).is_ok_and(|count| count == capacity)
    }
}

/// Bins of equal width returned by a single histogram query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    bins: Vec<Bin>,
    bin_capacity: i64,
}

impl Histogram {
    /// Creates a histogram whose bins are all `bin_capacity` wide.
    pub fn new(bins: Vec<Bin>, bin_capacity: i64) -> Self {
        debug_assert!(bin_capacity > 0, "bin capacity must be positive");

        Self { bins, bin_capacity }
    }

    /// Creates a histogram without any bins.
    pub fn empty(bin_capacity: i64) -> Self {
        Self::new(Vec::new(), bin_capacity)
    }

    /// Counts `ids` into bins of width `bin_capacity`. Duplicate identifiers are counted
    /// once per occurrence, as a database `COUNT(*)` would.
    ///
    /// Fails with [`ErrorKind::InvalidData`] for an identifier whose bin does not fit in
    /// the identifier range, see [`bin_key`].
    pub fn from_ids<I>(ids: I, bin_capacity: i64) -> DiffResult<Self>
    where
        I: IntoIterator<Item = RecordId>,
    {
        let mut counts: BTreeMap<RecordId, u64> = BTreeMap::new();
        for id in ids {
            let Some(key) = bin_key(id, bin_capacity) else {
                bail!(
                    ErrorKind::InvalidData,
                    "Identifier is outside of the supported range",
                    format!("identifier {id} does not fit in a bin of width {bin_capacity}")
                );
            };
            *counts.entry(key).or_default() += 1;
        }

        let bins = counts
            .into_iter()
            .map(|(key, count)| Bin::new(key, count))
            .collect();

        Ok(Self::new(bins, bin_capacity))
    }

    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    pub fn bin_capacity(&self) -> i64 {
        self.bin_capacity
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Sum of the counts of all bins.
    pub fn total_count(&self) -> u64 {
        self.bins.iter().map(|bin| bin.count).sum()
    }

    /// Pairs the bins of `self` (the primary side) with the bins of `secondary`.
    ///
    /// Both histograms must share the same bin capacity; the capacity of `self` is used
    /// for the result.
    pub fn merge(&self, secondary: &Histogram) -> MergedHistogram {
        debug_assert_eq!(
            self.bin_capacity, secondary.bin_capacity,
            "merged histograms must share the bin capacity"
        );

        let mut bin_pairs = PairedBins::default();
        bin_pairs.insert_primary_counts(&self.bins);
        bin_pairs.upsert_secondary_counts(&secondary.bins);

        MergedHistogram {
            bin_pairs,
            bin_capacity: self.bin_capacity,
        }
    }
}

/// Returns the key of the bin of width `capacity` that contains `id`.
///
/// Keys are multiples of `capacity`; negative identifiers round towards negative infinity.
/// Returns `None` when the bin `[key, key + capacity)` is not representable as
/// [`RecordId`]s, which happens for identifiers within `capacity` of either end of the
/// `i64` range.
pub fn bin_key(id: RecordId, capacity: i64) -> Option<RecordId> {
    let key = id.div_euclid(capacity).checked_mul(capacity)?;
    key.checked_add(capacity)?;

    Some(key)
}

/// Counts observed by both sources for the same key range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairedBin {
    pub key: RecordId,
    pub count_from_primary: u64,
    pub count_from_secondary: u64,
}

impl PairedBin {
    /// Returns whether both sides hold exactly `capacity` records in this range.
    ///
    /// With contiguous identifiers a full pair holds every identifier of the range on
    /// both sides. Any other combination, including equal counts below capacity, leaves
    /// the pair unresolved.
    pub fn is_full(&self, capacity: i64) -> bool {
        Bin::new(self.key, self.count_from_primary).is_full(capacity)
            && Bin::new(self.key, self.count_from_secondary).is_full(capacity)
    }

    /// Primary count minus secondary count.
    pub fn diff_count(&self) -> i64 {
        self.count_from_primary as i64 - self.count_from_secondary as i64
    }

    /// Exclusive upper bound of the range covered by this pair, or `None` past `i64::MAX`.
    pub fn upper_bound(&self, capacity: i64) -> Option<RecordId> {
        self.key.checked_add(capacity)
    }
}

/// Paired bins keyed by their lower bound, in ascending key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairedBins(BTreeMap<RecordId, PairedBin>);

impl PairedBins {
    /// Records the primary counts of `bins`, resetting the secondary count of each key.
    ///
    /// Returns the keys that were not present before this call.
    pub fn insert_primary_counts(&mut self, bins: &[Bin]) -> Vec<RecordId> {
        let mut inserted = Vec::new();

        for bin in bins {
            let pair = PairedBin {
                key: bin.key,
                count_from_primary: bin.count,
                count_from_secondary: 0,
            };

            if self.0.insert(bin.key, pair).is_none() {
                inserted.push(bin.key);
            }
        }

        inserted
    }

    /// Records the secondary counts of `bins`, creating pairs with a zero primary count
    /// for keys the primary side did not report.
    ///
    /// Returns the keys that were not present before this call.
    pub fn upsert_secondary_counts(&mut self, bins: &[Bin]) -> Vec<RecordId> {
        let mut inserted = Vec::new();

        for bin in bins {
            match self.0.entry(bin.key) {
                Entry::Occupied(mut entry) => {
                    entry.get_mut().count_from_secondary = bin.count;
                }
                Entry::Vacant(entry) => {
                    entry.insert(PairedBin {
                        key: bin.key,
                        count_from_primary: 0,
                        count_from_secondary: bin.count,
                    });
                    inserted.push(bin.key);
                }
            }
        }

        inserted
    }

    pub fn get(&self, key: RecordId) -> Option<&PairedBin> {
        self.0.get(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = &PairedBin> {
        self.0.values()
    }
}

/// Result of merging a primary and a secondary histogram of equal bin capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedHistogram {
    bin_pairs: PairedBins,
    bin_capacity: i64,
}

impl MergedHistogram {
    pub fn bin_pairs(&self) -> &PairedBins {
        &self.bin_pairs
    }

    pub fn bin_capacity(&self) -> i64 {
        self.bin_capacity
    }

    /// Returns the pairs that are not full, in ascending key order.
    pub fn unresolved_pairs(&self) -> Vec<PairedBin> {
        self.bin_pairs
            .iter()
            .filter(|pair| !pair.is_full(self.bin_capacity))
            .copied()
            .collect()
    }

    /// Returns whether every pair is full.
    pub fn is_resolved(&self) -> bool {
        self.bin_pairs
            .iter()
            .all(|pair| pair.is_full(self.bin_capacity))
    }
}
