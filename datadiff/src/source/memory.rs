use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::DiffResult;
use crate::histogram::{Histogram, RecordId};
use crate::source::DataSource;

/// In-process source over a fixed identifier set.
///
/// Used for dry runs of a configuration and as the backing store of tests. Cloning shares
/// the same set.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    ids: Arc<BTreeSet<RecordId>>,
}

impl MemorySource {
    pub fn new<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = RecordId>,
    {
        Self {
            ids: Arc::new(ids.into_iter().collect()),
        }
    }

    /// Creates a source holding every identifier in `[gte, lt)`.
    pub fn contiguous(gte: RecordId, lt: RecordId) -> Self {
        Self::new(gte..lt)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl DataSource for MemorySource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_histogram_all(&self, interval: i64) -> DiffResult<Histogram> {
        Histogram::from_ids(self.ids.iter().copied(), interval)
    }

    async fn fetch_histogram_range(
        &self,
        gte: RecordId,
        lt: RecordId,
        interval: i64,
    ) -> DiffResult<Histogram> {
        if gte >= lt {
            return Ok(Histogram::empty(interval));
        }

        Histogram::from_ids(self.ids.range(gte..lt).copied(), interval)
    }

    async fn fetch_id_range(&self, gte: RecordId, lt: RecordId) -> DiffResult<Vec<RecordId>> {
        if gte >= lt {
            return Ok(Vec::new());
        }

        Ok(self.ids.range(gte..lt).copied().collect())
    }
}
