use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{
    error::CatalogError,
    records::{Record, RecordId},
};

/// Simulated service latency per operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyProfile {
    /// Listing every record.
    pub list: Duration,
    /// Fetching one record by id.
    pub get: Duration,
    /// Filtered reads (by course, lesson, category).
    pub query: Duration,
    /// Creating a record.
    pub create: Duration,
    /// Updating a record.
    pub update: Duration,
    /// Deleting a record.
    pub delete: Duration,
}

impl Default for LatencyProfile {
    fn default() -> Self {
        Self {
            list: Duration::from_millis(300),
            get: Duration::from_millis(200),
            query: Duration::from_millis(250),
            create: Duration::from_millis(500),
            update: Duration::from_millis(400),
            delete: Duration::from_millis(300),
        }
    }
}

impl LatencyProfile {
    /// No delays at all.
    #[must_use]
    pub const fn instant() -> Self {
        Self {
            list: Duration::ZERO,
            get: Duration::ZERO,
            query: Duration::ZERO,
            create: Duration::ZERO,
            update: Duration::ZERO,
            delete: Duration::ZERO,
        }
    }

    /// Default delays multiplied by `factor` (negative counts as zero).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn scaled(factor: f64) -> Self {
        let factor = factor.max(0.0);
        let base = Self::default();
        let scale = |d: Duration| Duration::from_nanos((d.as_nanos() as f64 * factor).round() as u64);
        Self {
            list: scale(base.list),
            get: scale(base.get),
            query: scale(base.query),
            create: scale(base.create),
            update: scale(base.update),
            delete: scale(base.delete),
        }
    }
}

pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Async CRUD access to one kind of catalog record.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Every record, in stored order.
    async fn get_all(&self) -> Result<Vec<T>, CatalogError>;
    /// One record by id.
    async fn get_by_id(&self, id: RecordId) -> Result<T, CatalogError>;
    /// Stores a new record under the next free id.
    async fn create(&self, draft: T::Draft) -> Result<T, CatalogError>;
    /// Merges a patch into an existing record.
    async fn update(&self, id: RecordId, patch: T::Patch) -> Result<T, CatalogError>;
    /// Removes a record, returning it.
    async fn delete(&self, id: RecordId) -> Result<T, CatalogError>;
}

/// Session-scoped in-memory repository. Reads hand out clones, so callers
/// never alias stored state.
#[derive(Debug)]
pub struct MemoryRepository<T> {
    records: RwLock<Vec<T>>,
    latency: LatencyProfile,
}

impl<T: Record> MemoryRepository<T> {
    /// Repository seeded with `records`.
    #[must_use]
    pub fn new(records: Vec<T>, latency: LatencyProfile) -> Self {
        Self {
            records: RwLock::new(records),
            latency,
        }
    }

    /// Delays applied by this repository.
    #[must_use]
    pub const fn latency(&self) -> LatencyProfile {
        self.latency
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Records matching `predicate`, after the filtered-read delay.
    pub async fn query<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool + Send,
    {
        pause(self.latency.query).await;
        self.records
            .read()
            .iter()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }

    /// Applies `change` to the record with `id` without any delay.
    pub(crate) fn modify<R>(
        &self,
        id: RecordId,
        change: impl FnOnce(&mut T) -> R,
    ) -> Result<R, CatalogError> {
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|record| record.id() == id)
            .ok_or(CatalogError::NotFound { kind: T::KIND, id })?;
        Ok(change(record))
    }

    fn next_id(records: &[T]) -> RecordId {
        records.iter().map(Record::id).max().map_or(1, |max| max + 1)
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn get_all(&self) -> Result<Vec<T>, CatalogError> {
        pause(self.latency.list).await;
        Ok(self.records.read().clone())
    }

    async fn get_by_id(&self, id: RecordId) -> Result<T, CatalogError> {
        pause(self.latency.get).await;
        self.records
            .read()
            .iter()
            .find(|record| record.id() == id)
            .cloned()
            .ok_or(CatalogError::NotFound { kind: T::KIND, id })
    }

    async fn create(&self, draft: T::Draft) -> Result<T, CatalogError> {
        pause(self.latency.create).await;
        let mut records = self.records.write();
        let record = T::from_draft(Self::next_id(&records), draft);
        records.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: RecordId, patch: T::Patch) -> Result<T, CatalogError> {
        pause(self.latency.update).await;
        self.modify(id, |record| {
            record.apply(patch);
            record.clone()
        })
    }

    async fn delete(&self, id: RecordId) -> Result<T, CatalogError> {
        pause(self.latency.delete).await;
        let mut records = self.records.write();
        let index = records
            .iter()
            .position(|record| record.id() == id)
            .ok_or(CatalogError::NotFound { kind: T::KIND, id })?;
        Ok(records.remove(index))
    }
}
