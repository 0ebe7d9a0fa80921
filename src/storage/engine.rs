use super::query::TableQuery;
use crate::core::{Result, TableEntity};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// In-place transformation handed to [`TableStorage::replace`] and [`TableStorage::merge`].
///
/// The store may call it more than once when it has to re-read a row that
/// changed underneath it; only the last call's output is persisted.
pub type Mutator<'a, T> = &'a mut (dyn FnMut(T) -> T + Send);

/// Table storage collaborator.
///
/// Transport, transient-fault retries and timeouts belong to the implementor.
/// A write that hits an occupied key must fail with
/// [`TableError::Conflict`](crate::TableError::Conflict) (or a `Storage`
/// error carrying status 409); protocols built on top retry only that.
#[async_trait]
pub trait TableStorage<T: TableEntity>: Send + Sync {
    /// Table name, used in diagnostics.
    fn name(&self) -> &str;

    /// Returns `None` for a missing row; absence is never an error.
    async fn get(&self, partition_key: &str, row_key: &str) -> Result<Option<T>>;

    /// Fails with `Conflict` when the key is already occupied.
    async fn insert(&self, entity: &T) -> Result<()>;

    /// All-or-nothing. A `Conflict` applies to the batch as a whole and does not
    /// say which member collided.
    async fn insert_batch(&self, entities: &[T]) -> Result<()>;

    async fn insert_or_replace(&self, entity: &T) -> Result<()>;

    /// Compare-and-swap replace. `Ok(None)` means the row does not exist.
    async fn replace(
        &self,
        partition_key: &str,
        row_key: &str,
        mutator: Mutator<'_, T>,
    ) -> Result<Option<T>>;

    /// Attribute-level merge into the stored row. `Ok(None)` means the row does not exist.
    async fn merge(
        &self,
        partition_key: &str,
        row_key: &str,
        mutator: Mutator<'_, T>,
    ) -> Result<Option<T>>;

    /// Lazy scan in `(partition key, row key)` order. Each call starts a fresh scan.
    fn scan(&self, query: TableQuery) -> BoxStream<'_, Result<T>>;
}
