//! Secondary-index rows that point at one or more rows of a data table.

use crate::core::{EntityKey, Result, TableEntity};
use crate::storage::TableStorage;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Index row whose payload names rows of another table.
///
/// The pointers are weak: the index does not own the rows it names, and this
/// crate never creates, rewrites or deletes index rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiIndexEntity {
    pub partition_key: String,
    pub row_key: String,
    pub data: Vec<EntityKey>,
}

impl MultiIndexEntity {
    pub fn new(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        data: Vec<EntityKey>,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            data,
        }
    }

    pub fn pointers(&self) -> &[EntityKey] {
        &self.data
    }
}

crate::table_entity!(MultiIndexEntity);

/// Data table reached through a [`MultiIndexEntity`] index table.
pub struct IndexedTable<T: TableEntity> {
    index: Arc<dyn TableStorage<MultiIndexEntity>>,
    data: Arc<dyn TableStorage<T>>,
}

impl<T: TableEntity> Clone for IndexedTable<T> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: TableEntity> IndexedTable<T> {
    pub fn new(
        index: Arc<dyn TableStorage<MultiIndexEntity>>,
        data: Arc<dyn TableStorage<T>>,
    ) -> Self {
        Self { index, data }
    }

    /// Pointers stored at `(partition_key, row_key)`; empty when the index row is missing.
    pub async fn resolve(&self, partition_key: &str, row_key: &str) -> Result<Vec<EntityKey>> {
        Ok(self
            .index
            .get(partition_key, row_key)
            .await?
            .map(|index| index.data)
            .unwrap_or_default())
    }

    /// Row named by the first pointer. Remaining pointers are ignored.
    pub async fn get_first_or_default(
        &self,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Option<T>> {
        let pointers = self.resolve(partition_key, row_key).await?;
        let Some(first) = pointers.first() else {
            return Ok(None);
        };
        self.data.get(&first.partition_key, &first.row_key).await
    }

    /// Merges `mutate` into every row the index names and returns the first
    /// pointer's merged row.
    ///
    /// All merges run concurrently and are awaited to completion before the
    /// call returns, even when one of them fails; the first failure in pointer
    /// order is then reported. A missing or empty index row returns
    /// `Ok(None)` without touching the data table.
    pub async fn merge_all<F>(
        &self,
        partition_key: &str,
        row_key: &str,
        mutate: F,
    ) -> Result<Option<T>>
    where
        F: Fn(T) -> T + Send + Sync,
    {
        let span = info_span!(
            "index.merge_all",
            index = %self.index.name(),
            data = %self.data.name(),
            partition_key,
            row_key
        );

        async move {
            let pointers = self.resolve(partition_key, row_key).await?;
            if pointers.is_empty() {
                return Ok(None);
            }

            let mutate = &mutate;
            let merges = pointers.iter().map(|pointer| async move {
                let mut apply = |entity: T| mutate(entity);
                self.data
                    .merge(&pointer.partition_key, &pointer.row_key, &mut apply)
                    .await
            });
            let results = join_all(merges).await;
            event!(Level::DEBUG, copies = results.len(), "index fan-out merged");

            let mut first = None;
            for (position, result) in results.into_iter().enumerate() {
                let merged = result?;
                if position == 0 {
                    first = merged;
                }
            }
            Ok(first)
        }
        .instrument(span)
        .await
    }
}
