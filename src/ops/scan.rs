use super::OptimisticTable;
use crate::core::{Result, TableEntity, TableError};
use crate::storage::TableQuery;
use futures::TryStreamExt;
use futures::future::try_join_all;
use std::sync::Mutex;

impl<T: TableEntity> OptimisticTable<T> {
    /// Runs `query` once per partition, all partitions concurrently, and
    /// gathers the rows into one list.
    ///
    /// Rows keep key order within a partition; partitions land in completion
    /// order. The first failing scan fails the whole call.
    pub async fn scan_partitions<I, S>(&self, partition_keys: I, query: TableQuery) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collected = Mutex::new(Vec::new());

        let scans = partition_keys.into_iter().map(|partition_key| {
            let query = query.clone().in_partition(partition_key);
            let collected = &collected;
            async move {
                let rows: Vec<T> = self.storage.scan(query).try_collect().await?;
                collected.lock()?.extend(rows);
                Ok::<(), TableError>(())
            }
        });
        try_join_all(scans).await?;

        Ok(collected.into_inner()?)
    }

    /// Streams `query` and keeps the rows accepted by `condition`.
    pub async fn scan_and_collect<F>(&self, query: TableQuery, condition: F) -> Result<Vec<T>>
    where
        F: Fn(&T) -> bool + Send,
    {
        let mut rows = self.storage.scan(query);
        let mut matched = Vec::new();
        while let Some(entity) = rows.try_next().await? {
            if condition(&entity) {
                matched.push(entity);
            }
        }
        Ok(matched)
    }

    /// Every row with `row_key`, across all partitions.
    pub async fn get_by_row_key(&self, row_key: &str) -> Result<Vec<T>> {
        self.storage
            .scan(TableQuery::all().row_key(row_key))
            .try_collect()
            .await
    }
}
