use super::engine::{Mutator, TableStorage};
use super::query::TableQuery;
use crate::core::{EntityKey, Result, TableEntity, TableError};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

struct StoredRow<T> {
    entity: T,
    etag: u64,
}

/// Sorted in-memory table.
///
/// `replace` and `merge` are optimistic the way a remote table is: the row is
/// read, mutated outside the lock and written back only if its etag is
/// unchanged, otherwise the cycle repeats.
pub struct InMemoryTable<T> {
    name: String,
    rows: RwLock<BTreeMap<EntityKey, StoredRow<T>>>,
    next_etag: AtomicU64,
}

impl<T: TableEntity> InMemoryTable<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(BTreeMap::new()),
            next_etag: AtomicU64::new(1),
        }
    }

    pub fn shared(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// All rows in key order.
    pub async fn entities(&self) -> Vec<T> {
        let rows = self.rows.read().await;
        rows.values().map(|row| row.entity.clone()).collect()
    }

    fn etag(&self) -> u64 {
        self.next_etag.fetch_add(1, Ordering::Relaxed)
    }

    fn conflict(&self, key: &EntityKey) -> TableError {
        TableError::Conflict(format!(
            "entity '{}' already exists in table '{}'",
            key, self.name
        ))
    }

    async fn read_row(&self, key: &EntityKey) -> Option<(T, u64)> {
        let rows = self.rows.read().await;
        rows.get(key).map(|row| (row.entity.clone(), row.etag))
    }

    /// Conditional write shared by `replace` and `merge`.
    async fn swap_if_unchanged<F>(&self, key: &EntityKey, mut apply: F) -> Result<Option<T>>
    where
        F: FnMut(T) -> Result<T> + Send,
    {
        loop {
            let Some((current, etag)) = self.read_row(key).await else {
                return Ok(None);
            };

            let mut updated = apply(current)?;
            updated.set_partition_key(key.partition_key.clone());
            updated.set_row_key(key.row_key.clone());

            let mut rows = self.rows.write().await;
            match rows.get_mut(key) {
                None => return Ok(None),
                Some(row) if row.etag != etag => continue,
                Some(row) => {
                    row.entity = updated.clone();
                    row.etag = self.etag();
                    return Ok(Some(updated));
                }
            }
        }
    }
}

/// Unions the serialized attributes of `updated` into `current`.
/// Null attributes in `updated` leave the stored value untouched.
fn merge_attributes<T: TableEntity>(current: &T, updated: &T) -> Result<T> {
    let mut base = serde_json::to_value(current)?;
    let patch = serde_json::to_value(updated)?;

    match (&mut base, patch) {
        (serde_json::Value::Object(fields), serde_json::Value::Object(patch_fields)) => {
            for (name, value) in patch_fields {
                if !value.is_null() {
                    fields.insert(name, value);
                }
            }
        }
        (_, patch) => base = patch,
    }

    Ok(serde_json::from_value(base)?)
}

#[async_trait]
impl<T: TableEntity> TableStorage<T> for InMemoryTable<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, partition_key: &str, row_key: &str) -> Result<Option<T>> {
        let key = EntityKey::new(partition_key, row_key);
        Ok(self.read_row(&key).await.map(|(entity, _)| entity))
    }

    async fn insert(&self, entity: &T) -> Result<()> {
        let key = entity.key();
        let mut rows = self.rows.write().await;
        if rows.contains_key(&key) {
            return Err(self.conflict(&key));
        }
        let etag = self.etag();
        rows.insert(
            key,
            StoredRow {
                entity: entity.clone(),
                etag,
            },
        );
        Ok(())
    }

    async fn insert_batch(&self, entities: &[T]) -> Result<()> {
        let mut rows = self.rows.write().await;

        let mut seen = BTreeSet::new();
        for entity in entities {
            let key = entity.key();
            if rows.contains_key(&key) || !seen.insert(key.clone()) {
                return Err(self.conflict(&key));
            }
        }

        for entity in entities {
            let etag = self.etag();
            rows.insert(
                entity.key(),
                StoredRow {
                    entity: entity.clone(),
                    etag,
                },
            );
        }
        Ok(())
    }

    async fn insert_or_replace(&self, entity: &T) -> Result<()> {
        let etag = self.etag();
        let mut rows = self.rows.write().await;
        rows.insert(
            entity.key(),
            StoredRow {
                entity: entity.clone(),
                etag,
            },
        );
        Ok(())
    }

    async fn replace(
        &self,
        partition_key: &str,
        row_key: &str,
        mutator: Mutator<'_, T>,
    ) -> Result<Option<T>> {
        let key = EntityKey::new(partition_key, row_key);
        self.swap_if_unchanged(&key, |current| Ok(mutator(current)))
            .await
    }

    async fn merge(
        &self,
        partition_key: &str,
        row_key: &str,
        mutator: Mutator<'_, T>,
    ) -> Result<Option<T>> {
        let key = EntityKey::new(partition_key, row_key);
        self.swap_if_unchanged(&key, |current| {
            let updated = mutator(current.clone());
            merge_attributes(&current, &updated)
        })
        .await
    }

    fn scan(&self, query: TableQuery) -> BoxStream<'_, Result<T>> {
        let snapshot = async move {
            let rows = self.rows.read().await;
            let limit = query.take.unwrap_or(usize::MAX);
            let matched: Vec<Result<T>> = rows
                .iter()
                .filter(|(key, _)| query.matches(&key.partition_key, &key.row_key))
                .take(limit)
                .map(|(_, row)| Ok(row.entity.clone()))
                .collect();
            stream::iter(matched)
        };
        stream::once(snapshot).flatten().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DynamicEntity, Value};
    use futures::TryStreamExt;

    fn row(pk: &str, rk: &str) -> DynamicEntity {
        DynamicEntity::new(pk, rk)
    }

    #[tokio::test]
    async fn test_insert_conflicts_on_occupied_key() {
        let table = InMemoryTable::new("rows");
        table.insert(&row("p", "r")).await.unwrap();

        let err = table.insert(&row("p", "r")).await.unwrap_err();
        assert!(matches!(err, TableError::Conflict(_)));
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let table = InMemoryTable::new("rows");
        table.insert(&row("p", "2")).await.unwrap();

        let batch = vec![row("p", "1"), row("p", "2"), row("p", "3")];
        assert!(table.insert_batch(&batch).await.is_err());
        assert_eq!(table.len().await, 1);

        let duplicate_inside = vec![row("p", "4"), row("p", "4")];
        assert!(table.insert_batch(&duplicate_inside).await.is_err());
        assert_eq!(table.len().await, 1);

        table.insert_batch(&[row("p", "1"), row("p", "3")]).await.unwrap();
        assert_eq!(table.len().await, 3);
    }

    #[tokio::test]
    async fn test_replace_missing_row_returns_none() {
        let table: InMemoryTable<DynamicEntity> = InMemoryTable::new("rows");
        let result = table
            .replace("p", "r", &mut |entity| entity.with("x", 1i64))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_replace_keeps_identity() {
        let table = InMemoryTable::new("rows");
        table.insert(&row("p", "r").with("x", 1i64)).await.unwrap();

        let replaced = table
            .replace("p", "r", &mut |mut entity: DynamicEntity| {
                entity.row_key = "hijacked".to_string();
                entity.remove("x");
                entity.with("y", 2i64)
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(replaced.row_key, "r");
        assert!(replaced.get("x").is_none());
        assert_eq!(table.get("p", "r").await.unwrap(), Some(replaced));
    }

    #[tokio::test]
    async fn test_merge_unions_attributes() {
        let table = InMemoryTable::new("rows");
        table
            .insert(&row("p", "r").with("a", 1i64).with("b", "keep"))
            .await
            .unwrap();

        let merged = table
            .merge("p", "r", &mut |_| {
                row("p", "r").with("a", 2i64).with("b", Value::Null).with("c", true)
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(merged.get("a"), Some(&Value::Integer(2)));
        assert_eq!(merged.get("b"), Some(&Value::Text("keep".into())));
        assert_eq!(merged.get("c"), Some(&Value::Boolean(true)));
    }

    #[tokio::test]
    async fn test_scan_is_sorted_and_filtered() {
        let table = InMemoryTable::new("rows");
        for (pk, rk) in [("b", "2"), ("a", "9"), ("b", "1"), ("c", "1")] {
            table.insert(&row(pk, rk)).await.unwrap();
        }

        let keys: Vec<String> = table
            .scan(TableQuery::partitions(["a", "b"]))
            .map_ok(|entity| entity.key().to_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(keys, vec!["a/9", "b/1", "b/2"]);

        let limited: Vec<DynamicEntity> = table
            .scan(TableQuery::all().take(2))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_insert_or_replace_overwrites() {
        let table = InMemoryTable::new("rows");
        table.insert(&row("p", "r").with("x", 1i64)).await.unwrap();
        table
            .insert_or_replace(&row("p", "r").with("y", 2i64))
            .await
            .unwrap();

        let stored = table.get("p", "r").await.unwrap().unwrap();
        assert!(stored.get("x").is_none());
        assert_eq!(stored.get("y"), Some(&Value::Integer(2)));
        assert_eq!(table.len().await, 1);
    }
}
