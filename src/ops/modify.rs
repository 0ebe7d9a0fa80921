use super::OptimisticTable;
use crate::conflict::is_conflict;
use crate::core::{Result, TableEntity, TableError, render_entity};
use tracing::{Level, event};

impl<T: TableEntity> OptimisticTable<T> {
    /// Applies `update` to the stored row, or inserts `create()` when there is none.
    ///
    /// Runs at most `modify_or_create_attempts` cycles of replace-then-insert.
    /// A replace that finds no row falls through to the insert; an insert that
    /// conflicts (someone created the row meanwhile) starts the next cycle.
    /// Any other failure is returned immediately. On exhaustion the error
    /// carries a dump of what `create()` would have inserted.
    #[deprecated(note = "use get_or_insert, or replace_entity for rows known to exist")]
    pub async fn modify_or_create<C, U>(
        &self,
        partition_key: &str,
        row_key: &str,
        create: C,
        mut update: U,
    ) -> Result<T>
    where
        C: Fn() -> T + Send,
        U: FnMut(&mut T) + Send,
    {
        let attempts = self.policy.modify_or_create_attempts;

        for attempt in 0..attempts {
            let mut apply = |mut entity: T| {
                update(&mut entity);
                entity
            };
            match self
                .storage
                .replace(partition_key, row_key, &mut apply)
                .await
            {
                Ok(Some(updated)) => return Ok(updated),
                Ok(None) => {}
                Err(err) if is_conflict(&err) => {
                    event!(Level::DEBUG, table = %self.table_name(), attempt, "replace conflicted");
                    continue;
                }
                Err(err) => return Err(err),
            }

            let created = create();
            match self.storage.insert(&created).await {
                Ok(()) => return Ok(created),
                Err(err) if is_conflict(&err) => {
                    event!(
                        Level::DEBUG,
                        table = %self.table_name(),
                        partition_key,
                        row_key,
                        attempt,
                        "row created concurrently, modifying instead"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(TableError::RetryExhausted {
            operation: "modify_or_create",
            attempts,
            entity: render_entity(&create()),
        })
    }

    /// Replaces the stored copy of `item` with `update(stored)`.
    ///
    /// Returns `Ok(None)` when the row no longer exists.
    pub async fn replace_entity<U>(&self, item: &T, mut update: U) -> Result<Option<T>>
    where
        U: FnMut(T) -> T + Send,
    {
        self.storage
            .replace(item.partition_key(), item.row_key(), &mut update)
            .await
    }
}
