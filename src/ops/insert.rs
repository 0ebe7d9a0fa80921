use super::OptimisticTable;
use crate::conflict::is_conflict;
use crate::core::{Result, TableEntity, TableError, render_entity};
use crate::keygen::{
    ClockTimeOrdinalKey, GeneratedKey, ORDINAL_KEY_SPACE, RowKeyDateTimeFormat, RowKeyGenerator,
    TimestampOrdinalKey,
};
use chrono::NaiveDateTime;
use tracing::{Instrument, Level, event, info_span};

impl<T: TableEntity> OptimisticTable<T> {
    /// Inserts `entity` under a row key drawn from `generator`, drawing a new
    /// key after every conflict.
    ///
    /// Attempt `n` (0-based) uses `generator.row_key(n)`. Non-conflict
    /// failures are returned as-is without a retry. After `max_attempts`
    /// conflicts the call fails with [`TableError::RetryExhausted`] carrying a
    /// dump of the entity's fields.
    pub async fn insert_with_generated_row_key<G>(
        &self,
        mut entity: T,
        generator: &mut G,
        max_attempts: u32,
    ) -> Result<T>
    where
        G: RowKeyGenerator + ?Sized,
    {
        for attempt in 0..max_attempts {
            entity.set_row_key(generator.row_key(attempt));

            match self.storage.insert(&entity).await {
                Ok(()) => return Ok(entity),
                Err(err) if is_conflict(&err) => {
                    event!(
                        Level::DEBUG,
                        table = %self.table_name(),
                        partition_key = %entity.partition_key(),
                        row_key = %entity.row_key(),
                        attempt,
                        "row key occupied, regenerating"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        event!(
            Level::WARN,
            table = %self.table_name(),
            partition_key = %entity.partition_key(),
            max_attempts,
            "no free row key found"
        );
        Err(TableError::RetryExhausted {
            operation: "insert_with_generated_row_key",
            attempts: max_attempts,
            entity: render_entity(&entity),
        })
    }

    /// Row key = formatted `timestamp` + 3-digit ordinal (`...000`, `...001`, ...).
    pub async fn insert_with_row_key_as_datetime(
        &self,
        entity: T,
        timestamp: NaiveDateTime,
        format: RowKeyDateTimeFormat,
    ) -> Result<T> {
        let mut generator = TimestampOrdinalKey::new(timestamp, format);
        self.insert_with_generated_row_key(entity, &mut generator, self.ordinal_attempts())
            .await
    }

    /// Row key = `HH:mm:ss.NNN` of `timestamp`.
    pub async fn insert_with_row_key_as_time(
        &self,
        entity: T,
        timestamp: NaiveDateTime,
    ) -> Result<T> {
        let mut generator = ClockTimeOrdinalKey::new(timestamp);
        self.insert_with_generated_row_key(entity, &mut generator, self.ordinal_attempts())
            .await
    }

    /// Row key = a fresh `generate()` result on every attempt.
    pub async fn insert_and_check_row_key<F>(&self, entity: T, generate: F) -> Result<T>
    where
        F: FnMut() -> String + Send,
    {
        let mut generator = GeneratedKey::new(generate);
        self.insert_with_generated_row_key(entity, &mut generator, self.policy.insert_max_attempts)
            .await
    }

    fn ordinal_attempts(&self) -> u32 {
        self.policy.insert_max_attempts.min(ORDINAL_KEY_SPACE)
    }

    /// Inserts `entity`, reporting an occupied key as `Ok(false)`.
    pub async fn try_insert(&self, entity: &T) -> Result<bool> {
        match self.storage.insert(entity).await {
            Ok(()) => Ok(true),
            Err(err) if is_conflict(&err) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Returns the row at `(partition_key, row_key)`, inserting `create_new()`
    /// when there is none.
    ///
    /// `create_new` is not called when the row already exists. When a
    /// concurrent caller wins the insert race, its row is returned and the
    /// locally created one is dropped, so `create_new` may run more than once
    /// while exactly one row ever lands in the table.
    ///
    /// ```
    /// use tablecas::{DynamicEntity, InMemoryTable, OptimisticTable};
    ///
    /// # tokio_test::block_on(async {
    /// let table = OptimisticTable::new(InMemoryTable::<DynamicEntity>::shared("profiles"));
    /// let first = table
    ///     .get_or_insert("eu", "alice", || DynamicEntity::new("eu", "alice").with("tier", "gold"))
    ///     .await
    ///     .unwrap();
    /// let second = table
    ///     .get_or_insert("eu", "alice", || DynamicEntity::new("eu", "alice").with("tier", "free"))
    ///     .await
    ///     .unwrap();
    /// assert_eq!(first, second);
    /// # });
    /// ```
    pub async fn get_or_insert<F>(
        &self,
        partition_key: &str,
        row_key: &str,
        mut create_new: F,
    ) -> Result<T>
    where
        F: FnMut() -> T + Send,
    {
        let span = info_span!(
            "table.get_or_insert",
            table = %self.table_name(),
            partition_key,
            row_key
        );

        async move {
            loop {
                if let Some(existing) = self.storage.get(partition_key, row_key).await? {
                    return Ok(existing);
                }

                let created = create_new();
                validate_created_key(&created, partition_key, row_key)?;

                if self.try_insert(&created).await? {
                    return Ok(created);
                }
                event!(Level::DEBUG, "lost insert race, re-reading");
            }
        }
        .instrument(span)
        .await
    }
}

fn validate_created_key<T: TableEntity>(
    created: &T,
    partition_key: &str,
    row_key: &str,
) -> Result<()> {
    if created.partition_key() != partition_key {
        return Err(TableError::InvariantViolation(format!(
            "created entity partition key ({}) should equal the partition key ({}) passed to get_or_insert",
            created.partition_key(),
            partition_key
        )));
    }
    if created.row_key() != row_key {
        return Err(TableError::InvariantViolation(format!(
            "created entity row key ({}) should equal the row key ({}) passed to get_or_insert",
            created.row_key(),
            row_key
        )));
    }
    Ok(())
}
