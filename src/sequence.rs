//! Monotonic counters persisted as a single row.

use crate::conflict::is_conflict;
use crate::core::{EntityKey, Result, TableEntity, TableError};
use crate::storage::TableStorage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Settings row holding a string-encoded value, e.g. a sequence counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupEntity {
    pub partition_key: String,
    pub row_key: String,
    pub value: String,
}

impl SetupEntity {
    pub fn new(
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            value: value.into(),
        }
    }
}

crate::table_entity!(SetupEntity);

/// Hands out unique, increasing values from a counter row.
///
/// Correctness rests on the store's compare-and-swap replace: concurrent
/// callers never observe the same value, and there is no attempt ceiling.
///
/// ```
/// use tablecas::{InMemoryTable, SequenceGenerator, SetupEntity};
///
/// # tokio_test::block_on(async {
/// let sequence = SequenceGenerator::new(InMemoryTable::<SetupEntity>::shared("setup"));
/// assert_eq!(sequence.next_id("ids", "orders", 100).await.unwrap(), "100");
/// assert_eq!(sequence.next_id("ids", "orders", 100).await.unwrap(), "101");
/// # });
/// ```
#[derive(Clone)]
pub struct SequenceGenerator {
    table: Arc<dyn TableStorage<SetupEntity>>,
}

impl SequenceGenerator {
    pub fn new(table: Arc<dyn TableStorage<SetupEntity>>) -> Self {
        Self { table }
    }

    /// Returns the counter value as stored before this call advanced it.
    ///
    /// The stored text comes back verbatim (`"007"` stays `"007"`); a corrupt
    /// value comes back as `start`.
    pub async fn next_id(&self, partition_key: &str, row_key: &str, start: i64) -> Result<String> {
        let (_, stored) = self.advance(partition_key, row_key, start).await?;
        Ok(stored)
    }

    /// Returns the counter's current value and stores its successor.
    ///
    /// A missing counter row is created holding `start`; losing that creation
    /// race to another caller is not an error. A stored value that does not
    /// parse as an integer is treated as `start`. A counter at `i64::MAX` is
    /// left as stored and the call fails with
    /// [`TableError::InvariantViolation`].
    pub async fn next_value(&self, partition_key: &str, row_key: &str, start: i64) -> Result<i64> {
        let (value, _) = self.advance(partition_key, row_key, start).await?;
        Ok(value)
    }

    async fn advance(&self, partition_key: &str, row_key: &str, start: i64) -> Result<(i64, String)> {
        let span = info_span!(
            "sequence.next_value",
            table = %self.table.name(),
            partition_key,
            row_key
        );

        async move {
            loop {
                let mut observed = (start, start.to_string());
                let mut overflowed = false;
                let mut bump = |mut row: SetupEntity| {
                    let (current, stored) = read_counter(&row, start);
                    match current.checked_add(1) {
                        Some(next) => {
                            observed = (current, stored);
                            overflowed = false;
                            row.value = next.to_string();
                        }
                        None => overflowed = true,
                    }
                    row
                };

                match self.table.replace(partition_key, row_key, &mut bump).await {
                    Ok(Some(_)) if overflowed => {
                        let key = EntityKey::new(partition_key, row_key);
                        event!(Level::WARN, key = %key, "sequence counter exhausted");
                        return Err(TableError::InvariantViolation(format!(
                            "sequence counter {} cannot advance past {}",
                            key,
                            i64::MAX
                        )));
                    }
                    Ok(Some(_)) => return Ok(observed),
                    Ok(None) => {}
                    Err(err) if is_conflict(&err) => continue,
                    Err(err) => return Err(err),
                }

                let seed = SetupEntity::new(partition_key, row_key, start.to_string());
                match self.table.insert(&seed).await {
                    Ok(()) => event!(Level::INFO, start, "counter row created"),
                    Err(err) if is_conflict(&err) => {
                        event!(Level::DEBUG, "counter row created concurrently")
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Parsed counter and the text it came from; `start` when the text is corrupt.
fn read_counter(row: &SetupEntity, start: i64) -> (i64, String) {
    match row.value.trim().parse::<i64>() {
        Ok(value) => (value, row.value.clone()),
        Err(err) => {
            event!(
                Level::WARN,
                key = %row.key(),
                value = %row.value,
                error = %err,
                start,
                "corrupted counter value, restarting sequence"
            );
            (start, start.to_string())
        }
    }
}
