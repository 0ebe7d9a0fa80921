use super::OptimisticTable;
use crate::conflict::is_conflict;
use crate::core::{Result, TableEntity, TableError, render_entity};
use tracing::{Level, event};

impl<T: TableEntity> OptimisticTable<T> {
    /// Keys every member of `entities` and inserts them as one atomic batch,
    /// re-keying the whole batch after each conflict.
    ///
    /// `generate(entity, attempt, index)` is called for every member on every
    /// attempt. The store does not say which member collided, so all of them
    /// get a new key. Allows `batch_max_retries` resubmissions from the policy.
    pub async fn insert_batch_with_generated_row_keys<F>(
        &self,
        entities: &mut [T],
        generate: F,
    ) -> Result<()>
    where
        F: FnMut(&T, u32, usize) -> String + Send,
    {
        self.insert_batch_with_max_retries(entities, generate, self.policy.batch_max_retries)
            .await
    }

    pub async fn insert_batch_with_max_retries<F>(
        &self,
        entities: &mut [T],
        mut generate: F,
        max_retries: u32,
    ) -> Result<()>
    where
        F: FnMut(&T, u32, usize) -> String + Send,
    {
        let mut attempt = 0u32;
        assign_row_keys(entities, &mut generate, attempt);

        loop {
            match self.storage.insert_batch(entities).await {
                Ok(()) => return Ok(()),
                Err(err) if is_conflict(&err) => {
                    if attempt >= max_retries {
                        break;
                    }
                    attempt += 1;
                    event!(
                        Level::DEBUG,
                        table = %self.table_name(),
                        batch_size = entities.len(),
                        attempt,
                        "batch collided, re-keying every member"
                    );
                    assign_row_keys(entities, &mut generate, attempt);
                }
                Err(err) => return Err(err),
            }
        }

        event!(
            Level::WARN,
            table = %self.table_name(),
            batch_size = entities.len(),
            max_retries,
            "batch insert gave up"
        );
        Err(TableError::RetryExhausted {
            operation: "insert_batch_with_generated_row_keys",
            attempts: max_retries.saturating_add(1),
            entity: render_batch(entities),
        })
    }
}

fn assign_row_keys<T, F>(entities: &mut [T], generate: &mut F, attempt: u32)
where
    T: TableEntity,
    F: FnMut(&T, u32, usize) -> String,
{
    for (index, entity) in entities.iter_mut().enumerate() {
        let row_key = generate(&*entity, attempt, index);
        entity.set_row_key(row_key);
    }
}

fn render_batch<T: TableEntity>(entities: &[T]) -> String {
    entities
        .iter()
        .enumerate()
        .map(|(index, entity)| format!("#{} {}", index, render_entity(entity)))
        .collect::<Vec<_>>()
        .join(" ")
}
