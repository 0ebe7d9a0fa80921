/// Shared fixtures for the integration tests.
///
/// `ScriptedTable` wraps an `InMemoryTable` and can be told to fail the next
/// N writes with a chosen error, while recording every key it was asked to
/// write.
#[allow(dead_code)]
pub mod fixtures {
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use serde::{Deserialize, Serialize};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tablecas::{InMemoryTable, Mutator, Result, TableEntity, TableError, TableQuery, TableStorage};

    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Reading {
        pub partition_key: String,
        pub row_key: String,
        pub sensor: String,
        pub celsius: Option<f64>,
        pub note: Option<String>,
    }

    impl Reading {
        pub fn new(partition_key: &str, sensor: &str, celsius: f64) -> Self {
            Self {
                partition_key: partition_key.to_string(),
                row_key: String::new(),
                sensor: sensor.to_string(),
                celsius: Some(celsius),
                note: None,
            }
        }

        pub fn at(mut self, row_key: &str) -> Self {
            self.row_key = row_key.to_string();
            self
        }
    }

    tablecas::table_entity!(Reading);

    /// Failure injected into the next write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Fault {
        Conflict,
        Status(u16),
        Cancelled,
    }

    impl Fault {
        fn to_error(self) -> TableError {
            match self {
                Fault::Conflict => TableError::Conflict("scripted conflict".to_string()),
                Fault::Status(status) => TableError::storage_with_status(status, "scripted failure"),
                Fault::Cancelled => TableError::Cancelled,
            }
        }
    }

    pub struct ScriptedTable<T: TableEntity> {
        inner: InMemoryTable<T>,
        faults: Mutex<VecDeque<Fault>>,
        always_conflict: AtomicBool,
        race_winner: Mutex<Option<T>>,
        inserted_keys: Mutex<Vec<String>>,
        batches: Mutex<Vec<Vec<String>>>,
        get_calls: AtomicUsize,
        insert_calls: AtomicUsize,
        batch_calls: AtomicUsize,
        replace_calls: AtomicUsize,
        merge_calls: AtomicUsize,
    }

    impl<T: TableEntity> ScriptedTable<T> {
        pub fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                inner: InMemoryTable::new(name),
                faults: Mutex::new(VecDeque::new()),
                always_conflict: AtomicBool::new(false),
                race_winner: Mutex::new(None),
                inserted_keys: Mutex::new(Vec::new()),
                batches: Mutex::new(Vec::new()),
                get_calls: AtomicUsize::new(0),
                insert_calls: AtomicUsize::new(0),
                batch_calls: AtomicUsize::new(0),
                replace_calls: AtomicUsize::new(0),
                merge_calls: AtomicUsize::new(0),
            })
        }

        pub fn fail_next(&self, fault: Fault, times: usize) {
            let mut faults = self.faults.lock().unwrap();
            faults.extend(std::iter::repeat_n(fault, times));
        }

        pub fn conflict_forever(&self) {
            self.always_conflict.store(true, Ordering::SeqCst);
        }

        /// The next insert stores `winner` first and then reports a conflict,
        /// as if a concurrent writer got there between a read and the insert.
        pub fn lose_next_insert_to(&self, winner: T) {
            *self.race_winner.lock().unwrap() = Some(winner);
        }

        pub fn inner(&self) -> &InMemoryTable<T> {
            &self.inner
        }

        pub fn inserted_keys(&self) -> Vec<String> {
            self.inserted_keys.lock().unwrap().clone()
        }

        pub fn batches(&self) -> Vec<Vec<String>> {
            self.batches.lock().unwrap().clone()
        }

        pub fn get_calls(&self) -> usize {
            self.get_calls.load(Ordering::SeqCst)
        }

        pub fn insert_calls(&self) -> usize {
            self.insert_calls.load(Ordering::SeqCst)
        }

        pub fn batch_calls(&self) -> usize {
            self.batch_calls.load(Ordering::SeqCst)
        }

        pub fn replace_calls(&self) -> usize {
            self.replace_calls.load(Ordering::SeqCst)
        }

        pub fn merge_calls(&self) -> usize {
            self.merge_calls.load(Ordering::SeqCst)
        }

        fn next_fault(&self) -> Option<TableError> {
            if self.always_conflict.load(Ordering::SeqCst) {
                return Some(Fault::Conflict.to_error());
            }
            self.faults.lock().unwrap().pop_front().map(Fault::to_error)
        }
    }

    #[async_trait]
    impl<T: TableEntity> TableStorage<T> for ScriptedTable<T> {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn get(&self, partition_key: &str, row_key: &str) -> Result<Option<T>> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get(partition_key, row_key).await
        }

        async fn insert(&self, entity: &T) -> Result<()> {
            self.insert_calls.fetch_add(1, Ordering::SeqCst);
            self.inserted_keys
                .lock()
                .unwrap()
                .push(entity.row_key().to_string());
            let winner = self.race_winner.lock().unwrap().take();
            if let Some(winner) = winner {
                self.inner.insert_or_replace(&winner).await?;
                return Err(Fault::Conflict.to_error());
            }
            if let Some(err) = self.next_fault() {
                return Err(err);
            }
            self.inner.insert(entity).await
        }

        async fn insert_batch(&self, entities: &[T]) -> Result<()> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(
                entities
                    .iter()
                    .map(|entity| entity.row_key().to_string())
                    .collect(),
            );
            if let Some(err) = self.next_fault() {
                return Err(err);
            }
            self.inner.insert_batch(entities).await
        }

        async fn insert_or_replace(&self, entity: &T) -> Result<()> {
            self.inner.insert_or_replace(entity).await
        }

        async fn replace(
            &self,
            partition_key: &str,
            row_key: &str,
            mutator: Mutator<'_, T>,
        ) -> Result<Option<T>> {
            self.replace_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.next_fault() {
                return Err(err);
            }
            self.inner.replace(partition_key, row_key, mutator).await
        }

        async fn merge(
            &self,
            partition_key: &str,
            row_key: &str,
            mutator: Mutator<'_, T>,
        ) -> Result<Option<T>> {
            self.merge_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.merge(partition_key, row_key, mutator).await
        }

        fn scan(&self, query: TableQuery) -> BoxStream<'_, Result<T>> {
            self.inner.scan(query)
        }
    }
}
