//! Optimistic write protocols over a single table.
//!
//! Every protocol here leans on the store's atomic insert and compare-and-swap
//! primitives; nothing takes a client-side lock around a store call. Only a
//! [`Conflict`](crate::TableError::Conflict) is ever retried, and retries are
//! issued back to back without delay.

mod batch;
mod insert;
mod modify;
mod scan;

use crate::config::RetryPolicy;
use crate::core::TableEntity;
use crate::storage::TableStorage;
use std::sync::Arc;

/// A table handle carrying the retrying insert, batch, modify and scan protocols.
pub struct OptimisticTable<T: TableEntity> {
    storage: Arc<dyn TableStorage<T>>,
    policy: RetryPolicy,
}

impl<T: TableEntity> Clone for OptimisticTable<T> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            policy: self.policy.clone(),
        }
    }
}

impl<T: TableEntity> OptimisticTable<T> {
    pub fn new(storage: Arc<dyn TableStorage<T>>) -> Self {
        Self::with_policy(storage, RetryPolicy::default())
    }

    pub fn with_policy(storage: Arc<dyn TableStorage<T>>, policy: RetryPolicy) -> Self {
        Self { storage, policy }
    }

    pub fn storage(&self) -> &Arc<dyn TableStorage<T>> {
        &self.storage
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn table_name(&self) -> &str {
        self.storage.name()
    }
}
