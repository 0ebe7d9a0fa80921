//! Glob-importable entrypoints.
//!
//! `use tablecas::prelude::*;` brings in the table handles, the entity trait
//! and its macro, and the error types most callers match on.

pub use crate::{
    DynamicEntity, EntityKey, IndexedTable, InMemoryTable, OptimisticTable, Result, RetryPolicy,
    SequenceGenerator, TableEntity, TableError, TableQuery, TableStorage, table_entity,
};
