// ============================================================================
// tablecas: optimistic write protocols for partitioned key-value tables
// ============================================================================
//
// Rows are addressed by (partition key, row key). The store supplies atomic
// single-row insert, atomic batch insert, compare-and-swap replace and merge;
// everything in this crate is built from those primitives and a retry loop
// that only ever retries a key conflict.

pub mod config;
pub mod conflict;
pub mod core;
pub mod index;
pub mod keygen;
pub mod ops;
pub mod prelude;
pub mod sequence;
pub mod storage;

// Re-export main types for convenience
pub use core::{
    CONFLICT_STATUS, DynamicEntity, EntityKey, Result, TableEntity, TableError, Value,
    render_entity,
};

pub use config::{ConnectionSettings, RetryPolicy};
pub use conflict::{WriteFailure, classify_write_failure, is_conflict};
pub use index::{IndexedTable, MultiIndexEntity};
pub use keygen::{
    ClockTimeOrdinalKey, GeneratedKey, ORDINAL_KEY_SPACE, RowKeyDateTimeFormat, RowKeyGenerator,
    TimestampOrdinalKey, format_row_key_timestamp,
};
pub use ops::OptimisticTable;
pub use sequence::{SequenceGenerator, SetupEntity};
pub use storage::{InMemoryTable, KeyFilter, Mutator, TableQuery, TableStorage, ToIntervalOption};
