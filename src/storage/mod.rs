pub mod engine;
pub mod memory;
pub mod query;

pub use engine::{Mutator, TableStorage};
pub use memory::InMemoryTable;
pub use query::{KeyFilter, TableQuery, ToIntervalOption};
