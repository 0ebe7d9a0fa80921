pub mod entity;
pub mod error;
pub mod value;

pub use entity::{DynamicEntity, EntityKey, TableEntity, render_entity};
pub use error::{CONFLICT_STATUS, Result, TableError};
pub use value::Value;
