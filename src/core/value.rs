use serde::{Deserialize, Serialize};

/// Attribute value carried by a schemaless entity.
///
/// Serialized untagged, so a stored attribute is a plain JSON scalar and a
/// `Null` attribute is skipped by a store-level merge. Variant order matters
/// for untagged deserialization: booleans and integers are tried before
/// floats and text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

macro_rules! value_from {
    ($($source:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Self::$variant(value.into())
                }
            }
        )+
    };
}

value_from! {
    bool => Boolean,
    i32 => Integer,
    i64 => Integer,
    f64 => Float,
    String => Text,
    &str => Text,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
