use super::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A row addressed by `(partition key, row key)`.
///
/// `Default` stands in for zero-argument construction: protocols that need a
/// blank row (sequence bootstrap, schemaless merges) build one from it.
pub trait TableEntity:
    Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
    fn partition_key(&self) -> &str;
    fn row_key(&self) -> &str;
    fn set_partition_key(&mut self, partition_key: String);
    fn set_row_key(&mut self, row_key: String);

    fn key(&self) -> EntityKey {
        EntityKey::new(self.partition_key(), self.row_key())
    }
}

/// Implements [`TableEntity`] for a struct with `partition_key: String` and
/// `row_key: String` fields.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Order {
///     partition_key: String,
///     row_key: String,
///     amount: i64,
/// }
///
/// tablecas::table_entity!(Order);
/// ```
#[macro_export]
macro_rules! table_entity {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::TableEntity for $ty {
                fn partition_key(&self) -> &str {
                    &self.partition_key
                }

                fn row_key(&self) -> &str {
                    &self.row_key
                }

                fn set_partition_key(&mut self, partition_key: String) {
                    self.partition_key = partition_key;
                }

                fn set_row_key(&mut self, row_key: String) {
                    self.row_key = row_key;
                }
            }
        )+
    };
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub partition_key: String,
    pub row_key: String,
}

impl EntityKey {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.row_key)
    }
}

/// Renders every serialized field of `item` as `name=[value];` for diagnostics.
///
/// Items that serialize to a bare string render as that string.
pub fn render_entity<T: Serialize + ?Sized>(item: &T) -> String {
    let json = match serde_json::to_value(item) {
        Ok(json) => json,
        Err(err) => return format!("<unrenderable: {err}>"),
    };

    match json {
        serde_json::Value::String(s) => s,
        serde_json::Value::Object(fields) => {
            let mut out = String::new();
            for (name, value) in &fields {
                out.push_str(name);
                out.push_str("=[");
                out.push_str(&render_field(value));
                out.push_str("];");
            }
            out
        }
        other => render_field(&other),
    }
}

fn render_field(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Schemaless row: keys plus an ordered attribute map.
///
/// Attributes serialize flattened next to the keys, so a store-level merge
/// unions them attribute by attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicEntity {
    pub partition_key: String,
    pub row_key: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl DynamicEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }
}

table_entity!(DynamicEntity);
