//! Documents derived from domain objects.

use serde_json::{Map, Value};

/// The flattened, indexable form of one domain object.
///
/// Keys are mapping keys (`author.username` stays a single key). The id field
/// is always present and always a string.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    /// Document identifier.
    pub id: String,
    /// Field values keyed by mapping key.
    pub fields: Map<String, Value>,
}

impl IndexedDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Set a field value.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The document body sent to the engine.
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
