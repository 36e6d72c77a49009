//! Schema descriptors submitted to the engine.

use super::field::{FieldMapping, FieldType};
use serde_json::{Value, json};

/// The schema of one document type.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    /// `_all` storage flag.
    pub all_enabled: bool,
    /// `_source` storage flag.
    pub source_enabled: bool,
    /// Mapped fields.
    pub properties: FieldMapping,
}

impl SchemaDescriptor {
    pub fn new(properties: FieldMapping) -> Self {
        Self {
            all_enabled: true,
            source_enabled: true,
            properties,
        }
    }

    /// Set the storage flags.
    pub fn storage(mut self, all_enabled: bool, source_enabled: bool) -> Self {
        self.all_enabled = all_enabled;
        self.source_enabled = source_enabled;
        self
    }

    /// Declared type of a field, if mapped.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.properties.get(name).map(|spec| spec.field_type)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "_all": { "enabled": self.all_enabled },
            "_source": { "enabled": self.source_enabled },
            "properties": self.properties.to_json(),
        })
    }
}
