//! Field paths and field type descriptors.

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// A mapped field path compiled once per mapping.
///
/// `author.username` and `author__username` both read the `author` attribute
/// and then its `username`. Paths deeper than two segments are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    name: String,
    segments: Vec<String>,
}

impl FieldPath {
    /// Compile a mapping key.
    pub fn parse(name: &str) -> Result<Self> {
        let segments: Vec<String> = if name.contains("__") {
            name.split("__").map(str::to_string).collect()
        } else {
            name.split('.').map(str::to_string).collect()
        };

        if segments.iter().any(String::is_empty) {
            return Err(SearchError::Configuration(format!(
                "Invalid field path {:?}",
                name
            )));
        }
        if segments.len() > 2 {
            return Err(SearchError::Configuration(format!(
                "Field path {:?} nests deeper than one level",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            segments,
        })
    }

    /// The mapping key, also used as the document field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute names read in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the path traverses a related attribute.
    pub fn is_nested(&self) -> bool {
        self.segments.len() == 2
    }

    /// Read the value at this path from a serialized object.
    ///
    /// A missing attribute, or a null parent for a nested path, fails with
    /// [`SearchError::AttributeMissing`].
    pub fn resolve<'a>(&self, object: &'a Value) -> Result<&'a Value> {
        let mut current = object;

        for (depth, segment) in self.segments.iter().enumerate() {
            let next = current
                .as_object()
                .and_then(|fields| fields.get(segment))
                .ok_or_else(|| self.missing(segment))?;

            if depth + 1 < self.segments.len() && next.is_null() {
                return Err(self.missing(segment));
            }
            current = next;
        }

        Ok(current)
    }

    fn missing(&self, segment: &str) -> SearchError {
        SearchError::AttributeMissing {
            field: self.name.clone(),
            segment: segment.to_string(),
        }
    }
}

/// Field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Full-text searchable field.
    Text,
    /// Exact match keyword field.
    Keyword,
    /// 64-bit integer.
    Long,
    /// 32-bit integer.
    Integer,
    /// 16-bit integer.
    Short,
    /// Double precision float.
    Double,
    /// Single precision float.
    Float,
    /// Boolean.
    Boolean,
    /// Date.
    Date,
    /// Object.
    Object,
    /// Nested object.
    Nested,
}

impl FieldType {
    /// Engine name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Long => "long",
            FieldType::Integer => "integer",
            FieldType::Short => "short",
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Object => "object",
            FieldType::Nested => "nested",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Long
                | FieldType::Integer
                | FieldType::Short
                | FieldType::Double
                | FieldType::Float
        )
    }

    /// Whether free text can be searched against this type.
    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Keyword)
    }

    /// Whether values are tokenized before indexing.
    pub fn is_analyzed(&self) -> bool {
        matches!(self, FieldType::Text)
    }

    /// Turn a raw query term into a value of this type.
    ///
    /// Terms that do not parse are kept as strings so the engine reports the
    /// mismatch rather than the translator guessing.
    pub fn coerce(&self, raw: &str) -> Value {
        match self {
            FieldType::Long | FieldType::Integer | FieldType::Short => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| json!(raw)),
            FieldType::Double | FieldType::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| json!(raw)),
            FieldType::Boolean => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Value::Bool(true),
                "false" | "0" | "no" => Value::Bool(false),
                _ => json!(raw),
            },
            _ => json!(raw),
        }
    }
}

/// Field mapping definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Field type.
    pub field_type: FieldType,
    /// Analyzer.
    pub analyzer: Option<String>,
    /// Search analyzer.
    pub search_analyzer: Option<String>,
    /// Whether to index the field.
    pub index: Option<bool>,
    /// Whether to store the field.
    pub store: Option<bool>,
    /// Date format.
    pub format: Option<String>,
    /// Sub-properties for object and nested types.
    pub properties: Option<FieldMapping>,
}

impl FieldSpec {
    /// A field of the given type with no extra attributes.
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            analyzer: None,
            search_analyzer: None,
            index: None,
            store: None,
            format: None,
            properties: None,
        }
    }

    pub fn text() -> Self {
        Self::new(FieldType::Text)
    }

    pub fn keyword() -> Self {
        Self::new(FieldType::Keyword)
    }

    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    pub fn long() -> Self {
        Self::new(FieldType::Long)
    }

    pub fn double() -> Self {
        Self::new(FieldType::Double)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn nested(properties: FieldMapping) -> Self {
        Self {
            properties: Some(properties),
            ..Self::new(FieldType::Nested)
        }
    }

    /// Set analyzer.
    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    /// Set search analyzer.
    pub fn search_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.search_analyzer = Some(analyzer.into());
        self
    }

    /// Set whether the field is indexed.
    pub fn indexed(mut self, index: bool) -> Self {
        self.index = Some(index);
        self
    }

    /// Set whether the field is stored.
    pub fn stored(mut self, store: bool) -> Self {
        self.store = Some(store);
        self
    }

    /// Set date format.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn to_json(&self) -> Value {
        let mut field = Map::new();

        field.insert("type".to_string(), json!(self.field_type.as_str()));

        if let Some(analyzer) = &self.analyzer {
            field.insert("analyzer".to_string(), json!(analyzer));
        }
        if let Some(search_analyzer) = &self.search_analyzer {
            field.insert("search_analyzer".to_string(), json!(search_analyzer));
        }
        if let Some(index) = self.index {
            field.insert("index".to_string(), json!(index));
        }
        if let Some(store) = self.store {
            field.insert("store".to_string(), json!(store));
        }
        if let Some(format) = &self.format {
            field.insert("format".to_string(), json!(format));
        }
        if let Some(properties) = &self.properties {
            field.insert("properties".to_string(), properties.to_json());
        }

        Value::Object(field)
    }
}

/// Ordered mapping from field path to field spec.
///
/// Insertion order is kept; it is the order queries are composed in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMapping {
    fields: Vec<(String, FieldSpec)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. A repeated name replaces the earlier spec in place.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = spec,
            None => self.fields.push((name, spec)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, spec)| spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The `properties` object of a schema body.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for (name, spec) in &self.fields {
            properties.insert(name.clone(), spec.to_json());
        }
        Value::Object(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paths() {
        assert_eq!(FieldPath::parse("subject").unwrap().segments(), ["subject"]);
        assert_eq!(
            FieldPath::parse("author.username").unwrap().segments(),
            ["author", "username"]
        );
        assert_eq!(
            FieldPath::parse("author__username").unwrap().segments(),
            ["author", "username"]
        );
        assert!(FieldPath::parse("a.b.c").is_err());
        assert!(FieldPath::parse("author.").is_err());
        assert!(FieldPath::parse("").is_err());
    }

    #[test]
    fn test_resolve_nested() {
        let object = json!({"author": {"username": "bob"}, "category": null});

        let path = FieldPath::parse("author.username").unwrap();
        assert_eq!(path.resolve(&object).unwrap(), "bob");

        let path = FieldPath::parse("category__name").unwrap();
        let err = path.resolve(&object).unwrap_err();
        assert!(matches!(
            err,
            SearchError::AttributeMissing { ref segment, .. } if segment == "category"
        ));

        let path = FieldPath::parse("author.email").unwrap();
        let err = path.resolve(&object).unwrap_err();
        assert!(matches!(
            err,
            SearchError::AttributeMissing { ref segment, .. } if segment == "email"
        ));
    }

    #[test]
    fn test_coerce_by_type() {
        assert_eq!(FieldType::Integer.coerce("42"), json!(42));
        assert_eq!(FieldType::Integer.coerce("abc"), json!("abc"));
        assert_eq!(FieldType::Double.coerce("1.5"), json!(1.5));
        assert_eq!(FieldType::Boolean.coerce("yes"), json!(true));
        assert_eq!(FieldType::Keyword.coerce("42"), json!("42"));
    }

    #[test]
    fn test_mapping_keeps_order_and_replaces() {
        let mapping = FieldMapping::new()
            .field("subject", FieldSpec::text())
            .field("status", FieldSpec::keyword())
            .field("subject", FieldSpec::keyword());

        assert_eq!(mapping.names().collect::<Vec<_>>(), ["subject", "status"]);
        assert_eq!(
            mapping.get("subject").map(|s| s.field_type),
            Some(FieldType::Keyword)
        );
    }

    #[test]
    fn test_spec_json() {
        let spec = FieldSpec::date().format("strict_date_optional_time");
        assert_eq!(
            spec.to_json(),
            json!({"type": "date", "format": "strict_date_optional_time"})
        );

        let nested = FieldSpec::nested(FieldMapping::new().field("name", FieldSpec::keyword()));
        assert_eq!(
            nested.to_json(),
            json!({"type": "nested", "properties": {"name": {"type": "keyword"}}})
        );
    }
}
