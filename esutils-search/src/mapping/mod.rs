//! Document mapping.
//!
//! A [`MappingType`] declares how one domain type is indexed: its document
//! type, id attribute and field mapping. [`DocumentMapper`] compiles that
//! declaration once and derives [`IndexedDocument`]s from live objects.

mod document;
mod field;
mod schema;

pub use document::IndexedDocument;
pub use field::{FieldMapping, FieldPath, FieldSpec, FieldType};
pub use schema::SchemaDescriptor;

use crate::config::SearchSettings;
use crate::datastore::Datastore;
use crate::error::{Result, SearchError};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Binds a domain type to a search engine document type.
///
/// # Example
///
/// ```rust
/// use esutils_search::{FieldMapping, FieldSpec, MappingType};
/// use serde::Serialize;
///
/// #[derive(Debug, Clone, Serialize)]
/// struct Article {
///     id: u64,
///     subject: String,
/// }
///
/// struct ArticleMapping;
///
/// impl MappingType for ArticleMapping {
///     type Model = Article;
///
///     fn model_name() -> &'static str {
///         "Article"
///     }
///
///     fn field_mapping() -> FieldMapping {
///         FieldMapping::new().field("subject", FieldSpec::text())
///     }
/// }
///
/// assert_eq!(ArticleMapping::document_type(), "article");
/// ```
pub trait MappingType: Send + Sync + 'static {
    /// The domain type.
    type Model: Serialize + Clone + Send + Sync + 'static;

    /// Name of the domain type.
    fn model_name() -> &'static str;

    /// Fields to index. These are also the only fields queries may reference.
    fn field_mapping() -> FieldMapping;

    /// Attribute holding the object's primary key.
    fn id_field() -> &'static str {
        "id"
    }

    /// Document type name, the lowercase model name by default.
    fn document_type() -> String {
        Self::model_name().to_lowercase()
    }

    /// Index the documents live in.
    fn index_name(settings: &SearchSettings) -> String {
        settings.index_default.clone()
    }
}

/// A compiled [`MappingType`] bound to its datastore.
pub struct DocumentMapper<M: MappingType> {
    index_name: String,
    document_type: String,
    id_path: FieldPath,
    paths: Vec<FieldPath>,
    mapping: FieldMapping,
    all_enabled: bool,
    source_enabled: bool,
    datastore: Arc<dyn Datastore<M::Model>>,
    _mapping_type: PhantomData<fn() -> M>,
}

impl<M: MappingType> DocumentMapper<M> {
    /// Compile the mapping type.
    ///
    /// An empty field mapping or an invalid field path is a configuration
    /// error.
    pub fn new(settings: &SearchSettings, datastore: Arc<dyn Datastore<M::Model>>) -> Result<Self> {
        let mapping = M::field_mapping();
        let document_type = M::document_type();

        if mapping.is_empty() {
            return Err(SearchError::Configuration(format!(
                "Mapping type {} declares no fields",
                document_type
            )));
        }
        if document_type.is_empty() {
            return Err(SearchError::Configuration(format!(
                "Mapping type for {} has an empty document type",
                M::model_name()
            )));
        }

        let id_path = FieldPath::parse(M::id_field())?;
        let paths = mapping
            .names()
            .map(FieldPath::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            index_name: M::index_name(settings),
            document_type,
            id_path,
            paths,
            mapping,
            all_enabled: settings.all_enabled,
            source_enabled: settings.source_enabled,
            datastore,
            _mapping_type: PhantomData,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    pub fn id_field(&self) -> &str {
        self.id_path.name()
    }

    pub fn field_mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// Whether queries may reference `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.mapping.contains(field)
    }

    pub fn field_spec(&self, field: &str) -> Option<&FieldSpec> {
        self.mapping.get(field)
    }

    pub fn datastore(&self) -> &Arc<dyn Datastore<M::Model>> {
        &self.datastore
    }

    /// The schema submitted for this document type.
    pub fn schema_descriptor(&self) -> SchemaDescriptor {
        SchemaDescriptor::new(self.mapping.clone()).storage(self.all_enabled, self.source_enabled)
    }

    /// The string form of an object's primary key.
    pub fn object_id(&self, object: &M::Model) -> Result<String> {
        let value = serde_json::to_value(object)?;
        self.id_from(&value)
    }

    /// Derive the document for an object. Pure.
    pub fn document_from(&self, object: &M::Model) -> Result<IndexedDocument> {
        let value = serde_json::to_value(object)?;
        let mut document = IndexedDocument::new(self.id_from(&value)?);

        document
            .fields
            .insert(self.id_path.name().to_string(), Value::String(document.id.clone()));
        for path in &self.paths {
            let field = path.resolve(&value)?.clone();
            document.fields.insert(path.name().to_string(), field);
        }

        Ok(document)
    }

    /// Derive the document for `object`, fetching it by `id` when absent.
    ///
    /// `id` is only consulted when `object` is `None`.
    pub async fn extract_document(
        &self,
        id: &str,
        object: Option<&M::Model>,
    ) -> Result<IndexedDocument> {
        match object {
            Some(object) => self.document_from(object),
            None => {
                let object = self.fetch(id).await?;
                self.document_from(&object)
            }
        }
    }

    /// Fetch an object from the datastore.
    pub async fn fetch(&self, id: &str) -> Result<M::Model> {
        self.datastore
            .fetch_by_id(id)
            .await?
            .ok_or_else(|| SearchError::ObjectNotFound {
                document_type: self.document_type.clone(),
                id: id.to_string(),
            })
    }

    fn id_from(&self, value: &Value) -> Result<String> {
        match self.id_path.resolve(value)? {
            Value::Null => Err(SearchError::AttributeMissing {
                field: self.id_path.name().to_string(),
                segment: self.id_path.segments().last().cloned().unwrap_or_default(),
            }),
            Value::String(id) => Ok(id.clone()),
            other => Ok(other.to_string()),
        }
    }
}

impl<M: MappingType> Clone for DocumentMapper<M> {
    fn clone(&self) -> Self {
        Self {
            index_name: self.index_name.clone(),
            document_type: self.document_type.clone(),
            id_path: self.id_path.clone(),
            paths: self.paths.clone(),
            mapping: self.mapping.clone(),
            all_enabled: self.all_enabled,
            source_enabled: self.source_enabled,
            datastore: Arc::clone(&self.datastore),
            _mapping_type: PhantomData,
        }
    }
}

impl<M: MappingType> fmt::Debug for DocumentMapper<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentMapper")
            .field("index_name", &self.index_name)
            .field("document_type", &self.document_type)
            .field("id_field", &self.id_path.name())
            .field("fields", &self.mapping.len())
            .finish()
    }
}
