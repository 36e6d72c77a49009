//! Search engine collaborator.
//!
//! [`SearchEngine`] is the seam between the core and a concrete engine.
//! [`MemoryEngine`] evaluates queries in process; [`OpenSearchEngine`] talks
//! to a cluster through the `opensearch` client.

mod cluster;
mod memory;

pub use self::cluster::{DOC_TYPE_FIELD, OpenSearchEngine};
pub use self::memory::MemoryEngine;

use crate::config::IndexSettings;
use crate::error::Result;
use crate::mapping::{IndexedDocument, SchemaDescriptor};
use crate::query::{BoolQuery, Query};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Initial schemas by document type, submitted with index creation.
pub type SchemaMap = BTreeMap<String, Value>;

/// Operations the core needs from a search engine.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool>;

    async fn create_index(
        &self,
        index: &str,
        settings: &IndexSettings,
        schemas: &SchemaMap,
    ) -> Result<()>;

    /// Remove the schema of a document type. Absent schemas are not an error.
    async fn delete_schema(&self, index: &str, document_type: &str) -> Result<()>;

    async fn put_schema(
        &self,
        index: &str,
        document_type: &str,
        schema: &SchemaDescriptor,
    ) -> Result<()>;

    /// Insert or replace a document.
    async fn upsert_document(
        &self,
        index: &str,
        document_type: &str,
        document: &IndexedDocument,
    ) -> Result<()>;

    /// Remove a document. Returns whether it existed.
    async fn delete_document(&self, index: &str, document_type: &str, id: &str) -> Result<bool>;

    async fn search(
        &self,
        index: &str,
        document_type: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse>;

    /// Make every write so far visible to search.
    async fn refresh(&self, index: &str) -> Result<()>;
}

/// A scored query with a non-scoring filter and a result window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub query: Option<Query>,
    pub filter: Option<Query>,
    pub from: Option<usize>,
    pub size: Option<usize>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single query equivalent to `query` filtered by `filter`.
    pub fn effective_query(&self) -> Query {
        let query = self.query.clone().unwrap_or(Query::MatchAll);
        match &self.filter {
            None => query,
            Some(filter) => BoolQuery::new().must(query).filter(filter.clone()).build(),
        }
    }

    /// The request body.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();

        body.insert("query".to_string(), self.effective_query().to_json());
        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }

        Value::Object(body)
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Document ID, as given to [`SearchEngine::upsert_document`].
    pub id: String,
    /// Relevance score.
    pub score: Option<f64>,
    /// Stored document body.
    pub source: Value,
}

/// Search result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Total matching documents, independent of the result window.
    pub total: u64,
    /// Hits in engine order.
    pub hits: Vec<SearchHit>,
    /// Time taken in milliseconds.
    pub took_ms: u64,
}
