//! OpenSearch-backed engine.
//!
//! OpenSearch indices hold a single mapping, so document types are emulated:
//! every document carries its type in [`DOC_TYPE_FIELD`] and is stored under
//! the id `{document_type}:{id}`. Searches filter on the type field and
//! deleting a schema deletes that type's documents. Field mappings themselves
//! cannot be removed from a live index.

use super::{SchemaMap, SearchEngine, SearchHit, SearchRequest, SearchResponse};
use crate::config::{EngineConfig, IndexSettings, SearchSettings};
use crate::error::{Result, SearchError};
use crate::mapping::{IndexedDocument, SchemaDescriptor};
use crate::query::{BoolQuery, Query};
use async_trait::async_trait;
use esutils_log::{debug, error, info};
use opensearch::http::StatusCode;
use opensearch::http::response::Response;
use opensearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use opensearch::indices::{
    IndicesCreateParts, IndicesExistsParts, IndicesPutMappingParts, IndicesRefreshParts,
};
use opensearch::{DeleteByQueryParts, DeleteParts, IndexParts, OpenSearch, SearchParts};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Keyword field holding a document's type.
pub const DOC_TYPE_FIELD: &str = "esutils_doc_type";

/// Search engine client for an OpenSearch cluster.
#[derive(Clone)]
pub struct OpenSearchEngine {
    client: Arc<OpenSearch>,
    config: Arc<EngineConfig>,
}

impl OpenSearchEngine {
    /// Create a new engine client.
    pub fn new(config: EngineConfig) -> Result<Self> {
        info!("Initializing OpenSearch client for: {:?}", config.urls);

        let url = config
            .urls
            .first()
            .ok_or_else(|| SearchError::Configuration("No engine URLs provided".to_string()))?;

        let url = opensearch::http::Url::parse(url)
            .map_err(|e| SearchError::Configuration(format!("Invalid URL: {}", e)))?;

        let conn_pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(config.request_timeout())
            .disable_proxy();

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.auth(opensearch::auth::Credentials::Basic(
                user.clone(),
                pass.clone(),
            ));
        }

        let transport = builder
            .build()
            .map_err(|e| SearchError::EngineUnavailable(e.to_string()))?;

        debug!("OpenSearch client initialized");

        Ok(Self {
            client: Arc::new(OpenSearch::new(transport)),
            config: Arc::new(config),
        })
    }

    /// Create a client from the engine section of the settings.
    pub fn from_settings(settings: &SearchSettings) -> Result<Self> {
        Self::new(settings.engine.clone())
    }

    /// Get the underlying OpenSearch client.
    pub fn inner(&self) -> &OpenSearch {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ping the cluster.
    pub async fn ping(&self) -> Result<bool> {
        let response = self.client.ping().send().await;
        Ok(response.is_ok_and(|r| r.status_code().is_success()))
    }
}

impl std::fmt::Debug for OpenSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchEngine")
            .field("urls", &self.config.urls)
            .finish()
    }
}

fn document_id(document_type: &str, id: &str) -> String {
    format!("{}:{}", document_type, id)
}

fn strip_document_id<'a>(document_type: &str, stored: &'a str) -> &'a str {
    stored
        .strip_prefix(document_type)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(stored)
}

fn type_field_mapping() -> Value {
    json!({ "type": "keyword" })
}

/// Schema properties plus the type field. `_all` and `_source` are fixed at
/// index creation in OpenSearch and are not sent.
fn mapping_body(schema: &Value) -> Value {
    let mut properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    properties.insert(DOC_TYPE_FIELD.to_string(), type_field_mapping());
    json!({ "properties": properties })
}

fn create_body(settings: &IndexSettings, schemas: &SchemaMap) -> Value {
    let mut properties = Map::new();
    for schema in schemas.values() {
        if let Some(fields) = schema.get("properties").and_then(Value::as_object) {
            properties.extend(fields.clone());
        }
    }
    properties.insert(DOC_TYPE_FIELD.to_string(), type_field_mapping());

    json!({
        "settings": settings.to_json(),
        "mappings": { "properties": properties },
    })
}

fn search_body(document_type: &str, request: &SearchRequest) -> Value {
    let query = BoolQuery::new()
        .must(request.effective_query())
        .filter(Query::term(DOC_TYPE_FIELD, document_type))
        .build();

    let mut body = Map::new();
    body.insert("query".to_string(), query.to_json());
    body.insert("track_total_hits".to_string(), json!(true));
    if let Some(from) = request.from {
        body.insert("from".to_string(), json!(from));
    }
    if let Some(size) = request.size {
        body.insert("size".to_string(), json!(size));
    }
    Value::Object(body)
}

fn parse_response(document_type: &str, result: &Value) -> SearchResponse {
    let hits = result["hits"]["hits"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .map(|hit| {
                    let mut source = hit["_source"].clone();
                    if let Value::Object(fields) = &mut source {
                        fields.remove(DOC_TYPE_FIELD);
                    }
                    SearchHit {
                        id: strip_document_id(document_type, hit["_id"].as_str().unwrap_or(""))
                            .to_string(),
                        score: hit["_score"].as_f64(),
                        source,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    SearchResponse {
        total: result["hits"]["total"]["value"].as_u64().unwrap_or(0),
        hits,
        took_ms: result["took"].as_u64().unwrap_or(0),
    }
}

/// Classify an error body.
fn reason_error(status: StatusCode, body: &Value, index: &str) -> SearchError {
    let error_type = body["error"]["type"].as_str().unwrap_or("");
    if error_type == "index_not_found_exception" {
        return SearchError::IndexNotFound(index.to_string());
    }

    let reason = body["error"]["reason"]
        .as_str()
        .unwrap_or("Unknown error")
        .to_string();
    if status == StatusCode::SERVICE_UNAVAILABLE {
        SearchError::EngineUnavailable(reason)
    } else {
        SearchError::Engine(format!("{} ({}): {}", error_type, status.as_u16(), reason))
    }
}

async fn failure(response: Response, index: &str) -> SearchError {
    let status = response.status_code();
    let err = match response.json::<Value>().await {
        Ok(body) => reason_error(status, &body, index),
        Err(e) => SearchError::Transport(e),
    };
    error!("OpenSearch request on {} failed: {}", index, err);
    err
}

/// Existence checks answer with a bodiless status: 404 means absent, any
/// other failure is reported.
fn exists_status(status: StatusCode, index: &str) -> Result<bool> {
    if status.is_success() {
        Ok(true)
    } else if status == StatusCode::NOT_FOUND {
        Ok(false)
    } else {
        let err = reason_error(status, &Value::Null, index);
        error!("OpenSearch existence check on {} failed: {}", index, err);
        Err(err)
    }
}

#[async_trait]
impl SearchEngine for OpenSearchEngine {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        debug!("Checking if index exists: {}", index);

        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await?;

        exists_status(response.status_code(), index)
    }

    async fn create_index(
        &self,
        index: &str,
        settings: &IndexSettings,
        schemas: &SchemaMap,
    ) -> Result<()> {
        info!("Creating index: {}", index);

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(create_body(settings, schemas))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(failure(response, index).await);
        }
        Ok(())
    }

    async fn delete_schema(&self, index: &str, document_type: &str) -> Result<()> {
        info!("Deleting {} documents from index {}", document_type, index);

        self.refresh(index).await?;
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[index]))
            .refresh(true)
            .body(json!({ "query": Query::term(DOC_TYPE_FIELD, document_type).to_json() }))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(failure(response, index).await);
        }

        let body: Value = response.json().await?;
        debug!(
            "Deleted {} {} documents",
            body["deleted"].as_u64().unwrap_or(0),
            document_type
        );
        Ok(())
    }

    async fn put_schema(
        &self,
        index: &str,
        document_type: &str,
        schema: &SchemaDescriptor,
    ) -> Result<()> {
        info!("Updating mapping for {} on index {}", document_type, index);

        let response = self
            .client
            .indices()
            .put_mapping(IndicesPutMappingParts::Index(&[index]))
            .body(mapping_body(&schema.to_json()))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(failure(response, index).await);
        }
        Ok(())
    }

    async fn upsert_document(
        &self,
        index: &str,
        document_type: &str,
        document: &IndexedDocument,
    ) -> Result<()> {
        let id = document_id(document_type, &document.id);
        debug!("Indexing document {} in index {}", id, index);

        let mut body = document.fields.clone();
        body.insert(DOC_TYPE_FIELD.to_string(), json!(document_type));

        let response = self
            .client
            .index(IndexParts::IndexId(index, &id))
            .body(Value::Object(body))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(failure(response, index).await);
        }
        Ok(())
    }

    async fn delete_document(&self, index: &str, document_type: &str, id: &str) -> Result<bool> {
        let id = document_id(document_type, id);
        debug!("Deleting document {} from index {}", id, index);

        let response = self
            .client
            .delete(DeleteParts::IndexId(index, &id))
            .send()
            .await?;

        let status = response.status_code();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::NOT_FOUND {
            let body: Value = response.json().await?;
            if body["result"].as_str() == Some("not_found") {
                return Ok(false);
            }
            return Err(reason_error(status, &body, index));
        }
        Err(failure(response, index).await)
    }

    async fn search(
        &self,
        index: &str,
        document_type: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse> {
        debug!("Searching {} in index {}", document_type, index);

        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(search_body(document_type, request))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(failure(response, index).await);
        }

        let result: Value = response.json().await?;
        Ok(parse_response(document_type, &result))
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        debug!("Refreshing index {}", index);

        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index]))
            .send()
            .await?;

        if !response.status_code().is_success() {
            return Err(failure(response, index).await);
        }
        Ok(())
    }
}
