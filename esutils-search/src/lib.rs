//! Search filter translation and index synchronization.
//!
//! This crate keeps a search index in step with a primary datastore and turns
//! flat `field -> term` requests into composed engine queries:
//! - [`MappingType`] / [`DocumentMapper`]: schema and document derivation
//! - [`IndexSynchronizer`]: index and schema lifecycle, change-driven jobs
//! - [`FilterSet`] / [`FilterBackend`]: query translation from raw terms
//! - [`SearchEngine`]: the engine seam, with [`MemoryEngine`] and
//!   [`OpenSearchEngine`] implementations
//!
//! # Example
//!
//! ```rust,no_run
//! use esutils_search::*;
//! use serde::Serialize;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize)]
//! struct Article {
//!     id: u64,
//!     subject: String,
//! }
//!
//! struct ArticleMapping;
//!
//! impl MappingType for ArticleMapping {
//!     type Model = Article;
//!
//!     fn model_name() -> &'static str {
//!         "Article"
//!     }
//!
//!     fn field_mapping() -> FieldMapping {
//!         FieldMapping::new().field("subject", FieldSpec::text())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = SearchSettings::load()?;
//!     let store: Arc<InMemoryDatastore<Article>> = Arc::new(InMemoryDatastore::new());
//!     let engine: Arc<dyn SearchEngine> = Arc::new(OpenSearchEngine::from_settings(&settings)?);
//!     let (tasks, jobs) = ChannelTaskRunner::channel();
//!
//!     let mapper = DocumentMapper::<ArticleMapping>::new(&settings, store.clone())?;
//!     let sync = Arc::new(IndexSynchronizer::new(
//!         mapper.clone(),
//!         engine.clone(),
//!         Arc::new(tasks.clone()),
//!         &settings,
//!     ));
//!     sync.update_schema(SchemaUpdate::new()).await?;
//!
//!     let mut worker = IndexWorker::new(&tasks, jobs);
//!     worker.register(sync.clone());
//!     worker.spawn();
//!
//!     let event = store.save("1", Article { id: 1, subject: "My amazing article".into() }).await;
//!     sync.handle_change(&event).await?;
//!
//!     let count = FilterSet::new(Search::new(mapper, engine))
//!         .with_search_fields(["subject"])
//!         .with_search_term("subject", "amaz")
//!         .with_default_action(MatchAction::Prefix)
//!         .count()
//!         .await?;
//!     println!("{} matches", count);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

mod action;
mod backend;
mod config;
mod datastore;
mod engine;
mod error;
mod filter;
mod filterset;
mod mapping;
mod query;
mod search;
mod sync;

pub use action::{Lookup, MatchAction};
pub use backend::{FilterBackend, SearchView};
pub use config::{EngineConfig, IndexSettings, SearchSettings};
pub use datastore::{ChangeEvent, Datastore, InMemoryDatastore};
pub use engine::{
    DOC_TYPE_FIELD, MemoryEngine, OpenSearchEngine, SchemaMap, SearchEngine, SearchHit,
    SearchRequest, SearchResponse,
};
pub use error::{Result, SearchError};
pub use filter::{Composition, Filter, MATCH_ALL, leaf_query};
pub use filterset::FilterSet;
pub use mapping::{
    DocumentMapper, FieldMapping, FieldPath, FieldSpec, FieldType, IndexedDocument, MappingType,
    SchemaDescriptor,
};
pub use query::{
    BoolQuery, ExistsQuery, FuzzyQuery, MatchPhraseQuery, MatchQuery, MultiMatchQuery,
    MultiMatchType, PrefixQuery, Query, QueryStringQuery, RangeQuery, TermQuery, TermsQuery,
    WildcardQuery,
};
pub use search::Search;
pub use sync::{
    ChannelTaskRunner, INDEX_ALL_CHUNK, INDEX_OBJECTS, IndexJob, IndexSynchronizer, IndexTarget,
    IndexWorker, Job, JobId, JobState, SchemaUpdate, TaskRunner, UNINDEX_OBJECTS, WorkerConfig,
    WorkerStats,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        ChangeEvent, ChannelTaskRunner, Datastore, DocumentMapper, FieldMapping, FieldSpec,
        FilterBackend, FilterSet, IndexSynchronizer, IndexWorker, MATCH_ALL, MappingType,
        MatchAction, Result, Search, SearchEngine, SearchError, SearchSettings, SearchView,
        SchemaUpdate,
    };
}
