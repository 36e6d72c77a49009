//! Index lifecycle and document synchronization.
//!
//! Datastore changes are turned into [`Job`]s and handed to a
//! [`TaskRunner`]. An [`IndexWorker`] later runs them against an
//! [`IndexSynchronizer`], which re-derives documents from the datastore, so
//! jobs can be repeated or reordered without leaving stale documents.

mod job;
mod runner;
mod worker;

pub use self::job::{INDEX_OBJECTS, IndexJob, Job, JobId, JobState, UNINDEX_OBJECTS};
pub use self::runner::{ChannelTaskRunner, TaskRunner};
pub use self::worker::{IndexTarget, IndexWorker, WorkerConfig, WorkerStats};

use crate::config::SearchSettings;
use crate::datastore::ChangeEvent;
use crate::engine::{SchemaMap, SearchEngine};
use crate::error::Result;
use crate::mapping::{DocumentMapper, MappingType, SchemaDescriptor};
use async_trait::async_trait;
use esutils_log::{debug, error, info, warn};
use serde_json::json;
use std::sync::Arc;

/// Objects per job when reindexing a whole document type.
pub const INDEX_ALL_CHUNK: usize = 100;

/// Parameters of [`IndexSynchronizer::update_schema`].
///
/// Unset fields fall back to the mapping type's index, document type and
/// schema descriptor.
#[derive(Debug, Clone)]
pub struct SchemaUpdate {
    pub index: Option<String>,
    pub document_type: Option<String>,
    pub schema: Option<SchemaDescriptor>,
    /// Delete the previous schema before submitting the new one.
    pub drop_previous: bool,
}

impl Default for SchemaUpdate {
    fn default() -> Self {
        Self {
            index: None,
            document_type: None,
            schema: None,
            drop_previous: true,
        }
    }
}

impl SchemaUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    pub fn schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn drop_previous(mut self, drop_previous: bool) -> Self {
        self.drop_previous = drop_previous;
        self
    }
}

/// Keeps the index of one mapping type in step with its datastore.
pub struct IndexSynchronizer<M: MappingType> {
    mapper: DocumentMapper<M>,
    engine: Arc<dyn SearchEngine>,
    tasks: Arc<dyn TaskRunner>,
    settings: SearchSettings,
}

impl<M: MappingType> IndexSynchronizer<M> {
    pub fn new(
        mapper: DocumentMapper<M>,
        engine: Arc<dyn SearchEngine>,
        tasks: Arc<dyn TaskRunner>,
        settings: &SearchSettings,
    ) -> Self {
        Self {
            mapper,
            engine,
            tasks,
            settings: settings.clone(),
        }
    }

    pub fn mapper(&self) -> &DocumentMapper<M> {
        &self.mapper
    }

    pub fn engine(&self) -> &Arc<dyn SearchEngine> {
        &self.engine
    }

    /// Placeholder schemas for every configured document type.
    pub fn generate_schema_map(&self) -> SchemaMap {
        self.settings
            .doc_types
            .iter()
            .map(|doc_type| (doc_type.clone(), json!({})))
            .collect()
    }

    /// Create the index unless it exists. Returns whether it was created.
    ///
    /// Defaults to the mapping type's index.
    pub async fn ensure_index(&self, index: Option<&str>) -> Result<bool> {
        self.ensure_index_with(index, self.generate_schema_map())
            .await
    }

    /// Like [`ensure_index`](Self::ensure_index), with explicit initial schemas.
    pub async fn ensure_index_with(&self, index: Option<&str>, schemas: SchemaMap) -> Result<bool> {
        let index = index.unwrap_or(self.mapper.index_name());

        if self.engine.index_exists(index).await? {
            debug!("Index {} already exists", index);
            return Ok(false);
        }

        self.engine
            .create_index(index, &self.settings.index_settings, &schemas)
            .await
            .inspect_err(|e| error!("Failed to create index {}: {}", index, e))?;
        info!("Created index {}", index);
        Ok(true)
    }

    /// Replace the schema of a document type, creating the index first.
    ///
    /// Idempotent: running it twice leaves the same schema in place.
    pub async fn update_schema(&self, update: SchemaUpdate) -> Result<()> {
        let index = update
            .index
            .unwrap_or_else(|| self.mapper.index_name().to_string());
        let document_type = update
            .document_type
            .unwrap_or_else(|| self.mapper.document_type().to_string());
        let schema = update
            .schema
            .unwrap_or_else(|| self.mapper.schema_descriptor());

        self.ensure_index(Some(&index)).await?;

        if update.drop_previous {
            self.engine
                .delete_schema(&index, &document_type)
                .await
                .inspect_err(|e| error!("Failed to delete schema {}/{}: {}", index, document_type, e))?;
        }

        self.engine
            .put_schema(&index, &document_type, &schema)
            .await
            .inspect_err(|e| error!("Failed to put schema {}/{}: {}", index, document_type, e))?;
        info!("Updated schema {}/{}", index, document_type);
        Ok(())
    }

    /// Schedule reindexing of a saved object.
    pub async fn on_object_saved(&self, object: &M::Model) -> Result<JobId> {
        let id = self.mapper.object_id(object)?;
        let job = IndexJob::index(
            self.mapper.document_type(),
            vec![id.clone()],
            self.mapper.id_field(),
        )
        .into_job(INDEX_OBJECTS)?;

        debug!("Scheduling index of {} {}", self.mapper.document_type(), id);
        self.tasks.enqueue(job).await
    }

    /// Schedule removal of a deleted object's document.
    pub async fn on_object_deleted(&self, object: &M::Model) -> Result<JobId> {
        let id = self.mapper.object_id(object)?;
        let job = IndexJob::unindex(self.mapper.document_type(), vec![id.clone()])
            .into_job(UNINDEX_OBJECTS)?;

        debug!("Scheduling unindex of {} {}", self.mapper.document_type(), id);
        self.tasks.enqueue(job).await
    }

    pub async fn handle_change(&self, event: &ChangeEvent<M::Model>) -> Result<JobId> {
        match event {
            ChangeEvent::Saved(object) => self.on_object_saved(object).await,
            ChangeEvent::Deleted(object) => self.on_object_deleted(object).await,
        }
    }

    /// Fetch each object and upsert its document. Returns how many were written.
    ///
    /// An object that vanished from the datastore, or that lost a mapped
    /// attribute, no longer has a document: any previously indexed one is
    /// removed and the object is skipped.
    pub async fn index_objects(&self, ids: &[String]) -> Result<usize> {
        let index = self.mapper.index_name();
        let document_type = self.mapper.document_type();
        let mut written = 0;

        for id in ids {
            let document = match self.mapper.extract_document(id, None).await {
                Ok(document) => document,
                Err(e) if e.is_vanished_object() => {
                    warn!("Skipping {} {}: {}", document_type, id, e);
                    if self
                        .engine
                        .delete_document(index, document_type, id)
                        .await?
                    {
                        info!("Removed stale {} document {}", document_type, id);
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.engine
                .upsert_document(index, document_type, &document)
                .await?;
            written += 1;
        }

        debug!("Indexed {}/{} {} documents", written, ids.len(), document_type);
        Ok(written)
    }

    /// Remove documents. Returns how many existed.
    pub async fn unindex_objects(&self, ids: &[String]) -> Result<usize> {
        let index = self.mapper.index_name();
        let document_type = self.mapper.document_type();
        let mut removed = 0;

        for id in ids {
            if self
                .engine
                .delete_document(index, document_type, id)
                .await?
            {
                removed += 1;
            }
        }

        debug!("Unindexed {}/{} {} documents", removed, ids.len(), document_type);
        Ok(removed)
    }

    /// Schedule reindexing of every object in the datastore.
    ///
    /// Returns the number of jobs submitted.
    pub async fn index_all(&self) -> Result<usize> {
        let ids = self.mapper.datastore().all_ids().await?;
        let mut jobs = 0;

        for chunk in ids.chunks(INDEX_ALL_CHUNK) {
            let job = IndexJob::index(
                self.mapper.document_type(),
                chunk.to_vec(),
                self.mapper.id_field(),
            )
            .into_job(INDEX_OBJECTS)?;
            self.tasks.enqueue(job).await?;
            jobs += 1;
        }

        info!(
            "Scheduled {} objects of {} in {} jobs",
            ids.len(),
            self.mapper.document_type(),
            jobs
        );
        Ok(jobs)
    }

    /// Make every write so far visible to search.
    pub async fn refresh(&self) -> Result<()> {
        self.engine.refresh(self.mapper.index_name()).await
    }
}

#[async_trait]
impl<M: MappingType> IndexTarget for IndexSynchronizer<M> {
    fn document_type(&self) -> &str {
        self.mapper.document_type()
    }

    fn id_field(&self) -> &str {
        self.mapper.id_field()
    }

    async fn index_objects(&self, ids: &[String]) -> Result<usize> {
        IndexSynchronizer::index_objects(self, ids).await
    }

    async fn unindex_objects(&self, ids: &[String]) -> Result<usize> {
        IndexSynchronizer::unindex_objects(self, ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::InMemoryDatastore;
    use crate::engine::MemoryEngine;
    use crate::mapping::{FieldMapping, FieldSpec};
    use serde::Serialize;
    use serde_json::Value;

    #[derive(Debug, Clone, Serialize)]
    struct Note {
        id: u64,
        title: String,
    }

    struct NoteMapping;

    impl MappingType for NoteMapping {
        type Model = Note;

        fn model_name() -> &'static str {
            "Note"
        }

        fn field_mapping() -> FieldMapping {
            FieldMapping::new().field("title", FieldSpec::text())
        }
    }

    struct Fixture {
        store: Arc<InMemoryDatastore<Note>>,
        engine: Arc<MemoryEngine>,
        sync: Arc<IndexSynchronizer<NoteMapping>>,
        worker: IndexWorker,
    }

    fn fixture(settings: SearchSettings) -> Fixture {
        let store: Arc<InMemoryDatastore<Note>> = Arc::new(InMemoryDatastore::new());
        let engine = Arc::new(MemoryEngine::new());
        let (tasks, jobs) = ChannelTaskRunner::channel();
        let mapper = DocumentMapper::<NoteMapping>::new(&settings, store.clone()).unwrap();
        let sync = Arc::new(IndexSynchronizer::new(
            mapper,
            engine.clone(),
            Arc::new(tasks.clone()),
            &settings,
        ));
        let mut worker = IndexWorker::new(&tasks, jobs);
        worker.register(sync.clone());

        Fixture {
            store,
            engine,
            sync,
            worker,
        }
    }

    fn note(id: u64, title: &str) -> Note {
        Note {
            id,
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn test_schema_map_has_placeholder_per_doc_type() {
        let settings = SearchSettings::new()
            .with_doc_type("note")
            .with_doc_type("tag");
        let f = fixture(settings);

        let map = f.sync.generate_schema_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["note"], json!({}));
        assert_eq!(map["tag"], json!({}));
    }

    #[tokio::test]
    async fn test_ensure_index_creates_once() {
        let f = fixture(SearchSettings::new());

        assert!(f.sync.ensure_index(None).await.unwrap());
        assert!(!f.sync.ensure_index(None).await.unwrap());
        assert!(f.engine.index_exists("default").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_schema_is_idempotent() {
        let f = fixture(SearchSettings::new());

        f.sync.update_schema(SchemaUpdate::new()).await.unwrap();
        let first = f.engine.schema("default", "note").await;
        f.sync.update_schema(SchemaUpdate::new()).await.unwrap();
        let second = f.engine.schema("default", "note").await;

        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_update_schema_explicit_target() {
        let f = fixture(SearchSettings::new());
        let schema = SchemaDescriptor::new(
            FieldMapping::new().field("title", FieldSpec::keyword()),
        );

        f.sync
            .update_schema(
                SchemaUpdate::new()
                    .index("other")
                    .document_type("memo")
                    .schema(schema.clone())
                    .drop_previous(false),
            )
            .await
            .unwrap();

        assert_eq!(
            f.engine.schema("other", "memo").await,
            Some(schema.to_json())
        );
        assert!(f.engine.schema("default", "note").await.is_none());
    }

    #[tokio::test]
    async fn test_saved_object_is_indexed_by_worker() {
        let mut f = fixture(SearchSettings::new());
        f.sync.ensure_index(None).await.unwrap();

        let event = f.store.save("1", note(1, "hello world")).await;
        f.sync.handle_change(&event).await.unwrap();
        assert!(f.engine.document("default", "note", "1").await.is_none());

        f.worker.run_until_idle().await;
        f.sync.refresh().await.unwrap();

        let document = f.engine.document("default", "note", "1").await.unwrap();
        assert_eq!(document["title"], Value::from("hello world"));
        assert_eq!(document["id"], Value::from("1"));
    }

    #[tokio::test]
    async fn test_deleted_object_is_unindexed() {
        let mut f = fixture(SearchSettings::new());
        f.sync.ensure_index(None).await.unwrap();

        f.store.save("1", note(1, "hello")).await;
        f.sync.index_objects(&["1".to_string()]).await.unwrap();

        let event = f.store.delete("1").await.unwrap();
        f.sync.handle_change(&event).await.unwrap();
        f.worker.run_until_idle().await;
        f.sync.refresh().await.unwrap();

        assert!(f.engine.document("default", "note", "1").await.is_none());
    }

    #[tokio::test]
    async fn test_index_objects_skips_vanished() {
        let f = fixture(SearchSettings::new());
        f.sync.ensure_index(None).await.unwrap();
        f.store.save("1", note(1, "kept")).await;
        f.store.save("2", note(2, "gone")).await;
        f.sync
            .index_objects(&["1".to_string(), "2".to_string()])
            .await
            .unwrap();
        f.store.delete("2").await.unwrap();

        let written = f
            .sync
            .index_objects(&["1".to_string(), "2".to_string()])
            .await
            .unwrap();
        f.sync.refresh().await.unwrap();

        assert_eq!(written, 1);
        assert!(f.engine.document("default", "note", "1").await.is_some());
        assert!(f.engine.document("default", "note", "2").await.is_none());
    }

    #[tokio::test]
    async fn test_stale_save_job_reads_current_state() {
        let mut f = fixture(SearchSettings::new());
        f.sync.ensure_index(None).await.unwrap();

        let saved = f.store.save("1", note(1, "first")).await;
        f.sync.handle_change(&saved).await.unwrap();
        let deleted = f.store.delete("1").await.unwrap();
        f.sync.handle_change(&deleted).await.unwrap();

        let stats = f.worker.run_until_idle().await;
        f.sync.refresh().await.unwrap();

        assert_eq!(stats.dead, 0);
        assert!(f.engine.document("default", "note", "1").await.is_none());
    }

    #[tokio::test]
    async fn test_index_all_chunks_jobs() {
        let mut f = fixture(SearchSettings::new());
        f.sync.ensure_index(None).await.unwrap();
        for id in 0..250u64 {
            f.store.save(id.to_string(), note(id, "bulk")).await;
        }

        assert_eq!(f.sync.index_all().await.unwrap(), 3);
        let stats = f.worker.run_until_idle().await;
        f.sync.refresh().await.unwrap();

        assert_eq!(stats.completed, 3);
        assert!(f.engine.document("default", "note", "249").await.is_some());
    }

    #[tokio::test]
    async fn test_unavailable_engine_job_is_retried() {
        let mut f = fixture(SearchSettings::new());
        f.sync.ensure_index(None).await.unwrap();
        f.store.save("1", note(1, "hello")).await;
        f.engine.set_available(false);

        let event = f.store.save("1", note(1, "hello")).await;
        f.sync.handle_change(&event).await.unwrap();
        let stats = f.worker.run_until_idle().await;

        assert_eq!(stats.retried, 2);
        assert_eq!(stats.dead, 1);
    }
}
