//! Integration tests for common esutils workflows.
//!
//! These tests verify that the most common use cases work correctly.

use esutils::*;
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Author {
    username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Article {
    id: u64,
    subject: String,
    content: String,
    status: String,
    author: Author,
}

struct ArticleMapping;

impl MappingType for ArticleMapping {
    type Model = Article;

    fn model_name() -> &'static str {
        "Article"
    }

    fn field_mapping() -> FieldMapping {
        FieldMapping::new()
            .field("subject", FieldSpec::text())
            .field("content", FieldSpec::text())
            .field("status", FieldSpec::keyword())
            .field("author__username", FieldSpec::text())
    }
}

fn article(id: u64, subject: &str, status: &str) -> Article {
    Article {
        id,
        subject: subject.to_string(),
        content: String::new(),
        status: status.to_string(),
        author: Author {
            username: "louise".to_string(),
        },
    }
}

// =============================================================================
// Settings Tests
// =============================================================================

#[test]
fn test_settings_defaults() {
    let settings = SearchSettings::new();
    assert_eq!(settings.index_default, "default");
    assert_eq!(settings.key_separator, ":");
    assert_eq!(settings.query_splitter, " ");
    assert_eq!(settings.filter_key, "q");
    assert!(settings.all_enabled);
    assert!(settings.source_enabled);
}

#[test]
fn test_settings_from_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "index_default = \"articles\"\nkey_separator = \"=\"\ndoc_types = [\"article\"]\n\n[index_settings]\nnumber_of_shards = 2"
    )
    .unwrap();

    let settings = SearchSettings::load_from(Some(file.path())).unwrap();
    assert_eq!(settings.index_default, "articles");
    assert_eq!(settings.key_separator, "=");
    assert_eq!(settings.doc_types, vec!["article".to_string()]);
    assert_eq!(settings.index_settings.number_of_shards, Some(2));
    assert_eq!(settings.query_splitter, " ");
}

#[test]
fn test_invalid_settings_are_configuration_errors() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "index_default = \"Articles\"").unwrap();

    let err = SearchSettings::load_from(Some(file.path())).unwrap_err();
    assert!(matches!(err, SearchError::Configuration(_)));
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_error_classification() {
    assert!(SearchError::EngineUnavailable("down".into()).is_transient());
    assert!(SearchError::Queue("closed".into()).is_transient());
    assert!(!SearchError::Configuration("bad".into()).is_transient());
    assert!(!SearchError::QuerySyntax("a:b:c".into()).is_transient());
}

// =============================================================================
// Query Tests
// =============================================================================

#[test]
fn test_filter_renders_bool_query() {
    let filter = Filter::leaf(Query::term("status", "online"))
        .and(Filter::leaf(Query::prefix("subject", "amaz")));

    assert_eq!(
        filter.to_query().unwrap().to_json(),
        json!({"bool": {"filter": [
            {"term": {"status": "online"}},
            {"prefix": {"subject": "amaz"}}
        ]}})
    );
    assert_eq!(Filter::Identity.to_query(), None);
}

#[test]
fn test_lookup_keywords() {
    assert_eq!(
        Lookup::parse("author__username__startswith"),
        Lookup {
            field: "author__username".to_string(),
            action: Some(MatchAction::Prefix),
        }
    );
    assert_eq!(Lookup::parse("author__username").action, None);
}

// =============================================================================
// Workflow Tests
// =============================================================================

#[tokio::test]
async fn test_background_worker_keeps_index_in_sync() {
    let settings = SearchSettings::new();
    let store: Arc<InMemoryDatastore<Article>> = Arc::new(InMemoryDatastore::new());
    let engine = Arc::new(MemoryEngine::new());
    let (tasks, jobs) = ChannelTaskRunner::channel();

    let mapper = DocumentMapper::<ArticleMapping>::new(&settings, store.clone()).unwrap();
    let sync = Arc::new(IndexSynchronizer::new(
        mapper.clone(),
        engine.clone(),
        Arc::new(tasks.clone()),
        &settings,
    ));
    sync.update_schema(SchemaUpdate::new()).await.unwrap();

    let mut worker = IndexWorker::new(&tasks, jobs);
    worker.register(sync.clone());
    let handle = worker.spawn();

    for (id, subject) in [(1, "make it works"), (2, "My amazing article")] {
        let event = store.save(id.to_string(), article(id, subject, "online")).await;
        sync.handle_change(&event).await.unwrap();
    }

    let search = Search::new(mapper, engine.clone())
        .query_kv("subject__prefix", "amaz")
        .unwrap();

    let mut found = 0;
    for _ in 0..50 {
        sync.refresh().await.unwrap();
        found = search.count().await.unwrap();
        if found == 1 && engine.pending_writes("default").await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(found, 1);

    handle.abort();
}

#[tokio::test]
async fn test_request_to_results() {
    let settings = SearchSettings::new();
    let store: Arc<InMemoryDatastore<Article>> = Arc::new(InMemoryDatastore::new());
    let engine = Arc::new(MemoryEngine::new());
    let (tasks, jobs) = ChannelTaskRunner::channel();

    let mapper = DocumentMapper::<ArticleMapping>::new(&settings, store.clone()).unwrap();
    let sync = Arc::new(IndexSynchronizer::new(
        mapper.clone(),
        engine.clone(),
        Arc::new(tasks.clone()),
        &settings,
    ));
    sync.update_schema(SchemaUpdate::new()).await.unwrap();

    store.save("1", article(1, "make it works", "online")).await;
    store.save("2", article(2, "My amazing article", "online")).await;
    store.save("3", article(3, "amazing draft", "draft")).await;

    let mut worker = IndexWorker::new(&tasks, jobs);
    worker.register(sync.clone());
    sync.index_all().await.unwrap();
    worker.run_until_idle().await;
    sync.refresh().await.unwrap();

    let backend = FilterBackend::from_settings(&settings);
    let view = SearchView::new()
        .with_search_fields(["subject", "status"])
        .with_search_action("status", MatchAction::Term);
    let params = HashMap::from([("q".to_string(), "subject:amazing status:online".to_string())]);

    let results: Vec<Article> = backend
        .filter_set(&params, &view, Search::new(mapper, engine))
        .unwrap()
        .results()
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(results, vec![article(2, "My amazing article", "online")]);
}
