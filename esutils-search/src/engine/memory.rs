//! In-process search engine.

use super::{SchemaMap, SearchEngine, SearchHit, SearchRequest, SearchResponse};
use crate::config::IndexSettings;
use crate::error::{Result, SearchError};
use crate::mapping::{FieldType, IndexedDocument, SchemaDescriptor};
use crate::query::{BoolQuery, MultiMatchType, Query, QueryStringQuery, RangeQuery};
use async_trait::async_trait;
use esutils_log::{debug, info};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::Instant;
use tokio::sync::RwLock;

const DEFAULT_SIZE: usize = 10;

type DocKey = (String, String);

#[derive(Debug, Clone)]
struct StoredSchema {
    body: Value,
    types: BTreeMap<String, FieldType>,
}

impl StoredSchema {
    fn from_descriptor(schema: &SchemaDescriptor) -> Self {
        Self {
            body: schema.to_json(),
            types: schema
                .properties
                .iter()
                .map(|(name, spec)| (name.to_string(), spec.field_type))
                .collect(),
        }
    }

    fn from_json(body: &Value) -> Self {
        let types = body
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .filter_map(|(name, spec)| {
                        let field_type = serde_json::from_value(spec.get("type")?.clone()).ok()?;
                        Some((name.clone(), field_type))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            body: body.clone(),
            types,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    source: Map<String, Value>,
}

#[derive(Debug, Clone)]
enum PendingWrite {
    Upsert {
        key: DocKey,
        source: Map<String, Value>,
    },
    Delete {
        key: DocKey,
    },
}

#[derive(Debug, Default)]
struct IndexState {
    settings: IndexSettings,
    schemas: BTreeMap<String, StoredSchema>,
    documents: BTreeMap<DocKey, StoredDocument>,
    pending: Vec<PendingWrite>,
}

impl IndexState {
    /// Whether `key` exists once pending writes are applied.
    fn latest_exists(&self, key: &DocKey) -> bool {
        for write in self.pending.iter().rev() {
            match write {
                PendingWrite::Upsert { key: pending, .. } if pending == key => return true,
                PendingWrite::Delete { key: pending } if pending == key => return false,
                _ => {}
            }
        }
        self.documents.contains_key(key)
    }
}

#[derive(Debug, Default)]
struct State {
    indices: BTreeMap<String, IndexState>,
    next_seq: u64,
}

/// A search engine that keeps every index in memory.
///
/// Writes are buffered until [`SearchEngine::refresh`], like a real engine's
/// refresh interval. `text` fields are lowercased and split on
/// non-alphanumeric characters; every other type is matched as a whole value.
/// Hits are ordered by score, then by first insertion.
#[derive(Debug)]
pub struct MemoryEngine {
    state: RwLock<State>,
    available: AtomicBool,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the engine going away. Every call then fails with
    /// [`SearchError::EngineUnavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    /// Current schema body of a document type.
    pub async fn schema(&self, index: &str, document_type: &str) -> Option<Value> {
        let state = self.state.read().await;
        state
            .indices
            .get(index)?
            .schemas
            .get(document_type)
            .map(|schema| schema.body.clone())
    }

    /// Settings the index was created with.
    pub async fn index_settings(&self, index: &str) -> Option<IndexSettings> {
        let state = self.state.read().await;
        state.indices.get(index).map(|idx| idx.settings.clone())
    }

    /// A searchable document, ignoring unrefreshed writes.
    pub async fn document(&self, index: &str, document_type: &str, id: &str) -> Option<Value> {
        let state = self.state.read().await;
        state
            .indices
            .get(index)?
            .documents
            .get(&(document_type.to_string(), id.to_string()))
            .map(|doc| Value::Object(doc.source.clone()))
    }

    /// Number of writes waiting for a refresh.
    pub async fn pending_writes(&self, index: &str) -> usize {
        let state = self.state.read().await;
        state.indices.get(index).map_or(0, |idx| idx.pending.len())
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(AtomicOrdering::SeqCst) {
            Ok(())
        } else {
            Err(SearchError::EngineUnavailable(
                "in-memory engine is offline".to_string(),
            ))
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn index_mut<'a>(state: &'a mut State, index: &str) -> Result<&'a mut IndexState> {
    state
        .indices
        .get_mut(index)
        .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))
}

#[async_trait]
impl SearchEngine for MemoryEngine {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.state.read().await.indices.contains_key(index))
    }

    async fn create_index(
        &self,
        index: &str,
        settings: &IndexSettings,
        schemas: &SchemaMap,
    ) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;

        if state.indices.contains_key(index) {
            return Err(SearchError::Engine(format!(
                "resource_already_exists_exception: index [{}] already exists",
                index
            )));
        }

        info!("Creating index: {}", index);
        let idx = IndexState {
            settings: settings.clone(),
            schemas: schemas
                .iter()
                .map(|(doc_type, body)| (doc_type.clone(), StoredSchema::from_json(body)))
                .collect(),
            ..IndexState::default()
        };
        state.indices.insert(index.to_string(), idx);
        Ok(())
    }

    async fn delete_schema(&self, index: &str, document_type: &str) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let idx = index_mut(&mut state, index)?;

        if idx.schemas.remove(document_type).is_some() {
            info!("Deleted schema {} from index {}", document_type, index);
        }
        idx.documents.retain(|(doc_type, _), _| doc_type != document_type);
        idx.pending.retain(|write| {
            let (PendingWrite::Upsert { key, .. } | PendingWrite::Delete { key }) = write;
            key.0 != document_type
        });
        Ok(())
    }

    async fn put_schema(
        &self,
        index: &str,
        document_type: &str,
        schema: &SchemaDescriptor,
    ) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let idx = index_mut(&mut state, index)?;

        info!("Putting schema {} on index {}", document_type, index);
        idx.schemas.insert(
            document_type.to_string(),
            StoredSchema::from_descriptor(schema),
        );
        Ok(())
    }

    async fn upsert_document(
        &self,
        index: &str,
        document_type: &str,
        document: &IndexedDocument,
    ) -> Result<()> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let idx = index_mut(&mut state, index)?;

        debug!("Upserting {}/{} in index {}", document_type, document.id, index);
        idx.pending.push(PendingWrite::Upsert {
            key: (document_type.to_string(), document.id.clone()),
            source: document.fields.clone(),
        });
        Ok(())
    }

    async fn delete_document(&self, index: &str, document_type: &str, id: &str) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let idx = index_mut(&mut state, index)?;

        let key = (document_type.to_string(), id.to_string());
        let existed = idx.latest_exists(&key);
        debug!("Deleting {}/{} from index {} (existed: {})", document_type, id, index, existed);
        if existed {
            idx.pending.push(PendingWrite::Delete { key });
        }
        Ok(existed)
    }

    async fn search(
        &self,
        index: &str,
        document_type: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse> {
        self.check_available()?;
        let started = Instant::now();
        let state = self.state.read().await;
        let idx = state
            .indices
            .get(index)
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))?;

        let evaluator = Evaluator {
            types: idx.schemas.get(document_type).map(|schema| &schema.types),
        };
        let query = request.effective_query();

        let mut matched = Vec::new();
        for ((doc_type, id), doc) in &idx.documents {
            if doc_type != document_type {
                continue;
            }
            if let Some(score) = evaluator.score(&query, &doc.source)? {
                matched.push((score, doc.seq, id, doc));
            }
        }
        matched.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        let total = matched.len() as u64;
        let hits = matched
            .into_iter()
            .skip(request.from.unwrap_or(0))
            .take(request.size.unwrap_or(DEFAULT_SIZE))
            .map(|(score, _, id, doc)| SearchHit {
                id: id.clone(),
                score: Some(score),
                source: Value::Object(doc.source.clone()),
            })
            .collect();

        Ok(SearchResponse {
            total,
            hits,
            took_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn refresh(&self, index: &str) -> Result<()> {
        self.check_available()?;
        let mut guard = self.state.write().await;
        let State { indices, next_seq } = &mut *guard;
        let idx = indices
            .get_mut(index)
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))?;

        debug!("Refreshing index {} ({} pending writes)", index, idx.pending.len());
        for write in idx.pending.drain(..) {
            match write {
                PendingWrite::Upsert { key, source } => match idx.documents.get_mut(&key) {
                    Some(existing) => existing.source = source,
                    None => {
                        *next_seq += 1;
                        idx.documents.insert(
                            key,
                            StoredDocument {
                                seq: *next_seq,
                                source,
                            },
                        );
                    }
                },
                PendingWrite::Delete { key } => {
                    idx.documents.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// Evaluates queries against one document type's stored sources.
struct Evaluator<'a> {
    types: Option<&'a BTreeMap<String, FieldType>>,
}

impl Evaluator<'_> {
    /// `Some(score)` when the document matches.
    fn score(&self, query: &Query, doc: &Map<String, Value>) -> Result<Option<f64>> {
        let score = match query {
            Query::MatchAll => Some(1.0),
            Query::Match(m) => self.match_tokens(
                doc,
                &m.field,
                &m.query,
                m.operator.as_deref() == Some("and"),
                m.fuzziness.as_deref(),
            ),
            Query::MatchPhrase(m) => self.phrase(doc, &m.field, &m.query, false),
            Query::MultiMatch(m) => m
                .fields
                .iter()
                .filter_map(|field| match m.match_type {
                    MultiMatchType::BestFields => {
                        self.match_tokens(doc, field, &m.query, false, m.fuzziness.as_deref())
                    }
                    MultiMatchType::Phrase => self.phrase(doc, field, &m.query, false),
                    MultiMatchType::PhrasePrefix => self.phrase(doc, field, &m.query, true),
                })
                .reduce(f64::max),
            Query::Term(t) => {
                self.any_value(doc, &t.field, |value, ft| term_matches(value, &t.value, ft))
            }
            Query::Terms(t) => self.any_value(doc, &t.field, |value, ft| {
                t.values.iter().any(|term| term_matches(value, term, ft))
            }),
            Query::Range(r) => self.any_value(doc, &r.field, |value, _| in_range(value, r)),
            Query::Prefix(p) => {
                self.any_token(doc, &p.field, |token| token.starts_with(p.value.as_str()))
            }
            Query::Wildcard(w) => self.any_token(doc, &w.field, |token| glob(&w.value, token)),
            Query::Fuzzy(f) => {
                let max = max_edits(f.fuzziness.as_deref(), &f.value);
                self.any_token(doc, &f.field, |token| levenshtein(token, &f.value) <= max)
            }
            Query::QueryString(q) => self.query_string(doc, q),
            Query::Exists(e) => doc.get(&e.field).filter(|v| !v.is_null()).map(|_| 1.0),
            Query::Bool(b) => self.bool_query(doc, b)?,
            Query::Raw(_) => {
                return Err(SearchError::Query(
                    "raw queries cannot be evaluated in memory".to_string(),
                ));
            }
        };
        Ok(score)
    }

    fn bool_query(&self, doc: &Map<String, Value>, query: &BoolQuery) -> Result<Option<f64>> {
        let mut score = 0.0;

        for clause in &query.must {
            match self.score(clause, doc)? {
                Some(s) => score += s,
                None => return Ok(None),
            }
        }
        for clause in &query.filter {
            if self.score(clause, doc)?.is_none() {
                return Ok(None);
            }
        }
        for clause in &query.must_not {
            if self.score(clause, doc)?.is_some() {
                return Ok(None);
            }
        }

        let mut should_matched = 0;
        for clause in &query.should {
            if let Some(s) = self.score(clause, doc)? {
                should_matched += 1;
                score += s;
            }
        }
        if should_matched < query.effective_minimum_should_match() {
            return Ok(None);
        }

        Ok(Some(score))
    }

    fn field_type(&self, field: &str, value: &Value) -> FieldType {
        self.types
            .and_then(|types| types.get(field).copied())
            .unwrap_or_else(|| infer_type(value))
    }

    /// Tokens of each value stored under `field`, with the field's type.
    fn value_tokens(&self, doc: &Map<String, Value>, field: &str) -> Option<(FieldType, Vec<Vec<String>>)> {
        let values = values(doc, field);
        let field_type = self.field_type(field, values.first()?);
        let tokens = values
            .iter()
            .map(|value| analyze_as(&as_text(value), field_type))
            .collect();
        Some((field_type, tokens))
    }

    fn match_tokens(
        &self,
        doc: &Map<String, Value>,
        field: &str,
        query: &str,
        require_all: bool,
        fuzziness: Option<&str>,
    ) -> Option<f64> {
        let (field_type, tokens) = self.value_tokens(doc, field)?;
        let wanted = analyze_as(query, field_type);
        if wanted.is_empty() {
            return None;
        }

        let tokens: Vec<&String> = tokens.iter().flatten().collect();
        let matched = wanted
            .iter()
            .filter(|want| {
                let edits = fuzziness.map_or(0, |f| max_edits(Some(f), want));
                tokens
                    .iter()
                    .any(|token| *token == *want || (edits > 0 && levenshtein(token, want) <= edits))
            })
            .count();

        if matched == 0 || (require_all && matched < wanted.len()) {
            None
        } else {
            Some(matched as f64)
        }
    }

    fn phrase(
        &self,
        doc: &Map<String, Value>,
        field: &str,
        query: &str,
        prefix_last: bool,
    ) -> Option<f64> {
        let (field_type, tokens) = self.value_tokens(doc, field)?;
        let wanted = analyze_as(query, field_type);
        if wanted.is_empty() {
            return None;
        }

        tokens
            .iter()
            .any(|tokens| contains_phrase(tokens, &wanted, prefix_last))
            .then_some(wanted.len() as f64)
    }

    fn any_value<F>(&self, doc: &Map<String, Value>, field: &str, predicate: F) -> Option<f64>
    where
        F: Fn(&Value, FieldType) -> bool,
    {
        values(doc, field)
            .into_iter()
            .any(|value| predicate(value, self.field_type(field, value)))
            .then_some(1.0)
    }

    fn any_token<F>(&self, doc: &Map<String, Value>, field: &str, predicate: F) -> Option<f64>
    where
        F: Fn(&str) -> bool,
    {
        let (_, tokens) = self.value_tokens(doc, field)?;
        tokens
            .iter()
            .flatten()
            .any(|token| predicate(token))
            .then_some(1.0)
    }

    /// Whitespace-separated clauses, OR-ed. A clause may name its field with
    /// `field:value`; values may use `*` and `?`.
    fn query_string(&self, doc: &Map<String, Value>, query: &QueryStringQuery) -> Option<f64> {
        let fields: Vec<String> = match (&query.default_field, &query.fields) {
            (Some(field), _) => vec![field.clone()],
            (None, Some(fields)) => fields.clone(),
            (None, None) => doc.keys().cloned().collect(),
        };

        let matched = query
            .query
            .split_whitespace()
            .filter(|clause| !matches!(*clause, "AND" | "OR"))
            .filter(|clause| {
                let (clause_fields, pattern) = match clause.split_once(':') {
                    Some((field, pattern)) => (vec![field.to_string()], pattern),
                    None => (fields.clone(), *clause),
                };
                clause_fields.iter().any(|field| {
                    self.value_tokens(doc, field).is_some_and(|(field_type, tokens)| {
                        let pattern = if field_type.is_analyzed() {
                            pattern.to_lowercase()
                        } else {
                            pattern.to_string()
                        };
                        tokens.iter().flatten().any(|token| glob(&pattern, token))
                    })
                })
            })
            .count();

        (matched > 0).then_some(matched as f64)
    }
}

/// Lowercase alphanumeric runs.
fn analyze(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn analyze_as(text: &str, field_type: FieldType) -> Vec<String> {
    if field_type.is_analyzed() {
        analyze(text)
    } else {
        vec![text.to_string()]
    }
}

fn values<'a>(doc: &'a Map<String, Value>, field: &str) -> Vec<&'a Value> {
    match doc.get(field) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
        Some(value) => vec![value],
    }
}

fn infer_type(value: &Value) -> FieldType {
    match value {
        Value::String(_) => FieldType::Text,
        Value::Number(n) if n.is_f64() => FieldType::Double,
        Value::Number(_) => FieldType::Long,
        Value::Bool(_) => FieldType::Boolean,
        _ => FieldType::Object,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn term_matches(value: &Value, term: &Value, field_type: FieldType) -> bool {
    if field_type.is_numeric() {
        return match (as_number(value), as_number(term)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
    }

    let term = as_text(term);
    if field_type.is_analyzed() {
        analyze(&as_text(value)).contains(&term)
    } else {
        as_text(value) == term
    }
}

fn compare(value: &Value, bound: &Value) -> Option<Ordering> {
    match (as_number(value), as_number(bound)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(as_text(value).cmp(&as_text(bound))),
    }
}

fn in_range(value: &Value, range: &RangeQuery) -> bool {
    let holds = |bound: &Option<Value>, accept: &[Ordering]| {
        bound.as_ref().is_none_or(|bound| {
            compare(value, bound).is_some_and(|ordering| accept.contains(&ordering))
        })
    };

    holds(&range.gt, &[Ordering::Greater])
        && holds(&range.gte, &[Ordering::Greater, Ordering::Equal])
        && holds(&range.lt, &[Ordering::Less])
        && holds(&range.lte, &[Ordering::Less, Ordering::Equal])
}

fn contains_phrase(tokens: &[String], phrase: &[String], prefix_last: bool) -> bool {
    if phrase.len() > tokens.len() {
        return false;
    }

    tokens.windows(phrase.len()).any(|window| {
        window.iter().zip(phrase).enumerate().all(|(i, (token, want))| {
            if prefix_last && i + 1 == phrase.len() {
                token.starts_with(want.as_str())
            } else {
                token == want
            }
        })
    })
}

/// Edit distance allowed for `term`. `AUTO` (or unset) allows none up to two
/// characters, one up to five and two beyond.
fn max_edits(fuzziness: Option<&str>, term: &str) -> usize {
    if let Some(edits) = fuzziness.and_then(|f| f.parse::<usize>().ok()) {
        return edits;
    }
    match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// `*` matches any run, `?` any single character.
fn glob(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{FieldMapping, FieldSpec};
    use crate::query::{MatchQuery, MultiMatchQuery};
    use serde_json::json;

    const INDEX: &str = "test";

    async fn engine() -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine
            .create_index(INDEX, &IndexSettings::default(), &SchemaMap::new())
            .await
            .unwrap();
        let schema = SchemaDescriptor::new(
            FieldMapping::new()
                .field("subject", FieldSpec::text())
                .field("status", FieldSpec::keyword())
                .field("category_id", FieldSpec::integer()),
        );
        engine.put_schema(INDEX, "article", &schema).await.unwrap();

        for (id, subject, status, category) in [
            ("1", "make it works", "online", 1),
            ("2", "My amazing article", "draft", 2),
            ("3", "Amazing grace", "online", 3),
        ] {
            let doc = IndexedDocument::new(id)
                .with_field("subject", json!(subject))
                .with_field("status", json!(status))
                .with_field("category_id", json!(category));
            engine.upsert_document(INDEX, "article", &doc).await.unwrap();
        }
        engine.refresh(INDEX).await.unwrap();
        engine
    }

    async fn ids(engine: &MemoryEngine, query: Query) -> Vec<String> {
        let request = SearchRequest {
            query: Some(query),
            ..SearchRequest::new()
        };
        let response = engine.search(INDEX, "article", &request).await.unwrap();
        let mut ids: Vec<String> = response.hits.into_iter().map(|h| h.id).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_writes_visible_after_refresh() {
        let engine = engine().await;
        let doc = IndexedDocument::new("4").with_field("subject", json!("late"));
        engine.upsert_document(INDEX, "article", &doc).await.unwrap();

        assert!(ids(&engine, Query::match_query("subject", "late")).await.is_empty());
        assert_eq!(engine.pending_writes(INDEX).await, 1);

        engine.refresh(INDEX).await.unwrap();
        assert_eq!(ids(&engine, Query::match_query("subject", "late")).await, ["4"]);
    }

    #[tokio::test]
    async fn test_text_and_keyword_semantics() {
        let engine = engine().await;

        assert_eq!(ids(&engine, Query::prefix("subject", "amaz")).await, ["2", "3"]);
        assert_eq!(ids(&engine, Query::match_query("subject", "AMAZING")).await, ["2", "3"]);
        assert_eq!(ids(&engine, Query::term("status", "online")).await, ["1", "3"]);
        assert!(ids(&engine, Query::term("status", "Online")).await.is_empty());
        assert!(ids(&engine, Query::match_phrase("subject", "amazing my")).await.is_empty());
        assert_eq!(ids(&engine, Query::match_phrase("subject", "my amazing")).await, ["2"]);
        assert_eq!(
            ids(&engine, Query::Range(RangeQuery::new("category_id").gte(2))).await,
            ["2", "3"]
        );
        assert_eq!(ids(&engine, Query::fuzzy("subject", "amazng")).await, ["2", "3"]);
        assert_eq!(ids(&engine, Query::wildcard("subject", "w?rk*")).await, ["1"]);
    }

    #[tokio::test]
    async fn test_match_operator_and() {
        let engine = engine().await;
        let query = Query::Match(MatchQuery::new("subject", "amazing grace").operator("and"));
        assert_eq!(ids(&engine, query).await, ["3"]);
        assert_eq!(
            ids(&engine, Query::match_query("subject", "amazing grace")).await,
            ["2", "3"]
        );
    }

    #[tokio::test]
    async fn test_multi_match_phrase_prefix() {
        let engine = engine().await;
        let query = Query::MultiMatch(
            MultiMatchQuery::new("make it wo", vec!["subject".into(), "status".into()])
                .match_type(MultiMatchType::PhrasePrefix),
        );
        assert_eq!(ids(&engine, query).await, ["1"]);
    }

    #[tokio::test]
    async fn test_bool_should_and_filter() {
        let engine = engine().await;
        let query = BoolQuery::new()
            .should(Query::term("status", "draft"))
            .should(Query::prefix("subject", "make"))
            .build();
        assert_eq!(ids(&engine, query).await, ["1", "2"]);

        let request = SearchRequest {
            query: Some(Query::prefix("subject", "amaz")),
            filter: Some(Query::term("status", "online")),
            ..SearchRequest::new()
        };
        let response = engine.search(INDEX, "article", &request).await.unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.hits[0].id, "3");
    }

    #[tokio::test]
    async fn test_window_and_total() {
        let engine = engine().await;
        let request = SearchRequest {
            size: Some(1),
            from: Some(1),
            ..SearchRequest::new()
        };
        let response = engine.search(INDEX, "article", &request).await.unwrap();
        assert_eq!(response.total, 3);
        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].id, "2");
    }

    #[tokio::test]
    async fn test_delete_document_reports_existence() {
        let engine = engine().await;
        assert!(engine.delete_document(INDEX, "article", "1").await.unwrap());
        assert!(!engine.delete_document(INDEX, "article", "1").await.unwrap());
        assert!(!engine.delete_document(INDEX, "article", "99").await.unwrap());

        engine.refresh(INDEX).await.unwrap();
        assert!(engine.document(INDEX, "article", "1").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_schema_drops_documents() {
        let engine = engine().await;
        engine.delete_schema(INDEX, "article").await.unwrap();

        assert!(engine.schema(INDEX, "article").await.is_none());
        assert!(ids(&engine, Query::MatchAll).await.is_empty());
        engine.delete_schema(INDEX, "article").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_index_and_offline() {
        let engine = MemoryEngine::new();
        let err = engine.refresh("nope").await.unwrap_err();
        assert!(matches!(err, SearchError::IndexNotFound(_)));

        engine.set_available(false);
        let err = engine.index_exists("nope").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_create_existing_index_fails() {
        let engine = engine().await;
        let result = engine
            .create_index(INDEX, &IndexSettings::default(), &SchemaMap::new())
            .await;
        assert!(matches!(result, Err(SearchError::Engine(_))));
    }

    #[test]
    fn test_helpers() {
        assert_eq!(analyze("hey #tgif, World"), ["hey", "tgif", "world"]);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert!(glob("a*c?", "abbbcd"));
        assert!(!glob("a*c", "abd"));
        assert_eq!(max_edits(None, "ab"), 0);
        assert_eq!(max_edits(Some("AUTO"), "amazing"), 2);
        assert_eq!(max_edits(Some("1"), "amazing"), 1);
    }
}
