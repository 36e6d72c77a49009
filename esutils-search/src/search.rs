//! Search builder.

use crate::action::Lookup;
use crate::engine::{SearchEngine, SearchRequest, SearchResponse};
use crate::error::Result;
use crate::filter::{Filter, leaf_query};
use crate::mapping::{DocumentMapper, MappingType};
use crate::query::{BoolQuery, Query};
use esutils_log::debug;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;

/// A search against one mapping type.
///
/// Scored queries are ANDed together, as are filters. Nothing is sent to the
/// engine until [`execute`](Self::execute), [`count`](Self::count) or
/// [`objects`](Self::objects) is called.
///
/// ```no_run
/// # use esutils_search::*;
/// # async fn example<M: MappingType>(search: Search<M>) -> Result<()> {
/// let hits = search
///     .query_kv("subject__prefix", "amaz")?
///     .size(20)
///     .count()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Search<M: MappingType> {
    mapper: DocumentMapper<M>,
    engine: Arc<dyn SearchEngine>,
    queries: Vec<Query>,
    filter: Filter,
    from: Option<usize>,
    size: Option<usize>,
}

impl<M: MappingType> Search<M> {
    pub fn new(mapper: DocumentMapper<M>, engine: Arc<dyn SearchEngine>) -> Self {
        Self {
            mapper,
            engine,
            queries: Vec::new(),
            filter: Filter::Identity,
            from: None,
            size: None,
        }
    }

    pub fn mapper(&self) -> &DocumentMapper<M> {
        &self.mapper
    }

    pub fn engine(&self) -> &Arc<dyn SearchEngine> {
        &self.engine
    }

    /// The filter applied so far.
    pub fn current_filter(&self) -> &Filter {
        &self.filter
    }

    /// Add a scored query.
    pub fn query(mut self, query: Query) -> Self {
        self.queries.push(query);
        self
    }

    /// Add a scored query from a `field__action` lookup.
    pub fn query_kv(self, lookup: &str, term: &str) -> Result<Self> {
        let query = self.lookup_query(lookup, term)?;
        Ok(self.query(query))
    }

    /// AND a filter expression into the current filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = std::mem::take(&mut self.filter).and(filter);
        self
    }

    /// AND a filter from a `field__action` lookup.
    pub fn filter_kv(self, lookup: &str, term: &str) -> Result<Self> {
        let query = self.lookup_query(lookup, term)?;
        Ok(self.filter(Filter::leaf(query)))
    }

    pub fn from(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// The request this search sends.
    pub fn request(&self) -> SearchRequest {
        let query = match self.queries.as_slice() {
            [] => None,
            [query] => Some(query.clone()),
            queries => Some(
                queries
                    .iter()
                    .cloned()
                    .fold(BoolQuery::new(), BoolQuery::must)
                    .build(),
            ),
        };

        SearchRequest {
            query,
            filter: self.filter.to_query(),
            from: self.from,
            size: self.size,
        }
    }

    /// Run the search and return the raw hits.
    pub async fn execute(&self) -> Result<SearchResponse> {
        let request = self.request();
        debug!(
            "Searching {}/{}: {}",
            self.mapper.index_name(),
            self.mapper.document_type(),
            request.to_body()
        );

        self.engine
            .search(
                self.mapper.index_name(),
                self.mapper.document_type(),
                &request,
            )
            .await
    }

    /// Total matching documents, ignoring the result window.
    pub async fn count(&self) -> Result<u64> {
        let mut request = self.request();
        request.from = None;
        request.size = Some(0);

        let response = self
            .engine
            .search(
                self.mapper.index_name(),
                self.mapper.document_type(),
                &request,
            )
            .await?;
        Ok(response.total)
    }

    /// Domain objects for each hit, in engine order.
    ///
    /// The search runs when the stream is first polled. A hit whose object is
    /// gone from the datastore yields
    /// [`SearchError::ObjectNotFound`](crate::SearchError::ObjectNotFound) and
    /// the stream continues.
    pub fn objects(&self) -> BoxStream<'static, Result<M::Model>> {
        let mapper = self.mapper.clone();
        let engine = Arc::clone(&self.engine);
        let request = self.request();

        let index = mapper.index_name().to_string();
        let document_type = mapper.document_type().to_string();
        let response =
            stream::once(async move { engine.search(&index, &document_type, &request).await });

        response
            .map_ok(move |response| {
                let mapper = mapper.clone();
                stream::iter(response.hits).then(move |hit| {
                    let mapper = mapper.clone();
                    async move { mapper.fetch(&hit.id).await }
                })
            })
            .try_flatten()
            .boxed()
    }

    fn lookup_query(&self, lookup: &str, term: &str) -> Result<Query> {
        let lookup = Lookup::parse(lookup);
        leaf_query(
            self.mapper.field_mapping(),
            &lookup.field,
            lookup.action.unwrap_or_default(),
            term,
        )
    }
}

impl<M: MappingType> Clone for Search<M> {
    fn clone(&self) -> Self {
        Self {
            mapper: self.mapper.clone(),
            engine: Arc::clone(&self.engine),
            queries: self.queries.clone(),
            filter: self.filter.clone(),
            from: self.from,
            size: self.size,
        }
    }
}
