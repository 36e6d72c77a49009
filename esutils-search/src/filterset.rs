//! Filter sets: field/term pairs composed into one filter.

use crate::action::MatchAction;
use crate::error::{Result, SearchError};
use crate::filter::{Composition, Filter, MATCH_ALL, leaf_query};
use crate::mapping::{DocumentMapper, MappingType};
use crate::query::Query;
use crate::search::Search;
use futures::stream::BoxStream;
use std::collections::{BTreeMap, HashMap};

/// Composes `(field, term, action)` triples into a filter over a base search.
///
/// For each search field the term is the field's own term, falling back to
/// the free text keyed by [`MATCH_ALL`]. Leaves are ORed when non-empty free
/// text is present and ANDed otherwise, folding from [`Filter::Identity`] in
/// field order. Fields without a term contribute nothing.
pub struct FilterSet<M: MappingType> {
    search_fields: Vec<String>,
    search_actions: HashMap<String, MatchAction>,
    search_terms: BTreeMap<String, String>,
    default_action: Option<MatchAction>,
    base: Search<M>,
}

impl<M: MappingType> FilterSet<M> {
    /// A filter set over `base`, searching every field by default.
    pub fn new(base: Search<M>) -> Self {
        Self {
            search_fields: Vec::new(),
            search_actions: HashMap::new(),
            search_terms: BTreeMap::new(),
            default_action: None,
            base,
        }
    }

    /// Fields to search, in order. Empty means [`MATCH_ALL`].
    pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_search_action(mut self, field: impl Into<String>, action: MatchAction) -> Self {
        self.search_actions.insert(field.into(), action);
        self
    }

    pub fn with_search_actions(mut self, actions: HashMap<String, MatchAction>) -> Self {
        self.search_actions.extend(actions);
        self
    }

    pub fn with_search_term(mut self, field: impl Into<String>, term: impl Into<String>) -> Self {
        self.search_terms.insert(field.into(), term.into());
        self
    }

    pub fn with_search_terms<I, K, V>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.search_terms
            .extend(terms.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Action for fields without their own.
    pub fn with_default_action(mut self, action: MatchAction) -> Self {
        self.default_action = Some(action);
        self
    }

    pub fn mapper(&self) -> &DocumentMapper<M> {
        self.base.mapper()
    }

    /// Fields that will be searched.
    pub fn search_fields(&self) -> Vec<&str> {
        if self.search_fields.is_empty() {
            vec![MATCH_ALL]
        } else {
            self.search_fields.iter().map(String::as_str).collect()
        }
    }

    pub fn search_terms(&self) -> &BTreeMap<String, String> {
        &self.search_terms
    }

    /// The action applied to `field`.
    pub fn action_for(&self, field: &str) -> MatchAction {
        self.search_actions
            .get(field)
            .copied()
            .or(self.default_action)
            .unwrap_or_default()
    }

    /// The term applied to `field`, if any.
    ///
    /// Free text only reaches text and keyword fields.
    pub fn term_for(&self, field: &str) -> Option<&str> {
        self.non_empty_term(field).or_else(|| {
            self.non_empty_term(MATCH_ALL)
                .filter(|_| self.accepts_free_text(field))
        })
    }

    /// How leaves are combined.
    pub fn composition(&self) -> Composition {
        if self.non_empty_term(MATCH_ALL).is_some() {
            Composition::Or
        } else {
            Composition::And
        }
    }

    /// The single leaf built for `field` and `term`.
    pub fn leaf_filter(&self, field: &str, term: &str) -> Result<Query> {
        leaf_query(
            self.mapper().field_mapping(),
            field,
            self.action_for(field),
            term,
        )
    }

    /// The composed filter. Fields are validated against the mapping even when
    /// they have no term.
    pub fn build_filter(&self) -> Result<Filter> {
        let composition = self.composition();
        let mut filter = Filter::Identity;

        for field in self.search_fields() {
            let Some(term) = self.term_for(field) else {
                self.check_mapped(field)?;
                continue;
            };

            let leaf = Filter::leaf(self.leaf_filter(field, term)?);
            filter = composition.combine(filter, leaf);
        }

        Ok(filter)
    }

    /// The base search with the composed filter applied.
    pub fn qs(&self) -> Result<Search<M>> {
        Ok(self.base.clone().filter(self.build_filter()?))
    }

    /// Total matching documents.
    pub async fn count(&self) -> Result<u64> {
        self.qs()?.count().await
    }

    /// Matching domain objects, in engine order.
    pub fn results(&self) -> Result<BoxStream<'static, Result<M::Model>>> {
        Ok(self.qs()?.objects())
    }

    fn non_empty_term(&self, field: &str) -> Option<&str> {
        self.search_terms
            .get(field)
            .map(String::as_str)
            .filter(|term| !term.trim().is_empty())
    }

    fn accepts_free_text(&self, field: &str) -> bool {
        field == MATCH_ALL
            || self
                .mapper()
                .field_mapping()
                .get(field)
                .is_some_and(|spec| spec.field_type.is_textual())
    }

    fn check_mapped(&self, field: &str) -> Result<()> {
        if field == MATCH_ALL || self.mapper().has_field(field) {
            Ok(())
        } else {
            Err(SearchError::Configuration(format!(
                "Field {:?} is not mapped",
                field
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchSettings;
    use crate::datastore::InMemoryDatastore;
    use crate::engine::MemoryEngine;
    use crate::mapping::{FieldMapping, FieldSpec};
    use crate::query::{MultiMatchQuery, TermQuery};
    use serde::Serialize;
    use std::sync::Arc;

    #[derive(Debug, Clone, Serialize)]
    struct Person {
        id: u32,
        firstname: String,
        lastname: String,
        age: u32,
    }

    struct PersonMapping;

    impl MappingType for PersonMapping {
        type Model = Person;

        fn model_name() -> &'static str {
            "Person"
        }

        fn field_mapping() -> FieldMapping {
            FieldMapping::new()
                .field("firstname", FieldSpec::text())
                .field("lastname", FieldSpec::keyword())
                .field("age", FieldSpec::integer())
        }
    }

    fn filter_set() -> FilterSet<PersonMapping> {
        let store: Arc<InMemoryDatastore<Person>> = Arc::new(InMemoryDatastore::new());
        let mapper = DocumentMapper::<PersonMapping>::new(&SearchSettings::new(), store).unwrap();
        FilterSet::new(Search::new(mapper, Arc::new(MemoryEngine::new())))
    }

    #[test]
    fn test_no_terms_is_identity() {
        let set = filter_set().with_search_fields(["firstname", "lastname"]);
        assert_eq!(set.build_filter().unwrap(), Filter::Identity);
    }

    #[test]
    fn test_single_term_is_its_leaf() {
        let set = filter_set()
            .with_search_fields(["firstname", "lastname", "age"])
            .with_search_term("lastname", "dylan");

        assert_eq!(
            set.build_filter().unwrap(),
            Filter::leaf(Query::match_query("lastname", "dylan"))
        );
    }

    #[test]
    fn test_concrete_terms_are_anded() {
        let set = filter_set()
            .with_search_fields(["firstname", "lastname"])
            .with_search_terms([("firstname", "bob"), ("lastname", "dylan")])
            .with_search_action("lastname", MatchAction::Term);

        assert_eq!(set.composition(), Composition::And);
        assert_eq!(
            set.build_filter().unwrap(),
            Filter::And(vec![
                Filter::leaf(Query::match_query("firstname", "bob")),
                Filter::leaf(Query::Term(TermQuery::new("lastname", "dylan"))),
            ])
        );
    }

    #[test]
    fn test_free_text_is_ored_over_fields() {
        let set = filter_set()
            .with_search_fields(["firstname", "lastname"])
            .with_search_term(MATCH_ALL, "bob");

        assert_eq!(set.composition(), Composition::Or);
        assert_eq!(
            set.build_filter().unwrap(),
            Filter::Or(vec![
                Filter::leaf(Query::match_query("firstname", "bob")),
                Filter::leaf(Query::match_query("lastname", "bob")),
            ])
        );
    }

    #[test]
    fn test_field_term_precedes_free_text() {
        let set = filter_set()
            .with_search_fields(["firstname", "lastname"])
            .with_search_terms([(MATCH_ALL, "bob"), ("lastname", "dylan")]);

        assert_eq!(
            set.build_filter().unwrap(),
            Filter::Or(vec![
                Filter::leaf(Query::match_query("firstname", "bob")),
                Filter::leaf(Query::match_query("lastname", "dylan")),
            ])
        );
    }

    #[test]
    fn test_free_text_skips_non_textual_fields() {
        let set = filter_set()
            .with_search_fields(["firstname", "age", "lastname"])
            .with_search_term(MATCH_ALL, "bob");

        assert_eq!(set.term_for("age"), None);
        assert_eq!(
            set.build_filter().unwrap(),
            Filter::Or(vec![
                Filter::leaf(Query::match_query("firstname", "bob")),
                Filter::leaf(Query::match_query("lastname", "bob")),
            ])
        );
    }

    #[test]
    fn test_numeric_field_keeps_its_own_term() {
        let set = filter_set()
            .with_search_fields(["firstname", "age"])
            .with_search_terms([(MATCH_ALL, "bob"), ("age", "42")])
            .with_search_action("age", MatchAction::Term);

        assert_eq!(
            set.build_filter().unwrap(),
            Filter::Or(vec![
                Filter::leaf(Query::match_query("firstname", "bob")),
                Filter::leaf(Query::Term(TermQuery::new("age", 42))),
            ])
        );
    }

    #[test]
    fn test_default_fields_use_match_all() {
        let set = filter_set().with_search_term(MATCH_ALL, "bob");

        assert_eq!(set.search_fields(), vec![MATCH_ALL]);
        assert_eq!(
            set.build_filter().unwrap(),
            Filter::leaf(Query::MultiMatch(MultiMatchQuery::new(
                "bob",
                vec!["firstname".to_string(), "lastname".to_string()]
            )))
        );
    }

    #[test]
    fn test_empty_free_text_is_ignored() {
        let set = filter_set()
            .with_search_fields(["firstname"])
            .with_search_term(MATCH_ALL, "  ");

        assert_eq!(set.composition(), Composition::And);
        assert_eq!(set.build_filter().unwrap(), Filter::Identity);
    }

    #[test]
    fn test_action_precedence() {
        let set = filter_set()
            .with_default_action(MatchAction::Prefix)
            .with_search_action("age", MatchAction::Gte);

        assert_eq!(set.action_for("age"), MatchAction::Gte);
        assert_eq!(set.action_for("firstname"), MatchAction::Prefix);
        assert_eq!(filter_set().action_for("firstname"), MatchAction::Match);
    }

    #[test]
    fn test_startswith_and_prefix_build_the_same_leaf() {
        let prefix = filter_set().with_search_action("firstname", MatchAction::Prefix);
        let startswith = filter_set()
            .with_search_action("firstname", "startswith".parse().unwrap());

        assert_eq!(
            prefix.leaf_filter("firstname", "bo").unwrap(),
            startswith.leaf_filter("firstname", "bo").unwrap()
        );
    }

    #[test]
    fn test_unmapped_field_is_rejected() {
        let with_term = filter_set()
            .with_search_fields(["nickname"])
            .with_search_term("nickname", "bobby");
        assert!(matches!(
            with_term.build_filter(),
            Err(SearchError::Configuration(_))
        ));

        let without_term = filter_set().with_search_fields(["nickname"]);
        assert!(matches!(
            without_term.build_filter(),
            Err(SearchError::Configuration(_))
        ));
    }
}
