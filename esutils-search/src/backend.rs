//! Raw query string adapter.

use crate::action::MatchAction;
use crate::config::SearchSettings;
use crate::error::{Result, SearchError};
use crate::filter::MATCH_ALL;
use crate::filterset::FilterSet;
use crate::mapping::MappingType;
use crate::search::Search;
use esutils_log::debug;
use std::collections::{BTreeMap, HashMap};

/// Per-view search configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchView {
    /// Fields to search. When unset, the keys of the parsed terms are used.
    pub search_fields: Option<Vec<String>>,
    pub search_actions: HashMap<String, MatchAction>,
    pub default_action: Option<MatchAction>,
    /// Overrides the backend's filter key.
    pub filter_key: Option<String>,
}

impl SearchView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_search_action(mut self, field: impl Into<String>, action: MatchAction) -> Self {
        self.search_actions.insert(field.into(), action);
        self
    }

    pub fn with_default_action(mut self, action: MatchAction) -> Self {
        self.default_action = Some(action);
        self
    }

    pub fn with_filter_key(mut self, filter_key: impl Into<String>) -> Self {
        self.filter_key = Some(filter_key.into());
        self
    }
}

/// Turns request parameters into a [`FilterSet`].
///
/// The raw query lives in one parameter (`q` by default) and is split into
/// `field:term` tokens. Bare tokens are free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterBackend {
    key_separator: String,
    query_splitter: String,
    filter_key: String,
}

impl Default for FilterBackend {
    fn default() -> Self {
        Self {
            key_separator: ":".to_string(),
            query_splitter: " ".to_string(),
            filter_key: "q".to_string(),
        }
    }
}

impl FilterBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self {
            key_separator: settings.key_separator.clone(),
            query_splitter: settings.query_splitter.clone(),
            filter_key: settings.filter_key.clone(),
        }
    }

    pub fn with_separators(
        mut self,
        key_separator: impl Into<String>,
        query_splitter: impl Into<String>,
    ) -> Self {
        self.key_separator = key_separator.into();
        self.query_splitter = query_splitter.into();
        self
    }

    pub fn with_filter_key(mut self, filter_key: impl Into<String>) -> Self {
        self.filter_key = filter_key.into();
        self
    }

    pub fn filter_key(&self) -> &str {
        &self.filter_key
    }

    /// Split a raw query into terms by field.
    ///
    /// A query without any key separator is free text as a whole. Otherwise
    /// each token is `field:term` or bare text; bare tokens are joined into
    /// the free text. Later duplicates of a field win.
    pub fn split_query_str(&self, query: &str) -> Result<BTreeMap<String, String>> {
        let query = query.trim();
        let mut terms = BTreeMap::new();

        if !query.contains(self.key_separator.as_str()) {
            terms.insert(MATCH_ALL.to_string(), query.to_string());
            return Ok(terms);
        }

        let mut free_text = Vec::new();
        for token in query
            .split(self.query_splitter.as_str())
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            let parts: Vec<&str> = token.split(self.key_separator.as_str()).collect();
            match parts.as_slice() {
                [text] => free_text.push(*text),
                [field, term] if !field.trim().is_empty() => {
                    terms.insert(field.trim().to_string(), term.trim().to_string());
                }
                [_, _] => {
                    return Err(SearchError::QuerySyntax(format!(
                        "Token {:?} has an empty field name",
                        token
                    )));
                }
                _ => {
                    return Err(SearchError::QuerySyntax(format!(
                        "Token {:?} contains {:?} more than once",
                        token, self.key_separator
                    )));
                }
            }
        }

        if !free_text.is_empty() {
            terms.insert(MATCH_ALL.to_string(), free_text.join(" "));
        }
        Ok(terms)
    }

    /// The parsed raw query from request parameters. A missing parameter is
    /// an empty query.
    pub fn search_terms(
        &self,
        params: &HashMap<String, String>,
        view: &SearchView,
    ) -> Result<BTreeMap<String, String>> {
        let filter_key = view.filter_key.as_deref().unwrap_or(&self.filter_key);
        let raw = params.get(filter_key).map(String::as_str).unwrap_or("");
        self.split_query_str(raw)
    }

    /// Build the filter set for a request.
    pub fn filter_set<M: MappingType>(
        &self,
        params: &HashMap<String, String>,
        view: &SearchView,
        base: Search<M>,
    ) -> Result<FilterSet<M>> {
        let search_terms = self.search_terms(params, view)?;
        let search_fields = match &view.search_fields {
            Some(fields) => fields.clone(),
            None => search_terms.keys().cloned().collect(),
        };
        debug!("Filtering {:?} on {:?}", search_terms, search_fields);

        let mut filter_set = FilterSet::new(base)
            .with_search_fields(search_fields)
            .with_search_actions(view.search_actions.clone())
            .with_search_terms(search_terms);
        if let Some(action) = view.default_action {
            filter_set = filter_set.with_default_action(action);
        }

        Ok(filter_set)
    }

    /// The filtered search for a request.
    pub fn filter_queryset<M: MappingType>(
        &self,
        params: &HashMap<String, String>,
        view: &SearchView,
        base: Search<M>,
    ) -> Result<Search<M>> {
        self.filter_set(params, view, base)?.qs()
    }
}
