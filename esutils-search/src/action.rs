//! Match actions and lookup keys.

use crate::error::{Result, SearchError};
use std::fmt;
use std::str::FromStr;

/// How a term is matched against a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchAction {
    /// Exact value.
    Term,
    /// Any of a comma-separated list of exact values. Also spelled `in`.
    Terms,
    /// Analyzed full-text match.
    #[default]
    Match,
    /// Value prefix. Also spelled `startswith`.
    Prefix,
    /// Inclusive `lo..hi` range, either bound optional.
    Range,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Approximate match within an edit distance.
    Fuzzy,
    /// `*` and `?` pattern.
    Wildcard,
    /// Analyzed phrase match.
    MatchPhrase,
    /// Engine query string syntax.
    QueryString,
}

impl MatchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchAction::Term => "term",
            MatchAction::Terms => "terms",
            MatchAction::Match => "match",
            MatchAction::Prefix => "prefix",
            MatchAction::Range => "range",
            MatchAction::Gt => "gt",
            MatchAction::Gte => "gte",
            MatchAction::Lt => "lt",
            MatchAction::Lte => "lte",
            MatchAction::Fuzzy => "fuzzy",
            MatchAction::Wildcard => "wildcard",
            MatchAction::MatchPhrase => "match_phrase",
            MatchAction::QueryString => "query_string",
        }
    }
}

impl FromStr for MatchAction {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "term" => Ok(MatchAction::Term),
            "terms" | "in" => Ok(MatchAction::Terms),
            "match" => Ok(MatchAction::Match),
            "prefix" | "startswith" => Ok(MatchAction::Prefix),
            "range" => Ok(MatchAction::Range),
            "gt" => Ok(MatchAction::Gt),
            "gte" => Ok(MatchAction::Gte),
            "lt" => Ok(MatchAction::Lt),
            "lte" => Ok(MatchAction::Lte),
            "fuzzy" => Ok(MatchAction::Fuzzy),
            "wildcard" => Ok(MatchAction::Wildcard),
            "match_phrase" => Ok(MatchAction::MatchPhrase),
            "query_string" => Ok(MatchAction::QueryString),
            other => Err(SearchError::Configuration(format!(
                "Unknown match action {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for MatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `field__action` keyword split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub field: String,
    pub action: Option<MatchAction>,
}

impl Lookup {
    /// Split on the last `__` when what follows is an action name.
    ///
    /// `author__username` has no action and stays a field path.
    pub fn parse(key: &str) -> Self {
        if let Some((field, suffix)) = key.rsplit_once("__") {
            if let Ok(action) = suffix.parse::<MatchAction>() {
                return Self {
                    field: field.to_string(),
                    action: Some(action),
                };
            }
        }

        Self {
            field: key.to_string(),
            action: None,
        }
    }
}
