//! Filter expressions and leaf predicates.

use crate::action::MatchAction;
use crate::error::{Result, SearchError};
use crate::mapping::{FieldMapping, FieldType};
use crate::query::{
    BoolQuery, FuzzyQuery, MultiMatchQuery, MultiMatchType, Query, QueryStringQuery, RangeQuery,
};

/// Field name meaning "every searchable field".
pub const MATCH_ALL: &str = "_all";

/// A boolean tree of leaf predicates.
///
/// `Identity` matches everything and disappears when combined with anything
/// else, under both AND and OR.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    #[default]
    Identity,
    Leaf(Query),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn leaf(query: Query) -> Self {
        Filter::Leaf(query)
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Filter::Identity)
    }

    /// Conjunction, flattening nested ANDs.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::Identity, f) | (f, Filter::Identity) => f,
            (Filter::And(mut left), Filter::And(right)) => {
                left.extend(right);
                Filter::And(left)
            }
            (Filter::And(mut left), f) => {
                left.push(f);
                Filter::And(left)
            }
            (f, Filter::And(mut right)) => {
                right.insert(0, f);
                Filter::And(right)
            }
            (left, right) => Filter::And(vec![left, right]),
        }
    }

    /// Disjunction, flattening nested ORs.
    pub fn or(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::Identity, f) | (f, Filter::Identity) => f,
            (Filter::Or(mut left), Filter::Or(right)) => {
                left.extend(right);
                Filter::Or(left)
            }
            (Filter::Or(mut left), f) => {
                left.push(f);
                Filter::Or(left)
            }
            (f, Filter::Or(mut right)) => {
                right.insert(0, f);
                Filter::Or(right)
            }
            (left, right) => Filter::Or(vec![left, right]),
        }
    }

    /// Render as a query. `None` for the identity filter.
    pub fn to_query(&self) -> Option<Query> {
        match self {
            Filter::Identity => None,
            Filter::Leaf(query) => Some(query.clone()),
            Filter::And(filters) => {
                let bool_query = filters
                    .iter()
                    .filter_map(Filter::to_query)
                    .fold(BoolQuery::new(), BoolQuery::filter);
                Some(bool_query.build())
            }
            Filter::Or(filters) => {
                let bool_query = filters
                    .iter()
                    .filter_map(Filter::to_query)
                    .fold(BoolQuery::new(), BoolQuery::should);
                Some(bool_query.minimum_should_match(1).build())
            }
        }
    }
}

/// How leaf predicates are folded together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    And,
    Or,
}

impl Composition {
    pub fn combine(&self, left: Filter, right: Filter) -> Filter {
        match self {
            Composition::And => left.and(right),
            Composition::Or => left.or(right),
        }
    }
}

/// Build the leaf predicate for `(field, action, term)` against `mapping`.
///
/// `field` must be mapped or be [`MATCH_ALL`]. Terms are coerced to the
/// field's declared type for exact and range actions.
pub fn leaf_query(
    mapping: &FieldMapping,
    field: &str,
    action: MatchAction,
    term: &str,
) -> Result<Query> {
    if field == MATCH_ALL {
        return match_all_query(mapping, action, term);
    }

    let field_type = mapping
        .get(field)
        .map(|spec| spec.field_type)
        .ok_or_else(|| {
            SearchError::Configuration(format!("Field {:?} is not mapped", field))
        })?;
    let coerce = |raw: &str| field_type.coerce(raw);

    let query = match action {
        MatchAction::Term => Query::term(field, coerce(term)),
        MatchAction::Terms => Query::terms(field, split_values(term).map(coerce).collect()),
        MatchAction::Match => Query::match_query(field, term),
        MatchAction::Prefix => Query::prefix(field, term),
        MatchAction::Range => Query::Range(parse_range(field, term, field_type)?),
        MatchAction::Gt => Query::Range(RangeQuery::new(field).gt(coerce(term))),
        MatchAction::Gte => Query::Range(RangeQuery::new(field).gte(coerce(term))),
        MatchAction::Lt => Query::Range(RangeQuery::new(field).lt(coerce(term))),
        MatchAction::Lte => Query::Range(RangeQuery::new(field).lte(coerce(term))),
        MatchAction::Fuzzy => Query::Fuzzy(FuzzyQuery {
            field: field.to_string(),
            value: term.to_string(),
            fuzziness: None,
        }),
        MatchAction::Wildcard => Query::wildcard(field, term),
        MatchAction::MatchPhrase => Query::match_phrase(field, term),
        MatchAction::QueryString => {
            Query::QueryString(QueryStringQuery::new(term).default_field(field))
        }
    };

    Ok(query)
}

/// Free text spread over every string-typed mapped field.
fn match_all_query(mapping: &FieldMapping, action: MatchAction, term: &str) -> Result<Query> {
    let fields: Vec<String> = mapping
        .iter()
        .filter(|(_, spec)| spec.field_type.is_textual())
        .map(|(name, _)| name.to_string())
        .collect();

    if fields.is_empty() {
        return Err(SearchError::Configuration(
            "No text or keyword fields to search for free text".to_string(),
        ));
    }

    let multi_match = MultiMatchQuery::new(term, fields.clone());
    let query = match action {
        MatchAction::Match | MatchAction::Term | MatchAction::Terms => {
            Query::MultiMatch(multi_match)
        }
        MatchAction::Prefix => {
            Query::MultiMatch(multi_match.match_type(MultiMatchType::PhrasePrefix))
        }
        MatchAction::MatchPhrase => Query::MultiMatch(multi_match.match_type(MultiMatchType::Phrase)),
        MatchAction::Fuzzy => Query::MultiMatch(multi_match.fuzziness("AUTO")),
        MatchAction::QueryString | MatchAction::Wildcard => {
            Query::QueryString(QueryStringQuery::new(term).fields(fields))
        }
        MatchAction::Range
        | MatchAction::Gt
        | MatchAction::Gte
        | MatchAction::Lt
        | MatchAction::Lte => {
            return Err(SearchError::Configuration(format!(
                "{} needs a concrete field, not {}",
                action, MATCH_ALL
            )));
        }
    };

    Ok(query)
}

fn split_values(term: &str) -> impl Iterator<Item = &str> {
    term.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn parse_range(field: &str, term: &str, field_type: FieldType) -> Result<RangeQuery> {
    let (lo, hi) = term.split_once("..").ok_or_else(|| {
        SearchError::QuerySyntax(format!("Range {:?} is not of the form lo..hi", term))
    })?;
    let (lo, hi) = (lo.trim(), hi.trim());

    if lo.is_empty() && hi.is_empty() {
        return Err(SearchError::QuerySyntax(format!(
            "Range {:?} has no bounds",
            term
        )));
    }

    let mut range = RangeQuery::new(field);
    if !lo.is_empty() {
        range = range.gte(field_type.coerce(lo));
    }
    if !hi.is_empty() {
        range = range.lte(field_type.coerce(hi));
    }
    Ok(range)
}
