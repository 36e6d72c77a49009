//! Query DSL.

use serde_json::{Map, Value, json};

/// Query clauses understood by the engines.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Match all documents.
    MatchAll,
    /// Full-text match query.
    Match(MatchQuery),
    /// Phrase match query.
    MatchPhrase(MatchPhraseQuery),
    /// Full-text match across several fields.
    MultiMatch(MultiMatchQuery),
    /// Term query for exact matches.
    Term(TermQuery),
    /// Terms query for multiple exact matches.
    Terms(TermsQuery),
    /// Range query.
    Range(RangeQuery),
    /// Prefix query.
    Prefix(PrefixQuery),
    /// Wildcard query.
    Wildcard(WildcardQuery),
    /// Fuzzy query.
    Fuzzy(FuzzyQuery),
    /// Query string query.
    QueryString(QueryStringQuery),
    /// Exists query.
    Exists(ExistsQuery),
    /// Bool query for combining queries.
    Bool(BoolQuery),
    /// Raw JSON query, passed through untouched.
    Raw(Value),
}

impl Query {
    pub fn match_query(field: impl Into<String>, query: impl Into<String>) -> Self {
        Query::Match(MatchQuery::new(field, query))
    }

    pub fn match_phrase(field: impl Into<String>, query: impl Into<String>) -> Self {
        Query::MatchPhrase(MatchPhraseQuery {
            field: field.into(),
            query: query.into(),
        })
    }

    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term(TermQuery::new(field, value))
    }

    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        Query::Terms(TermsQuery::new(field, values))
    }

    pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Prefix(PrefixQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn wildcard(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Wildcard(WildcardQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn fuzzy(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Fuzzy(FuzzyQuery {
            field: field.into(),
            value: value.into(),
            fuzziness: None,
        })
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Query::Exists(ExistsQuery {
            field: field.into(),
        })
    }

    /// Convert query to JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Match(m) => m.to_json(),
            Query::MatchPhrase(m) => m.to_json(),
            Query::MultiMatch(m) => m.to_json(),
            Query::Term(t) => t.to_json(),
            Query::Terms(t) => t.to_json(),
            Query::Range(r) => r.to_json(),
            Query::Prefix(p) => p.to_json(),
            Query::Wildcard(w) => w.to_json(),
            Query::Fuzzy(f) => f.to_json(),
            Query::QueryString(q) => q.to_json(),
            Query::Exists(e) => e.to_json(),
            Query::Bool(b) => b.to_json(),
            Query::Raw(v) => v.clone(),
        }
    }
}

/// Match query for full-text search.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    /// Field to search.
    pub field: String,
    /// Search query.
    pub query: String,
    /// Operator (and/or).
    pub operator: Option<String>,
    /// Fuzziness for typo tolerance.
    pub fuzziness: Option<String>,
}

impl MatchQuery {
    /// Create a new match query.
    pub fn new(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            query: query.into(),
            operator: None,
            fuzziness: None,
        }
    }

    /// Set the operator.
    pub fn operator(mut self, op: impl Into<String>) -> Self {
        self.operator = Some(op.into());
        self
    }

    /// Set fuzziness.
    pub fn fuzziness(mut self, fuzz: impl Into<String>) -> Self {
        self.fuzziness = Some(fuzz.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut query = json!({ "query": self.query });

        if let Some(op) = &self.operator {
            query["operator"] = json!(op);
        }
        if let Some(fuzz) = &self.fuzziness {
            query["fuzziness"] = json!(fuzz);
        }

        json!({ "match": { &self.field: query } })
    }
}

/// Phrase match query.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPhraseQuery {
    /// Field to search.
    pub field: String,
    /// Phrase.
    pub query: String,
}

impl MatchPhraseQuery {
    fn to_json(&self) -> Value {
        json!({ "match_phrase": { &self.field: { "query": self.query } } })
    }
}

/// How a multi_match query scores and matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiMatchType {
    #[default]
    BestFields,
    Phrase,
    PhrasePrefix,
}

impl MultiMatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MultiMatchType::BestFields => "best_fields",
            MultiMatchType::Phrase => "phrase",
            MultiMatchType::PhrasePrefix => "phrase_prefix",
        }
    }
}

/// Full-text match over several fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMatchQuery {
    /// Search query.
    pub query: String,
    /// Fields to search.
    pub fields: Vec<String>,
    /// Match type.
    pub match_type: MultiMatchType,
    /// Fuzziness for typo tolerance.
    pub fuzziness: Option<String>,
}

impl MultiMatchQuery {
    pub fn new(query: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            query: query.into(),
            fields,
            match_type: MultiMatchType::default(),
            fuzziness: None,
        }
    }

    pub fn match_type(mut self, match_type: MultiMatchType) -> Self {
        self.match_type = match_type;
        self
    }

    pub fn fuzziness(mut self, fuzz: impl Into<String>) -> Self {
        self.fuzziness = Some(fuzz.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut query = json!({
            "query": self.query,
            "fields": self.fields,
        });

        if self.match_type != MultiMatchType::BestFields {
            query["type"] = json!(self.match_type.as_str());
        }
        if let Some(fuzz) = &self.fuzziness {
            query["fuzziness"] = json!(fuzz);
        }

        json!({ "multi_match": query })
    }
}

/// Term query for exact matching.
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    /// Field name.
    pub field: String,
    /// Exact value to match.
    pub value: Value,
}

impl TermQuery {
    /// Create a new term query.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    fn to_json(&self) -> Value {
        json!({ "term": { &self.field: self.value } })
    }
}

/// Terms query for matching multiple values.
#[derive(Debug, Clone, PartialEq)]
pub struct TermsQuery {
    /// Field name.
    pub field: String,
    /// Values to match.
    pub values: Vec<Value>,
}

impl TermsQuery {
    /// Create a new terms query.
    pub fn new(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            values,
        }
    }

    fn to_json(&self) -> Value {
        json!({ "terms": { &self.field: self.values } })
    }
}

/// Range query for numeric/date ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    /// Field name.
    pub field: String,
    /// Greater than.
    pub gt: Option<Value>,
    /// Greater than or equal.
    pub gte: Option<Value>,
    /// Less than.
    pub lt: Option<Value>,
    /// Less than or equal.
    pub lte: Option<Value>,
}

impl RangeQuery {
    /// Create a new range query.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            gt: None,
            gte: None,
            lt: None,
            lte: None,
        }
    }

    /// Set greater than.
    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    /// Set greater than or equal.
    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    /// Set less than.
    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    /// Set less than or equal.
    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    fn to_json(&self) -> Value {
        let mut range = Map::new();

        if let Some(v) = &self.gt {
            range.insert("gt".to_string(), v.clone());
        }
        if let Some(v) = &self.gte {
            range.insert("gte".to_string(), v.clone());
        }
        if let Some(v) = &self.lt {
            range.insert("lt".to_string(), v.clone());
        }
        if let Some(v) = &self.lte {
            range.insert("lte".to_string(), v.clone());
        }

        json!({ "range": { &self.field: range } })
    }
}

/// Prefix query.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixQuery {
    /// Field name.
    pub field: String,
    /// Prefix value.
    pub value: String,
}

impl PrefixQuery {
    fn to_json(&self) -> Value {
        json!({ "prefix": { &self.field: self.value } })
    }
}

/// Wildcard query.
#[derive(Debug, Clone, PartialEq)]
pub struct WildcardQuery {
    /// Field name.
    pub field: String,
    /// Wildcard pattern (`*` and `?`).
    pub value: String,
}

impl WildcardQuery {
    fn to_json(&self) -> Value {
        json!({ "wildcard": { &self.field: self.value } })
    }
}

/// Fuzzy query.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyQuery {
    /// Field name.
    pub field: String,
    /// Value to match approximately.
    pub value: String,
    /// Edit distance, `AUTO` when unset.
    pub fuzziness: Option<String>,
}

impl FuzzyQuery {
    fn to_json(&self) -> Value {
        let mut fuzzy = json!({ "value": self.value });
        if let Some(fuzz) = &self.fuzziness {
            fuzzy["fuzziness"] = json!(fuzz);
        }
        json!({ "fuzzy": { &self.field: fuzzy } })
    }
}

/// Query string query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryStringQuery {
    /// Query string.
    pub query: String,
    /// Default field.
    pub default_field: Option<String>,
    /// Fields to search.
    pub fields: Option<Vec<String>>,
}

impl QueryStringQuery {
    /// Create a new query string query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            default_field: None,
            fields: None,
        }
    }

    pub fn default_field(mut self, field: impl Into<String>) -> Self {
        self.default_field = Some(field.into());
        self
    }

    pub fn fields(mut self, fields: Vec<String>) -> Self {
        self.fields = Some(fields);
        self
    }

    fn to_json(&self) -> Value {
        let mut qs = json!({ "query": self.query });

        if let Some(df) = &self.default_field {
            qs["default_field"] = json!(df);
        }
        if let Some(fields) = &self.fields {
            qs["fields"] = json!(fields);
        }

        json!({ "query_string": qs })
    }
}

/// Exists query.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistsQuery {
    /// Field name.
    pub field: String,
}

impl ExistsQuery {
    fn to_json(&self) -> Value {
        json!({ "exists": { "field": self.field } })
    }
}

/// Bool query for combining multiple queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    /// Must match (AND).
    pub must: Vec<Query>,
    /// Should match (OR).
    pub should: Vec<Query>,
    /// Must not match (NOT).
    pub must_not: Vec<Query>,
    /// Filter (non-scoring).
    pub filter: Vec<Query>,
    /// Minimum should match.
    pub minimum_should_match: Option<i32>,
}

impl BoolQuery {
    /// Create a new bool query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a must clause.
    pub fn must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    /// Add a should clause.
    pub fn should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    /// Add a must_not clause.
    pub fn must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    /// Add a filter clause.
    pub fn filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    /// Set minimum should match.
    pub fn minimum_should_match(mut self, min: i32) -> Self {
        self.minimum_should_match = Some(min);
        self
    }

    /// Build the query.
    pub fn build(self) -> Query {
        Query::Bool(self)
    }

    /// Effective minimum should match: 1 when only should clauses exist, 0
    /// otherwise, unless set explicitly.
    pub fn effective_minimum_should_match(&self) -> usize {
        match self.minimum_should_match {
            Some(min) => min.max(0) as usize,
            None if self.must.is_empty() && self.filter.is_empty() && !self.should.is_empty() => {
                1
            }
            None => 0,
        }
    }

    fn to_json(&self) -> Value {
        let mut bool_query = Map::new();

        for (key, clauses) in [
            ("must", &self.must),
            ("should", &self.should),
            ("must_not", &self.must_not),
            ("filter", &self.filter),
        ] {
            if !clauses.is_empty() {
                bool_query.insert(
                    key.to_string(),
                    Value::Array(clauses.iter().map(Query::to_json).collect()),
                );
            }
        }
        if let Some(min) = self.minimum_should_match {
            bool_query.insert("minimum_should_match".to_string(), json!(min));
        }

        json!({ "bool": bool_query })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_query_json() {
        let query = Query::Match(MatchQuery::new("subject", "amazing").operator("and"));
        assert_eq!(
            query.to_json(),
            json!({"match": {"subject": {"query": "amazing", "operator": "and"}}})
        );
    }

    #[test]
    fn test_multi_match_json() {
        let query = Query::MultiMatch(
            MultiMatchQuery::new("amaz", vec!["subject".into(), "content".into()])
                .match_type(MultiMatchType::PhrasePrefix),
        );
        assert_eq!(
            query.to_json(),
            json!({"multi_match": {
                "query": "amaz",
                "fields": ["subject", "content"],
                "type": "phrase_prefix"
            }})
        );
    }

    #[test]
    fn test_range_json_skips_unset_bounds() {
        let query = Query::Range(RangeQuery::new("category_id").gte(1).lt(10));
        assert_eq!(
            query.to_json(),
            json!({"range": {"category_id": {"gte": 1, "lt": 10}}})
        );
    }

    #[test]
    fn test_bool_json() {
        let query = BoolQuery::new()
            .should(Query::term("status", "online"))
            .should(Query::prefix("subject", "amaz"))
            .minimum_should_match(1)
            .build();

        assert_eq!(
            query.to_json(),
            json!({"bool": {
                "should": [
                    {"term": {"status": "online"}},
                    {"prefix": {"subject": "amaz"}}
                ],
                "minimum_should_match": 1
            }})
        );
    }

    #[test]
    fn test_effective_minimum_should_match() {
        let only_should = BoolQuery::new().should(Query::MatchAll);
        assert_eq!(only_should.effective_minimum_should_match(), 1);

        let with_filter = BoolQuery::new()
            .filter(Query::MatchAll)
            .should(Query::MatchAll);
        assert_eq!(with_filter.effective_minimum_should_match(), 0);
    }
}
