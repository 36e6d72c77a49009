//! Error types for mapping, synchronization and query translation.

use esutils_config::ConfigError;
use thiserror::Error;

/// Search error type.
#[derive(Error, Debug)]
pub enum SearchError {
    /// A mapping or filter set is misconfigured. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The backing domain object does not exist.
    #[error("Object not found: {document_type}/{id}")]
    ObjectNotFound {
        /// Document type of the mapping that looked the object up.
        document_type: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// A mapped attribute could not be resolved on a domain object.
    #[error("Attribute missing: {segment} (while resolving {field})")]
    AttributeMissing {
        /// Full mapped field path.
        field: String,
        /// Segment that was absent.
        segment: String,
    },

    /// Malformed client-supplied query string.
    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    /// The search engine could not be reached.
    #[error("Search engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The index does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The search engine rejected a request.
    #[error("Search engine error: {0}")]
    Engine(String),

    /// A query could not be built or evaluated.
    #[error("Query error: {0}")]
    Query(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport error from the opensearch client.
    #[error("Transport error: {0}")]
    Transport(#[from] opensearch::Error),

    /// The datastore failed to answer.
    #[error("Datastore error: {0}")]
    Datastore(String),

    /// A job could not be handed to the task runner.
    #[error("Task queue error: {0}")]
    Queue(String),
}

impl SearchError {
    /// Whether retrying the same operation later can succeed.
    ///
    /// Task runners use this to decide between backing off and giving up.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SearchError::EngineUnavailable(_)
                | SearchError::Transport(_)
                | SearchError::Datastore(_)
                | SearchError::Queue(_)
        )
    }

    /// Whether a job should treat this as "nothing left to index".
    pub(crate) fn is_vanished_object(&self) -> bool {
        matches!(
            self,
            SearchError::ObjectNotFound { .. } | SearchError::AttributeMissing { .. }
        )
    }
}

impl From<ConfigError> for SearchError {
    fn from(err: ConfigError) -> Self {
        SearchError::Configuration(err.to_string())
    }
}

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;
