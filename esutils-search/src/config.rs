//! Search settings.

use crate::error::Result;
use esutils_config::{ConfigValidator, SettingsLoader, Validate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;

/// Deployment-wide search settings.
///
/// Every mapping type shares one index; the query string knobs are used by
/// [`FilterBackend`](crate::FilterBackend) when splitting raw client queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Index shared by all mapping types.
    pub index_default: String,
    /// Settings submitted when the index is created.
    pub index_settings: IndexSettings,
    /// Document types that get a placeholder schema at index creation.
    pub doc_types: Vec<String>,
    /// `_all` flag in schema descriptors.
    pub all_enabled: bool,
    /// `_source` flag in schema descriptors.
    pub source_enabled: bool,
    /// Separator between field and term in a raw query token.
    pub key_separator: String,
    /// Separator between tokens in a raw query.
    pub query_splitter: String,
    /// Request parameter holding the raw query.
    pub filter_key: String,
    /// Search engine client configuration.
    pub engine: EngineConfig,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            index_default: "default".to_string(),
            index_settings: IndexSettings::default(),
            doc_types: Vec::new(),
            all_enabled: true,
            source_enabled: true,
            key_separator: ":".to_string(),
            query_splitter: " ".to_string(),
            filter_key: "q".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl SearchSettings {
    /// Default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from defaults, `esutils.toml` (if present), `.env` and
    /// `ESUTILS_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from(Some(Path::new("esutils.toml")))
    }

    /// Like [`SearchSettings::load`] with an explicit settings file.
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut loader = SettingsLoader::new().defaults(&Self::default())?;
        if let Some(file) = file {
            loader = loader.optional_file(file)?;
        }
        Ok(loader.dotenv(None)?.env().load()?)
    }

    /// Set the shared index name.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index_default = index.into();
        self
    }

    /// Set the index creation settings.
    pub fn with_index_settings(mut self, settings: IndexSettings) -> Self {
        self.index_settings = settings;
        self
    }

    /// Register a document type for placeholder schemas.
    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_types.push(doc_type.into());
        self
    }

    /// Set the `_all` and `_source` flags.
    pub fn with_storage(mut self, all_enabled: bool, source_enabled: bool) -> Self {
        self.all_enabled = all_enabled;
        self.source_enabled = source_enabled;
        self
    }

    /// Set the raw query separators.
    pub fn with_separators(
        mut self,
        key_separator: impl Into<String>,
        query_splitter: impl Into<String>,
    ) -> Self {
        self.key_separator = key_separator.into();
        self.query_splitter = query_splitter.into();
        self
    }

    /// Set the request parameter holding the raw query.
    pub fn with_filter_key(mut self, filter_key: impl Into<String>) -> Self {
        self.filter_key = filter_key.into();
        self
    }

    /// Set the engine configuration.
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

impl Validate for SearchSettings {
    fn validate(&self) -> esutils_config::Result<()> {
        ConfigValidator::not_empty(&self.index_default, "index_default")?;
        ConfigValidator::lowercase(&self.index_default, "index_default")?;
        ConfigValidator::not_empty(&self.key_separator, "key_separator")?;
        ConfigValidator::not_empty(&self.query_splitter, "query_splitter")?;
        ConfigValidator::distinct(
            &self.key_separator,
            &self.query_splitter,
            "key_separator",
            "query_splitter",
        )?;
        ConfigValidator::not_empty(&self.filter_key, "filter_key")?;
        for url in &self.engine.urls {
            ConfigValidator::is_url(url, "engine.urls")?;
        }
        Ok(())
    }
}

/// Search engine client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Node URLs. The first one is used.
    pub urls: Vec<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            urls: vec!["http://localhost:9200".to_string()],
            username: None,
            password: None,
            request_timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    /// Configuration for a single node.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Self::default()
        }
    }

    /// Set basic authentication credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Settings submitted with index creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Number of shards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_shards: Option<u32>,
    /// Number of replicas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_replicas: Option<u32>,
    /// Refresh interval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<String>,
    /// Analysis settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Value>,
}

impl IndexSettings {
    /// Create new index settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of shards.
    pub fn shards(mut self, shards: u32) -> Self {
        self.number_of_shards = Some(shards);
        self
    }

    /// Set number of replicas.
    pub fn replicas(mut self, replicas: u32) -> Self {
        self.number_of_replicas = Some(replicas);
        self
    }

    /// Set refresh interval.
    pub fn refresh_interval(mut self, interval: impl Into<String>) -> Self {
        self.refresh_interval = Some(interval.into());
        self
    }

    /// Set analysis settings.
    pub fn analysis(mut self, analysis: Value) -> Self {
        self.analysis = Some(analysis);
        self
    }

    /// The `settings` body of an index creation request.
    pub fn to_json(&self) -> Value {
        let mut settings = serde_json::Map::new();

        if let Some(shards) = self.number_of_shards {
            settings.insert("number_of_shards".to_string(), json!(shards));
        }
        if let Some(replicas) = self.number_of_replicas {
            settings.insert("number_of_replicas".to_string(), json!(replicas));
        }
        if let Some(interval) = &self.refresh_interval {
            settings.insert("refresh_interval".to_string(), json!(interval));
        }
        if let Some(analysis) = &self.analysis {
            settings.insert("analysis".to_string(), analysis.clone());
        }

        Value::Object(settings)
    }
}
