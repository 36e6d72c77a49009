// Layered settings loading for esutils
//
// Layers are applied lowest to highest: typed defaults, settings files,
// `.env` files and finally prefixed environment variables. The merged tree is
// deserialized into the caller's settings type and validated.

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat, merge};
pub use validation::{ConfigValidator, Validate};

use esutils_log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;

/// Builder that accumulates settings layers and produces a typed value.
///
/// ```
/// use esutils_config::{SettingsLoader, Validate, Result};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Settings {
///     index_default: String,
/// }
///
/// impl Validate for Settings {
///     fn validate(&self) -> Result<()> {
///         Ok(())
///     }
/// }
///
/// let settings: Settings = SettingsLoader::new()
///     .defaults(&Settings { index_default: "blog".into() })
///     .unwrap()
///     .load()
///     .unwrap();
/// assert_eq!(settings.index_default, "blog");
/// ```
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    tree: Value,
    env_prefix: String,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self {
            tree: Value::Object(Map::new()),
            env_prefix: "ESUTILS".to_string(),
        }
    }

    /// Use a different environment variable prefix for [`SettingsLoader::env`].
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Seed the tree with a serialized default value.
    pub fn defaults<T: Serialize>(mut self, defaults: &T) -> Result<Self> {
        let value = serde_json::to_value(defaults)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
        merge(&mut self.tree, value);
        Ok(self)
    }

    /// Merge a raw settings tree.
    pub fn layer(mut self, value: Value) -> Self {
        merge(&mut self.tree, value);
        self
    }

    /// Merge a settings file; the format comes from the extension.
    pub fn file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let format = FileFormat::detect(path)?;
        debug!("Loading settings file {} as {:?}", path.display(), format);
        let value = ConfigLoader::new(format).load_file(path)?;
        Ok(self.layer(value))
    }

    /// Merge a settings file if it exists.
    pub fn optional_file(self, path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            self.file(path)
        } else {
            Ok(self)
        }
    }

    /// Load a `.env` file into the process environment.
    ///
    /// With `None` the nearest `.env` is used and a missing file is not an
    /// error. Call [`SettingsLoader::env`] afterwards to pick the values up.
    pub fn dotenv(self, path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Ok(self)
    }

    /// Merge prefixed environment variables.
    pub fn env(self) -> Self {
        let value = EnvLoader::new(self.env_prefix.clone()).load();
        self.layer(value)
    }

    /// Merge an explicit set of variables as if they came from the environment.
    pub fn env_from<I, K, V>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let value = EnvLoader::new(self.env_prefix.clone()).load_from(vars);
        self.layer(value)
    }

    /// The merged tree, for inspection.
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    /// Deserialize and validate the merged settings.
    pub fn load<T: DeserializeOwned + Validate>(self) -> Result<T> {
        let settings: T = serde_json::from_value(self.tree)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct Demo {
        name: String,
        separator: String,
        nested: Nested,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Nested {
        shards: u32,
    }

    impl Validate for Demo {
        fn validate(&self) -> Result<()> {
            ConfigValidator::not_empty(&self.separator, "separator")
        }
    }

    fn demo() -> Demo {
        Demo {
            name: "default".to_string(),
            separator: ":".to_string(),
            nested: Nested { shards: 1 },
        }
    }

    #[test]
    fn test_env_overrides_defaults() {
        let settings: Demo = SettingsLoader::new()
            .with_env_prefix("DEMO")
            .defaults(&demo())
            .unwrap()
            .env_from([("DEMO_NAME", "blog"), ("DEMO_NESTED__SHARDS", "3")])
            .load()
            .unwrap();

        assert_eq!(settings.name, "blog");
        assert_eq!(settings.separator, ":");
        assert_eq!(settings.nested.shards, 3);
    }

    #[test]
    fn test_layer_order() {
        let settings: Demo = SettingsLoader::new()
            .defaults(&demo())
            .unwrap()
            .layer(json!({"name": "from-file"}))
            .env_from([("ESUTILS_NAME", "from-env")])
            .load()
            .unwrap();

        assert_eq!(settings.name, "from-env");
    }

    #[test]
    fn test_validation_runs_on_load() {
        let result: Result<Demo> = SettingsLoader::new()
            .defaults(&demo())
            .unwrap()
            .layer(json!({"separator": ""}))
            .load();

        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_bad_shape_is_deserialization_error() {
        let result: Result<Demo> = SettingsLoader::new()
            .layer(json!({"name": "x"}))
            .load();

        assert!(matches!(result, Err(ConfigError::DeserializationError(_))));
    }

    #[test]
    fn test_optional_file_missing_is_ok() {
        let loader = SettingsLoader::new()
            .optional_file("/nonexistent/esutils.toml")
            .unwrap();
        assert_eq!(loader.tree(), &json!({}));
    }
}
