// Environment variable layer

use crate::loader::{insert_path, scalar};
use serde_json::{Map, Value};
use std::env;

/// Collects prefixed environment variables into a settings tree.
///
/// `ESUTILS_INDEX_DEFAULT=blog` becomes `{"index_default": "blog"}` and
/// `ESUTILS_ENGINE__URLS=["http://a:9200"]` becomes
/// `{"engine": {"urls": ["http://a:9200"]}}`.
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('_') {
            prefix.push('_');
        }
        Self { prefix }
    }

    /// Build the tree from the process environment.
    pub fn load(&self) -> Value {
        self.load_from(env::vars())
    }

    /// Build the tree from an explicit set of variables.
    pub fn load_from<I, K, V>(&self, vars: I) -> Value
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut root = Map::new();

        for (key, value) in vars {
            let key = key.as_ref();
            let Some(stripped) = key.strip_prefix(&self.prefix) else {
                continue;
            };
            if stripped.is_empty() {
                continue;
            }
            insert_path(&mut root, stripped, scalar(value.as_ref()));
        }

        Value::Object(root)
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new("ESUTILS")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_is_stripped_and_keys_lowercased() {
        let loader = EnvLoader::new("ESUTILS");
        let value = loader.load_from([
            ("ESUTILS_INDEX_DEFAULT", "blog"),
            ("ESUTILS_FILTER_KEY", "search"),
            ("PATH", "/usr/bin"),
        ]);

        assert_eq!(value["index_default"], "blog");
        assert_eq!(value["filter_key"], "search");
        assert!(value.get("path").is_none());
    }

    #[test]
    fn test_nested_keys_and_json_values() {
        let loader = EnvLoader::default();
        let value = loader.load_from([
            ("ESUTILS_ENGINE__URLS", r#"["http://a:9200","http://b:9200"]"#),
            ("ESUTILS_ENGINE__REQUEST_TIMEOUT_SECS", "5"),
            ("ESUTILS_ALL_ENABLED", "false"),
        ]);

        assert_eq!(value["engine"]["urls"][1], "http://b:9200");
        assert_eq!(value["engine"]["request_timeout_secs"], 5);
        assert_eq!(value["all_enabled"], false);
    }

    #[test]
    fn test_bare_prefix_is_ignored() {
        let loader = EnvLoader::new("ESUTILS_");
        let value = loader.load_from([("ESUTILS_", "x")]);
        assert_eq!(value, Value::Object(Map::new()));
    }
}
