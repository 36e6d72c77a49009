// Settings validation

use crate::{ConfigError, Result};

/// Implemented by settings types that have invariants beyond their shape.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Reusable validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Search engine index names must be lowercase.
    pub fn lowercase(value: &str, field: &str) -> Result<()> {
        if value.chars().any(|c| c.is_uppercase()) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be lowercase, got {:?}",
                field, value
            )));
        }
        Ok(())
    }

    pub fn distinct(a: &str, b: &str, field_a: &str, field_b: &str) -> Result<()> {
        if a == b {
            return Err(ConfigError::ValidationError(format!(
                "{} and {} must differ (both are {:?})",
                field_a, field_b, a
            )));
        }
        Ok(())
    }

    pub fn is_url(value: &str, field: &str) -> Result<()> {
        if !value.starts_with("http://") && !value.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid URL, got {:?}",
                field, value
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_empty_validation() {
        assert!(ConfigValidator::not_empty("q", "filter_key").is_ok());
        assert!(ConfigValidator::not_empty("", "filter_key").is_err());
    }

    #[test]
    fn test_lowercase_validation() {
        assert!(ConfigValidator::lowercase("articles-v2", "index_default").is_ok());
        assert!(ConfigValidator::lowercase("Articles", "index_default").is_err());
    }

    #[test]
    fn test_distinct_validation() {
        assert!(ConfigValidator::distinct(":", " ", "key_separator", "query_splitter").is_ok());
        let err = ConfigValidator::distinct(" ", " ", "key_separator", "query_splitter")
            .unwrap_err();
        assert!(err.to_string().contains("key_separator"));
    }

    #[test]
    fn test_url_validation() {
        assert!(ConfigValidator::is_url("https://search.internal:9200", "engine.urls").is_ok());
        assert!(ConfigValidator::is_url("search.internal:9200", "engine.urls").is_err());
    }
}
