// Checkout configuration file loaders

use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    Toml,
    Env,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            "env" => Some(FileFormat::Env),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FileFormat::Json => "JSON",
            FileFormat::Toml => "TOML",
            FileFormat::Env => ".env",
        }
    }
}

/// Reads a checkout config file into a JSON tree.
///
/// `.env` files are flattened: `CARELINK_PUBLISHABLE_KEY=pk` becomes
/// `{"publishable_key": "pk"}` with every value kept as a string.
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Pick the format from the file extension.
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|s| s.to_str()).ok_or_else(|| {
            ConfigError::LoadError(format!("{} has no file extension", path.display()))
        })?;

        FileFormat::from_extension(ext)
            .map(Self::new)
            .ok_or_else(|| ConfigError::LoadError(format!("Unsupported format: {}", ext)))
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        self.parse(&content)
    }

    pub fn parse(&self, content: &str) -> Result<Value> {
        let parsed = match self.format {
            FileFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            FileFormat::Toml => toml::from_str::<toml::Value>(content)
                .map_err(|e| e.to_string())
                .and_then(|v| serde_json::to_value(v).map_err(|e| e.to_string())),
            FileFormat::Env => parse_env(content),
        };

        parsed.map_err(|e| {
            ConfigError::ParseError(format!("{} parse error: {}", self.format.name(), e))
        })
    }
}

fn parse_env(content: &str) -> std::result::Result<Value, String> {
    let mut map = Map::new();
    for item in dotenvy::from_read_iter(content.as_bytes()) {
        let (key, value) = item.map_err(|e| e.to_string())?;
        map.insert(crate::env::field_name(&key), Value::String(value));
    }
    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new(FileFormat::Json);
        let json = r#"{"membership_price": "119.88", "max_intent_retries": 2}"#;

        let result = loader.parse(json).unwrap();
        assert_eq!(result["max_intent_retries"], 2);
    }

    #[test]
    fn test_parse_toml() {
        let loader = ConfigLoader::new(FileFormat::Toml);
        let toml = r#"
            currency = "usd"
            intent_retry_delay_ms = 1000

            [endpoints]
            signup = "/api/users/signup"
        "#;

        let result = loader.parse(toml).unwrap();
        assert_eq!(result["currency"], "usd");
        assert_eq!(result["endpoints"]["signup"], "/api/users/signup");
    }

    #[test]
    fn test_parse_env() {
        let loader = ConfigLoader::new(FileFormat::Env);
        let env = "CARELINK_PUBLISHABLE_KEY=pk_test_123\n# Comment\nCURRENCY=\"usd\"\n";

        let result = loader.parse(env).unwrap();
        assert_eq!(result["publishable_key"], "pk_test_123");
        assert_eq!(result["currency"], "usd");
    }

    #[test]
    fn test_parse_error_names_format() {
        let err = ConfigLoader::new(FileFormat::Json).parse("{").unwrap_err();
        assert!(err.to_string().contains("JSON parse error"));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::from_extension("json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_extension("TOML"), Some(FileFormat::Toml));
        assert_eq!(FileFormat::from_extension("env"), Some(FileFormat::Env));
        assert_eq!(FileFormat::from_extension("unknown"), None);
        assert!(ConfigLoader::auto("checkout").is_err());
    }
}
