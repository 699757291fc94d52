// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Prefix every checkout variable carries, e.g. `CARELINK_API_BASE_URL`.
pub const DEFAULT_PREFIX: &str = "CARELINK";

fn strip_prefix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('_'))
}

/// Config field for a variable name: `CARELINK_` dropped, lowercased.
pub(crate) fn field_name(key: &str) -> String {
    strip_prefix(key, DEFAULT_PREFIX)
        .unwrap_or(key)
        .to_ascii_lowercase()
}

/// Environment variable loader
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Loader scoped to `CARELINK_*`.
    pub fn carelink() -> Self {
        Self::new(Some(DEFAULT_PREFIX.to_string()))
    }

    /// Load matching variables, keys lowercased with the prefix stripped.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        Ok(self.collect(env::vars()))
    }

    fn collect(&self, vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
        let mut config = HashMap::new();

        for (key, value) in vars {
            match &self.prefix {
                Some(prefix) => {
                    if let Some(rest) = strip_prefix(&key, prefix) {
                        config.insert(rest.to_lowercase(), value);
                    }
                }
                None => {
                    config.insert(key.to_lowercase(), value);
                }
            }
        }

        config
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.full_key(key)).map_err(ConfigError::EnvError)
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_var(key).unwrap_or_else(|_| default.to_string())
    }

    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::carelink()
    }
}
