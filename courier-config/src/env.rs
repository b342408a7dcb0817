// Environment variable loading

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Environment variable loader
///
/// Reads from the process environment unless constructed with
/// [`EnvLoader::from_map`], which pins the lookup to a fixed set of values.
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    prefix: Option<String>,
    fixed: Option<HashMap<String, String>>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix,
            fixed: None,
        }
    }

    /// Create a loader that looks keys up in `vars` instead of the process
    /// environment.
    pub fn from_map<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: None,
            fixed: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn full_key(&self, key: &str) -> String {
        match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }

    /// Load a specific variable, if set
    pub fn load_optional(&self, key: &str) -> Option<String> {
        let full_key = self.full_key(key);
        match self.fixed {
            Some(ref vars) => vars.get(&full_key).cloned(),
            None => env::var(&full_key).ok(),
        }
    }

    /// Load a specific variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        self.load_optional(key)
            .ok_or_else(|| ConfigError::KeyNotFound(self.full_key(key)))
    }

    /// Load with default value
    pub fn load_var_or(&self, key: &str, default: &str) -> String {
        self.load_optional(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Load and parse a variable, falling back to `default` when unset or blank
    pub fn load_parsed_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.load_optional(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::parse(&self.full_key(key), &raw, e)),
            _ => Ok(default),
        }
    }
}
