//! ============================================================================
//! Storefront Configuration
//! ============================================================================
//! Defaults match the public demo catalog. Every field can be overridden from
//! the environment (a `.env` file is loaded by the binary before this runs).
//! ============================================================================

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public catalog the storefront talks to by default
pub const DEFAULT_API_URL: &str = "https://api.escuelajs.co/api/v1";

/// Products requested per page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Quiet period before typed search text is applied
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    pub api_url: String,
    pub page_size: usize,
    pub search_debounce_ms: u64,
    pub http_timeout_secs: u64,
    /// Cart database file; `None` means the default under the home directory
    pub db_path: Option<String>,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            db_path: None,
        }
    }
}

impl StorefrontConfig {
    /// Defaults overridden by `STOREFRONT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from an arbitrary source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("STOREFRONT_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup("STOREFRONT_PAGE_SIZE") {
            config.page_size = parse_number("STOREFRONT_PAGE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("STOREFRONT_SEARCH_DEBOUNCE_MS") {
            config.search_debounce_ms = parse_number("STOREFRONT_SEARCH_DEBOUNCE_MS", &raw)?;
        }
        if let Some(raw) = lookup("STOREFRONT_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = parse_number("STOREFRONT_HTTP_TIMEOUT_SECS", &raw)?;
        }
        if let Some(path) = lookup("STOREFRONT_DB_PATH").filter(|v| !v.trim().is_empty()) {
            config.db_path = Some(path);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(anyhow!("Page size must be at least 1"));
        }
        if self.api_url.is_empty() {
            return Err(anyhow!("Catalog API URL must not be empty"));
        }
        Ok(())
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("Invalid value for {}: '{}'", key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StorefrontConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, StorefrontConfig::default());
        assert_eq!(config.page_size, 10);
        assert_eq!(config.search_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_env_overrides() {
        let config = StorefrontConfig::from_lookup(lookup_from(&[
            ("STOREFRONT_API_URL", "http://localhost:3000/api/v1/"),
            ("STOREFRONT_PAGE_SIZE", "20"),
            ("STOREFRONT_SEARCH_DEBOUNCE_MS", "250"),
            ("STOREFRONT_DB_PATH", "/tmp/cart.redb"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "http://localhost:3000/api/v1");
        assert_eq!(config.page_size, 20);
        assert_eq!(config.search_debounce_ms, 250);
        assert_eq!(config.db_path.as_deref(), Some("/tmp/cart.redb"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(StorefrontConfig::from_lookup(lookup_from(&[("STOREFRONT_PAGE_SIZE", "ten")])).is_err());
        assert!(StorefrontConfig::from_lookup(lookup_from(&[("STOREFRONT_PAGE_SIZE", "0")])).is_err());
    }
}
