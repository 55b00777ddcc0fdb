//! Endpoint configuration for the chat and reverse-geocoding services.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default OpenAI-compatible API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-1106";

/// Default reverse-geocoding endpoint.
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

/// Default timeout for any single HTTP request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Nominatim asks for at most one request per second.
pub const DEFAULT_GEOCODE_INTERVAL_MS: u64 = 1000;

pub const USER_AGENT: &str = concat!("photoplan/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    /// API key; never written out with the rest of the config.
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Minimum spacing between two lookups.
    pub min_interval_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GEOCODER_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            min_interval_ms: DEFAULT_GEOCODE_INTERVAL_MS,
        }
    }
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub geocoder: GeocoderConfig,
}

impl Config {
    /// Read configuration from environment variables, falling back to defaults.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `OPENAI_API_KEY` | `llm.api_key` |
    /// | `OPENAI_BASE_URL` | `llm.base_url` |
    /// | `OPENAI_MODEL` | `llm.model` |
    /// | `PHOTOPLAN_TIMEOUT_SECS` | both timeouts |
    /// | `PHOTOPLAN_GEOCODER_URL` | `geocoder.base_url` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let timeout_secs = get("PHOTOPLAN_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            llm: LlmConfig {
                base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
                api_key: get("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                timeout_secs,
            },
            geocoder: GeocoderConfig {
                base_url: get("PHOTOPLAN_GEOCODER_URL")
                    .unwrap_or_else(|| DEFAULT_GEOCODER_URL.to_string()),
                timeout_secs,
                ..GeocoderConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.llm.base_url, DEFAULT_OPENAI_URL);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.geocoder.base_url, DEFAULT_GEOCODER_URL);
        assert_eq!(config.geocoder.min_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("PHOTOPLAN_TIMEOUT_SECS", "5"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.timeout(), Duration::from_secs(5));
        assert_eq!(config.geocoder.timeout(), Duration::from_secs(5));
        assert_eq!(config.llm.base_url, DEFAULT_OPENAI_URL);
    }

    #[test]
    fn test_blank_api_key_is_none() {
        let config = Config::from_lookup(|k| (k == "OPENAI_API_KEY").then(|| "  ".to_string()));
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
