use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::Identity;

pub const DEFAULT_STORE_URL: &str = "http://127.0.0.1:4943/";

/// Environment variables read by [`ClientConfig::from_env`].
pub const ENV_STORE_URL: &str = "HEARTH_STORE_URL";
pub const ENV_IDENTITY: &str = "HEARTH_IDENTITY";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "HEARTH_REQUEST_TIMEOUT_SECS";

/// Connection settings for the store binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the post store.
    pub store_url: String,

    /// Name the binding connects as. `None` connects anonymously.
    pub identity: Option<String>,

    /// Per-request timeout applied by the HTTP transport.
    ///
    /// Without it a call that never resolves keeps its cache key loading.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: DEFAULT_STORE_URL.to_string(),
            identity: None,
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new(store_url: impl Into<String>) -> Self {
        Self {
            store_url: store_url.into(),
            ..Self::default()
        }
    }

    /// Reads `HEARTH_*` variables, loading a `.env` file first if present.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_STORE_URL) {
            config.store_url = url;
        }
        config.identity = lookup(ENV_IDENTITY).filter(|name| !name.trim().is_empty());
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            let secs = secs.trim().parse().map_err(|e| {
                Error::StoreUnavailable(format!("invalid {ENV_REQUEST_TIMEOUT_SECS}: {e}"))
            })?;
            config.request_timeout_secs = Some(secs);
        }
        Ok(config)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        self.identity
            .as_deref()
            .map_or_else(Identity::anonymous, Identity::named)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.store_url, DEFAULT_STORE_URL);
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.identity(), Identity::anonymous());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_STORE_URL, "http://blog.local/"),
            (ENV_IDENTITY, "Ana"),
            (ENV_REQUEST_TIMEOUT_SECS, "15"),
        ]);
        let config = ClientConfig::from_lookup(|key| vars.get(key).map(ToString::to_string))
            .expect("valid config");

        assert_eq!(config.store_url, "http://blog.local/");
        assert_eq!(config.identity(), Identity::named("Ana"));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_from_lookup_rejects_bad_timeout() {
        let result = ClientConfig::from_lookup(|key| {
            (key == ENV_REQUEST_TIMEOUT_SECS).then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"identity": "Ben"}"#).expect("should deserialize");
        assert_eq!(config.store_url, DEFAULT_STORE_URL);
        assert_eq!(config.identity.as_deref(), Some("Ben"));
    }
}
