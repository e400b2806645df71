//! Conversation cache backend selection (§4.E).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// SQLite file path or PostgreSQL connection string; unused by
    /// `memory`/`noop`.
    #[serde(default)]
    pub connection_string: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Noop,
            connection_string: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Sqlite,
    Postgres,
    Memory,
    #[default]
    Noop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_is_noop() {
        assert_eq!(CacheConfig::default().backend, CacheBackend::Noop);
    }

    #[test]
    fn backend_deserializes_lowercase() {
        let config: CacheConfig = serde_json::from_str(r#"{"backend": "sqlite", "connection_string": "gateway.db"}"#).unwrap();
        assert_eq!(config.backend, CacheBackend::Sqlite);
        assert_eq!(config.connection_string.as_deref(), Some("gateway.db"));
    }
}
