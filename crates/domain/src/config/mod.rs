mod auth;
mod cache;
mod llm;
mod mcp;
mod quota;
mod server;
mod storage;

pub use auth::*;
pub use cache::*;
pub use llm::*;
pub use mcp::*;
pub use quota::*;
pub use server::*;
pub use storage::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The gateway's top-level configuration, loaded from a TOML file and
/// layered with environment overrides at bootstrap (§4.N).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub transcripts: TranscriptsConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means everything looks good; callers should still scan for
    /// `ConfigSeverity::Error` entries before booting (§4.N).
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*" {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)".into(),
            });
        }
        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }

        if self.llm.upstream_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.upstream_url".into(),
                message: "upstream_url must not be empty".into(),
            });
        } else if !self.llm.upstream_url.starts_with("http://") && !self.llm.upstream_url.starts_with("https://") {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.upstream_url".into(),
                message: format!(
                    "upstream_url must start with http:// or https:// (got \"{}\")",
                    self.llm.upstream_url
                ),
            });
        }
        if self.llm.models.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.models".into(),
                message: "no models configured".into(),
            });
        }

        let mut seen_mcp_names: HashSet<&str> = HashSet::new();
        for (i, server) in self.mcp.servers.iter().enumerate() {
            if server.name.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].name"),
                    message: "server name must not be empty".into(),
                });
            }
            if !server.url.starts_with("http://") && !server.url.starts_with("https://") {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].url"),
                    message: format!("url must start with http:// or https:// (got \"{}\")", server.url),
                });
            }
            if !server.name.is_empty() && !seen_mcp_names.insert(&server.name) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("mcp.servers[{i}].name"),
                    message: format!("duplicate MCP server name \"{}\"", server.name),
                });
            }
        }

        match self.auth.module {
            AuthModule::K8s if self.auth.k8s.is_none() => errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "auth.k8s".into(),
                message: "auth.module = \"k8s\" requires an [auth.k8s] section".into(),
            }),
            AuthModule::JwkToken if self.auth.jwk.is_none() => errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "auth.jwk".into(),
                message: "auth.module = \"jwk-token\" requires an [auth.jwk] section".into(),
            }),
            _ => {}
        }

        if matches!(self.cache.backend, CacheBackend::Sqlite | CacheBackend::Postgres)
            && self.cache.connection_string.is_none()
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "cache.connection_string".into(),
                message: format!("cache.backend = {:?} requires a connection_string", self.cache.backend),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            server: ServerConfig {
                port: 8080,
                host: "127.0.0.1".into(),
                ..ServerConfig::default()
            },
            llm: LlmConfig {
                upstream_url: "http://localhost:8321".into(),
                models: vec![ModelConfig {
                    provider: "openai".into(),
                    model: "gpt-4o".into(),
                }],
                ..LlmConfig::default()
            },
            ..Config::default()
        }
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn valid_config_passes() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert_eq!(find_issue(&issues, "server.port").unwrap().severity, ConfigSeverity::Error);
    }

    #[test]
    fn upstream_url_empty_is_error() {
        let mut cfg = valid_config();
        cfg.llm.upstream_url = String::new();
        let issues = cfg.validate();
        assert_eq!(find_issue(&issues, "llm.upstream_url").unwrap().severity, ConfigSeverity::Error);
    }

    #[test]
    fn upstream_url_bad_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.llm.upstream_url = "ftp://localhost".into();
        let issues = cfg.validate();
        assert_eq!(find_issue(&issues, "llm.upstream_url").unwrap().severity, ConfigSeverity::Error);
    }

    #[test]
    fn no_models_is_warning() {
        let mut cfg = valid_config();
        cfg.llm.models.clear();
        let issues = cfg.validate();
        assert_eq!(find_issue(&issues, "llm.models").unwrap().severity, ConfigSeverity::Warning);
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        assert_eq!(
            find_issue(&issues, "server.cors.allowed_origins").unwrap().severity,
            ConfigSeverity::Warning
        );
    }

    #[test]
    fn rate_limit_zero_values_are_errors() {
        let mut cfg = valid_config();
        cfg.server.rate_limit = Some(RateLimitConfig {
            requests_per_second: 0,
            burst_size: 0,
        });
        let issues = cfg.validate();
        assert!(find_issue(&issues, "server.rate_limit.requests_per_second").is_some());
        assert!(find_issue(&issues, "server.rate_limit.burst_size").is_some());
    }

    #[test]
    fn mcp_duplicate_name_is_error() {
        let mut cfg = valid_config();
        cfg.mcp.servers = vec![
            McpServerConfig {
                name: "docs".into(),
                url: "https://mcp.example.com/a".into(),
            },
            McpServerConfig {
                name: "docs".into(),
                url: "https://mcp.example.com/b".into(),
            },
        ];
        let issues = cfg.validate();
        assert!(issues.iter().any(|e| e.message.contains("duplicate MCP server name")));
    }

    #[test]
    fn mcp_bad_url_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.mcp.servers = vec![McpServerConfig {
            name: "docs".into(),
            url: "ws://mcp.example.com".into(),
        }];
        let issues = cfg.validate();
        assert!(find_issue(&issues, "mcp.servers[0].url").is_some());
    }

    #[test]
    fn k8s_module_without_section_is_error() {
        let mut cfg = valid_config();
        cfg.auth.module = AuthModule::K8s;
        cfg.auth.k8s = None;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "auth.k8s").is_some());
    }

    #[test]
    fn jwk_module_without_section_is_error() {
        let mut cfg = valid_config();
        cfg.auth.module = AuthModule::JwkToken;
        cfg.auth.jwk = None;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "auth.jwk").is_some());
    }

    #[test]
    fn sqlite_backend_without_connection_string_is_error() {
        let mut cfg = valid_config();
        cfg.cache.backend = CacheBackend::Sqlite;
        cfg.cache.connection_string = None;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "cache.connection_string").is_some());
    }

    #[test]
    fn noop_backend_needs_no_connection_string() {
        let cfg = valid_config();
        let issues = cfg.validate();
        assert!(find_issue(&issues, "cache.connection_string").is_none());
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(format!("{err}"), "[ERROR] server.port: port must be greater than 0");
    }
}
