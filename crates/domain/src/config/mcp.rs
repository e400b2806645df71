//! MCP (Model Context Protocol) server registry configuration (§4.G).
//!
//! The gateway never spawns MCP servers — every entry here is a remote
//! server reachable by URL; header resolution picks among these by
//! toolgroup name or full URL.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

/// One configured remote MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Toolgroup name the upstream exposes for this server, and the key
    /// `MCP-HEADERS` may address it by instead of the full URL.
    pub name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_servers() {
        assert!(McpConfig::default().servers.is_empty());
    }

    #[test]
    fn servers_deserialize() {
        let json = r#"{"servers": [{"name": "docs", "url": "https://mcp.example.com/docs"}]}"#;
        let config: McpConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].name, "docs");
    }
}
