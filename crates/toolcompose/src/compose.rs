//! Tool composer (§4.G): turns a request's `no_tools` flag, RAG vector
//! database ids, and the `MCP-HEADERS` request header into the
//! `toolgroups` argument and provider-data extra header a turn needs.

use gw_domain::config::McpServerConfig;
use gw_upstream::ToolGroupDescriptor;
use serde_json::{Map, Value};

const KNOWLEDGE_SEARCH_TOOLGROUP: &str = "builtin::rag/knowledge_search";

/// Result of composing one turn's tools.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedTools {
    /// `None` serializes to JSON `null`; distinct from `Some(vec![])`.
    pub toolgroups: Option<Vec<ToolGroupDescriptor>>,
    /// `None` means the caller should omit/clear the agent's
    /// `X-LlamaStack-Provider-Data` header entirely. `Some` carries the
    /// full `{"mcp_headers": <map>}` value to set it to.
    pub provider_data_header: Option<Value>,
}

pub struct ToolComposer<'a> {
    mcp_servers: &'a [McpServerConfig],
}

impl<'a> ToolComposer<'a> {
    pub fn new(mcp_servers: &'a [McpServerConfig]) -> Self {
        Self { mcp_servers }
    }

    pub fn compose(
        &self,
        no_tools: bool,
        vector_db_ids: &[String],
        raw_mcp_headers: Option<&str>,
        bearer_token: Option<&str>,
    ) -> ComposedTools {
        if no_tools {
            return ComposedTools {
                toolgroups: None,
                provider_data_header: None,
            };
        }

        let mut headers = self.resolve_mcp_headers(raw_mcp_headers);
        if headers.is_empty() {
            headers = self.bearer_fallback(bearer_token);
        }

        let mut groups = Vec::new();
        if let Some(rag) = rag_toolgroups(vector_db_ids) {
            groups.push(rag);
        }
        for server in self.mcp_servers {
            groups.push(ToolGroupDescriptor {
                name: server.name.clone(),
                args: None,
            });
        }

        let toolgroups = if groups.is_empty() { None } else { Some(groups) };
        let provider_data_header = Some(serde_json::json!({ "mcp_headers": Value::Object(headers) }));

        ComposedTools {
            toolgroups,
            provider_data_header,
        }
    }

    /// Parse the `MCP-HEADERS` request header: a JSON object mapping
    /// either full URLs or toolgroup names to header dicts. Toolgroup
    /// names are translated to the matching server's URL; unknown names
    /// are dropped; malformed or non-object JSON yields an empty map.
    fn resolve_mcp_headers(&self, raw: Option<&str>) -> Map<String, Value> {
        let Some(raw) = raw else {
            return Map::new();
        };
        let parsed: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "MCP-HEADERS is not valid JSON, ignoring");
                return Map::new();
            }
        };
        let Some(obj) = parsed.as_object() else {
            tracing::warn!("MCP-HEADERS is not a JSON object, ignoring");
            return Map::new();
        };

        let mut resolved = Map::new();
        for (key, value) in obj {
            if key.starts_with("http://") || key.starts_with("https://") {
                resolved.insert(key.clone(), value.clone());
            } else if let Some(server) = self.mcp_servers.iter().find(|s| &s.name == key) {
                resolved.insert(server.url.clone(), value.clone());
            } else {
                tracing::warn!(toolgroup = %key, "unknown MCP toolgroup name in headers, dropping");
            }
        }
        resolved
    }

    fn bearer_fallback(&self, token: Option<&str>) -> Map<String, Value> {
        let Some(token) = token else {
            return Map::new();
        };
        self.mcp_servers
            .iter()
            .map(|server| {
                (
                    server.url.clone(),
                    serde_json::json!({ "Authorization": format!("Bearer {token}") }),
                )
            })
            .collect()
    }
}

/// `{name: "builtin::rag/knowledge_search", args: {vector_db_ids: ids}}`
/// when `ids` is non-empty; `None` otherwise.
pub fn rag_toolgroups(ids: &[String]) -> Option<ToolGroupDescriptor> {
    if ids.is_empty() {
        return None;
    }
    Some(ToolGroupDescriptor {
        name: KNOWLEDGE_SEARCH_TOOLGROUP.into(),
        args: Some(serde_json::json!({ "vector_db_ids": ids })),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servers() -> Vec<McpServerConfig> {
        vec![
            McpServerConfig {
                name: "docs".into(),
                url: "https://mcp.example.com/docs".into(),
            },
            McpServerConfig {
                name: "search".into(),
                url: "https://mcp.example.com/search".into(),
            },
        ]
    }

    #[test]
    fn rag_toolgroups_none_for_empty_ids() {
        assert!(rag_toolgroups(&[]).is_none());
    }

    #[test]
    fn rag_toolgroups_builds_descriptor() {
        let ids = vec!["db1".to_string()];
        let descriptor = rag_toolgroups(&ids).unwrap();
        assert_eq!(descriptor.name, KNOWLEDGE_SEARCH_TOOLGROUP);
        assert_eq!(descriptor.args.unwrap()["vector_db_ids"][0], "db1");
    }

    #[test]
    fn no_tools_clears_everything() {
        let servers = servers();
        let composer = ToolComposer::new(&servers);
        let composed = composer.compose(true, &["db1".into()], Some("{}"), Some("tok"));
        assert!(composed.toolgroups.is_none());
        assert!(composed.provider_data_header.is_none());
    }

    #[test]
    fn empty_total_toolgroups_coerces_to_null() {
        let composer = ToolComposer::new(&[]);
        let composed = composer.compose(false, &[], None, None);
        assert!(composed.toolgroups.is_none());
    }

    #[test]
    fn toolgroups_include_rag_and_configured_servers() {
        let servers = servers();
        let composer = ToolComposer::new(&servers);
        let composed = composer.compose(false, &["db1".into()], None, None);
        let groups = composed.toolgroups.unwrap();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].name, KNOWLEDGE_SEARCH_TOOLGROUP);
        assert_eq!(groups[1].name, "docs");
        assert_eq!(groups[2].name, "search");
    }

    #[test]
    fn toolgroup_name_in_headers_resolves_to_url() {
        let servers = servers();
        let composer = ToolComposer::new(&servers);
        let raw = r#"{"docs": {"X-Api-Key": "abc"}}"#;
        let composed = composer.compose(false, &[], Some(raw), None);
        let header = composed.provider_data_header.unwrap();
        let map = header["mcp_headers"].as_object().unwrap();
        assert!(map.contains_key("https://mcp.example.com/docs"));
        assert!(!map.contains_key("docs"));
    }

    #[test]
    fn unknown_toolgroup_name_is_dropped() {
        let servers = servers();
        let composer = ToolComposer::new(&servers);
        let raw = r#"{"nonexistent": {"X-Api-Key": "abc"}}"#;
        let composed = composer.compose(false, &[], Some(raw), None);
        let header = composed.provider_data_header.unwrap();
        assert!(header["mcp_headers"].as_object().unwrap().is_empty());
    }

    #[test]
    fn malformed_json_yields_empty_map() {
        let servers = servers();
        let composer = ToolComposer::new(&servers);
        let composed = composer.compose(false, &[], Some("not json"), None);
        let header = composed.provider_data_header.unwrap();
        assert!(header["mcp_headers"].as_object().unwrap().is_empty());
    }

    #[test]
    fn non_object_json_yields_empty_map() {
        let servers = servers();
        let composer = ToolComposer::new(&servers);
        let composed = composer.compose(false, &[], Some("[1,2,3]"), None);
        let header = composed.provider_data_header.unwrap();
        assert!(header["mcp_headers"].as_object().unwrap().is_empty());
    }

    #[test]
    fn bearer_token_injected_when_headers_empty() {
        let servers = servers();
        let composer = ToolComposer::new(&servers);
        let composed = composer.compose(false, &[], None, Some("secret-token"));
        let header = composed.provider_data_header.unwrap();
        let map = header["mcp_headers"].as_object().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map["https://mcp.example.com/docs"]["Authorization"],
            "Bearer secret-token"
        );
    }

    #[test]
    fn bearer_token_not_injected_when_headers_resolved() {
        let servers = servers();
        let composer = ToolComposer::new(&servers);
        let raw = r#"{"docs": {"X-Api-Key": "abc"}}"#;
        let composed = composer.compose(false, &[], Some(raw), Some("secret-token"));
        let header = composed.provider_data_header.unwrap();
        let map = header["mcp_headers"].as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert!(!map["https://mcp.example.com/docs"]
            .as_object()
            .unwrap()
            .contains_key("Authorization"));
    }

    #[test]
    fn full_url_key_passes_through_unresolved() {
        let servers = servers();
        let composer = ToolComposer::new(&servers);
        let raw = r#"{"https://mcp.example.com/docs": {"X-Api-Key": "abc"}}"#;
        let composed = composer.compose(false, &[], Some(raw), None);
        let header = composed.provider_data_header.unwrap();
        let map = header["mcp_headers"].as_object().unwrap();
        assert!(map.contains_key("https://mcp.example.com/docs"));
    }
}
