//! Referenced-document parser (§4.M). Scans knowledge-search tool
//! output for `Metadata: { ... }` blocks and keeps the ones naming both
//! a doc URL and a title. The interior is parsed as a flat, permissive
//! key/value literal mapping — never `eval`-equivalent.

use gw_domain::conversation::ReferencedDocument;
use regex::Regex;
use std::sync::OnceLock;

fn metadata_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)Metadata:\s*\{(?P<body>[^{}]*)\}").expect("static pattern"))
}

fn entry_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"['"](?P<key>[\w_]+)['"]\s*:\s*['"](?P<value>[^'"]*)['"]"#).expect("static pattern")
    })
}

/// Parse one text block's literal mapping into `key -> value`, skipping
/// anything that isn't a quoted-string value (numbers, `None`, `True`,
/// nested structures are all ignored — only the two keys this parser
/// cares about are ever string-valued in the upstream's output).
fn parse_mapping(body: &str) -> std::collections::HashMap<String, String> {
    entry_re()
        .captures_iter(body)
        .map(|c| (c["key"].to_string(), c["value"].to_string()))
        .collect()
}

/// Scan `text` for `Metadata: { ... }` blocks, keep the ones with both
/// `docs_url` and `title`, and deduplicate in encounter order.
pub fn parse_referenced_documents(text: &str) -> Vec<ReferencedDocument> {
    let mut seen = std::collections::HashSet::new();
    let mut docs = Vec::new();

    for captures in metadata_block_re().captures_iter(text) {
        let body = &captures["body"];
        let mapping = parse_mapping(body);
        let (Some(doc_url), Some(doc_title)) = (mapping.get("docs_url"), mapping.get("title")) else {
            continue;
        };
        let key = (doc_url.clone(), doc_title.clone());
        if seen.insert(key) {
            docs.push(ReferencedDocument {
                doc_url: doc_url.clone(),
                doc_title: doc_title.clone(),
            });
        }
    }

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_metadata_block() {
        let text = "some content\nMetadata: {'docs_url': 'https://example.com/a', 'title': 'Doc A'}\n";
        let docs = parse_referenced_documents(text);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].doc_url, "https://example.com/a");
        assert_eq!(docs[0].doc_title, "Doc A");
    }

    #[test]
    fn requires_both_fields() {
        let text = "Metadata: {'docs_url': 'https://example.com/a'}";
        assert!(parse_referenced_documents(text).is_empty());
    }

    #[test]
    fn deduplicates_in_encounter_order() {
        let text = "Metadata: {'docs_url': 'https://x', 'title': 'X'}\nMetadata: {'docs_url': 'https://x', 'title': 'X'}\nMetadata: {'docs_url': 'https://y', 'title': 'Y'}";
        let docs = parse_referenced_documents(text);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].doc_url, "https://x");
        assert_eq!(docs[1].doc_url, "https://y");
    }

    #[test]
    fn ignores_blocks_missing_both_keys() {
        let text = "Metadata: {'foo': 'bar'}";
        assert!(parse_referenced_documents(text).is_empty());
    }

    #[test]
    fn no_blocks_yields_empty_list() {
        assert!(parse_referenced_documents("plain text, no metadata here").is_empty());
    }
}
