//! Tool selection: which knowledge tool, if any, should answer a query.
//!
//! Selection is a pure function over the query text and the catalog. Rules
//! are checked in table order and the first match wins, so a query that
//! contains a link is always treated as a documentation lookup even when it
//! also mentions regions.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::catalog::ToolCatalog;

/// The tools the policy knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    SearchDocumentation,
    ReadDocumentation,
    Recommend,
    ListRegions,
    RegionalAvailability,
}

impl ToolKind {
    /// Unprefixed tool name as published by the server.
    pub fn base_name(&self) -> &'static str {
        match self {
            Self::SearchDocumentation => "search_documentation",
            Self::ReadDocumentation => "read_documentation",
            Self::Recommend => "recommend",
            Self::ListRegions => "list_regions",
            Self::RegionalAvailability => "get_regional_availability",
        }
    }

    /// Whether a catalog tool name refers to this kind.
    ///
    /// Live servers namespace their tools (`aws___search_documentation`);
    /// fallback entries use the bare name.
    pub fn matches(&self, tool_name: &str) -> bool {
        let base = self.base_name();
        tool_name == base
            || tool_name
                .strip_suffix(base)
                .is_some_and(|prefix| prefix.ends_with('_'))
    }

    fn purpose(&self) -> &'static str {
        match self {
            Self::SearchDocumentation => "search the documentation",
            Self::ReadDocumentation => "read the linked documentation page",
            Self::Recommend => "find pages related to the linked one",
            Self::ListRegions => "list regions",
            Self::RegionalAvailability => "check regional availability",
        }
    }

    /// Build call arguments for this kind from the raw query.
    ///
    /// Link-driven kinds return `None` when the query carries no URL.
    pub fn arguments(&self, query: &str) -> Option<Map<String, Value>> {
        let args = match self {
            Self::SearchDocumentation => json!({ "search_phrase": query, "limit": 5 }),
            Self::ReadDocumentation => json!({ "url": extract_url(query)?, "max_length": 5000 }),
            Self::Recommend => json!({ "url": extract_url(query)? }),
            Self::ListRegions => json!({}),
            Self::RegionalAvailability => {
                let lower = query.to_lowercase();
                let resource_type = if lower.contains("cloudformation") || lower.contains("cfn") {
                    "cfn"
                } else {
                    "api"
                };
                json!({ "resource_type": resource_type })
            }
        };
        match args {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }
}

/// First `http://` or `https://` link in the text, up to whitespace.
pub fn extract_url(text: &str) -> Option<&str> {
    let start = ["https://", "http://"]
        .iter()
        .filter_map(|scheme| text.find(scheme))
        .min()?;
    let rest = &text[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(&rest[..end])
}

struct Rule {
    kind: ToolKind,
    keywords: &'static [&'static str],
    /// When non-empty, at least one must also appear.
    qualifiers: &'static [&'static str],
}

const REGION_WORDS: &[&str] = &["region", "availability", "available in"];

const RULES: &[Rule] = &[
    Rule {
        kind: ToolKind::Recommend,
        keywords: &["http"],
        qualifiers: &["recommend", "related", "similar"],
    },
    Rule {
        kind: ToolKind::ReadDocumentation,
        keywords: &["http"],
        qualifiers: &[],
    },
    Rule {
        kind: ToolKind::ListRegions,
        keywords: REGION_WORDS,
        qualifiers: &["list", "all regions"],
    },
    Rule {
        kind: ToolKind::RegionalAvailability,
        keywords: REGION_WORDS,
        qualifiers: &[],
    },
    Rule {
        kind: ToolKind::SearchDocumentation,
        keywords: &[
            "aws",
            "amazon",
            "cloud",
            "ec2",
            "s3",
            "lambda",
            "cloudformation",
            "terraform",
            "bedrock",
        ],
        qualifiers: &[],
    },
];

impl Rule {
    /// Matched words, or `None` when the rule does not apply.
    fn matched(&self, lower_query: &str) -> Option<Vec<&'static str>> {
        let keywords: Vec<&'static str> = self
            .keywords
            .iter()
            .copied()
            .filter(|k| lower_query.contains(k))
            .collect();
        if keywords.is_empty() {
            return None;
        }

        if self.qualifiers.is_empty() {
            return Some(keywords);
        }
        let qualifiers: Vec<&'static str> = self
            .qualifiers
            .iter()
            .copied()
            .filter(|q| lower_query.contains(q))
            .collect();
        if qualifiers.is_empty() {
            return None;
        }
        Some(keywords.into_iter().chain(qualifiers).collect())
    }
}

/// The single tool decision made for a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDecision {
    pub should_use_tool: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    pub reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToolKind>,
}

impl ToolDecision {
    fn none(reasoning: &str) -> Self {
        Self {
            should_use_tool: false,
            tool_id: None,
            reasoning: reasoning.to_string(),
            kind: None,
        }
    }
}

/// Choose at most one tool for `query`.
///
/// Total and side-effect free. A rule is only eligible when the catalog
/// holds a tool of its kind.
pub fn select_tool(query: &str, catalog: &ToolCatalog) -> ToolDecision {
    if catalog.is_empty() {
        return ToolDecision::none("No tools available");
    }

    let lower = query.to_lowercase();
    for rule in RULES {
        let Some(tool) = catalog.find_kind(rule.kind) else {
            continue;
        };
        if let Some(words) = rule.matched(&lower) {
            return ToolDecision {
                should_use_tool: true,
                tool_id: Some(tool.name.clone()),
                reasoning: format!(
                    "Query mentions {}; using {} to {}",
                    words.join(", "),
                    tool.name,
                    rule.kind.purpose()
                ),
                kind: Some(rule.kind),
            };
        }
    }

    ToolDecision::none("No relevant tool for this query")
}
