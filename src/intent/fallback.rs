//! Deterministic fallback parser
//!
//! Used whenever the LLM path errors or produces something unusable. The
//! rules are keyword heuristics, not a grammar; they are tuned for the
//! common phrasings ("list pods", "pods in kube-system", "show logs for
//! backend pod") and always produce an intent thanks to total defaults.

use crate::intent::names::{sanitize_name, sanitize_namespace};
use crate::intent::types::{Action, Intent, ResourceType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Namespaces recognised by name
pub const KNOWN_NAMESPACES: [&str; 6] = [
    "kube-system",
    "default",
    "monitoring",
    "ingress-nginx",
    "cert-manager",
    "kube-public",
];

/// Singular kinds that, when they follow a word, mark that word as a name
const NAME_ANCHORS: [&str; 6] = ["pod", "service", "deployment", "configmap", "node", "ingress"];

/// Words that are never resource names
const STOPWORDS: [&str; 14] = [
    "the", "a", "an", "all", "me", "show", "this", "that", "my", "list", "get", "describe",
    "logs", "find",
];

/// Regex captures that are never namespaces
const NAMESPACE_STOPWORDS: [&str; 8] = [
    "the", "a", "an", "all", "this", "my", "cluster", "namespace",
];

static NAMESPACE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\bin\s+(\w+)\s+namespace",
        r"\bnamespace\s+(\w+)",
        r"\bin\s+namespace\s+(\w+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static HYPHENATED_IN_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\bin\s+(\w+-\w+)").ok());

/// "<kind> in <ns>" per resource type. The trailing guard stops
/// "pods in team-a" from capturing "team".
static KIND_IN_PATTERNS: Lazy<Vec<(ResourceType, Regex)>> = Lazy::new(|| {
    ResourceType::ALL
        .iter()
        .filter_map(|&kind| {
            let alternatives = kind
                .keywords()
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"\b(?:{})\s+in\s+(\w+)(?:[\s.,?!]|$)", alternatives))
                .ok()
                .map(|re| (kind, re))
        })
        .collect()
});

/// Rule-based parser over lowercase keywords and whitespace tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackParser;

impl FallbackParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a query. Pure: same input, same intent.
    pub fn parse(&self, query: &str) -> Intent {
        let query_lower = query.to_lowercase();
        let keywords = keyword_tokens(&query_lower);

        let action = detect_action(&keywords);
        let resource_type = detect_resource_type(&keywords);
        let namespace = detect_namespace(&query_lower, resource_type);

        let bound_by_in = namespace
            .as_ref()
            .map(|ns| query_lower.contains(&format!(" in {}", ns)))
            .unwrap_or(false);

        let resource_name = if bound_by_in {
            None
        } else {
            detect_resource_name(query, &query_lower).and_then(|name| sanitize_name(&name))
        };

        Intent {
            resource_name,
            namespace: namespace.and_then(|ns| sanitize_namespace(&ns)),
            ..Intent::new(resource_type, action)
        }
    }
}

/// Lowercase alphanumeric runs, for keyword detection
fn keyword_tokens(query_lower: &str) -> Vec<&str> {
    query_lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

fn detect_action(keywords: &[&str]) -> Action {
    let has = |words: &[&str]| keywords.iter().any(|k| words.contains(k));
    let mentions_logs = has(&["logs", "log"]);

    if mentions_logs {
        Action::Logs
    } else if has(&["describe", "desc", "details"]) {
        Action::Describe
    } else if has(&["get", "show", "find"]) {
        Action::Get
    } else {
        Action::List
    }
}

fn detect_resource_type(keywords: &[&str]) -> ResourceType {
    ResourceType::ALL
        .iter()
        .copied()
        .find(|kind| keywords.iter().any(|k| kind.keywords().contains(k)))
        .unwrap_or(ResourceType::Pods)
}

fn detect_namespace(query_lower: &str, resource_type: ResourceType) -> Option<String> {
    // Known namespace in an "in <ns>" construct
    if query_lower.contains(" in ") || query_lower.starts_with("in ") {
        if let Some(ns) = KNOWN_NAMESPACES
            .iter()
            .find(|ns| query_lower.contains(&format!("in {}", ns)))
        {
            return Some(ns.to_string());
        }
    }

    // Known namespace as a standalone token
    let tokens: Vec<&str> = query_lower.split_whitespace().map(trim_token).collect();
    if let Some(ns) = KNOWN_NAMESPACES.iter().find(|ns| tokens.contains(ns)) {
        return Some(ns.to_string());
    }

    // Free-form patterns, first match wins
    let kind_in = KIND_IN_PATTERNS
        .iter()
        .filter(|(kind, _)| *kind == resource_type)
        .map(|(_, re)| re);

    let candidates = NAMESPACE_PATTERNS
        .iter()
        .chain(kind_in)
        .chain(HYPHENATED_IN_PATTERN.iter());

    for pattern in candidates {
        if let Some(captured) = pattern.captures(query_lower).and_then(|c| c.get(1)) {
            let ns = captured.as_str();
            if !NAMESPACE_STOPWORDS.contains(&ns) {
                return Some(ns.to_string());
            }
        }
    }

    None
}

fn detect_resource_name(query: &str, query_lower: &str) -> Option<String> {
    let words: Vec<&str> = query
        .split_whitespace()
        .map(trim_token)
        .filter(|w| !w.is_empty())
        .collect();
    let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();

    let is_namespace = |w: &str| KNOWN_NAMESPACES.contains(&w);
    let is_stopword = |w: &str| STOPWORDS.contains(&w);
    let is_anchor = |w: &str| NAME_ANCHORS.contains(&w);

    // "logs for backend pod"
    for i in 0..words.len() {
        if (lower[i] == "for" || lower[i] == "of") && i + 2 < words.len() {
            let candidate = lower[i + 1].as_str();
            if is_anchor(lower[i + 2].as_str()) && !is_namespace(candidate) && !is_stopword(candidate)
            {
                return Some(words[i + 1].to_string());
            }
        }
    }

    // "backend pod"
    for i in 1..words.len() {
        if is_anchor(lower[i].as_str()) {
            let candidate = lower[i - 1].as_str();
            if !is_namespace(candidate) && !is_stopword(candidate) {
                return Some(words[i - 1].to_string());
            }
        }
    }

    // Generated object names such as "backend-deployment-f8dbcddb8-knvlc"
    for (i, word) in words.iter().enumerate() {
        if word.contains('-') && word.len() > 10 && !is_namespace(lower[i].as_str()) {
            return Some(word.to_string());
        }
    }

    // "pod name for frontend"
    if query_lower.contains("name for") {
        for i in 0..words.len() {
            if lower[i] == "for" && i + 1 < words.len() && !is_namespace(lower[i + 1].as_str()) {
                return Some(words[i + 1].to_string());
            }
        }
    }

    None
}

fn trim_token(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, ',' | '.' | '?' | '!' | '"' | '\'' | ':' | ';' | '(' | ')'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> Intent {
        FallbackParser::new().parse(query)
    }

    #[test]
    fn test_list_all_pods() {
        let intent = parse("list all pods");
        assert_eq!(intent.resource_type, ResourceType::Pods);
        assert_eq!(intent.action, Action::List);
        assert_eq!(intent.resource_name, None);
        assert_eq!(intent.namespace, None);
    }

    #[test]
    fn test_namespace_is_not_a_name() {
        let intent = parse("pods in kube-system");
        assert_eq!(intent.action, Action::List);
        assert_eq!(intent.namespace.as_deref(), Some("kube-system"));
        assert_eq!(intent.resource_name, None);

        let intent = parse("show me pods in kube-system namespace");
        assert_eq!(intent.namespace.as_deref(), Some("kube-system"));
        assert_eq!(intent.resource_name, None);
    }

    #[test]
    fn test_logs_for_named_pod() {
        let intent = parse("show logs for backend pod");
        assert_eq!(intent.action, Action::Logs);
        assert_eq!(intent.resource_type, ResourceType::Pods);
        assert_eq!(intent.resource_name.as_deref(), Some("backend"));
    }

    #[test]
    fn test_action_priority() {
        assert_eq!(parse("describe the logs pod").action, Action::Logs);
        assert_eq!(parse("describe frontend service").action, Action::Describe);
        assert_eq!(parse("show services").action, Action::Get);
        assert_eq!(parse("find deployments").action, Action::Get);
        assert_eq!(parse("what deployments are there").action, Action::List);
    }

    #[test]
    fn test_resource_type_detection() {
        assert_eq!(parse("list svc").resource_type, ResourceType::Services);
        assert_eq!(parse("list deployments").resource_type, ResourceType::Deployments);
        assert_eq!(parse("list cm").resource_type, ResourceType::ConfigMaps);
        assert_eq!(parse("list nodes").resource_type, ResourceType::Nodes);
        assert_eq!(parse("list namespaces").resource_type, ResourceType::Namespaces);
        assert_eq!(parse("list pv").resource_type, ResourceType::PersistentVolumes);
        assert_eq!(
            parse("list pvc").resource_type,
            ResourceType::PersistentVolumeClaims
        );
        assert_eq!(parse("what is running").resource_type, ResourceType::Pods);
    }

    #[test]
    fn test_first_kind_in_table_wins() {
        // "pods" precedes "namespaces" in the detection table
        let intent = parse("pods in monitoring namespace");
        assert_eq!(intent.resource_type, ResourceType::Pods);
        assert_eq!(intent.namespace.as_deref(), Some("monitoring"));
    }

    #[test]
    fn test_regex_namespace_patterns() {
        assert_eq!(
            parse("list services in payments namespace").namespace.as_deref(),
            Some("payments")
        );
        assert_eq!(
            parse("list deployments in namespace staging").namespace.as_deref(),
            Some("staging")
        );
        assert_eq!(
            parse("pods in production").namespace.as_deref(),
            Some("production")
        );
        assert_eq!(
            parse("get services in team-a").namespace.as_deref(),
            Some("team-a")
        );
        assert_eq!(parse("pods in the cluster").namespace, None);
    }

    #[test]
    fn test_known_namespace_token() {
        let intent = parse("describe coredns pod kube-system");
        assert_eq!(intent.namespace.as_deref(), Some("kube-system"));
        assert_eq!(intent.resource_name.as_deref(), Some("coredns"));
    }

    #[test]
    fn test_generated_name_heuristic() {
        let intent = parse("show the logs for this pod - backend-deployment-f8dbcddb8-knvlc");
        assert_eq!(intent.action, Action::Logs);
        assert_eq!(
            intent.resource_name.as_deref(),
            Some("backend-deployment-f8dbcddb8-knvlc")
        );
    }

    #[test]
    fn test_name_for_pattern() {
        let intent = parse("what is the name for frontend");
        assert_eq!(intent.resource_name.as_deref(), Some("frontend"));
    }

    #[test]
    fn test_names_are_lowercased() {
        let intent = parse("logs for MyApp pod");
        assert_eq!(intent.resource_name.as_deref(), Some("myapp"));
    }

    #[test]
    fn test_path_like_name_is_dropped() {
        let intent = parse("describe x/../../%73ecrets pod");
        assert_eq!(intent.action, Action::Describe);
        assert_eq!(intent.resource_type, ResourceType::Pods);
        assert_eq!(intent.resource_name, None);
    }

    #[test]
    fn test_flag_like_name_is_dropped() {
        let intent = parse("describe --server=http://evil.example pod");
        assert_eq!(intent.resource_name, None);

        let intent = parse("logs for -n pod");
        assert_eq!(intent.resource_name, None);
    }

    #[test]
    fn test_invalid_namespace_is_dropped() {
        assert_eq!(parse("pods in team_a namespace").namespace, None);
    }

    #[test]
    fn test_deterministic() {
        let query = "describe the api deployment in namespace web";
        assert_eq!(parse(query), parse(query));
    }
}
