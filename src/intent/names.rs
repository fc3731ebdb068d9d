//! Object name and namespace checks
//!
//! Names end up as kubectl arguments and API URL path segments, so only the
//! shapes the API server itself accepts get through: DNS-1123 subdomains for
//! object names and DNS-1123 labels for namespaces.

use once_cell::sync::Lazy;
use regex::Regex;

const MAX_NAME_LEN: usize = 253;
const MAX_NAMESPACE_LEN: usize = 63;

static OBJECT_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9.]*[a-z0-9])?$").ok());

static NAMESPACE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").ok());

fn matches(pattern: &Lazy<Option<Regex>>, value: &str) -> bool {
    pattern
        .as_ref()
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

pub fn is_valid_object_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && !name.contains("..") && matches(&OBJECT_NAME, name)
}

pub fn is_valid_namespace(namespace: &str) -> bool {
    namespace.len() <= MAX_NAMESPACE_LEN && matches(&NAMESPACE, namespace)
}

/// Lowercased name if it is a valid object name
pub fn sanitize_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_lowercase();
    is_valid_object_name(&name).then_some(name)
}

/// Lowercased namespace if it is a valid namespace
pub fn sanitize_namespace(raw: &str) -> Option<String> {
    let namespace = raw.trim().to_lowercase();
    is_valid_namespace(&namespace).then_some(namespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_names() {
        assert!(is_valid_object_name("backend-deployment-7f9c"));
        assert!(is_valid_object_name("coredns.v1"));
        assert!(is_valid_object_name("a"));

        for hostile in [
            "",
            "x/../../%73ecrets",
            "../secrets",
            "a..b",
            "%73ecrets",
            "--server=http://evil.example",
            "-n",
            "web-",
            "Backend",
            "with space",
        ] {
            assert!(!is_valid_object_name(hostile), "accepted {:?}", hostile);
        }
        assert!(!is_valid_object_name(&"a".repeat(254)));
    }

    #[test]
    fn test_namespaces() {
        assert!(is_valid_namespace("kube-system"));
        assert!(!is_valid_namespace("team.a"));
        assert!(!is_valid_namespace("team_a"));
        assert!(!is_valid_namespace("-a"));
        assert!(!is_valid_namespace(&"a".repeat(64)));
    }

    #[test]
    fn test_sanitize_lowercases() {
        assert_eq!(sanitize_name(" MyApp "), Some("myapp".to_string()));
        assert_eq!(sanitize_name("x/../y"), None);
        assert_eq!(sanitize_namespace("Kube-System"), Some("kube-system".to_string()));
        assert_eq!(sanitize_namespace("../default"), None);
    }
}
