//! Security gate for incoming queries
//!
//! A lexical policy check that runs on the raw query text before any
//! parsing happens. It is a pure function of the text: no I/O, no state.
//! The same lexicons are reused by the intent parser to re-check the
//! parsed resource type and action.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Verbs that would mutate the cluster
pub const BANNED_ACTIONS: [&str; 5] = ["delete", "edit", "patch", "apply", "create"];

/// Restricted resource categories and the patterns that identify them
pub const RESTRICTED_RESOURCES: [(&str, &[&str]); 3] = [
    ("secrets", &["secret", "secrets"]),
    ("roles", &["role", "roles", "rolebinding", "rolebindings"]),
    (
        "clusterroles",
        &[
            "clusterrole",
            "clusterroles",
            "clusterrolebinding",
            "clusterrolebindings",
        ],
    ),
];

pub const READ_ONLY_SUGGESTION: &str =
    "You can only perform read-only operations like 'list', 'get', 'describe', and 'logs'.";

pub const RESTRICTED_SUGGESTION: &str =
    "Try querying other resources like pods, services, deployments, configmaps, or ingress instead.";

/// A policy violation, from either the raw text or a parsed intent
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityViolation {
    #[error("🚫 Security Warning: '{verb}' operations are not allowed for safety reasons.")]
    BannedAction { verb: String },

    #[error("🔒 Access Denied: '{pattern}' resources are restricted for security reasons.")]
    RestrictedResource { category: String, pattern: String },
}

impl SecurityViolation {
    /// Hint steering the user back toward what is allowed
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::BannedAction { .. } => READ_ONLY_SUGGESTION,
            Self::RestrictedResource { .. } => RESTRICTED_SUGGESTION,
        }
    }
}

/// Outcome of gating one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityVerdict {
    pub blocked: bool,
    pub reason: Option<String>,
    #[serde(skip)]
    violation: Option<SecurityViolation>,
}

impl SecurityVerdict {
    pub fn allowed() -> Self {
        Self {
            blocked: false,
            reason: None,
            violation: None,
        }
    }

    pub fn blocked(violation: SecurityViolation) -> Self {
        Self {
            blocked: true,
            reason: Some(violation.to_string()),
            violation: Some(violation),
        }
    }

    pub fn violation(&self) -> Option<&SecurityViolation> {
        self.violation.as_ref()
    }
}

/// Lexical policy check over raw query text
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityGate;

impl SecurityGate {
    pub fn new() -> Self {
        Self
    }

    /// Check a raw query. Banned verbs are checked before restricted
    /// resources; the first hit decides the reason.
    pub fn check(&self, query: &str) -> SecurityVerdict {
        let query_lower = query.to_lowercase();

        if let Some(violation) = find_banned_action(&query_lower)
            .or_else(|| find_restricted_resource(&query_lower))
        {
            warn!(reason = %violation, "Query blocked by security gate");
            return SecurityVerdict::blocked(violation);
        }

        SecurityVerdict::allowed()
    }

    /// Re-check a parsed resource type and action.
    ///
    /// Exact (case-insensitive) matches only: the values come from a
    /// structured source, not prose.
    pub fn check_parsed(
        &self,
        resource_type: &str,
        action: &str,
    ) -> Result<(), SecurityViolation> {
        let resource_type = resource_type.trim().to_lowercase();
        for (category, patterns) in RESTRICTED_RESOURCES {
            if category == resource_type || patterns.contains(&resource_type.as_str()) {
                return Err(SecurityViolation::RestrictedResource {
                    category: category.to_string(),
                    pattern: resource_type,
                });
            }
        }

        let action = action.trim().to_lowercase();
        if BANNED_ACTIONS.contains(&action.as_str()) {
            return Err(SecurityViolation::BannedAction { verb: action });
        }

        Ok(())
    }
}

fn find_banned_action(query_lower: &str) -> Option<SecurityViolation> {
    BANNED_ACTIONS
        .iter()
        .find(|verb| query_lower.contains(*verb))
        .map(|verb| SecurityViolation::BannedAction {
            verb: verb.to_string(),
        })
}

fn find_restricted_resource(query_lower: &str) -> Option<SecurityViolation> {
    for (category, patterns) in RESTRICTED_RESOURCES {
        if let Some(pattern) = patterns.iter().find(|p| query_lower.contains(*p)) {
            return Some(SecurityViolation::RestrictedResource {
                category: category.to_string(),
                pattern: pattern.to_string(),
            });
        }
    }
    None
}
