//! Resource name resolution
//!
//! Users rarely type full generated names ("backend" rather than
//! "backend-deployment-7f9c-x2k"). The resolver looks up live names and
//! picks the best candidate. It only ever annotates the intent; failures
//! leave the name untouched with a note.

use crate::cluster::{ClusterBackend, ClusterError};
use crate::config::PipelineConfig;
use crate::intent::Intent;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Category words and their aliases for the last-resort match
const CATEGORY_ALIASES: [(&str, &[&str]); 5] = [
    ("frontend", &["front", "fe", "ui", "web"]),
    ("backend", &["back", "be", "api", "server"]),
    ("database", &["db", "postgres", "mysql", "mongo"]),
    ("redis", &["cache", "session"]),
    ("nginx", &["proxy", "lb", "loadbalancer"]),
];

/// How many live names a no-match note lists
const NOTE_SAMPLE: usize = 5;

/// Which rule produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Prefix,
    Substring,
    Category,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub name: String,
    pub kind: MatchKind,
    /// Runner-up candidates, best first
    pub others: Vec<String>,
}

/// Generated names with this shape are taken as already complete
pub fn looks_fully_qualified(name: &str) -> bool {
    name.len() > 20 && name.matches('-').count() >= 3
}

/// Pick the best live name for `partial`.
///
/// Rules are tried in order and the first that yields anything wins:
/// exact, prefix, substring, category alias. Among several matches the
/// shortest name is chosen.
pub fn best_match(partial: &str, candidates: &[String], max_others: usize) -> Option<NameMatch> {
    let partial = partial.to_lowercase();

    if let Some(exact) = candidates.iter().find(|c| c.to_lowercase() == partial) {
        return Some(NameMatch {
            name: exact.clone(),
            kind: MatchKind::Exact,
            others: Vec::new(),
        });
    }

    let collect = |pred: &dyn Fn(&str) -> bool| -> Vec<&String> {
        candidates
            .iter()
            .filter(|c| pred(c.to_lowercase().as_str()))
            .collect()
    };

    let (kind, matches) = [
        (MatchKind::Prefix, collect(&|c: &str| c.starts_with(partial.as_str()))),
        (MatchKind::Substring, collect(&|c: &str| c.contains(partial.as_str()))),
        (MatchKind::Category, collect(&|c: &str| category_matches(&partial, c))),
    ]
    .into_iter()
    .find(|(_, matches)| !matches.is_empty())?;

    // min_by_key keeps the first of equally short names
    let best = matches.iter().min_by_key(|m| m.len())?;
    let others = matches
        .iter()
        .filter(|m| *m != best)
        .take(max_others)
        .map(|m| m.to_string())
        .collect();

    Some(NameMatch {
        name: best.to_string(),
        kind,
        others,
    })
}

/// Whether `candidate` belongs to the category `partial` names
fn category_matches(partial: &str, candidate: &str) -> bool {
    CATEGORY_ALIASES.iter().any(|(key, aliases)| {
        (*key == partial || aliases.contains(&partial))
            && (candidate.contains(key) || aliases.iter().any(|a| candidate.contains(a)))
    })
}

/// Resolves partial names against live cluster state
pub struct ResourceResolver {
    backend: Arc<dyn ClusterBackend>,
    timeout: Duration,
    max_other_matches: usize,
}

impl ResourceResolver {
    pub fn new(backend: Arc<dyn ClusterBackend>, config: &PipelineConfig) -> Self {
        Self {
            backend,
            timeout: Duration::from_secs(config.resolve_timeout_secs),
            max_other_matches: config.max_other_matches,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Annotate `intent` with the resolved name. Never fails.
    pub async fn resolve(&self, mut intent: Intent) -> Intent {
        let Some(partial) = intent.resource_name.clone() else {
            return intent;
        };
        if looks_fully_qualified(&partial) {
            debug!(name = %partial, "Name looks complete, skipping resolution");
            return intent;
        }

        // An unset namespace lists the backend's default namespace
        let lookup = self
            .backend
            .list_names(intent.resource_type, intent.namespace.as_deref());
        let names = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(names)) => names,
            Ok(Err(ClusterError::Timeout)) | Err(_) => {
                warn!(name = %partial, "Timed out resolving resource name");
                intent.resolution_note = Some("Timeout while resolving resource names".to_string());
                return intent;
            }
            Ok(Err(e)) => {
                warn!(name = %partial, error = %e, "Failed to list resource names");
                intent.resolution_note = Some(format!("Error resolving resource names: {}", e));
                return intent;
            }
        };

        match best_match(&partial, &names, self.max_other_matches) {
            Some(found) if found.kind == MatchKind::Exact => {
                intent.resource_name = Some(found.name);
            }
            Some(found) => {
                info!(
                    from = %partial,
                    to = %found.name,
                    rule = ?found.kind,
                    alternatives = found.others.len(),
                    "Resolved resource name"
                );
                intent.resource_name = Some(found.name);
                intent.resolved_from = Some(partial);
                intent.other_matches = found.others;
            }
            None => {
                let sample = names.iter().take(NOTE_SAMPLE).cloned().collect::<Vec<_>>();
                let available = if sample.is_empty() {
                    "none".to_string()
                } else {
                    sample.join(", ")
                };
                warn!(name = %partial, candidates = names.len(), "No matching resource name");
                intent.resolution_note = Some(format!(
                    "No match found for '{}'. Available: {}",
                    partial, available
                ));
            }
        }

        intent
    }
}
