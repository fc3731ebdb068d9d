//! Core data types for structured cluster queries
//!
//! An [`Intent`] is what the parser produces from prose and what the
//! resolver and executor consume. Resource types and actions are closed
//! enums so that, once an intent exists, it can only name something the
//! pipeline knows how to read.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Resource Types
// ============================================================================

/// Supported (readable) cluster resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Pods,
    Services,
    Deployments,
    ConfigMaps,
    Ingress,
    Nodes,
    Namespaces,
    PersistentVolumes,
    PersistentVolumeClaims,
}

impl ResourceType {
    /// All supported kinds, in fallback-detection order
    pub const ALL: [ResourceType; 9] = [
        ResourceType::Pods,
        ResourceType::Services,
        ResourceType::Deployments,
        ResourceType::ConfigMaps,
        ResourceType::Ingress,
        ResourceType::Nodes,
        ResourceType::Namespaces,
        ResourceType::PersistentVolumes,
        ResourceType::PersistentVolumeClaims,
    ];

    /// Canonical plural name, as accepted by kubectl
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pods => "pods",
            Self::Services => "services",
            Self::Deployments => "deployments",
            Self::ConfigMaps => "configmaps",
            Self::Ingress => "ingress",
            Self::Nodes => "nodes",
            Self::Namespaces => "namespaces",
            Self::PersistentVolumes => "persistentvolumes",
            Self::PersistentVolumeClaims => "persistentvolumeclaims",
        }
    }

    /// Words that identify this kind in free text
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Pods => &["pod", "pods"],
            Self::Services => &["service", "services", "svc"],
            Self::Deployments => &["deployment", "deployments", "deploy"],
            Self::ConfigMaps => &["configmap", "configmaps", "cm"],
            Self::Ingress => &["ingress", "ingresses", "ing"],
            Self::Nodes => &["node", "nodes"],
            Self::Namespaces => &["namespace", "namespaces", "ns"],
            Self::PersistentVolumes => &["persistentvolume", "persistentvolumes", "pv", "pvs"],
            Self::PersistentVolumeClaims => {
                &["persistentvolumeclaim", "persistentvolumeclaims", "pvc", "pvcs"]
            }
        }
    }

    /// Whether objects of this kind live inside a namespace
    pub fn is_namespaced(&self) -> bool {
        !matches!(
            self,
            Self::Nodes | Self::Namespaces | Self::PersistentVolumes
        )
    }

    /// Parse a canonical name or known alias.
    ///
    /// Returns `None` for anything unrecognised; callers that need the
    /// total mapping use [`normalize_resource_type`].
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        let kind = match value.as_str() {
            "pods" | "pod" => Self::Pods,
            "services" | "service" | "svc" => Self::Services,
            "deployments" | "deployment" | "deploy" => Self::Deployments,
            "configmaps" | "configmap" | "cm" => Self::ConfigMaps,
            "ingress" | "ingresses" | "ing" => Self::Ingress,
            "nodes" | "node" => Self::Nodes,
            "namespaces" | "namespace" | "ns" => Self::Namespaces,
            "persistentvolumes" | "persistentvolume" | "pv" => Self::PersistentVolumes,
            "persistentvolumeclaims" | "persistentvolumeclaim" | "pvc" => {
                Self::PersistentVolumeClaims
            }
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map any resource-type string onto a supported kind.
///
/// Unknown values become `pods`.
pub fn normalize_resource_type(value: &str) -> ResourceType {
    ResourceType::parse(value).unwrap_or(ResourceType::Pods)
}

// ============================================================================
// Actions
// ============================================================================

/// Read-only operations the executor can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    List,
    Get,
    Describe,
    Logs,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Describe => "describe",
            Self::Logs => "logs",
        }
    }

    /// Parse an action name or common synonym
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "list" | "ls" => Some(Self::List),
            "get" | "show" | "find" => Some(Self::Get),
            "describe" | "desc" | "details" => Some(Self::Describe),
            "logs" | "log" => Some(Self::Logs),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Intent
// ============================================================================

/// Structured representation of a user's request
///
/// `namespace: None` means the user did not name one and the backend
/// default applies; `Some("default")` means they asked for it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub resource_type: ResourceType,
    pub action: Action,
    pub resource_name: Option<String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub additional_flags: Vec<String>,

    /// Name the user typed, when resolution replaced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_from: Option<String>,
    /// Other live names that also matched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_matches: Vec<String>,
    /// Why resolution left the name untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_note: Option<String>,
}

impl Intent {
    pub fn new(resource_type: ResourceType, action: Action) -> Self {
        Self {
            resource_type,
            action,
            resource_name: None,
            namespace: None,
            additional_flags: Vec::new(),
            resolved_from: None,
            other_matches: Vec::new(),
            resolution_note: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Short human description, used in prompts and logs
    pub fn summary(&self) -> String {
        let mut summary = format!("{} {}", self.action, self.resource_type);
        if let Some(name) = &self.resource_name {
            summary.push_str(&format!(" '{}'", name));
        }
        if let Some(ns) = &self.namespace {
            summary.push_str(&format!(" in namespace '{}'", ns));
        }
        summary
    }
}

impl Default for Intent {
    fn default() -> Self {
        Self::new(ResourceType::Pods, Action::List)
    }
}
