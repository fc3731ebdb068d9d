//! Cluster access
//!
//! [`ClusterBackend`] is the seam between the pipeline and a real cluster.
//! Two implementations exist: [`KubectlBackend`] shells out to the kubectl
//! CLI and returns pre-rendered text, [`ApiBackend`] talks to the API server
//! over HTTPS and returns typed objects for the executor to format.

pub mod api;
pub mod kubectl;
pub mod objects;

use crate::config::{BackendKind, ClusterConfig};
use crate::intent::{is_valid_namespace, is_valid_object_name, ResourceType};
use async_trait::async_trait;
use objects::{Deployment, GenericObject, Namespace, Node, Pod, Service};
use std::sync::Arc;
use thiserror::Error;

pub use api::ApiBackend;
pub use kubectl::KubectlBackend;

/// Failures reported by a cluster backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Cluster request timed out")]
    Timeout,

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Backend(String),

    /// Rejected locally; nothing was sent to the cluster
    #[error("{0}")]
    InvalidArgument(String),
}

/// Output of a list or describe call
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterOutput {
    /// Already rendered for display
    Text(String),
    Pods(Vec<Pod>),
    Services(Vec<Service>),
    Deployments(Vec<Deployment>),
    Nodes(Vec<Node>),
    Namespaces(Vec<Namespace>),
    /// Kinds without a dedicated table
    Objects(Vec<GenericObject>),
    /// A single object in full
    Object(serde_json::Value),
}

/// Read-only access to a cluster
///
/// `namespace` is ignored for cluster-scoped kinds. A `None` namespace for a
/// namespaced kind means the backend's configured default.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Short identifier for logs and health output
    fn name(&self) -> &'static str;

    /// Names of all objects of a kind
    async fn list_names(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
    ) -> Result<Vec<String>, ClusterError>;

    /// List objects, or one object when `name` is given
    async fn get(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
        name: Option<&str>,
        flags: &[String],
    ) -> Result<ClusterOutput, ClusterError>;

    /// Full detail of one object
    async fn describe(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ClusterOutput, ClusterError>;

    /// Tail of a pod's logs
    async fn logs(
        &self,
        pod: &str,
        namespace: Option<&str>,
        tail_lines: usize,
        flags: &[String],
    ) -> Result<String, ClusterError>;

    /// Cheap reachability check
    async fn ping(&self) -> Result<(), ClusterError> {
        self.list_names(ResourceType::Namespaces, None)
            .await
            .map(|_| ())
    }
}

/// Build the backend selected in configuration
pub fn build_backend(config: &ClusterConfig) -> Result<Arc<dyn ClusterBackend>, ClusterError> {
    match config.backend {
        BackendKind::Kubectl => Ok(Arc::new(KubectlBackend::new(config.clone()))),
        BackendKind::Api => Ok(Arc::new(ApiBackend::new(config)?)),
    }
}

/// Namespace to send for a kind, or `None` for cluster-scoped kinds
pub(crate) fn scoped_namespace<'a>(
    resource_type: ResourceType,
    namespace: Option<&'a str>,
    default_namespace: &'a str,
) -> Option<&'a str> {
    if resource_type.is_namespaced() {
        Some(namespace.unwrap_or(default_namespace))
    } else {
        None
    }
}

/// Like [`scoped_namespace`], rejecting namespaces the API server would not accept
pub(crate) fn checked_namespace<'a>(
    resource_type: ResourceType,
    namespace: Option<&'a str>,
    default_namespace: &'a str,
) -> Result<Option<&'a str>, ClusterError> {
    match scoped_namespace(resource_type, namespace, default_namespace) {
        Some(ns) if !is_valid_namespace(ns) => Err(ClusterError::InvalidArgument(format!(
            "Invalid namespace '{}'",
            ns
        ))),
        scoped => Ok(scoped),
    }
}

/// Reject object names that could be read as flags or path syntax
pub(crate) fn checked_name(name: &str) -> Result<&str, ClusterError> {
    if is_valid_object_name(name) {
        Ok(name)
    } else {
        Err(ClusterError::InvalidArgument(format!(
            "Invalid resource name '{}'",
            name
        )))
    }
}
