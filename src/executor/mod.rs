//! Command execution
//!
//! Maps a resolved [`Intent`] onto exactly one read-only backend call and
//! renders the outcome to text. Failures are returned as data in
//! [`ExecutionResult::error`]; nothing here returns `Err`.

pub mod format;

use crate::cluster::{ClusterBackend, ClusterError};
use crate::config::PipelineConfig;
use crate::intent::{is_valid_namespace, is_valid_object_name, Action, Intent, ResourceType};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Why an execution produced no usable output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    /// Backend call exceeded its budget (seconds)
    Timeout(u64),
    NotFound(String),
    PermissionDenied(String),
    BackendError(String),
    BackendUnavailable(String),
    /// Local precondition failed; no backend call was made
    InvalidRequest(String),
}

impl ExecutionErrorKind {
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Timeout(_) => {
                "The cluster may be slow or unresponsive. Try again, or narrow the query to a namespace."
            }
            Self::NotFound(_) => {
                "Check the resource name and namespace. Try listing the resources first."
            }
            Self::PermissionDenied(_) => {
                "Your credentials cannot read this resource. Check your RBAC permissions."
            }
            Self::BackendError(_) => "Check the resource name, namespace and cluster state.",
            Self::BackendUnavailable(_) => {
                "Check that kubectl is installed and that the cluster API is reachable."
            }
            Self::InvalidRequest(_) => {
                "Name the resource explicitly, for example 'show logs for backend pod'."
            }
        }
    }
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(secs) => write!(f, "Error: command timed out after {} seconds", secs),
            Self::NotFound(msg) => write!(f, "Resource not found: {}", msg),
            Self::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            Self::BackendError(msg) => write!(f, "Command failed: {}", msg),
            Self::BackendUnavailable(msg) => write!(f, "Cluster unavailable: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Outcome of one execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub raw_text: String,
    pub error: Option<ExecutionErrorKind>,
}

impl ExecutionResult {
    pub fn ok(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            error: None,
        }
    }

    /// Failed result; the raw text carries the readable error
    pub fn failed(error: ExecutionErrorKind) -> Self {
        Self {
            raw_text: error.to_string(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs intents against a [`ClusterBackend`]
pub struct CommandExecutor {
    backend: Arc<dyn ClusterBackend>,
    timeout: Duration,
    tail_lines: usize,
}

impl CommandExecutor {
    pub fn new(backend: Arc<dyn ClusterBackend>, config: &PipelineConfig) -> Self {
        Self {
            backend,
            timeout: Duration::from_secs(config.execute_timeout_secs),
            tail_lines: config.log_tail_lines,
        }
    }

    /// Override the call budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn execute(&self, intent: &Intent) -> ExecutionResult {
        let operation = match plan(intent) {
            Ok(operation) => operation,
            Err(error) => {
                warn!(error = %error, "Rejected intent before execution");
                return ExecutionResult::failed(error);
            }
        };

        info!(
            backend = self.backend.name(),
            operation = %intent.summary(),
            "Executing read-only operation"
        );

        let budget = self.timeout.as_secs();
        let call = self.dispatch(intent, operation);
        let result = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => Err(ExecutionErrorKind::Timeout(budget)),
            Ok(result) => result.map_err(|e| map_cluster_error(e, budget)),
        };

        match result {
            Ok(text) => ExecutionResult::ok(text),
            Err(error) => {
                warn!(error = %error, "Execution failed");
                ExecutionResult::failed(error)
            }
        }
    }

    async fn dispatch(&self, intent: &Intent, operation: Operation<'_>) -> Result<String, ClusterError> {
        let namespace = intent.namespace.as_deref();

        match operation {
            Operation::Get(name) => {
                let output = self
                    .backend
                    .get(intent.resource_type, namespace, name, &intent.additional_flags)
                    .await?;
                Ok(format::render(&output, Utc::now()))
            }
            Operation::Describe(name) => {
                let output = self
                    .backend
                    .describe(intent.resource_type, namespace, name)
                    .await?;
                Ok(format::render(&output, Utc::now()))
            }
            Operation::Logs(pod) => {
                let text = self
                    .backend
                    .logs(pod, namespace, self.tail_lines, &intent.additional_flags)
                    .await?;
                Ok(last_lines(&text, self.tail_lines))
            }
        }
    }
}

/// The one backend call an intent maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation<'a> {
    Get(Option<&'a str>),
    Describe(&'a str),
    Logs(&'a str),
}

/// Local preconditions checked before any backend call
fn plan(intent: &Intent) -> Result<Operation<'_>, ExecutionErrorKind> {
    if let Some(namespace) = intent.namespace.as_deref() {
        if !is_valid_namespace(namespace) {
            return Err(ExecutionErrorKind::InvalidRequest(format!(
                "Invalid namespace '{}'",
                namespace
            )));
        }
    }
    let name = intent.resource_name.as_deref();
    if let Some(name) = name {
        if !is_valid_object_name(name) {
            return Err(ExecutionErrorKind::InvalidRequest(format!(
                "Invalid resource name '{}'",
                name
            )));
        }
    }

    match (intent.action, name) {
        (Action::Logs, _) if intent.resource_type != ResourceType::Pods => {
            Err(ExecutionErrorKind::InvalidRequest(format!(
                "Logs are only available for pods, not {}",
                intent.resource_type
            )))
        }
        (Action::List | Action::Get, name) => Ok(Operation::Get(name)),
        (Action::Describe, Some(name)) => Ok(Operation::Describe(name)),
        (Action::Logs, Some(pod)) => Ok(Operation::Logs(pod)),
        (Action::Describe, None) => Err(ExecutionErrorKind::InvalidRequest(
            "Resource name required for describe command".to_string(),
        )),
        (Action::Logs, None) => Err(ExecutionErrorKind::InvalidRequest(
            "Resource name required for logs command".to_string(),
        )),
    }
}

/// `budget` is the call budget in seconds, reported on timeouts
fn map_cluster_error(error: ClusterError, budget: u64) -> ExecutionErrorKind {
    match error {
        ClusterError::NotFound(msg) => ExecutionErrorKind::NotFound(msg),
        ClusterError::PermissionDenied(msg) => ExecutionErrorKind::PermissionDenied(msg),
        ClusterError::Unavailable(msg) => ExecutionErrorKind::BackendUnavailable(msg),
        ClusterError::Backend(msg) => ExecutionErrorKind::BackendError(msg),
        ClusterError::InvalidArgument(msg) => ExecutionErrorKind::InvalidRequest(msg),
        ClusterError::Timeout => ExecutionErrorKind::Timeout(budget),
    }
}

/// Keep the last `n` lines of `text`
pub fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
