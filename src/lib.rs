//! Kube Assistant - natural-language, read-only queries against a cluster
//!
//! A prose question is checked against a static security policy, turned
//! into a structured [`Intent`], matched against live resource names,
//! executed through a [`ClusterBackend`] and finally narrated for a human
//! reader. [`QueryOrchestrator`] wires the stages together.
//!
//! ```rust,ignore
//! use kube_assistant::{AssistantConfig, QueryOrchestrator, QueryProcessor};
//!
//! let config = AssistantConfig::load("kube-assistant.toml")?;
//! let orchestrator = QueryOrchestrator::from_config(&config)?;
//! let response = orchestrator.process_query("pods in kube-system").await;
//! println!("{}", response.enhanced_response.unwrap_or_default());
//! ```

pub mod cluster;
pub mod config;
pub mod enhancer;
pub mod error;
pub mod executor;
pub mod intent;
pub mod llm;
pub mod orchestration;
pub mod resolver;
pub mod security;

pub use cluster::{ClusterBackend, ClusterError, ClusterOutput};
pub use config::{AssistantConfig, BackendKind, ClusterConfig, LlmConfig, PipelineConfig};
pub use error::{AssistantError, AssistantResult, ErrorCategory};
pub use executor::{CommandExecutor, ExecutionErrorKind, ExecutionResult};
pub use intent::{Action, Intent, IntentParser, ResourceType};
pub use llm::{LlmClient, LlmError};
pub use orchestration::{HealthStatus, QueryOrchestrator, QueryProcessor, QueryResponse, Stage};
pub use resolver::ResourceResolver;
pub use security::{SecurityGate, SecurityVerdict, SecurityViolation};
