//! Query orchestrator
//!
//! Drives one [`WorkflowState`] per query through the stages in
//! [`super::state`]. The LLM client and cluster backend are injected and
//! shared between concurrent queries; everything else is per-query.

use crate::cluster::{self, ClusterBackend};
use crate::config::{AssistantConfig, PipelineConfig};
use crate::enhancer::{fallback_text, ResponseEnhancer};
use crate::error::{AssistantError, AssistantResult};
use crate::executor::{CommandExecutor, ExecutionResult};
use crate::intent::{Intent, IntentParser};
use crate::llm::{self, LlmClient};
use crate::orchestration::state::{next_stage, Stage, WorkflowState};
use crate::resolver::ResourceResolver;
use crate::security::SecurityGate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

pub const SERVICE_NAME: &str = "kube-assistant";

const UNKNOWN_ERROR: &str = "An unknown error occurred";
const UNKNOWN_SUGGESTION: &str = "Please try rephrasing your query";
const EMPTY_OUTPUT: &str = "The query completed but returned no output.";

/// Response envelope for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub parsed_intent: Option<Intent>,
    pub raw_response: Option<String>,
    pub enhanced_response: Option<String>,
    pub error: Option<String>,
    pub suggestion: Option<String>,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub backend: String,
    pub cluster_reachable: bool,
}

/// Entry points offered to a front end (CLI, HTTP layer)
#[async_trait]
pub trait QueryProcessor: Send + Sync {
    /// Run the whole pipeline for one query. Never fails; errors are
    /// reported inside the response.
    async fn process_query(&self, query: &str) -> QueryResponse;

    async fn health_check(&self) -> HealthStatus;
}

pub struct QueryOrchestrator {
    gate: SecurityGate,
    parser: IntentParser,
    resolver: ResourceResolver,
    executor: CommandExecutor,
    enhancer: ResponseEnhancer,
    backend: Arc<dyn ClusterBackend>,
    ping_timeout: Duration,
}

impl QueryOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        backend: Arc<dyn ClusterBackend>,
        pipeline: &PipelineConfig,
    ) -> Self {
        Self {
            gate: SecurityGate::new(),
            parser: IntentParser::new(Arc::clone(&llm)),
            resolver: ResourceResolver::new(Arc::clone(&backend), pipeline),
            executor: CommandExecutor::new(Arc::clone(&backend), pipeline),
            enhancer: ResponseEnhancer::new(llm),
            backend,
            ping_timeout: Duration::from_secs(pipeline.resolve_timeout_secs),
        }
    }

    /// Build the collaborators named in configuration
    pub fn from_config(config: &AssistantConfig) -> AssistantResult<Self> {
        config
            .validate()
            .map_err(|e| AssistantError::Configuration(e.to_string()))?;
        let llm = llm::build_client(&config.llm)?;
        let backend = cluster::build_backend(&config.cluster)?;
        info!(
            backend = backend.name(),
            model = llm.model_name(),
            "Query orchestrator ready"
        );
        Ok(Self::new(llm, backend, &config.pipeline))
    }

    /// Override the resolver's name-listing budget
    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolver = self.resolver.with_timeout(timeout);
        self
    }

    /// Override the executor's backend-call budget
    pub fn with_execute_timeout(mut self, timeout: Duration) -> Self {
        self.executor = self.executor.with_timeout(timeout);
        self
    }

    /// Run the state machine to a terminal stage
    pub async fn run_workflow(&self, query: &str) -> WorkflowState {
        let span = info_span!("query", id = %Uuid::new_v4());
        async {
            let mut state = WorkflowState::new(query);
            let mut stage = Stage::Security;

            loop {
                debug!(stage = %stage, "Entering stage");
                state.visited.push(stage);
                self.run_stage(stage, &mut state).await;

                match next_stage(stage, &state) {
                    Some(next) => stage = next,
                    None => {
                        state.terminal = Some(stage);
                        break;
                    }
                }
            }

            state
        }
        .instrument(span)
        .await
    }

    /// Like [`QueryProcessor::process_query`], abandoned when `cancel`
    /// completes first. In-flight calls are dropped with the pipeline.
    pub async fn process_query_until<F>(&self, query: &str, cancel: F) -> Option<QueryResponse>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            response = self.process_query(query) => Some(response),
            _ = cancel => {
                info!("Query cancelled");
                None
            }
        }
    }

    async fn run_stage(&self, stage: Stage, state: &mut WorkflowState) {
        match stage {
            Stage::Security => {
                let verdict = self.gate.check(&state.query);
                if let Some(violation) = verdict.violation() {
                    AssistantError::from(violation.clone()).log();
                    state.fail(violation.to_string(), violation.suggestion());
                }
                state.security_verdict = Some(verdict);
            }
            Stage::Parse => match self.parser.parse(&state.query).await {
                Ok(intent) => {
                    info!(intent = %intent.summary(), "Parsed intent");
                    state.intent = Some(intent);
                }
                Err(failure) => {
                    state.fail(failure.to_string(), failure.suggestion());
                    AssistantError::from(failure).log();
                }
            },
            Stage::Resolve => {
                if let Some(intent) = state.intent.take() {
                    state.intent = Some(self.resolver.resolve(intent).await);
                }
            }
            Stage::Execute => {
                if let Some(intent) = &state.intent {
                    state.execution_result = Some(self.executor.execute(intent).await);
                }
            }
            Stage::Enhance => {
                let (Some(intent), Some(result)) = (&state.intent, &state.execution_result) else {
                    return;
                };
                if result.is_success() && !result.raw_text.trim().is_empty() {
                    let text = self
                        .enhancer
                        .enhance(&state.query, intent, &result.raw_text)
                        .await;
                    state.enhanced_text = Some(text);
                } else {
                    debug!("Skipping enhancement");
                }
            }
            Stage::Format => {
                debug!("Formatting response");
            }
            Stage::ErrorFormat => {
                if state.error.is_none() {
                    error!("Query failed without an error message");
                    state.fail(UNKNOWN_ERROR, UNKNOWN_SUGGESTION);
                }
                debug!("Formatting error response");
            }
        }
    }
}

#[async_trait]
impl QueryProcessor for QueryOrchestrator {
    async fn process_query(&self, query: &str) -> QueryResponse {
        let state = self.run_workflow(query).await;
        format_response(&state)
    }

    async fn health_check(&self) -> HealthStatus {
        let reachable = matches!(
            tokio::time::timeout(self.ping_timeout, self.backend.ping()).await,
            Ok(Ok(()))
        );
        HealthStatus {
            status: if reachable { "healthy" } else { "degraded" }.to_string(),
            service: SERVICE_NAME.to_string(),
            backend: self.backend.name().to_string(),
            cluster_reachable: reachable,
        }
    }
}

/// Build the response envelope from a finished workflow
pub fn format_response(state: &WorkflowState) -> QueryResponse {
    if state.terminal == Some(Stage::ErrorFormat) || state.error.is_some() {
        return QueryResponse {
            query: state.query.clone(),
            parsed_intent: state.intent.clone(),
            raw_response: None,
            enhanced_response: None,
            error: Some(state.error.clone().unwrap_or_else(|| UNKNOWN_ERROR.to_string())),
            suggestion: state.suggestion.clone(),
            success: false,
        };
    }

    let result = state
        .execution_result
        .clone()
        .unwrap_or_else(|| ExecutionResult::ok(String::new()));

    let enhanced = match (&state.enhanced_text, &result.error) {
        (Some(text), _) => text.clone(),
        (None, Some(_)) => format!("Unable to execute the query. {}", result.raw_text),
        (None, None) if result.raw_text.trim().is_empty() => EMPTY_OUTPUT.to_string(),
        (None, None) => fallback_text(&result.raw_text),
    };

    QueryResponse {
        query: state.query.clone(),
        parsed_intent: state.intent.clone(),
        suggestion: result.error.as_ref().map(|e| e.suggestion().to_string()),
        raw_response: Some(result.raw_text),
        enhanced_response: Some(enhanced),
        error: None,
        success: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionErrorKind;
    use crate::intent::{Action, ResourceType};

    fn finished(terminal: Stage) -> WorkflowState {
        WorkflowState {
            query: "q".to_string(),
            terminal: Some(terminal),
            ..WorkflowState::default()
        }
    }

    #[test]
    fn test_error_envelope() {
        let mut state = finished(Stage::ErrorFormat);
        state.fail("🚫 Security Warning: 'delete' operations are not allowed for safety reasons.", "read-only");
        let response = format_response(&state);

        assert!(!response.success);
        assert!(response.error.unwrap().contains("delete"));
        assert_eq!(response.suggestion.as_deref(), Some("read-only"));
        assert!(response.raw_response.is_none());
    }

    #[test]
    fn test_execution_error_envelope() {
        let mut state = finished(Stage::Format);
        state.intent = Some(Intent::new(ResourceType::Pods, Action::List));
        state.execution_result = Some(ExecutionResult::failed(ExecutionErrorKind::Timeout(30)));
        let response = format_response(&state);

        assert!(response.success);
        assert!(response.error.is_none());
        assert!(response.suggestion.is_some());
        let enhanced = response.enhanced_response.unwrap();
        assert!(enhanced.starts_with("Unable to execute the query. "));
        assert!(enhanced.contains("timed out"));
    }

    #[test]
    fn test_success_envelope() {
        let mut state = finished(Stage::Format);
        state.intent = Some(Intent::default());
        state.execution_result = Some(ExecutionResult::ok("NAME READY"));
        state.enhanced_text = Some("All good".to_string());
        let response = format_response(&state);

        assert!(response.success);
        assert_eq!(response.raw_response.as_deref(), Some("NAME READY"));
        assert_eq!(response.enhanced_response.as_deref(), Some("All good"));
        assert!(response.suggestion.is_none());
    }

    #[test]
    fn test_empty_output_envelope() {
        let mut state = finished(Stage::Format);
        state.intent = Some(Intent::default());
        state.execution_result = Some(ExecutionResult::ok(""));
        let response = format_response(&state);
        assert_eq!(response.enhanced_response.as_deref(), Some(EMPTY_OUTPUT));
    }

    #[test]
    fn test_response_serializes_all_fields() {
        let response = format_response(&finished(Stage::ErrorFormat));
        let json = serde_json::to_value(&response).unwrap();
        for key in [
            "query",
            "parsed_intent",
            "raw_response",
            "enhanced_response",
            "error",
            "suggestion",
            "success",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["error"], UNKNOWN_ERROR);
    }
}
