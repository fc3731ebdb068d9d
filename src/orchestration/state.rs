//! Pipeline state machine
//!
//! ```text
//! Security ──ok──▶ Parse ──ok──▶ Resolve ──▶ Execute ──▶ Enhance ──▶ Format
//!    │               │
//!    └──blocked──────┴──failed──▶ ErrorFormat
//! ```
//!
//! [`next_stage`] is the whole transition table. It is pure: it reads the
//! state and never mutates it.

use crate::executor::ExecutionResult;
use crate::intent::Intent;
use crate::security::SecurityVerdict;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Security,
    Parse,
    Resolve,
    Execute,
    Enhance,
    Format,
    ErrorFormat,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Format | Self::ErrorFormat)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Parse => "parse",
            Self::Resolve => "resolve",
            Self::Execute => "execute",
            Self::Enhance => "enhance",
            Self::Format => "format",
            Self::ErrorFormat => "error_format",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one query accumulates on its way through the pipeline
///
/// Created per query and owned by the orchestrator task running it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowState {
    pub query: String,
    pub intent: Option<Intent>,
    pub security_verdict: Option<SecurityVerdict>,
    pub execution_result: Option<ExecutionResult>,
    pub enhanced_text: Option<String>,
    /// Fatal error text; set only by stages that may branch to `ErrorFormat`
    pub error: Option<String>,
    pub suggestion: Option<String>,
    /// Stages entered so far, in order
    pub visited: Vec<Stage>,
    /// Terminal stage reached, once the run is over
    pub terminal: Option<Stage>,
}

impl WorkflowState {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Record a fatal failure
    pub fn fail(&mut self, error: impl Into<String>, suggestion: impl Into<String>) {
        self.error = Some(error.into());
        self.suggestion = Some(suggestion.into());
    }

    pub fn is_blocked(&self) -> bool {
        self.security_verdict
            .as_ref()
            .map(|v| v.blocked)
            .unwrap_or(false)
    }
}

/// Stage that follows `current`, or `None` once a terminal stage ran
pub fn next_stage(current: Stage, state: &WorkflowState) -> Option<Stage> {
    let next = match current {
        Stage::Security if state.is_blocked() || state.error.is_some() => Stage::ErrorFormat,
        Stage::Security => Stage::Parse,
        Stage::Parse if state.error.is_some() || state.intent.is_none() => Stage::ErrorFormat,
        Stage::Parse => Stage::Resolve,
        Stage::Resolve => Stage::Execute,
        // Execution errors are data: they flow on to Enhance
        Stage::Execute => Stage::Enhance,
        Stage::Enhance => Stage::Format,
        Stage::Format | Stage::ErrorFormat => return None,
    };
    Some(next)
}
