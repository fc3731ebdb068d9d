//! Crate-level error aggregate
//!
//! Each component has its own error enum at its boundary. [`AssistantError`]
//! wraps them for library callers that want a single type, and classifies
//! them for logging.

use crate::cluster::ClusterError;
use crate::intent::ParseFailure;
use crate::llm::LlmError;
use crate::security::SecurityViolation;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

pub type AssistantResult<T> = Result<T, AssistantError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssistantError {
    // ========================================================================
    // Query errors
    // ========================================================================
    #[error(transparent)]
    Security(#[from] SecurityViolation),

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    // ========================================================================
    // Collaborator errors
    // ========================================================================
    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    // ========================================================================
    // Setup errors
    // ========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AssistantError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Security(_) => ErrorCategory::Security,
            Self::Parse(ParseFailure::Security(_)) => ErrorCategory::Security,
            Self::Parse(_) => ErrorCategory::Parse,
            Self::Cluster(_) => ErrorCategory::Cluster,
            Self::Llm(_) => ErrorCategory::Llm,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether the error ends a query (as opposed to degrading it)
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Security(_) | Self::Parse(_) | Self::Configuration(_) => true,
            // LLM failures trigger the fallback parser or raw output
            Self::Llm(_) => false,
            Self::Cluster(ClusterError::Unavailable(_)) => true,
            Self::Cluster(_) => false,
        }
    }

    /// Hint for the user, where one exists
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Security(violation) => Some(violation.suggestion()),
            Self::Parse(failure) => Some(failure.suggestion()),
            _ => None,
        }
    }

    pub fn log(&self) {
        if self.is_fatal() {
            error!(category = %self.category(), "{}", self);
        } else {
            warn!(category = %self.category(), "{}", self);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Security,
    Parse,
    Cluster,
    Llm,
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Security => write!(f, "security"),
            Self::Parse => write!(f, "parse"),
            Self::Cluster => write!(f, "cluster"),
            Self::Llm => write!(f, "llm"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}
