//! Natural language intent parser
//!
//! The primary path asks the LLM for a JSON intent and validates it. Any
//! failure to obtain usable JSON yields [`LlmParse::Unparseable`], which
//! hands the query to the deterministic [`FallbackParser`]. Security
//! violations found in the parsed output are fatal and never fall back.

use crate::intent::fallback::FallbackParser;
use crate::intent::names::{sanitize_name, sanitize_namespace};
use crate::intent::types::{normalize_resource_type, Action, Intent};
use crate::llm::LlmClient;
use crate::orchestration::prompts::PromptTemplates;
use crate::security::{SecurityGate, SecurityViolation};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fatal parse outcomes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// The parsed intent named a restricted resource or banned action
    #[error("{0}")]
    Security(#[from] SecurityViolation),

    /// Neither path produced an intent
    #[error("Failed to understand the query. Please try rephrasing.")]
    Unparseable { input: String },
}

impl ParseFailure {
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Security(violation) => violation.suggestion(),
            Self::Unparseable { .. } => {
                "Use clear commands like 'list pods', 'show logs for pod-name', or 'describe service-name'."
            }
        }
    }
}

/// Intent fields exactly as the model emitted them
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawIntent {
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub additional_flags: Option<Vec<String>>,
}

/// Result of reading an LLM response
#[derive(Debug, Clone, PartialEq)]
pub enum LlmParse {
    Parsed(RawIntent),
    Unparseable(String),
}

impl LlmParse {
    /// Extract and decode the first balanced JSON object in `response`
    pub fn from_response(response: &str) -> Self {
        let Some(json) = extract_json_object(response) else {
            return Self::Unparseable(response.to_string());
        };
        match serde_json::from_str::<RawIntent>(json) {
            Ok(raw) => Self::Parsed(raw),
            Err(e) => {
                debug!(error = %e, "LLM JSON did not match the intent shape");
                Self::Unparseable(response.to_string())
            }
        }
    }
}

/// Find the first balanced `{...}` substring, ignoring braces inside strings
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Converts prose into a validated [`Intent`]
pub struct IntentParser {
    llm: Arc<dyn LlmClient>,
    gate: SecurityGate,
    fallback: FallbackParser,
}

impl IntentParser {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            gate: SecurityGate::new(),
            fallback: FallbackParser::new(),
        }
    }

    /// Parse a query that already passed the security gate
    pub async fn parse(&self, query: &str) -> Result<Intent, ParseFailure> {
        let prompt = PromptTemplates::build_intent_prompt(query);

        let parsed = match self.llm.complete(&prompt).await {
            Ok(response) => LlmParse::from_response(&response),
            Err(e) => {
                warn!(error = %e, model = self.llm.model_name(), "LLM completion failed");
                LlmParse::Unparseable(String::new())
            }
        };

        let intent = match parsed {
            LlmParse::Parsed(raw) => {
                let intent = self.validate(raw)?;
                info!(intent = %intent.summary(), "LLM interpretation successful");
                intent
            }
            LlmParse::Unparseable(_) => {
                warn!("LLM output unusable, falling back to keyword parsing");
                let intent = self.fallback.parse(query);
                info!(intent = %intent.summary(), "Fallback interpretation");
                intent
            }
        };

        Ok(intent)
    }

    /// Fill defaults, re-run the security policy and normalise a raw intent
    pub fn validate(&self, raw: RawIntent) -> Result<Intent, ParseFailure> {
        let resource_type = non_empty(raw.resource_type).unwrap_or_else(|| "pods".to_string());
        let action = non_empty(raw.action).unwrap_or_else(|| "list".to_string());

        self.gate.check_parsed(&resource_type, &action)?;

        let action = Action::parse(&action).unwrap_or_else(|| {
            warn!(action = %action, "Unsupported action from LLM, defaulting to list");
            Action::List
        });

        Ok(Intent {
            resource_name: accept("resource_name", raw.resource_name, sanitize_name),
            namespace: accept("namespace", raw.namespace, sanitize_namespace),
            additional_flags: raw.additional_flags.unwrap_or_default(),
            ..Intent::new(normalize_resource_type(&resource_type), action)
        })
    }
}

/// Treat blanks and the literal "null" as absent
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Keep a name field only when it passes `check`; anything else is dropped
fn accept(field: &str, value: Option<String>, check: fn(&str) -> Option<String>) -> Option<String> {
    let value = non_empty(value)?;
    let checked = check(&value);
    if checked.is_none() {
        warn!(field, value = %value, "Dropping invalid name from LLM output");
    }
    checked
}
