//! Response enhancement
//!
//! Best-effort narration of raw cluster output. Any LLM failure yields a
//! fixed fallback that embeds the raw output, so this stage cannot fail a
//! query.

use crate::intent::Intent;
use crate::llm::LlmClient;
use crate::orchestration::prompts::PromptTemplates;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ResponseEnhancer {
    llm: Arc<dyn LlmClient>,
}

impl ResponseEnhancer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn enhance(&self, query: &str, intent: &Intent, raw_output: &str) -> String {
        let prompt = PromptTemplates::build_enhance_prompt(query, intent, raw_output);
        debug!(prompt_len = prompt.len(), "Requesting narration");

        match self.llm.complete(&prompt).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Narration was empty, returning raw output");
                fallback_text(raw_output)
            }
            Err(e) => {
                warn!(error = %e, "Narration unavailable, returning raw output");
                fallback_text(raw_output)
            }
        }
    }
}

/// Text used when no narration is available
pub fn fallback_text(raw_output: &str) -> String {
    format!("Here's the kubectl output for your query:\n\n{}", raw_output)
}
