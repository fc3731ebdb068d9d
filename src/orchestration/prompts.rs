//! Prompt templates for the query pipeline
//!
//! Two prompts: one that turns a question into an intent JSON object, and
//! one that narrates raw cluster output for a human reader.

use crate::intent::fallback::KNOWN_NAMESPACES;
use crate::intent::Intent;

/// Instructions for intent extraction
pub const INTENT_SYSTEM_PROMPT: &str = r#"You translate questions about a Kubernetes cluster into a single read-only query.

RULES:
1. Respond with EXACTLY ONE JSON object and nothing else
2. resource_type must be one of: pods, services, deployments, configmaps, ingress, nodes, namespaces, persistentvolumes, persistentvolumeclaims
3. action must be one of: list, get, describe, logs
4. "X in Y namespace" and "X in Y" mean Y is the NAMESPACE, never the resource_name
5. A known namespace name ({namespaces}) is always a namespace, never a resource_name
6. resource_name is null unless one specific object is mentioned
7. namespace is null unless the user names one
8. additional_flags holds extra kubectl output flags such as "-o", "wide"; usually empty

RESPONSE FORMAT (strict JSON):
{
  "resource_type": "pods",
  "action": "list",
  "resource_name": null,
  "namespace": null,
  "additional_flags": []
}

EXAMPLES:
- "list all pods" -> {"resource_type": "pods", "action": "list", "resource_name": null, "namespace": null, "additional_flags": []}
- "pods in kube-system" -> {"resource_type": "pods", "action": "list", "resource_name": null, "namespace": "kube-system", "additional_flags": []}
- "show me pods in kube-system namespace" -> {"resource_type": "pods", "action": "list", "resource_name": null, "namespace": "kube-system", "additional_flags": []}
- "show logs for backend pod" -> {"resource_type": "pods", "action": "logs", "resource_name": "backend", "namespace": null, "additional_flags": []}
- "describe coredns pod in kube-system" -> {"resource_type": "pods", "action": "describe", "resource_name": "coredns", "namespace": "kube-system", "additional_flags": []}
- "show the logs for this pod - backend-deployment-f8dbcddb8-knvlc" -> {"resource_type": "pods", "action": "logs", "resource_name": "backend-deployment-f8dbcddb8-knvlc", "namespace": null, "additional_flags": []}
"#;

/// Instructions for narrating command output
pub const ENHANCE_SYSTEM_PROMPT: &str = r#"You are a Kubernetes expert assistant explaining command output to an operator.

Provide a clear, human-friendly explanation that includes:
1. A summary of what was found
2. Observations about status and health
3. Potential issues or concerns, if any
4. Suggested next steps

Keep the response concise but informative."#;

/// Prompt template container
pub struct PromptTemplates;

impl PromptTemplates {
    /// Build the intent extraction prompt for a query
    pub fn build_intent_prompt(query: &str) -> String {
        let system = INTENT_SYSTEM_PROMPT.replace("{namespaces}", &KNOWN_NAMESPACES.join(", "));
        format!(
            "{}\n## QUERY\n\"{}\"\n\n## YOUR ANSWER\nRespond with the JSON object only.",
            system,
            query.trim()
        )
    }

    /// Build the enhancement prompt for a finished query
    pub fn build_enhance_prompt(query: &str, intent: &Intent, raw_output: &str) -> String {
        format!(
            "{}\n\n## USER QUESTION\n\"{}\"\n\n## INTERPRETED AS\n{}\n\n## OUTPUT\n```\n{}\n```",
            ENHANCE_SYSTEM_PROMPT,
            query.trim(),
            intent.summary(),
            raw_output
        )
    }
}
