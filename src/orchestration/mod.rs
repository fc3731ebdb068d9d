//! Query orchestration
//!
//! A query moves through a fixed sequence of stages:
//!
//! ```text
//! ┌──────────┐   ┌───────┐   ┌─────────┐   ┌─────────┐   ┌─────────┐   ┌────────┐
//! │ Security │──▶│ Parse │──▶│ Resolve │──▶│ Execute │──▶│ Enhance │──▶│ Format │
//! └──────────┘   └───────┘   └─────────┘   └─────────┘   └─────────┘   └────────┘
//!       │            │
//!       └────────────┴──────────▶ ErrorFormat
//! ```
//!
//! The stage graph lives in [`state`]; [`orchestrator`] runs it against
//! injected LLM and cluster collaborators.

pub mod orchestrator;
pub mod prompts;
pub mod state;

pub use orchestrator::{
    format_response, HealthStatus, QueryOrchestrator, QueryProcessor, QueryResponse, SERVICE_NAME,
};
pub use prompts::PromptTemplates;
pub use state::{next_stage, Stage, WorkflowState};
