//! Query intent model and parsing
//!
//! - [`types`]: the `Intent` data model and resource/action enums
//! - [`parser`]: LLM-backed parsing with validation
//! - [`fallback`]: deterministic keyword parser
//! - [`names`]: object name and namespace checks

pub mod fallback;
pub mod names;
pub mod parser;
pub mod types;

pub use fallback::FallbackParser;
pub use names::{is_valid_namespace, is_valid_object_name, sanitize_name, sanitize_namespace};
pub use parser::{IntentParser, LlmParse, ParseFailure, RawIntent};
pub use types::{normalize_resource_type, Action, Intent, ResourceType};
