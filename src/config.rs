use crate::intent::is_valid_namespace;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable set inside a pod; enables in-cluster API access
pub const IN_CLUSTER_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";
pub const IN_CLUSTER_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    pub log_level: String,
    pub llm: LlmConfig,
    pub cluster: ClusterConfig,
    pub pipeline: PipelineConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            llm: LlmConfig::default(),
            cluster: ClusterConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Wire protocol spoken by the completion endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LlmProvider::Ollama,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            api_key: None,
            timeout_secs: 60,
            temperature: 0.1,
        }
    }
}

/// Which cluster backend executes queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Kubectl,
    Api,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kubectl" | "cli" => Ok(Self::Kubectl),
            "api" => Ok(Self::Api),
            other => bail!("Unknown backend '{}', expected 'kubectl' or 'api'", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub backend: BackendKind,
    pub kubectl_path: String,
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
    pub api_server: Option<String>,
    pub token: Option<String>,
    pub token_file: Option<String>,
    pub ca_cert: Option<String>,
    pub insecure_skip_tls_verify: bool,
    /// Namespace used when the user does not name one
    pub default_namespace: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Kubectl,
            kubectl_path: "kubectl".to_string(),
            kubeconfig: None,
            context: None,
            api_server: None,
            token: None,
            token_file: None,
            ca_cert: None,
            insecure_skip_tls_verify: false,
            default_namespace: "default".to_string(),
        }
    }
}

impl ClusterConfig {
    /// API server URL: explicit setting, else the in-cluster service address
    pub fn resolved_api_server(&self) -> Option<String> {
        if let Some(server) = &self.api_server {
            return Some(server.trim_end_matches('/').to_string());
        }
        let host = std::env::var(IN_CLUSTER_HOST_ENV).ok()?;
        let port = std::env::var(IN_CLUSTER_PORT_ENV).unwrap_or_else(|_| "443".to_string());
        Some(format!("https://{}:{}", host, port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub resolve_timeout_secs: u64,
    pub execute_timeout_secs: u64,
    pub log_tail_lines: usize,
    pub max_other_matches: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resolve_timeout_secs: 10,
            execute_timeout_secs: 30,
            log_tail_lines: 100,
            max_other_matches: 4,
        }
    }
}

impl AssistantConfig {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config: AssistantConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.resolve_timeout_secs == 0 {
            bail!("pipeline.resolve_timeout_secs must be greater than 0");
        }
        if self.pipeline.execute_timeout_secs == 0 {
            bail!("pipeline.execute_timeout_secs must be greater than 0");
        }
        if self.pipeline.log_tail_lines == 0 {
            bail!("pipeline.log_tail_lines must be greater than 0");
        }

        if self.llm.enabled {
            if self.llm.endpoint.trim().is_empty() {
                bail!("llm.endpoint must be set when the LLM is enabled");
            }
            if self.llm.model.trim().is_empty() {
                bail!("llm.model must be set when the LLM is enabled");
            }
            if self.llm.timeout_secs == 0 {
                bail!("llm.timeout_secs must be greater than 0");
            }
        }

        match self.cluster.backend {
            BackendKind::Kubectl => {
                if self.cluster.kubectl_path.trim().is_empty() {
                    bail!("cluster.kubectl_path must not be empty");
                }
            }
            BackendKind::Api => {
                if self.cluster.resolved_api_server().is_none() {
                    bail!(
                        "cluster.api_server is not set and {} is not in the environment",
                        IN_CLUSTER_HOST_ENV
                    );
                }
            }
        }

        if self.cluster.default_namespace.trim().is_empty() {
            bail!("cluster.default_namespace must not be empty");
        }
        if !is_valid_namespace(&self.cluster.default_namespace) {
            bail!(
                "cluster.default_namespace '{}' is not a valid namespace name",
                self.cluster.default_namespace
            );
        }

        Ok(())
    }
}
