//! kubectl subprocess backend

use super::{checked_name, checked_namespace, ClusterBackend, ClusterError, ClusterOutput};
use crate::config::ClusterConfig;
use crate::intent::ResourceType;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Flags that take a value, in short and long spelling
const VALUE_FLAGS: [&str; 10] = [
    "-o",
    "--output",
    "-l",
    "--selector",
    "--sort-by",
    "--field-selector",
    "-L",
    "--label-columns",
    "-c",
    "--container",
];

/// Boolean flags
const SWITCH_FLAGS: [&str; 6] = [
    "-A",
    "--all-namespaces",
    "--show-labels",
    "--no-headers",
    "--previous",
    "--timestamps",
];

/// Flags that only make sense for `kubectl logs`
const LOG_ONLY_FLAGS: [&str; 4] = ["-c", "--container", "--previous", "--timestamps"];

/// Runs kubectl as a child process per call
pub struct KubectlBackend {
    config: ClusterConfig,
}

impl KubectlBackend {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    fn namespace_args(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
    ) -> Result<Vec<String>, ClusterError> {
        let scoped = checked_namespace(resource_type, namespace, &self.config.default_namespace)?;
        Ok(match scoped {
            Some(ns) => vec!["-n".to_string(), ns.to_string()],
            None => Vec::new(),
        })
    }

    pub fn list_names_args(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
    ) -> Result<Vec<String>, ClusterError> {
        let mut args = vec![
            "get".to_string(),
            resource_type.as_str().to_string(),
            "-o".to_string(),
            "name".to_string(),
        ];
        args.extend(self.namespace_args(resource_type, namespace)?);
        Ok(args)
    }

    pub fn get_args(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
        name: Option<&str>,
        flags: &[String],
    ) -> Result<Vec<String>, ClusterError> {
        let mut args = vec!["get".to_string(), resource_type.as_str().to_string()];
        args.extend(self.namespace_args(resource_type, namespace)?);
        args.extend(allowed_flags(flags, false));
        if let Some(name) = name {
            // Names go after "--" so kubectl never reads them as flags
            args.push("--".to_string());
            args.push(checked_name(name)?.to_string());
        }
        Ok(args)
    }

    pub fn describe_args(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Vec<String>, ClusterError> {
        let mut args = vec!["describe".to_string(), resource_type.as_str().to_string()];
        args.extend(self.namespace_args(resource_type, namespace)?);
        args.push("--".to_string());
        args.push(checked_name(name)?.to_string());
        Ok(args)
    }

    pub fn logs_args(
        &self,
        pod: &str,
        namespace: Option<&str>,
        tail_lines: usize,
        flags: &[String],
    ) -> Result<Vec<String>, ClusterError> {
        let mut args = vec!["logs".to_string()];
        args.extend(self.namespace_args(ResourceType::Pods, namespace)?);
        args.push(format!("--tail={}", tail_lines));
        args.extend(allowed_flags(flags, true));
        args.push("--".to_string());
        args.push(checked_name(pod)?.to_string());
        Ok(args)
    }

    /// Spawn kubectl and return trimmed stdout
    async fn run(&self, args: Vec<String>) -> Result<String, ClusterError> {
        let mut command = Command::new(&self.config.kubectl_path);
        if let Some(kubeconfig) = &self.config.kubeconfig {
            command.arg("--kubeconfig").arg(kubeconfig);
        }
        if let Some(context) = &self.config.context {
            command.arg("--context").arg(context);
        }
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Abandoned calls (timeout, cancellation) must not leave kubectl running
            .kill_on_drop(true);

        debug!(program = %self.config.kubectl_path, args = ?args, "Executing kubectl");

        let output = command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClusterError::Unavailable(
                    "kubectl command not found. Please ensure kubectl is installed and in PATH"
                        .to_string(),
                )
            } else {
                ClusterError::Backend(format!("Failed to run kubectl: {}", e))
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = ?output.status.code(), stderr = %stderr.trim(), "kubectl failed");
            return Err(classify_stderr(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl ClusterBackend for KubectlBackend {
    fn name(&self) -> &'static str {
        "kubectl"
    }

    async fn list_names(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
    ) -> Result<Vec<String>, ClusterError> {
        let stdout = self.run(self.list_names_args(resource_type, namespace)?).await?;
        // `-o name` prints `kind/name` per line
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.rsplit('/').next().unwrap_or(line).to_string())
            .collect())
    }

    async fn get(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
        name: Option<&str>,
        flags: &[String],
    ) -> Result<ClusterOutput, ClusterError> {
        let args = self.get_args(resource_type, namespace, name, flags)?;
        self.run(args).await.map(ClusterOutput::Text)
    }

    async fn describe(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ClusterOutput, ClusterError> {
        let args = self.describe_args(resource_type, namespace, name)?;
        self.run(args).await.map(ClusterOutput::Text)
    }

    async fn logs(
        &self,
        pod: &str,
        namespace: Option<&str>,
        tail_lines: usize,
        flags: &[String],
    ) -> Result<String, ClusterError> {
        self.run(self.logs_args(pod, namespace, tail_lines, flags)?).await
    }
}

/// Keep only read-only flags, with their values.
///
/// `for_logs` selects the flags meant for `kubectl logs` rather than
/// `kubectl get`.
pub fn allowed_flags(flags: &[String], for_logs: bool) -> Vec<String> {
    let mut kept = Vec::new();
    let mut iter = flags.iter().peekable();

    while let Some(flag) = iter.next() {
        let flag = flag.trim();
        let name = flag.split('=').next().unwrap_or(flag);

        let group = if SWITCH_FLAGS.contains(&name) {
            vec![flag.to_string()]
        } else if VALUE_FLAGS.contains(&name) {
            if flag.contains('=') {
                vec![flag.to_string()]
            } else if let Some(value) = iter.next_if(|v| !v.starts_with('-')) {
                vec![flag.to_string(), value.trim().to_string()]
            } else {
                warn!(flag = %flag, "Dropping flag without a value");
                continue;
            }
        } else {
            warn!(flag = %flag, "Dropping flag outside the read-only allowlist");
            continue;
        };

        if LOG_ONLY_FLAGS.contains(&name) == for_logs {
            kept.extend(group);
        }
    }

    kept
}

/// Map kubectl's stderr onto a backend error
fn classify_stderr(stderr: &str) -> ClusterError {
    let message = stderr.trim();
    if message.is_empty() {
        return ClusterError::Backend("kubectl error: Unknown kubectl error".to_string());
    }
    let lower = message.to_lowercase();
    let message = format!("kubectl error: {}", message);

    if lower.contains("notfound") || lower.contains("not found") {
        ClusterError::NotFound(message)
    } else if lower.contains("forbidden") || lower.contains("unauthorized") {
        ClusterError::PermissionDenied(message)
    } else if lower.contains("unable to connect")
        || lower.contains("connection refused")
        || lower.contains("no such host")
    {
        ClusterError::Unavailable(message)
    } else {
        ClusterError::Backend(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> KubectlBackend {
        KubectlBackend::new(ClusterConfig::default())
    }

    fn flags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_get_args_default_namespace() {
        let args = backend().get_args(ResourceType::Pods, None, None, &[]).unwrap();
        assert_eq!(args, flags(&["get", "pods", "-n", "default"]));
    }

    #[test]
    fn test_cluster_scoped_kind_drops_namespace() {
        let args = backend()
            .get_args(ResourceType::Nodes, Some("kube-system"), None, &[])
            .unwrap();
        assert_eq!(args, flags(&["get", "nodes"]));
    }

    #[test]
    fn test_describe_and_logs_args() {
        let b = backend();
        assert_eq!(
            b.describe_args(ResourceType::Services, Some("web"), "api").unwrap(),
            flags(&["describe", "services", "-n", "web", "--", "api"])
        );
        assert_eq!(
            b.logs_args("backend-1", None, 100, &flags(&["--previous", "-o", "wide"]))
                .unwrap(),
            flags(&["logs", "-n", "default", "--tail=100", "--previous", "--", "backend-1"])
        );
        assert_eq!(
            b.get_args(ResourceType::Deployments, Some("web"), Some("api"), &flags(&["-o", "wide"]))
                .unwrap(),
            flags(&["get", "deployments", "-n", "web", "-o", "wide", "--", "api"])
        );
    }

    #[test]
    fn test_flag_like_names_are_rejected() {
        let b = backend();
        for name in ["--server=http://evil.example", "-n", "--kubeconfig=/tmp/x", "a/../b"] {
            assert!(matches!(
                b.describe_args(ResourceType::Pods, None, name),
                Err(ClusterError::InvalidArgument(_))
            ));
            assert!(matches!(
                b.logs_args(name, None, 100, &[]),
                Err(ClusterError::InvalidArgument(_))
            ));
            assert!(matches!(
                b.get_args(ResourceType::Pods, None, Some(name), &[]),
                Err(ClusterError::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            b.list_names_args(ResourceType::Pods, Some("--all-namespaces")),
            Err(ClusterError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_name_spawns_nothing() {
        // A missing binary would report Unavailable if a spawn were attempted
        let backend = KubectlBackend::new(ClusterConfig {
            kubectl_path: "/nonexistent/kubectl".to_string(),
            ..ClusterConfig::default()
        });
        let result = backend
            .logs("--server=http://evil.example", None, 100, &[])
            .await;
        assert!(matches!(result, Err(ClusterError::InvalidArgument(_))));
    }

    #[test]
    fn test_flag_allowlist() {
        let kept = allowed_flags(
            &flags(&[
                "-o", "wide", "--show-labels", "--force", "-l", "app=web", "--output=yaml",
                "--grace-period=0",
            ]),
            false,
        );
        assert_eq!(
            kept,
            flags(&["-o", "wide", "--show-labels", "-l", "app=web", "--output=yaml"])
        );
    }

    #[test]
    fn test_value_flag_without_value_is_dropped() {
        assert!(allowed_flags(&flags(&["-o"]), false).is_empty());
        assert_eq!(allowed_flags(&flags(&["-l", "-A"]), false), flags(&["-A"]));
    }

    #[test]
    fn test_get_excludes_log_only_flags() {
        let args = backend()
            .get_args(
                ResourceType::Pods,
                Some("prod"),
                None,
                &flags(&["--previous", "-c", "app", "-o", "wide"]),
            )
            .unwrap();
        assert_eq!(args, flags(&["get", "pods", "-n", "prod", "-o", "wide"]));

        let args = backend()
            .logs_args("web-1", None, 50, &flags(&["-c", "app", "-o", "wide"]))
            .unwrap();
        assert_eq!(
            args,
            flags(&["logs", "-n", "default", "--tail=50", "-c", "app", "--", "web-1"])
        );
    }

    #[test]
    fn test_classify_stderr() {
        assert!(matches!(
            classify_stderr("Error from server (NotFound): pods \"x\" not found"),
            ClusterError::NotFound(_)
        ));
        assert!(matches!(
            classify_stderr("Error from server (Forbidden): pods is forbidden"),
            ClusterError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_stderr("Unable to connect to the server: dial tcp"),
            ClusterError::Unavailable(_)
        ));
        assert!(matches!(classify_stderr(""), ClusterError::Backend(_)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let backend = KubectlBackend::new(ClusterConfig {
            kubectl_path: "/nonexistent/kubectl".to_string(),
            ..ClusterConfig::default()
        });
        let result = backend.list_names(ResourceType::Pods, None).await;
        assert!(matches!(result, Err(ClusterError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_configured_binary() {
        // echo stands in for kubectl and prints the arguments it received
        let backend = KubectlBackend::new(ClusterConfig {
            kubectl_path: "echo".to_string(),
            ..ClusterConfig::default()
        });
        let output = backend
            .get(ResourceType::Deployments, Some("web"), Some("api"), &[])
            .await
            .unwrap();
        assert_eq!(
            output,
            ClusterOutput::Text("get deployments -n web -- api".to_string())
        );

        let names = backend.list_names(ResourceType::Pods, None).await.unwrap();
        assert_eq!(names, vec!["get pods -o name -n default".to_string()]);
    }
}
