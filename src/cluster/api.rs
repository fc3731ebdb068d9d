//! Kubernetes REST API backend
//!
//! Talks to the API server directly with `reqwest`, decoding list responses
//! into the typed model in [`super::objects`]. Describe returns the full
//! object (minus `managedFields`) for the executor to render as YAML.

use super::objects::{
    Deployment, GenericObject, Namespace, Node, ObjectList, Pod, Service,
};
use super::{checked_name, checked_namespace, ClusterBackend, ClusterError, ClusterOutput};
use crate::config::ClusterConfig;
use crate::intent::ResourceType;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Typed API client backend
pub struct ApiBackend {
    client: reqwest::Client,
    server: Url,
    token: Option<String>,
    default_namespace: String,
}

impl ApiBackend {
    /// Build a client from cluster settings.
    ///
    /// Falls back to the pod's service-account token and CA when running
    /// in-cluster and nothing explicit is configured.
    pub fn new(config: &ClusterConfig) -> Result<Self, ClusterError> {
        let server = config.resolved_api_server().ok_or_else(|| {
            ClusterError::Unavailable(
                "No API server configured and not running inside a cluster".to_string(),
            )
        })?;
        let server = Url::parse(&server).map_err(|e| {
            ClusterError::Unavailable(format!("Invalid API server URL {}: {}", server, e))
        })?;
        if server.cannot_be_a_base() {
            return Err(ClusterError::Unavailable(format!(
                "Invalid API server URL {}",
                server
            )));
        }

        let token = match (&config.token, &config.token_file) {
            (Some(token), _) => Some(token.trim().to_string()),
            (None, Some(path)) => Some(read_trimmed(path)?),
            (None, None) if Path::new(SERVICE_ACCOUNT_TOKEN).exists() => {
                Some(read_trimmed(SERVICE_ACCOUNT_TOKEN)?)
            }
            (None, None) => None,
        };

        let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);

        let ca_path = config
            .ca_cert
            .clone()
            .or_else(|| Path::new(SERVICE_ACCOUNT_CA).exists().then(|| SERVICE_ACCOUNT_CA.to_string()));
        if let Some(ca_path) = ca_path {
            let pem = std::fs::read(&ca_path).map_err(|e| {
                ClusterError::Unavailable(format!("Failed to read CA cert {}: {}", ca_path, e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                ClusterError::Unavailable(format!("Failed to parse CA cert {}: {}", ca_path, e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if config.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            ClusterError::Unavailable(format!("Failed to build API client: {}", e))
        })?;

        Ok(Self {
            client,
            server,
            token,
            default_namespace: config.default_namespace.clone(),
        })
    }

    /// Server URL extended by `segments`, each percent-encoded as one path segment
    fn url(&self, segments: &[&str]) -> Result<Url, ClusterError> {
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || **s == "." || **s == "..")
        {
            return Err(ClusterError::InvalidArgument(format!(
                "Invalid path segment '{}'",
                bad
            )));
        }
        let mut url = self.server.clone();
        url.path_segments_mut()
            .map_err(|_| ClusterError::Unavailable(format!("Invalid API server URL {}", self.server)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn collection_segments<'a>(
        &'a self,
        resource_type: ResourceType,
        namespace: Option<&'a str>,
    ) -> Result<Vec<&'a str>, ClusterError> {
        let mut segments: Vec<&'a str> = api_prefix(resource_type).to_vec();
        if let Some(ns) = checked_namespace(resource_type, namespace, &self.default_namespace)? {
            segments.extend(["namespaces", ns]);
        }
        segments.push(api_plural(resource_type));
        Ok(segments)
    }

    fn collection_url(&self, resource_type: ResourceType, namespace: Option<&str>) -> Result<Url, ClusterError> {
        self.url(&self.collection_segments(resource_type, namespace)?)
    }

    /// URL of one object, optionally a subresource of it
    fn object_url(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
        name: &str,
        subresource: Option<&str>,
    ) -> Result<Url, ClusterError> {
        let mut segments = self.collection_segments(resource_type, namespace)?;
        segments.push(checked_name(name)?);
        segments.extend(subresource);
        self.url(&segments)
    }

    fn request(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClusterError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(status = %status, error = %e, "Failed to read API error response");
                format!("unreadable response body: {}", e)
            }
        };
        Err(status_error(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClusterError> {
        debug!(path = %url.path(), "API request");
        let response = self.send(self.request(url)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClusterError::Backend(format!("Failed to decode API response: {}", e)))
    }

    fn transport_error(&self, error: reqwest::Error) -> ClusterError {
        if error.is_timeout() {
            ClusterError::Timeout
        } else if error.is_connect() {
            ClusterError::Unavailable(format!("Cannot reach API server {}: {}", self.server, error))
        } else {
            ClusterError::Backend(format!("API request failed: {}", error))
        }
    }

    async fn list_output(&self, resource_type: ResourceType, url: Url) -> Result<ClusterOutput, ClusterError> {
        let output = match resource_type {
            ResourceType::Pods => ClusterOutput::Pods(self.get_json::<ObjectList<Pod>>(url).await?.items),
            ResourceType::Services => {
                ClusterOutput::Services(self.get_json::<ObjectList<Service>>(url).await?.items)
            }
            ResourceType::Deployments => {
                ClusterOutput::Deployments(self.get_json::<ObjectList<Deployment>>(url).await?.items)
            }
            ResourceType::Nodes => ClusterOutput::Nodes(self.get_json::<ObjectList<Node>>(url).await?.items),
            ResourceType::Namespaces => {
                ClusterOutput::Namespaces(self.get_json::<ObjectList<Namespace>>(url).await?.items)
            }
            _ => ClusterOutput::Objects(self.get_json::<ObjectList<GenericObject>>(url).await?.items),
        };
        Ok(output)
    }

    async fn single_output(&self, resource_type: ResourceType, url: Url) -> Result<ClusterOutput, ClusterError> {
        let output = match resource_type {
            ResourceType::Pods => ClusterOutput::Pods(vec![self.get_json(url).await?]),
            ResourceType::Services => ClusterOutput::Services(vec![self.get_json(url).await?]),
            ResourceType::Deployments => ClusterOutput::Deployments(vec![self.get_json(url).await?]),
            ResourceType::Nodes => ClusterOutput::Nodes(vec![self.get_json(url).await?]),
            ResourceType::Namespaces => ClusterOutput::Namespaces(vec![self.get_json(url).await?]),
            _ => ClusterOutput::Objects(vec![self.get_json(url).await?]),
        };
        Ok(output)
    }
}

#[async_trait]
impl ClusterBackend for ApiBackend {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn list_names(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
    ) -> Result<Vec<String>, ClusterError> {
        let url = self.collection_url(resource_type, namespace)?;
        let list: ObjectList<GenericObject> = self.get_json(url).await?;
        Ok(list.items.into_iter().map(|o| o.metadata.name).collect())
    }

    async fn get(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
        name: Option<&str>,
        flags: &[String],
    ) -> Result<ClusterOutput, ClusterError> {
        if !flags.is_empty() {
            debug!(flags = ?flags, "API backend ignores output flags");
        }
        match name {
            Some(name) => {
                let url = self.object_url(resource_type, namespace, name, None)?;
                self.single_output(resource_type, url).await
            }
            None => {
                let url = self.collection_url(resource_type, namespace)?;
                self.list_output(resource_type, url).await
            }
        }
    }

    async fn describe(
        &self,
        resource_type: ResourceType,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<ClusterOutput, ClusterError> {
        let url = self.object_url(resource_type, namespace, name, None)?;
        let mut object: serde_json::Value = self.get_json(url).await?;
        if let Some(metadata) = object.get_mut("metadata").and_then(|m| m.as_object_mut()) {
            metadata.remove("managedFields");
        }
        Ok(ClusterOutput::Object(object))
    }

    async fn logs(
        &self,
        pod: &str,
        namespace: Option<&str>,
        tail_lines: usize,
        flags: &[String],
    ) -> Result<String, ClusterError> {
        if !flags.is_empty() {
            debug!(flags = ?flags, "API backend ignores log flags");
        }
        let url = self.object_url(ResourceType::Pods, namespace, pod, Some("log"))?;
        let request = self
            .request(url)
            .query(&[("tailLines", tail_lines.to_string())]);
        let response = self.send(request).await?;
        response
            .text()
            .await
            .map_err(|e| ClusterError::Backend(format!("Failed to read logs: {}", e)))
    }

    async fn ping(&self) -> Result<(), ClusterError> {
        let url = self.url(&["version"])?;
        self.get_json::<serde_json::Value>(url).await.map(|_| ())
    }
}

fn read_trimmed(path: &str) -> Result<String, ClusterError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| ClusterError::Unavailable(format!("Failed to read token file {}: {}", path, e)))
}

fn api_prefix(resource_type: ResourceType) -> &'static [&'static str] {
    match resource_type {
        ResourceType::Deployments => &["apis", "apps", "v1"],
        ResourceType::Ingress => &["apis", "networking.k8s.io", "v1"],
        _ => &["api", "v1"],
    }
}

fn api_plural(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::Ingress => "ingresses",
        other => other.as_str(),
    }
}

/// Map a non-success HTTP status onto a backend error
fn status_error(status: StatusCode, body: &str) -> ClusterError {
    // The API server answers with a `Status` object carrying a message
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::NOT_FOUND => ClusterError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClusterError::PermissionDenied(message),
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => ClusterError::Timeout,
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => ClusterError::Unavailable(message),
        other => ClusterError::Backend(format!("HTTP {}: {}", other, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn backend(server: &str) -> ApiBackend {
        ApiBackend::new(&ClusterConfig {
            api_server: Some(server.to_string()),
            token: Some("t0ken".to_string()),
            ..ClusterConfig::default()
        })
        .unwrap()
    }

    /// Serve one raw HTTP response; returns the base URL and the raw request
    async fn serve_raw(response: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });
        (format!("http://{}", addr), handle)
    }

    /// Serve one canned JSON response
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        serve_raw(format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        ))
        .await
    }

    fn path(url: Result<Url, ClusterError>) -> String {
        url.unwrap().path().to_string()
    }

    #[test]
    fn test_paths() {
        let b = backend("https://k8s.local:6443");
        assert_eq!(
            path(b.collection_url(ResourceType::Pods, None)),
            "/api/v1/namespaces/default/pods"
        );
        assert_eq!(
            path(b.collection_url(ResourceType::Deployments, Some("web"))),
            "/apis/apps/v1/namespaces/web/deployments"
        );
        assert_eq!(
            path(b.collection_url(ResourceType::Ingress, Some("web"))),
            "/apis/networking.k8s.io/v1/namespaces/web/ingresses"
        );
        assert_eq!(
            path(b.object_url(ResourceType::Nodes, Some("web"), "node-1", None)),
            "/api/v1/nodes/node-1"
        );
        assert_eq!(
            path(b.collection_url(ResourceType::PersistentVolumes, Some("x"))),
            "/api/v1/persistentvolumes"
        );
        assert_eq!(
            path(b.object_url(ResourceType::Pods, None, "web-1", Some("log"))),
            "/api/v1/namespaces/default/pods/web-1/log"
        );
    }

    #[test]
    fn test_server_path_prefix_is_kept() {
        let b = backend("https://gateway.local/clusters/prod/");
        assert_eq!(
            path(b.collection_url(ResourceType::Pods, Some("web"))),
            "/clusters/prod/api/v1/namespaces/web/pods"
        );
    }

    #[test]
    fn test_segments_are_encoded() {
        let b = backend("https://k8s.local:6443");
        assert_eq!(
            path(b.url(&["api", "v1", "pods", "x/%73ecrets"])),
            "/api/v1/pods/x%2F%2573ecrets"
        );
        for bad in ["..", ".", ""] {
            assert!(matches!(
                b.url(&["api", "v1", bad, "secrets"]),
                Err(ClusterError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_hostile_names_are_rejected() {
        let b = backend("https://k8s.local:6443");
        for name in ["x/../../%73ecrets", "..", "../secrets", "-n"] {
            assert!(matches!(
                b.object_url(ResourceType::Pods, None, name, None),
                Err(ClusterError::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            b.collection_url(ResourceType::Pods, Some("default/../../secrets")),
            Err(ClusterError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_hostile_name_sends_nothing() {
        // Nothing listens on this port; a sent request would fail as Unavailable
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let b = backend(&format!("http://{}", addr));
        let result = b.describe(ResourceType::Pods, None, "x/../../%73ecrets").await;
        assert!(matches!(result, Err(ClusterError::InvalidArgument(_))));
        let result = b.logs("x/../../%73ecrets", None, 100, &[]).await;
        assert!(matches!(result, Err(ClusterError::InvalidArgument(_))));
    }

    #[test]
    fn test_invalid_server_url_is_unavailable() {
        let result = ApiBackend::new(&ClusterConfig {
            api_server: Some("not a url".to_string()),
            ..ClusterConfig::default()
        });
        assert!(matches!(result, Err(ClusterError::Unavailable(_))));
    }

    #[test]
    fn test_status_mapping() {
        let body = r#"{"kind":"Status","message":"pods \"x\" not found","code":404}"#;
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, body),
            ClusterError::NotFound("pods \"x\" not found".to_string())
        );
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "denied"),
            ClusterError::PermissionDenied(_)
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ClusterError::Backend(_)
        ));
    }

    #[test]
    fn test_missing_token_file_is_unavailable() {
        let result = ApiBackend::new(&ClusterConfig {
            api_server: Some("https://k8s.local".to_string()),
            token_file: Some("/nonexistent/token".to_string()),
            ..ClusterConfig::default()
        });
        assert!(matches!(result, Err(ClusterError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_list_names_over_http() {
        let (url, request) = serve_once(
            "200 OK",
            r#"{"kind":"PodList","items":[{"metadata":{"name":"web-1"}},{"metadata":{"name":"web-2"}}]}"#,
        )
        .await;

        let names = backend(&url)
            .list_names(ResourceType::Pods, Some("prod"))
            .await
            .unwrap();
        assert_eq!(names, vec!["web-1".to_string(), "web-2".to_string()]);

        let request = request.await.unwrap();
        assert!(request.starts_with("GET /api/v1/namespaces/prod/pods "));
        assert!(request.to_lowercase().contains("authorization: bearer t0ken"));
    }

    #[tokio::test]
    async fn test_not_found_over_http() {
        let (url, _request) = serve_once(
            "404 Not Found",
            r#"{"kind":"Status","message":"pods \"ghost\" not found"}"#,
        )
        .await;

        let result = backend(&url)
            .describe(ResourceType::Pods, None, "ghost")
            .await;
        assert!(matches!(result, Err(ClusterError::NotFound(m)) if m.contains("ghost")));
    }

    #[tokio::test]
    async fn test_truncated_error_body_keeps_status() {
        // Content-Length promises more than is sent before the connection closes
        let (url, _request) = serve_raw(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 100\r\nConnection: close\r\n\r\n{\"kind\""
                .to_string(),
        )
        .await;

        let result = backend(&url).describe(ResourceType::Pods, None, "ghost").await;
        assert!(matches!(result, Err(ClusterError::NotFound(m)) if m.contains("unreadable")));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = backend(&format!("http://{}", addr)).ping().await;
        assert!(matches!(result, Err(ClusterError::Unavailable(_))));
    }
}
