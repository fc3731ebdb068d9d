//! Text rendering of typed cluster objects

use crate::cluster::objects::{Deployment, GenericObject, Namespace, Node, Pod, Service};
use crate::cluster::ClusterOutput;
use chrono::{DateTime, Utc};

const NONE: &str = "<none>";
const ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";

/// Compact age of an object, kubectl style
pub fn format_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created) = created else {
        return "Unknown".to_string();
    };
    let elapsed = now.signed_duration_since(created);
    let days = elapsed.num_days();
    let seconds = elapsed.num_seconds();

    if days > 0 {
        format!("{}d", days)
    } else if seconds > 3600 {
        format!("{}h", seconds / 3600)
    } else if seconds > 60 {
        format!("{}m", seconds / 60)
    } else {
        format!("{}s", seconds.max(0))
    }
}

/// Render any backend output as text
pub fn render(output: &ClusterOutput, now: DateTime<Utc>) -> String {
    match output {
        ClusterOutput::Text(text) => text.clone(),
        ClusterOutput::Pods(pods) => pod_table(pods, now),
        ClusterOutput::Services(services) => service_table(services, now),
        ClusterOutput::Deployments(deployments) => deployment_table(deployments, now),
        ClusterOutput::Nodes(nodes) => node_table(nodes, now),
        ClusterOutput::Namespaces(namespaces) => namespace_table(namespaces, now),
        ClusterOutput::Objects(objects) => generic_table(objects, now),
        ClusterOutput::Object(object) => serde_yaml::to_string(object)
            .unwrap_or_else(|_| serde_json::to_string_pretty(object).unwrap_or_default()),
    }
}

pub fn pod_table(pods: &[Pod], now: DateTime<Utc>) -> String {
    let rows = pods
        .iter()
        .map(|pod| {
            let statuses = &pod.status.container_statuses;
            let ready = statuses.iter().filter(|c| c.ready).count();
            let total = pod.spec.containers.len().max(statuses.len());
            let restarts: i64 = statuses.iter().map(|c| c.restart_count).sum();
            vec![
                pod.metadata.name.clone(),
                format!("{}/{}", ready, total),
                pod.status.phase.clone().unwrap_or_else(|| "Unknown".to_string()),
                restarts.to_string(),
                format_age(pod.metadata.creation_timestamp, now),
            ]
        })
        .collect();
    table(&["NAME", "READY", "STATUS", "RESTARTS", "AGE"], rows)
}

pub fn service_table(services: &[Service], now: DateTime<Utc>) -> String {
    let rows = services
        .iter()
        .map(|svc| {
            // Hostname-only load balancers show the hostname, as kubectl does
            let external_ip = svc
                .status
                .load_balancer
                .ingress
                .first()
                .and_then(|i| i.ip.clone().or_else(|| i.hostname.clone()))
                .unwrap_or_else(|| NONE.to_string());
            let ports = svc
                .spec
                .ports
                .iter()
                .map(|p| {
                    let target = p
                        .target_port
                        .as_ref()
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| p.port.to_string());
                    let protocol = p.protocol.as_deref().unwrap_or("TCP");
                    format!("{}:{}/{}", p.port, target, protocol)
                })
                .collect::<Vec<_>>();
            vec![
                svc.metadata.name.clone(),
                svc.spec.type_.clone().unwrap_or_else(|| "ClusterIP".to_string()),
                svc.spec.cluster_ip.clone().unwrap_or_else(|| NONE.to_string()),
                external_ip,
                if ports.is_empty() { NONE.to_string() } else { ports.join(",") },
                format_age(svc.metadata.creation_timestamp, now),
            ]
        })
        .collect();
    table(
        &["NAME", "TYPE", "CLUSTER-IP", "EXTERNAL-IP", "PORT(S)", "AGE"],
        rows,
    )
}

pub fn deployment_table(deployments: &[Deployment], now: DateTime<Utc>) -> String {
    let rows = deployments
        .iter()
        .map(|d| {
            let desired = d.spec.replicas.unwrap_or(0);
            vec![
                d.metadata.name.clone(),
                format!("{}/{}", d.status.ready_replicas.unwrap_or(0), desired),
                d.status.updated_replicas.unwrap_or(0).to_string(),
                d.status.available_replicas.unwrap_or(0).to_string(),
                format_age(d.metadata.creation_timestamp, now),
            ]
        })
        .collect();
    table(&["NAME", "READY", "UP-TO-DATE", "AVAILABLE", "AGE"], rows)
}

pub fn node_table(nodes: &[Node], now: DateTime<Utc>) -> String {
    let rows = nodes
        .iter()
        .map(|node| {
            let ready = node
                .status
                .conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True");
            let roles = node
                .metadata
                .labels
                .keys()
                .filter_map(|k| k.strip_prefix(ROLE_LABEL_PREFIX))
                .filter(|r| !r.is_empty())
                .collect::<Vec<_>>();
            vec![
                node.metadata.name.clone(),
                if ready { "Ready" } else { "NotReady" }.to_string(),
                if roles.is_empty() { NONE.to_string() } else { roles.join(",") },
                format_age(node.metadata.creation_timestamp, now),
                node.status.node_info.kubelet_version.clone(),
            ]
        })
        .collect();
    table(&["NAME", "STATUS", "ROLES", "AGE", "VERSION"], rows)
}

pub fn namespace_table(namespaces: &[Namespace], now: DateTime<Utc>) -> String {
    let rows = namespaces
        .iter()
        .map(|ns| {
            vec![
                ns.metadata.name.clone(),
                ns.status.phase.clone().unwrap_or_else(|| "Unknown".to_string()),
                format_age(ns.metadata.creation_timestamp, now),
            ]
        })
        .collect();
    table(&["NAME", "STATUS", "AGE"], rows)
}

pub fn generic_table(objects: &[GenericObject], now: DateTime<Utc>) -> String {
    let rows = objects
        .iter()
        .map(|o| {
            vec![
                o.metadata.name.clone(),
                format_age(o.metadata.creation_timestamp, now),
            ]
        })
        .collect();
    table(&["NAME", "AGE"], rows)
}

/// Left-aligned columns separated by three spaces
fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No resources found.".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = vec![render_row(headers, &widths)];
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        lines.push(render_row(&cells, &widths));
    }
    lines.join("\n")
}

fn render_row(cells: &[&str], widths: &[usize]) -> String {
    let last = cells.len().saturating_sub(1);
    cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, width))| {
            if i == last {
                cell.to_string()
            } else {
                format!("{:<width$}", cell, width = *width)
            }
        })
        .collect::<Vec<_>>()
        .join("   ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::objects::{
        ContainerStatus, Container, DeploymentSpec, DeploymentStatus, IntOrString,
        LoadBalancerIngress, NodeCondition, ObjectMeta, ServicePort,
    };
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn meta(name: &str, age: Duration) -> ObjectMeta {
        ObjectMeta {
            name: name.to_string(),
            creation_timestamp: Some(now() - age),
            ..ObjectMeta::default()
        }
    }

    #[test]
    fn test_format_age() {
        let now = now();
        assert_eq!(format_age(Some(now - Duration::minutes(90)), now), "1h");
        assert_eq!(format_age(Some(now - Duration::seconds(30)), now), "30s");
        assert_eq!(format_age(Some(now - Duration::days(2)), now), "2d");
        assert_eq!(format_age(Some(now - Duration::minutes(5)), now), "5m");
        assert_eq!(format_age(Some(now - Duration::seconds(3600)), now), "60m");
        assert_eq!(format_age(None, now), "Unknown");
    }

    #[test]
    fn test_pod_table() {
        let mut pod = Pod {
            metadata: meta("web-1", Duration::hours(3)),
            ..Pod::default()
        };
        pod.spec.containers = vec![
            Container { name: "web".to_string() },
            Container { name: "proxy".to_string() },
        ];
        pod.status.phase = Some("Running".to_string());
        pod.status.container_statuses = vec![
            ContainerStatus { name: "web".to_string(), ready: true, restart_count: 2 },
            ContainerStatus { name: "proxy".to_string(), ready: false, restart_count: 1 },
        ];

        let text = pod_table(&[pod], now());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("NAME"));
        let cells: Vec<&str> = lines[1].split_whitespace().collect();
        assert_eq!(cells, vec!["web-1", "1/2", "Running", "3", "3h"]);
    }

    #[test]
    fn test_service_table() {
        let mut svc = Service {
            metadata: meta("api", Duration::days(1)),
            ..Service::default()
        };
        svc.spec.type_ = Some("LoadBalancer".to_string());
        svc.spec.cluster_ip = Some("10.0.0.7".to_string());
        svc.spec.ports = vec![
            ServicePort {
                port: 80,
                target_port: Some(IntOrString::Int(8080)),
                protocol: Some("TCP".to_string()),
            },
            ServicePort {
                port: 443,
                target_port: Some(IntOrString::String("https".to_string())),
                protocol: None,
            },
        ];
        svc.status.load_balancer.ingress = vec![LoadBalancerIngress {
            ip: Some("34.1.2.3".to_string()),
            hostname: None,
        }];

        let text = service_table(&[svc], now());
        let cells: Vec<&str> = text.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(
            cells,
            vec!["api", "LoadBalancer", "10.0.0.7", "34.1.2.3", "80:8080/TCP,443:https/TCP", "1d"]
        );
    }

    #[test]
    fn test_service_hostname_ingress() {
        let mut svc = Service {
            metadata: meta("edge", Duration::days(1)),
            ..Service::default()
        };
        svc.status.load_balancer.ingress = vec![LoadBalancerIngress {
            ip: None,
            hostname: Some("a1b2.elb.amazonaws.com".to_string()),
        }];
        let text = service_table(&[svc], now());
        assert!(text.lines().nth(1).unwrap().contains("a1b2.elb.amazonaws.com"));
    }

    #[test]
    fn test_service_without_ingress() {
        let svc = Service {
            metadata: meta("db", Duration::seconds(10)),
            ..Service::default()
        };
        let text = service_table(&[svc], now());
        assert!(text.contains("<none>"));
    }

    #[test]
    fn test_deployment_table() {
        let d = Deployment {
            metadata: meta("backend", Duration::minutes(10)),
            spec: DeploymentSpec { replicas: Some(3) },
            status: DeploymentStatus {
                replicas: Some(3),
                ready_replicas: Some(2),
                updated_replicas: Some(3),
                available_replicas: Some(2),
            },
        };
        let text = deployment_table(&[d], now());
        let cells: Vec<&str> = text.lines().nth(1).unwrap().split_whitespace().collect();
        assert_eq!(cells, vec!["backend", "2/3", "3", "2", "10m"]);
    }

    #[test]
    fn test_node_table_roles_and_status() {
        let mut node = Node {
            metadata: meta("cp-1", Duration::days(40)),
            ..Node::default()
        };
        node.metadata
            .labels
            .insert("node-role.kubernetes.io/control-plane".to_string(), String::new());
        node.metadata
            .labels
            .insert("kubernetes.io/os".to_string(), "linux".to_string());
        node.status.conditions = vec![NodeCondition {
            type_: "Ready".to_string(),
            status: "True".to_string(),
        }];
        node.status.node_info.kubelet_version = "v1.29.2".to_string();

        let worker = Node {
            metadata: meta("worker-1", Duration::days(2)),
            ..Node::default()
        };

        let text = node_table(&[node, worker], now());
        let rows: Vec<Vec<&str>> = text
            .lines()
            .skip(1)
            .map(|l| l.split_whitespace().collect())
            .collect();
        assert_eq!(rows[0], vec!["cp-1", "Ready", "control-plane", "40d", "v1.29.2"]);
        assert_eq!(rows[1][1], "NotReady");
        assert_eq!(rows[1][2], "<none>");
    }

    #[test]
    fn test_empty_listing() {
        assert_eq!(pod_table(&[], now()), "No resources found.");
    }

    #[test]
    fn test_render_object_as_yaml() {
        let object = serde_json::json!({"metadata": {"name": "cfg"}, "data": {"k": "v"}});
        let text = render(&ClusterOutput::Object(object), now());
        assert!(text.contains("name: cfg"));
        assert!(text.contains("k: v"));
    }
}
