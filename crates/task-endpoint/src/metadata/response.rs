//! Task and container metadata documents

use crate::models::{DockerContainer, Eni, Task, NETWORK_MODE_AWSVPC};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Largest magnitude an `f64` holds without losing integer precision
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// CPU and memory limits. Unset (zero) limits are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitsResponse {
    #[serde(
        rename = "CPU",
        default,
        serialize_with = "serialize_cpu",
        skip_serializing_if = "Option::is_none"
    )]
    pub cpu: Option<f64>,
    #[serde(rename = "Memory", default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
}

impl LimitsResponse {
    fn new(cpu: f64, memory: i64) -> Self {
        Self {
            cpu: (cpu != 0.0).then_some(cpu),
            memory: (memory != 0).then_some(memory),
        }
    }

    fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none()
    }
}

/// Whole CPU values are written as integers, fractional ones as floats
fn serialize_cpu<S: Serializer>(cpu: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    match *cpu {
        Some(value) if value.fract() == 0.0 && value.abs() <= MAX_EXACT_INTEGER => {
            serializer.serialize_i64(value as i64)
        }
        Some(value) => serializer.serialize_f64(value),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortResponse {
    pub container_port: u16,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkResponse {
    #[serde(rename = "NetworkMode")]
    pub network_mode: String,
    #[serde(rename = "IPv4Addresses", default)]
    pub ipv4_addresses: Vec<String>,
    #[serde(rename = "IPv6Addresses", default, skip_serializing_if = "Vec::is_empty")]
    pub ipv6_addresses: Vec<String>,
}

impl From<&Eni> for NetworkResponse {
    fn from(eni: &Eni) -> Self {
        Self {
            network_mode: NETWORK_MODE_AWSVPC.to_string(),
            ipv4_addresses: eni.ipv4_addresses.iter().map(|ip| ip.to_string()).collect(),
            ipv6_addresses: eni.ipv6_addresses.iter().map(|ip| ip.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerResponse {
    #[serde(rename = "DockerId")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "DockerName")]
    pub docker_name: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "ImageID")]
    pub image_id: String,
    #[serde(rename = "Ports", default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<PortResponse>,
    #[serde(rename = "Labels", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(rename = "DesiredStatus")]
    pub desired_status: String,
    #[serde(rename = "KnownStatus")]
    pub known_status: String,
    #[serde(rename = "ExitCode", default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(rename = "Limits")]
    pub limits: LimitsResponse,
    #[serde(rename = "CreatedAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "StartedAt", default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "FinishedAt", default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(rename = "Type")]
    pub container_type: String,
    #[serde(rename = "Networks", default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkResponse>,
}

impl ContainerResponse {
    /// Build the document for a container of a task attached to `eni`, if any
    pub fn new(docker_container: &DockerContainer, eni: Option<&Eni>) -> Self {
        let container = &docker_container.container;

        // With a dedicated ENI the container port is reachable as-is
        let ports = container
            .ports
            .iter()
            .map(|binding| PortResponse {
                container_port: binding.container_port,
                protocol: binding.protocol.as_str().to_string(),
                host_port: match eni {
                    Some(_) => Some(binding.container_port),
                    None => binding.host_port.filter(|port| *port != 0),
                },
            })
            .collect();

        Self {
            id: docker_container.docker_id.clone(),
            name: container.name.clone(),
            docker_name: docker_container.docker_name.clone(),
            image: container.image.clone(),
            image_id: container.image_id.clone(),
            ports,
            labels: container.labels.clone(),
            desired_status: container.desired_status.to_string(),
            known_status: container.known_status.to_string(),
            exit_code: container.exit_code,
            limits: LimitsResponse::new(f64::from(container.cpu), i64::from(container.memory)),
            created_at: container.created_at,
            started_at: container.started_at,
            finished_at: container.finished_at,
            container_type: container.container_type.as_str().to_string(),
            networks: eni.map(NetworkResponse::from).into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(rename = "Cluster")]
    pub cluster: String,
    #[serde(rename = "TaskARN")]
    pub task_arn: String,
    #[serde(rename = "Family")]
    pub family: String,
    #[serde(rename = "Revision")]
    pub revision: String,
    #[serde(rename = "DesiredStatus", default, skip_serializing_if = "String::is_empty")]
    pub desired_status: String,
    #[serde(rename = "KnownStatus")]
    pub known_status: String,
    #[serde(rename = "Containers", default)]
    pub containers: Vec<ContainerResponse>,
    #[serde(rename = "Limits", default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<LimitsResponse>,
    #[serde(rename = "PullStartedAt", default, skip_serializing_if = "Option::is_none")]
    pub pull_started_at: Option<DateTime<Utc>>,
    #[serde(rename = "PullStoppedAt", default, skip_serializing_if = "Option::is_none")]
    pub pull_stopped_at: Option<DateTime<Utc>>,
    #[serde(rename = "ExecutionStoppedAt", default, skip_serializing_if = "Option::is_none")]
    pub execution_stopped_at: Option<DateTime<Utc>>,
    #[serde(rename = "AvailabilityZone", default, skip_serializing_if = "String::is_empty")]
    pub availability_zone: String,
    #[serde(rename = "TaskTags", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub task_tags: BTreeMap<String, String>,
    #[serde(
        rename = "ContainerInstanceTags",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub container_instance_tags: BTreeMap<String, String>,
}

impl TaskResponse {
    /// Build the task document. Agent-internal containers are left out.
    pub fn new(
        task: &Task,
        containers: &BTreeMap<String, DockerContainer>,
        cluster: &str,
        availability_zone: &str,
    ) -> Self {
        let eni = task.eni.as_ref();
        let containers = containers
            .values()
            .filter(|dc| !dc.container.container_type.is_internal())
            .map(|dc| ContainerResponse::new(dc, eni))
            .collect();

        let limits = LimitsResponse::new(task.cpu, task.memory);

        Self {
            cluster: cluster.to_string(),
            task_arn: task.arn.clone(),
            family: task.family.clone(),
            revision: task.version.clone(),
            desired_status: task.desired_status.to_string(),
            known_status: task.known_status.to_string(),
            containers,
            limits: (!limits.is_empty()).then_some(limits),
            pull_started_at: task.pull_started_at,
            pull_stopped_at: task.pull_stopped_at,
            execution_stopped_at: task.execution_stopped_at,
            availability_zone: availability_zone.to_string(),
            task_tags: BTreeMap::new(),
            container_instance_tags: BTreeMap::new(),
        }
    }
}
