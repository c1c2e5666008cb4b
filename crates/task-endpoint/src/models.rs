//! Core data models owned by the task engine
//!
//! The endpoint server only ever reads snapshots of these types; every
//! mutation happens in the engine that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Network mode reported for tasks with a dedicated ENI
pub const NETWORK_MODE_AWSVPC: &str = "awsvpc";

/// Task lifecycle status. Ordering follows the lifecycle, which only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    None,
    Pending,
    Created,
    Running,
    Stopped,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Pending => "PENDING",
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerStatus {
    #[default]
    None,
    Pulled,
    Created,
    Running,
    ResourcesProvisioned,
    Stopped,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Pulled => "PULLED",
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::ResourcesProvisioned => "RESOURCES_PROVISIONED",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distinguishes user containers from containers the agent injects itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerType {
    #[default]
    Normal,
    EmptyHostVolume,
    CniPause,
}

impl ContainerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::EmptyHostVolume => "EMPTY_HOST_VOLUME",
            Self::CniPause => "CNI_PAUSE",
        }
    }

    /// Agent-injected support containers are never shown to the task
    pub fn is_internal(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    #[default]
    Tcp,
    Udp,
}

impl TransportProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// Declared port binding on a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub container_port: u16,
    pub host_port: Option<u16>,
    pub protocol: TransportProtocol,
}

/// Elastic network interface attached to a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eni {
    pub id: String,
    pub ipv4_addresses: Vec<Ipv4Addr>,
    pub ipv6_addresses: Vec<Ipv6Addr>,
}

/// Container definition as tracked by the engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    pub image_id: String,
    pub desired_status: ContainerStatus,
    pub known_status: ContainerStatus,
    /// CPU units; zero means unset
    pub cpu: u32,
    /// Memory in MiB; zero means unset
    pub memory: u32,
    pub container_type: ContainerType,
    pub ports: Vec<PortBinding>,
    pub labels: BTreeMap<String, String>,
    pub exit_code: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A container bound to its runtime identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerContainer {
    pub docker_id: String,
    pub docker_name: String,
    pub container: Container,
}

/// Task snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub arn: String,
    pub family: String,
    pub version: String,
    pub desired_status: TaskStatus,
    pub known_status: TaskStatus,
    /// Task-level CPU limit; zero means unset
    pub cpu: f64,
    /// Task-level memory limit in MiB; zero means unset
    pub memory: i64,
    pub eni: Option<Eni>,
    pub pull_started_at: Option<DateTime<Utc>>,
    pub pull_stopped_at: Option<DateTime<Utc>>,
    pub execution_stopped_at: Option<DateTime<Utc>>,
    pub containers: Vec<Container>,
}

/// IAM role credentials issued for a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamRoleCredentials {
    pub role_arn: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: String,
}

impl IamRoleCredentials {
    /// True for a reserved slot the credentials manager has not filled yet
    pub fn is_uninitialized(&self) -> bool {
        *self == Self::default()
    }
}

/// Credentials record keyed by credentials id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIamRoleCredentials {
    /// ARN of the task the credentials belong to
    pub task_arn: String,
    pub credentials: IamRoleCredentials,
}

/// Control-plane resource tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}

impl ResourceTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Raw Docker statistics sample, passed through to callers untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DockerStats(pub serde_json::Value);
