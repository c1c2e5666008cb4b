//! Interfaces to the services that own the state this server exposes
//!
//! Every implementation must be safe to call concurrently. Calls return
//! snapshots; the server never holds a lock across a call.

use crate::error::{StatsError, TagsError};
use crate::lookup::Lookup;
use crate::models::{DockerContainer, DockerStats, ResourceTag, Task, TaskIamRoleCredentials};
use std::collections::BTreeMap;
use std::net::IpAddr;

pub use async_trait::async_trait;

/// Read-only view of the task engine's state tables
pub trait EngineState: Send + Sync {
    /// Task ARN owning the given container network address
    fn task_arn_by_ip(&self, ip: IpAddr) -> Lookup<String>;

    fn task_by_arn(&self, arn: &str) -> Lookup<Task>;

    /// Task owning the container with the given docker id
    fn task_by_container_id(&self, docker_id: &str) -> Lookup<Task>;

    fn container_by_id(&self, docker_id: &str) -> Lookup<DockerContainer>;

    /// Containers of a task keyed by container name
    fn container_map_by_arn(&self, arn: &str) -> Lookup<BTreeMap<String, DockerContainer>>;

    fn task_arn_by_endpoint_id(&self, endpoint_id: &str) -> Lookup<String>;

    fn docker_id_by_endpoint_id(&self, endpoint_id: &str) -> Lookup<String>;
}

/// Query side of the credentials store
pub trait CredentialsManager: Send + Sync {
    fn get_task_credentials(&self, credentials_id: &str) -> Lookup<TaskIamRoleCredentials>;
}

/// Source of per-container Docker statistics
#[async_trait]
pub trait StatsEngine: Send + Sync {
    async fn container_docker_stats(
        &self,
        task_arn: &str,
        container_id: &str,
    ) -> Result<DockerStats, StatsError>;
}

/// Control-plane API used for tag enrichment
#[async_trait]
pub trait ControlPlaneClient: Send + Sync {
    async fn get_resource_tags(&self, arn: &str) -> Result<Vec<ResourceTag>, TagsError>;
}
