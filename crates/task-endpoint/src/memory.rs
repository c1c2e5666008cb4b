//! In-memory collaborator implementations
//!
//! These back the standalone agent binary, where the task engine pushes
//! state into the server process, and double as fixtures in tests.

use crate::collaborators::{
    async_trait, ControlPlaneClient, CredentialsManager, EngineState, StatsEngine,
};
use crate::error::{StatsError, TagsError};
use crate::lookup::Lookup;
use crate::models::{
    ContainerStatus, DockerContainer, DockerStats, IamRoleCredentials, ResourceTag, Task,
    TaskIamRoleCredentials, TaskStatus,
};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::net::IpAddr;
use tracing::debug;

/// Engine state tables keyed the ways the endpoints look tasks up
#[derive(Default)]
pub struct MemoryEngineState {
    /// task ARN -> task
    tasks: DashMap<String, Task>,
    /// docker id -> (task ARN, container)
    containers: DashMap<String, (String, DockerContainer)>,
    /// container network address -> task ARN
    task_ips: DashMap<IpAddr, String>,
    /// v3 endpoint id -> (task ARN, docker id)
    endpoint_ids: DashMap<String, (String, String)>,
}

impl MemoryEngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a task. Containers are attached separately.
    pub fn add_task(&self, mut task: Task) {
        debug!(task_arn = %task.arn, "Adding task");
        task.containers.clear();
        for entry in self.containers.iter() {
            let (arn, docker_container) = entry.value();
            if *arn == task.arn {
                task.containers.push(docker_container.container.clone());
            }
        }
        self.tasks.insert(task.arn.clone(), task);
    }

    /// Attach a running container to a task, optionally issuing it a v3 endpoint id
    pub fn add_container(
        &self,
        task_arn: &str,
        docker_container: DockerContainer,
        endpoint_id: Option<&str>,
    ) {
        debug!(
            task_arn = %task_arn,
            container_id = %docker_container.docker_id,
            "Adding container"
        );
        if let Some(mut task) = self.tasks.get_mut(task_arn) {
            task.containers
                .retain(|c| c.name != docker_container.container.name);
            task.containers.push(docker_container.container.clone());
        }
        if let Some(endpoint_id) = endpoint_id {
            self.endpoint_ids.insert(
                endpoint_id.to_string(),
                (task_arn.to_string(), docker_container.docker_id.clone()),
            );
        }
        self.containers.insert(
            docker_container.docker_id.clone(),
            (task_arn.to_string(), docker_container),
        );
    }

    /// Bind a container network address to a task
    pub fn add_task_ip(&self, ip: IpAddr, task_arn: &str) {
        self.task_ips.insert(ip, task_arn.to_string());
    }

    /// Advance a task's known status. Regressions are ignored.
    pub fn update_task_status(&self, task_arn: &str, status: TaskStatus) -> bool {
        match self.tasks.get_mut(task_arn) {
            Some(mut task) if status > task.known_status => {
                task.known_status = status;
                true
            }
            _ => false,
        }
    }

    /// Advance a container's known status. Regressions are ignored.
    pub fn update_container_status(&self, docker_id: &str, status: ContainerStatus) -> bool {
        let Some(mut entry) = self.containers.get_mut(docker_id) else {
            return false;
        };
        let (task_arn, docker_container) = entry.value_mut();
        if status <= docker_container.container.known_status {
            return false;
        }
        docker_container.container.known_status = status;
        let name = docker_container.container.name.clone();
        let task_arn = task_arn.clone();
        drop(entry);

        if let Some(mut task) = self.tasks.get_mut(&task_arn) {
            if let Some(container) = task.containers.iter_mut().find(|c| c.name == name) {
                container.known_status = status;
            }
        }
        true
    }

    /// Remove a task and every index entry pointing at it
    pub fn remove_task(&self, task_arn: &str) -> Option<Task> {
        debug!(task_arn = %task_arn, "Removing task");
        self.containers.retain(|_, entry| entry.0 != task_arn);
        self.task_ips.retain(|_, arn| *arn != task_arn);
        self.endpoint_ids.retain(|_, entry| entry.0 != task_arn);
        self.tasks.remove(task_arn).map(|(_, task)| task)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl EngineState for MemoryEngineState {
    fn task_arn_by_ip(&self, ip: IpAddr) -> Lookup<String> {
        self.task_ips.get(&ip).map(|r| r.value().clone()).into()
    }

    fn task_by_arn(&self, arn: &str) -> Lookup<Task> {
        self.tasks.get(arn).map(|r| r.value().clone()).into()
    }

    fn task_by_container_id(&self, docker_id: &str) -> Lookup<Task> {
        let task_arn = self.containers.get(docker_id).map(|r| r.value().0.clone());
        match task_arn {
            Some(arn) => self.task_by_arn(&arn),
            None => Lookup::Absent,
        }
    }

    fn container_by_id(&self, docker_id: &str) -> Lookup<DockerContainer> {
        self.containers
            .get(docker_id)
            .map(|r| r.value().1.clone())
            .into()
    }

    fn container_map_by_arn(&self, arn: &str) -> Lookup<BTreeMap<String, DockerContainer>> {
        if !self.tasks.contains_key(arn) {
            return Lookup::Absent;
        }
        let map = self
            .containers
            .iter()
            .filter(|r| r.value().0 == arn)
            .map(|r| {
                let docker_container = r.value().1.clone();
                (docker_container.container.name.clone(), docker_container)
            })
            .collect();
        Lookup::Found(map)
    }

    fn task_arn_by_endpoint_id(&self, endpoint_id: &str) -> Lookup<String> {
        self.endpoint_ids
            .get(endpoint_id)
            .map(|r| r.value().0.clone())
            .into()
    }

    fn docker_id_by_endpoint_id(&self, endpoint_id: &str) -> Lookup<String> {
        self.endpoint_ids
            .get(endpoint_id)
            .map(|r| r.value().1.clone())
            .into()
    }
}

/// Credentials slots keyed by credentials id
#[derive(Default)]
pub struct MemoryCredentialsManager {
    credentials: DashMap<String, TaskIamRoleCredentials>,
}

impl MemoryCredentialsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a slot for a task before its credentials arrive
    pub fn reserve(&self, credentials_id: &str, task_arn: &str) {
        self.credentials
            .entry(credentials_id.to_string())
            .or_insert_with(|| TaskIamRoleCredentials {
                task_arn: task_arn.to_string(),
                credentials: IamRoleCredentials::default(),
            });
    }

    pub fn set(&self, credentials_id: &str, credentials: TaskIamRoleCredentials) {
        self.credentials
            .insert(credentials_id.to_string(), credentials);
    }

    pub fn remove(&self, credentials_id: &str) -> Option<TaskIamRoleCredentials> {
        self.credentials
            .remove(credentials_id)
            .map(|(_, creds)| creds)
    }
}

impl CredentialsManager for MemoryCredentialsManager {
    fn get_task_credentials(&self, credentials_id: &str) -> Lookup<TaskIamRoleCredentials> {
        self.credentials
            .get(credentials_id)
            .map(|r| r.value().clone())
            .into()
    }
}

/// Latest stats sample per (task ARN, docker id)
#[derive(Default)]
pub struct MemoryStatsEngine {
    samples: DashMap<(String, String), DockerStats>,
}

impl MemoryStatsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, task_arn: &str, container_id: &str, stats: DockerStats) {
        self.samples
            .insert((task_arn.to_string(), container_id.to_string()), stats);
    }

    pub fn remove_task(&self, task_arn: &str) {
        self.samples.retain(|key, _| key.0 != task_arn);
    }
}

#[async_trait]
impl StatsEngine for MemoryStatsEngine {
    async fn container_docker_stats(
        &self,
        task_arn: &str,
        container_id: &str,
    ) -> Result<DockerStats, StatsError> {
        self.samples
            .get(&(task_arn.to_string(), container_id.to_string()))
            .map(|r| r.value().clone())
            .ok_or_else(|| StatsError::NoSample {
                task_arn: task_arn.to_string(),
                container_id: container_id.to_string(),
            })
    }
}

/// Tags per resource ARN, as last synced from the control plane
#[derive(Default)]
pub struct MemoryTagStore {
    tags: DashMap<String, Vec<ResourceTag>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tags(&self, arn: &str, tags: Vec<ResourceTag>) {
        self.tags.insert(arn.to_string(), tags);
    }
}

#[async_trait]
impl ControlPlaneClient for MemoryTagStore {
    async fn get_resource_tags(&self, arn: &str) -> Result<Vec<ResourceTag>, TagsError> {
        Ok(self
            .tags
            .get(arn)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }
}
