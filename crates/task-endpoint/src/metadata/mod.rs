//! Metadata document assembly
//!
//! Builds task and container documents from engine-state snapshots, with
//! optional tag enrichment from the control plane.

mod response;

pub use response::{ContainerResponse, LimitsResponse, NetworkResponse, PortResponse, TaskResponse};

use crate::collaborators::{ControlPlaneClient, EngineState};
use crate::error::{EndpointError, TagsError};
use crate::observability::EndpointMetrics;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Server-wide values injected into every task document
#[derive(Debug, Clone, Copy)]
pub struct MetadataContext<'a> {
    pub cluster: &'a str,
    pub availability_zone: &'a str,
    pub container_instance_arn: &'a str,
    pub tag_fetch_timeout: Duration,
    /// Fail the request instead of omitting tags when a fetch fails
    pub tag_fetch_failure_fatal: bool,
}

pub struct MetadataAssembler<'a> {
    state: &'a dyn EngineState,
    control_plane: &'a dyn ControlPlaneClient,
    metrics: &'a EndpointMetrics,
    context: MetadataContext<'a>,
}

impl<'a> MetadataAssembler<'a> {
    pub fn new(
        state: &'a dyn EngineState,
        control_plane: &'a dyn ControlPlaneClient,
        metrics: &'a EndpointMetrics,
        context: MetadataContext<'a>,
    ) -> Self {
        Self {
            state,
            control_plane,
            metrics,
            context,
        }
    }

    /// Task document for a resolved task ARN
    pub fn task_metadata(&self, task_arn: &str) -> Result<TaskResponse, EndpointError> {
        let task = self.state.task_by_arn(task_arn).found_or_else(|| {
            EndpointError::bad_request(format!("Unable to find task '{}'", task_arn))
        })?;
        let containers = self.state.container_map_by_arn(task_arn).found_or_else(|| {
            EndpointError::bad_request(format!(
                "Unable to find container map for task '{}'",
                task_arn
            ))
        })?;

        debug!(task_arn = %task_arn, containers = containers.len(), "Writing task metadata");
        Ok(TaskResponse::new(
            &task,
            &containers,
            self.context.cluster,
            self.context.availability_zone,
        ))
    }

    /// Task document merged with container-instance and task tags
    pub async fn task_metadata_with_tags(
        &self,
        task_arn: &str,
    ) -> Result<TaskResponse, EndpointError> {
        let mut response = self.task_metadata(task_arn)?;

        let (instance_tags, task_tags) = tokio::join!(
            self.fetch_tags(self.context.container_instance_arn),
            self.fetch_tags(task_arn),
        );

        if let Some(tags) = self.degrade(instance_tags)? {
            response.container_instance_tags = tags;
        }
        if let Some(tags) = self.degrade(task_tags)? {
            response.task_tags = tags;
        }
        Ok(response)
    }

    /// Container document for a docker id.
    ///
    /// When `owner_task_arn` is given, the container must belong to that task.
    pub fn container_metadata(
        &self,
        container_id: &str,
        owner_task_arn: Option<&str>,
    ) -> Result<ContainerResponse, EndpointError> {
        let docker_container = self.state.container_by_id(container_id).found_or_else(|| {
            EndpointError::bad_request(format!(
                "Unable to find container '{}'",
                container_id
            ))
        })?;
        let task = self
            .state
            .task_by_container_id(container_id)
            .found_or_else(|| {
                EndpointError::bad_request(format!(
                    "Unable to find task for container '{}'",
                    container_id
                ))
            })?;

        if let Some(owner) = owner_task_arn {
            if task.arn != owner {
                warn!(
                    container_id = %container_id,
                    task_arn = %owner,
                    "Container requested from outside its task"
                );
                return Err(EndpointError::bad_request(format!(
                    "Unable to find container '{}'",
                    container_id
                )));
            }
        }

        debug!(container_id = %container_id, task_arn = %task.arn, "Writing container metadata");
        Ok(ContainerResponse::new(&docker_container, task.eni.as_ref()))
    }

    async fn fetch_tags(&self, arn: &str) -> Result<BTreeMap<String, String>, TagsError> {
        let timeout = self.context.tag_fetch_timeout;
        let tags = tokio::time::timeout(timeout, self.control_plane.get_resource_tags(arn))
            .await
            .map_err(|_| TagsError::Timeout {
                arn: arn.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })??;

        Ok(tags.into_iter().map(|tag| (tag.key, tag.value)).collect())
    }

    /// Turn a failed tag fetch into "no tags" unless failures are fatal
    fn degrade(
        &self,
        result: Result<BTreeMap<String, String>, TagsError>,
    ) -> Result<Option<BTreeMap<String, String>>, EndpointError> {
        match result {
            Ok(tags) => Ok(Some(tags)),
            Err(e) => {
                self.metrics.inc_tag_fetch_failures();
                warn!(error = %e, "Failed to fetch resource tags");
                if self.context.tag_fetch_failure_fatal {
                    Err(EndpointError::internal(format!(
                        "Unable to get resource tags: {}",
                        e
                    )))
                } else {
                    Ok(None)
                }
            }
        }
    }
}
