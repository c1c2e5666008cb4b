//! Docker stats endpoints

use crate::collaborators::{EngineState, StatsEngine};
use crate::error::EndpointError;
use crate::models::DockerStats;
use crate::observability::EndpointMetrics;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Stats for every container of a task, keyed by docker id
pub type TaskStatsResponse = BTreeMap<String, DockerStats>;

pub struct StatsHandler<'a> {
    pub state: &'a dyn EngineState,
    pub engine: &'a dyn StatsEngine,
    pub metrics: &'a EndpointMetrics,
}

impl StatsHandler<'_> {
    /// Latest sample for one container, passed through unchanged
    pub async fn container_stats(
        &self,
        task_arn: &str,
        container_id: &str,
    ) -> Result<DockerStats, EndpointError> {
        self.engine
            .container_docker_stats(task_arn, container_id)
            .await
            .map_err(|e| {
                warn!(
                    task_arn = %task_arn,
                    container_id = %container_id,
                    error = %e,
                    "Unable to get container stats"
                );
                EndpointError::internal(format!(
                    "Unable to get container stats for: {}",
                    container_id
                ))
            })
    }

    /// Samples for every container of a task.
    ///
    /// Containers without a sample yet are skipped rather than failing the
    /// request, so an empty mapping is a valid answer.
    pub async fn task_stats(&self, task_arn: &str) -> Result<TaskStatsResponse, EndpointError> {
        let containers = self.state.container_map_by_arn(task_arn).found_or_else(|| {
            EndpointError::bad_request(format!(
                "Unable to get container map for task '{}'",
                task_arn
            ))
        })?;

        let mut response = TaskStatsResponse::new();
        for docker_container in containers.values() {
            let docker_id = &docker_container.docker_id;
            match self.engine.container_docker_stats(task_arn, docker_id).await {
                Ok(stats) => {
                    response.insert(docker_id.clone(), stats);
                }
                Err(e) => {
                    self.metrics.inc_stats_skipped();
                    debug!(
                        task_arn = %task_arn,
                        container_id = %docker_id,
                        error = %e,
                        "Skipping container without stats"
                    );
                }
            }
        }
        Ok(response)
    }
}
