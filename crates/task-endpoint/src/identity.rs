//! Caller identity resolution
//!
//! v1/v2 callers are identified by the source address of the connection.
//! v3 callers present an opaque endpoint id, issued per container, in the
//! request path. Both resolve against the engine state's lookup tables.

use crate::collaborators::EngineState;
use crate::error::EndpointError;
use std::net::IpAddr;
use tracing::debug;

/// How the caller reached the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource<'a> {
    /// Source address of the connection, if the transport exposed one
    RemoteIp(Option<IpAddr>),
    /// v3 endpoint id from the request path
    EndpointId(&'a str),
}

/// Task and container a request is scoped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerScope {
    pub task_arn: String,
    pub container_id: String,
}

/// Resolves identity sources into task ARNs and docker ids
pub struct IdentityResolver<'a> {
    state: &'a dyn EngineState,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(state: &'a dyn EngineState) -> Self {
        Self { state }
    }

    /// ARN of the task the caller belongs to
    pub fn task_arn(&self, source: IdentitySource<'_>) -> Result<String, EndpointError> {
        match source {
            IdentitySource::RemoteIp(None) => Err(EndpointError::bad_request(
                "Unable to get task arn from request: no remote address",
            )),
            IdentitySource::RemoteIp(Some(ip)) => {
                self.state.task_arn_by_ip(ip).found_or_else(|| {
                    debug!(remote_ip = %ip, "No task found for remote address");
                    EndpointError::bad_request(format!(
                        "Unable to get task arn from request: unable to associate '{}' with task",
                        ip
                    ))
                })
            }
            IdentitySource::EndpointId(id) => {
                if id.is_empty() {
                    return Err(EndpointError::bad_request(
                        "Unable to get task arn from request: empty endpoint id",
                    ));
                }
                self.state.task_arn_by_endpoint_id(id).found_or_else(|| {
                    debug!(endpoint_id = %id, "No task found for endpoint id");
                    EndpointError::bad_request(format!(
                        "Unable to get task arn from request: unable to get task arn from v3 endpoint id: {}",
                        id
                    ))
                })
            }
        }
    }

    /// Docker id of the container the caller is asking about.
    ///
    /// For address-based identity the id comes from the request path; for
    /// endpoint ids it is bound to the id itself and `path_container_id` is
    /// ignored.
    pub fn container_id(
        &self,
        source: IdentitySource<'_>,
        path_container_id: Option<&str>,
    ) -> Result<String, EndpointError> {
        match source {
            IdentitySource::RemoteIp(_) => match path_container_id {
                Some(id) if !id.is_empty() => Ok(id.to_string()),
                _ => Err(EndpointError::bad_request(
                    "Unable to get container id from request",
                )),
            },
            IdentitySource::EndpointId(id) => {
                if id.is_empty() {
                    return Err(EndpointError::bad_request(
                        "Unable to get docker id from request: empty endpoint id",
                    ));
                }
                self.state.docker_id_by_endpoint_id(id).found_or_else(|| {
                    debug!(endpoint_id = %id, "No container found for endpoint id");
                    EndpointError::bad_request(format!(
                        "Unable to get docker id from request: unable to get docker id from v3 endpoint id: {}",
                        id
                    ))
                })
            }
        }
    }

    /// Task ARN and docker id together.
    ///
    /// A container id taken from the path must belong to the caller's task.
    pub fn container_scope(
        &self,
        source: IdentitySource<'_>,
        path_container_id: Option<&str>,
    ) -> Result<ContainerScope, EndpointError> {
        let task_arn = self.task_arn(source)?;
        let container_id = self.container_id(source, path_container_id)?;
        if let IdentitySource::RemoteIp(_) = source {
            self.check_owner(&task_arn, &container_id)?;
        }
        Ok(ContainerScope {
            task_arn,
            container_id,
        })
    }

    fn check_owner(&self, task_arn: &str, container_id: &str) -> Result<(), EndpointError> {
        let owner = self
            .state
            .task_by_container_id(container_id)
            .found_or_else(|| {
                debug!(container_id = %container_id, "No task found for container");
                EndpointError::bad_request(format!(
                    "Unable to get container from request: container {} not found",
                    container_id
                ))
            })?;
        if owner.arn != task_arn {
            debug!(
                container_id = %container_id,
                task_arn = %task_arn,
                owner = %owner.arn,
                "Container belongs to another task"
            );
            return Err(EndpointError::bad_request(format!(
                "Unable to get container from request: container {} does not belong to task {}",
                container_id, task_arn
            )));
        }
        Ok(())
    }
}
