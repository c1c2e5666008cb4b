//! Shared fixtures for server integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use task_endpoint::collaborators::async_trait;
use task_endpoint::{
    AuditEntry, AuditError, AuditLogger, Collaborators, Container, ContainerStatus,
    ContainerType, ControlPlaneClient, CredentialsManager, DockerContainer, DockerStats, Eni,
    EngineState, IamRoleCredentials, Lookup, MemoryCredentialsManager, MemoryEngineState,
    MemoryStatsEngine, MemoryTagStore, PortBinding, ResourceTag, ServerConfig, StatsEngine,
    StatsError, TagsError, Task, TaskIamRoleCredentials, TaskServer, TaskStatus,
    TransportProtocol,
};
use tower::ServiceExt;

pub const CLUSTER_NAME: &str = "default";
pub const REMOTE_ADDR: &str = "169.254.170.3:32146";
pub const UNKNOWN_REMOTE_ADDR: &str = "169.254.170.9:32146";
pub const TASK_ARN: &str = "t1";
pub const FAMILY: &str = "sleep";
pub const VERSION: &str = "1";
pub const CONTAINER_ID: &str = "cid";
pub const CONTAINER_NAME: &str = "sleepy";
pub const IMAGE_NAME: &str = "busybox";
pub const IMAGE_ID: &str = "bUsYbOx";
pub const CPU: u32 = 1024;
pub const MEMORY: u32 = 512;
pub const CONTAINER_PORT: u16 = 80;
pub const ENI_IPV4_ADDRESS: &str = "10.0.0.2";
pub const ROLE_ARN: &str = "r1";
pub const ACCESS_KEY_ID: &str = "ak";
pub const SECRET_ACCESS_KEY: &str = "sk";
pub const CREDENTIALS_ID: &str = "credentialsId";
pub const V3_ENDPOINT_ID: &str = "v3eid";
pub const AVAILABILITY_ZONE: &str = "us-west-2b";
pub const CONTAINER_INSTANCE_ARN: &str = "containerInstanceArn-test";

pub fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 8, 30, 0).unwrap()
}

/// Shared call log for every counting collaborator
#[derive(Default)]
pub struct CallLog {
    calls: Mutex<Vec<&'static str>>,
}

impl CallLog {
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

pub struct CountingEngineState {
    pub inner: MemoryEngineState,
    log: Arc<CallLog>,
}

impl EngineState for CountingEngineState {
    fn task_arn_by_ip(&self, ip: IpAddr) -> Lookup<String> {
        self.log.record("task_arn_by_ip");
        self.inner.task_arn_by_ip(ip)
    }

    fn task_by_arn(&self, arn: &str) -> Lookup<Task> {
        self.log.record("task_by_arn");
        self.inner.task_by_arn(arn)
    }

    fn task_by_container_id(&self, docker_id: &str) -> Lookup<Task> {
        self.log.record("task_by_container_id");
        self.inner.task_by_container_id(docker_id)
    }

    fn container_by_id(&self, docker_id: &str) -> Lookup<DockerContainer> {
        self.log.record("container_by_id");
        self.inner.container_by_id(docker_id)
    }

    fn container_map_by_arn(&self, arn: &str) -> Lookup<BTreeMap<String, DockerContainer>> {
        self.log.record("container_map_by_arn");
        self.inner.container_map_by_arn(arn)
    }

    fn task_arn_by_endpoint_id(&self, endpoint_id: &str) -> Lookup<String> {
        self.log.record("task_arn_by_endpoint_id");
        self.inner.task_arn_by_endpoint_id(endpoint_id)
    }

    fn docker_id_by_endpoint_id(&self, endpoint_id: &str) -> Lookup<String> {
        self.log.record("docker_id_by_endpoint_id");
        self.inner.docker_id_by_endpoint_id(endpoint_id)
    }
}

pub struct CountingCredentials {
    pub inner: MemoryCredentialsManager,
    log: Arc<CallLog>,
}

impl CredentialsManager for CountingCredentials {
    fn get_task_credentials(&self, credentials_id: &str) -> Lookup<TaskIamRoleCredentials> {
        self.log.record("get_task_credentials");
        self.inner.get_task_credentials(credentials_id)
    }
}

pub struct CountingStats {
    pub inner: MemoryStatsEngine,
    log: Arc<CallLog>,
}

#[async_trait]
impl StatsEngine for CountingStats {
    async fn container_docker_stats(
        &self,
        task_arn: &str,
        container_id: &str,
    ) -> Result<DockerStats, StatsError> {
        self.log.record("container_docker_stats");
        self.inner.container_docker_stats(task_arn, container_id).await
    }
}

pub struct CountingTags {
    pub inner: MemoryTagStore,
    /// Never answer once set
    pub hang: AtomicBool,
    log: Arc<CallLog>,
}

#[async_trait]
impl ControlPlaneClient for CountingTags {
    async fn get_resource_tags(&self, arn: &str) -> Result<Vec<ResourceTag>, TagsError> {
        self.log.record("get_resource_tags");
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.inner.get_resource_tags(arn).await
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    pub entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLogger for RecordingAudit {
    fn log(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

impl RecordingAudit {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

pub fn test_config() -> ServerConfig {
    ServerConfig {
        cluster: CLUSTER_NAME.to_string(),
        availability_zone: AVAILABILITY_ZONE.to_string(),
        container_instance_arn: CONTAINER_INSTANCE_ARN.to_string(),
        ..Default::default()
    }
}

pub fn sleepy_container() -> DockerContainer {
    let mut labels = BTreeMap::new();
    labels.insert("foo".to_string(), "bar".to_string());

    DockerContainer {
        docker_id: CONTAINER_ID.to_string(),
        docker_name: CONTAINER_NAME.to_string(),
        container: Container {
            name: CONTAINER_NAME.to_string(),
            image: IMAGE_NAME.to_string(),
            image_id: IMAGE_ID.to_string(),
            desired_status: ContainerStatus::Running,
            known_status: ContainerStatus::Running,
            cpu: CPU,
            memory: MEMORY,
            container_type: ContainerType::Normal,
            ports: vec![PortBinding {
                container_port: CONTAINER_PORT,
                host_port: None,
                protocol: TransportProtocol::Tcp,
            }],
            labels,
            ..Default::default()
        },
    }
}

pub fn sleep_task() -> Task {
    Task {
        arn: TASK_ARN.to_string(),
        family: FAMILY.to_string(),
        version: VERSION.to_string(),
        desired_status: TaskStatus::Running,
        known_status: TaskStatus::Running,
        cpu: f64::from(CPU),
        memory: i64::from(MEMORY),
        eni: Some(Eni {
            id: "eni-1".to_string(),
            ipv4_addresses: vec![ENI_IPV4_ADDRESS.parse().unwrap()],
            ipv6_addresses: Vec::new(),
        }),
        pull_started_at: Some(timestamp()),
        pull_stopped_at: Some(timestamp()),
        execution_stopped_at: Some(timestamp()),
        ..Default::default()
    }
}

pub fn expected_container_response() -> Value {
    json!({
        "DockerId": CONTAINER_ID,
        "Name": CONTAINER_NAME,
        "DockerName": CONTAINER_NAME,
        "Image": IMAGE_NAME,
        "ImageID": IMAGE_ID,
        "Ports": [{
            "ContainerPort": CONTAINER_PORT,
            "Protocol": "tcp",
            "HostPort": CONTAINER_PORT,
        }],
        "Labels": {"foo": "bar"},
        "DesiredStatus": "RUNNING",
        "KnownStatus": "RUNNING",
        "Limits": {"CPU": 1024, "Memory": 512},
        "Type": "NORMAL",
        "Networks": [{
            "NetworkMode": "awsvpc",
            "IPv4Addresses": [ENI_IPV4_ADDRESS],
        }],
    })
}

pub fn expected_task_response() -> Value {
    let at = serde_json::to_value(timestamp()).unwrap();
    json!({
        "Cluster": CLUSTER_NAME,
        "TaskARN": TASK_ARN,
        "Family": FAMILY,
        "Revision": VERSION,
        "DesiredStatus": "RUNNING",
        "KnownStatus": "RUNNING",
        "Containers": [expected_container_response()],
        "Limits": {"CPU": 1024, "Memory": 512},
        "PullStartedAt": at,
        "PullStoppedAt": at,
        "ExecutionStoppedAt": at,
        "AvailabilityZone": AVAILABILITY_ZONE,
    })
}

pub fn sample_stats() -> DockerStats {
    DockerStats(json!({
        "read": "2026-10-17T08:30:00Z",
        "num_procs": 1,
        "memory_stats": {"usage": 1048576},
    }))
}

pub struct Harness {
    pub log: Arc<CallLog>,
    pub engine: Arc<CountingEngineState>,
    pub credentials: Arc<CountingCredentials>,
    pub stats: Arc<CountingStats>,
    pub tags: Arc<CountingTags>,
    pub audit: Arc<RecordingAudit>,
    pub server: Arc<TaskServer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    /// Fixture task `t1` with one container, reachable from [`REMOTE_ADDR`]
    /// and through [`V3_ENDPOINT_ID`]
    pub fn with_config(config: ServerConfig) -> Self {
        let log = Arc::new(CallLog::default());

        let state = MemoryEngineState::new();
        state.add_task(sleep_task());
        state.add_container(TASK_ARN, sleepy_container(), Some(V3_ENDPOINT_ID));
        state.add_task_ip(remote_addr().ip(), TASK_ARN);

        let credentials = MemoryCredentialsManager::new();
        credentials.set(
            CREDENTIALS_ID,
            TaskIamRoleCredentials {
                task_arn: TASK_ARN.to_string(),
                credentials: IamRoleCredentials {
                    role_arn: ROLE_ARN.to_string(),
                    access_key_id: ACCESS_KEY_ID.to_string(),
                    secret_access_key: SECRET_ACCESS_KEY.to_string(),
                    session_token: "token".to_string(),
                    expiration: "2026-10-17T09:30:00Z".to_string(),
                },
            },
        );

        let stats = MemoryStatsEngine::new();
        stats.record(TASK_ARN, CONTAINER_ID, sample_stats());

        let engine = Arc::new(CountingEngineState {
            inner: state,
            log: log.clone(),
        });
        let credentials = Arc::new(CountingCredentials {
            inner: credentials,
            log: log.clone(),
        });
        let stats = Arc::new(CountingStats {
            inner: stats,
            log: log.clone(),
        });
        let tags = Arc::new(CountingTags {
            inner: MemoryTagStore::new(),
            hang: AtomicBool::new(false),
            log: log.clone(),
        });
        let audit = Arc::new(RecordingAudit::default());

        let server = TaskServer::new(
            Collaborators {
                engine_state: engine.clone(),
                credentials: credentials.clone(),
                stats: stats.clone(),
                control_plane: tags.clone(),
                audit: audit.clone(),
            },
            config,
        );

        Self {
            log,
            engine,
            credentials,
            stats,
            tags,
            audit,
            server,
        }
    }

    pub fn router_from(&self, addr: SocketAddr) -> Router {
        self.server.router().layer(MockConnectInfo(addr))
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        self.request_from(remote_addr(), Method::GET, uri).await
    }

    pub async fn get_from(&self, addr: SocketAddr, uri: &str) -> (StatusCode, Vec<u8>) {
        self.request_from(addr, Method::GET, uri).await
    }

    pub async fn request_from(
        &self,
        addr: SocketAddr,
        method: Method,
        uri: &str,
    ) -> (StatusCode, Vec<u8>) {
        let response = self
            .router_from(addr)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("user-agent", "aws-sdk-go/1.0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    pub async fn get_json(&self, uri: &str) -> (StatusCode, Value) {
        let (status, body) = self.get(uri).await;
        (status, serde_json::from_slice(&body).unwrap())
    }
}

pub fn remote_addr() -> SocketAddr {
    REMOTE_ADDR.parse().unwrap()
}

pub fn unknown_remote_addr() -> SocketAddr {
    UNKNOWN_REMOTE_ADDR.parse().unwrap()
}
