//! Task-facing HTTP server
//!
//! A single fallback handler dispatches every request through
//! [`match_route`]; the token bucket sits in front of it so rejected
//! requests never reach a collaborator.

use crate::audit::AuditLogger;
use crate::collaborators::{ControlPlaneClient, CredentialsManager, EngineState, StatsEngine};
use crate::credentials::{CredentialsHandler, CredentialsRequest, CredentialsVersion};
use crate::error::EndpointError;
use crate::identity::{IdentityResolver, IdentitySource};
use crate::metadata::{MetadataAssembler, MetadataContext};
use crate::observability::EndpointMetrics;
use crate::rate_limit::{TokenBucket, DEFAULT_BURST, DEFAULT_STEADY_STATE_RATE};
use crate::router::{match_route, Route};
use crate::stats::StatsHandler;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::USER_AGENT, HeaderMap, Method, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

pub const DEFAULT_PORT: u16 = 51679;

/// Minimum gap between the tag fetch deadline and the request deadline
pub const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: IpAddr,
    pub port: u16,
    pub cluster: String,
    pub availability_zone: String,
    pub container_instance_arn: String,
    pub steady_state_rate: f64,
    pub burst: u32,
    pub tag_fetch_timeout: Duration,
    pub tag_fetch_failure_fatal: bool,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            cluster: String::new(),
            availability_zone: String::new(),
            container_instance_arn: String::new(),
            steady_state_rate: DEFAULT_STEADY_STATE_RATE,
            burst: DEFAULT_BURST,
            tag_fetch_timeout: Duration::from_secs(5),
            tag_fetch_failure_fatal: false,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.port)
    }

    /// Raise `request_timeout` so a tag fetch always hits its own deadline
    /// first and degrades instead of timing out the whole request.
    pub fn normalized(mut self) -> Self {
        let floor = self.tag_fetch_timeout.saturating_add(REQUEST_TIMEOUT_MARGIN);
        if self.request_timeout < floor {
            warn!(
                request_timeout_ms = self.request_timeout.as_millis() as u64,
                tag_fetch_timeout_ms = self.tag_fetch_timeout.as_millis() as u64,
                adjusted_ms = floor.as_millis() as u64,
                "Request timeout does not exceed tag fetch timeout, raising it"
            );
            self.request_timeout = floor;
        }
        self
    }
}

/// Everything the server reads from or reports to
#[derive(Clone)]
pub struct Collaborators {
    pub engine_state: Arc<dyn EngineState>,
    pub credentials: Arc<dyn CredentialsManager>,
    pub stats: Arc<dyn StatsEngine>,
    pub control_plane: Arc<dyn ControlPlaneClient>,
    pub audit: Arc<dyn AuditLogger>,
}

pub struct TaskServer {
    collaborators: Collaborators,
    config: ServerConfig,
    limiter: TokenBucket,
    metrics: EndpointMetrics,
}

impl TaskServer {
    pub fn new(collaborators: Collaborators, config: ServerConfig) -> Arc<Self> {
        let config = config.normalized();
        let limiter = TokenBucket::new(config.steady_state_rate, config.burst);
        Arc::new(Self {
            collaborators,
            config,
            limiter,
            metrics: EndpointMetrics::new(),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the axum router. Layers run outermost first: trace, timeout,
    /// rate limit, then dispatch.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .fallback(handle_request)
            .layer(middleware::from_fn_with_state(self.clone(), rate_limit))
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    /// Serve until `shutdown` resolves
    pub async fn serve(
        self: Arc<Self>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %addr, "Starting task endpoint server");

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!("Task endpoint server stopped");
        Ok(())
    }

    async fn dispatch(&self, route: &Route, request: &RequestInfo<'_>) -> Response {
        match route {
            Route::CredentialsV1 { credentials_id } => {
                self.credentials(CredentialsVersion::V1, credentials_id.as_deref(), request)
            }
            Route::CredentialsV2 { credentials_id } => {
                self.credentials(CredentialsVersion::V2, Some(credentials_id.as_str()), request)
            }
            _ => match self.metadata_or_stats(route, request.remote_ip()).await {
                Ok(response) => response,
                Err(e) => {
                    debug!(path = %request.uri, error = %e, "Request failed");
                    e.into_response()
                }
            },
        }
    }

    fn credentials(
        &self,
        version: CredentialsVersion,
        credentials_id: Option<&str>,
        request: &RequestInfo<'_>,
    ) -> Response {
        let handler = CredentialsHandler {
            manager: self.collaborators.credentials.as_ref(),
            audit: self.collaborators.audit.as_ref(),
            metrics: &self.metrics,
            cluster: &self.config.cluster,
            container_instance_arn: &self.config.container_instance_arn,
        };
        let request_uri = request.uri.to_string();
        let credentials_request = CredentialsRequest {
            version,
            credentials_id,
            source_addr: request.remote_addr,
            request_uri: &request_uri,
            user_agent: request.user_agent,
        };

        match handler.get_credentials(&credentials_request) {
            Ok(response) => Json(response).into_response(),
            Err(e) => e.into_response(),
        }
    }

    async fn metadata_or_stats(
        &self,
        route: &Route,
        remote_ip: Option<IpAddr>,
    ) -> Result<Response, EndpointError> {
        let state = self.collaborators.engine_state.as_ref();
        let resolver = IdentityResolver::new(state);
        let assembler = MetadataAssembler::new(
            state,
            self.collaborators.control_plane.as_ref(),
            &self.metrics,
            self.metadata_context(),
        );
        let stats = StatsHandler {
            state,
            engine: self.collaborators.stats.as_ref(),
            metrics: &self.metrics,
        };
        let by_ip = IdentitySource::RemoteIp(remote_ip);

        let response = match route {
            Route::V2TaskMetadata { with_tags } => {
                let task_arn = resolver.task_arn(by_ip)?;
                task_document(&assembler, &task_arn, *with_tags).await?
            }
            Route::V2ContainerMetadata { container_id } => {
                let task_arn = resolver.task_arn(by_ip)?;
                let container_id = resolver.container_id(by_ip, Some(container_id.as_str()))?;
                Json(assembler.container_metadata(&container_id, Some(task_arn.as_str()))?)
                    .into_response()
            }
            Route::V2TaskStats => {
                let task_arn = resolver.task_arn(by_ip)?;
                Json(stats.task_stats(&task_arn).await?).into_response()
            }
            Route::V2ContainerStats { container_id } => {
                let scope = resolver.container_scope(by_ip, Some(container_id.as_str()))?;
                Json(
                    stats
                        .container_stats(&scope.task_arn, &scope.container_id)
                        .await?,
                )
                .into_response()
            }
            Route::V3ContainerMetadata { endpoint_id } => {
                let source = IdentitySource::EndpointId(endpoint_id);
                let container_id = resolver.container_id(source, None)?;
                Json(assembler.container_metadata(&container_id, None)?).into_response()
            }
            Route::V3TaskMetadata {
                endpoint_id,
                with_tags,
            } => {
                let task_arn = resolver.task_arn(IdentitySource::EndpointId(endpoint_id))?;
                task_document(&assembler, &task_arn, *with_tags).await?
            }
            Route::V3ContainerStats { endpoint_id } => {
                let scope = resolver.container_scope(IdentitySource::EndpointId(endpoint_id), None)?;
                Json(
                    stats
                        .container_stats(&scope.task_arn, &scope.container_id)
                        .await?,
                )
                .into_response()
            }
            Route::V3TaskStats { endpoint_id } => {
                let task_arn = resolver.task_arn(IdentitySource::EndpointId(endpoint_id))?;
                Json(stats.task_stats(&task_arn).await?).into_response()
            }
            Route::CredentialsV1 { .. } | Route::CredentialsV2 { .. } => {
                return Err(EndpointError::NotFound)
            }
        };
        Ok(response)
    }

    fn metadata_context(&self) -> MetadataContext<'_> {
        MetadataContext {
            cluster: &self.config.cluster,
            availability_zone: &self.config.availability_zone,
            container_instance_arn: &self.config.container_instance_arn,
            tag_fetch_timeout: self.config.tag_fetch_timeout,
            tag_fetch_failure_fatal: self.config.tag_fetch_failure_fatal,
        }
    }
}

async fn task_document(
    assembler: &MetadataAssembler<'_>,
    task_arn: &str,
    with_tags: bool,
) -> Result<Response, EndpointError> {
    let document = if with_tags {
        assembler.task_metadata_with_tags(task_arn).await?
    } else {
        assembler.task_metadata(task_arn)?
    };
    Ok(Json(document).into_response())
}

/// Transport details of the request being dispatched
struct RequestInfo<'a> {
    uri: &'a Uri,
    remote_addr: Option<SocketAddr>,
    user_agent: Option<&'a str>,
}

impl RequestInfo<'_> {
    fn remote_ip(&self) -> Option<IpAddr> {
        self.remote_addr.map(|addr| addr.ip())
    }
}

async fn handle_request(
    State(server): State<Arc<TaskServer>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET {
        return EndpointError::MethodNotAllowed.into_response();
    }
    let Some(route) = match_route(uri.path(), uri.query()) else {
        debug!(path = %uri.path(), "No route for path");
        return EndpointError::NotFound.into_response();
    };

    let start = Instant::now();
    let request = RequestInfo {
        uri: &uri,
        remote_addr: connect_info.map(|ConnectInfo(addr)| addr),
        user_agent: headers.get(USER_AGENT).and_then(|value| value.to_str().ok()),
    };
    let response = server.dispatch(&route, &request).await;

    server.metrics.observe_request(
        route.version(),
        route.endpoint(),
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

async fn rate_limit(
    State(server): State<Arc<TaskServer>>,
    request: Request,
    next: Next,
) -> Response {
    if !server.limiter.try_acquire() {
        server.metrics.inc_rate_limited();
        debug!(path = %request.uri().path(), "Request rejected by rate limiter");
        return EndpointError::TooManyRequests.into_response();
    }
    next.run(request).await
}
