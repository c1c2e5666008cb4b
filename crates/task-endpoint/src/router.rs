//! Path matching for the three protocol versions
//!
//! Matching is purely syntactic: a path either has a recognized shape and
//! yields a [`Route`], or it does not and the request is a 404. Whether the
//! ids inside a recognized shape resolve to anything is decided later, and
//! failures there are 400s.
//!
//! Shapes:
//! - `/v1/credentials?id=<id>`
//! - `/v2/credentials[/<id>]`
//! - `/v2/metadata[/[<container-id>]]`, `/v2/metadataWithTags[/[<container-id>]]`
//! - `/v2/stats[/[<container-id>]]`
//! - `/v3/<endpoint-id>[/task|/taskWithTags|/stats|/task/stats]`
//!
//! v2 container ids take the rest of the path, slashes included. v3 endpoint
//! ids never contain a slash but may be empty.

use crate::credentials::{CREDENTIALS_ID_QUERY_PARAMETER, V1_CREDENTIALS_PATH, V2_CREDENTIALS_PATH};

const V2_PREFIX: &str = "/v2/";
const V3_PREFIX: &str = "/v3/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    CredentialsV1 { credentials_id: Option<String> },
    CredentialsV2 { credentials_id: String },
    V2TaskMetadata { with_tags: bool },
    V2ContainerMetadata { container_id: String },
    V2TaskStats,
    V2ContainerStats { container_id: String },
    V3ContainerMetadata { endpoint_id: String },
    V3TaskMetadata { endpoint_id: String, with_tags: bool },
    V3ContainerStats { endpoint_id: String },
    V3TaskStats { endpoint_id: String },
}

impl Route {
    /// Protocol version label
    pub fn version(&self) -> &'static str {
        match self {
            Self::CredentialsV1 { .. } => "v1",
            Self::CredentialsV2 { .. }
            | Self::V2TaskMetadata { .. }
            | Self::V2ContainerMetadata { .. }
            | Self::V2TaskStats
            | Self::V2ContainerStats { .. } => "v2",
            Self::V3ContainerMetadata { .. }
            | Self::V3TaskMetadata { .. }
            | Self::V3ContainerStats { .. }
            | Self::V3TaskStats { .. } => "v3",
        }
    }

    /// Endpoint label
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::CredentialsV1 { .. } | Self::CredentialsV2 { .. } => "credentials",
            Self::V2TaskMetadata { with_tags: false }
            | Self::V3TaskMetadata {
                with_tags: false, ..
            } => "task_metadata",
            Self::V2TaskMetadata { with_tags: true }
            | Self::V3TaskMetadata {
                with_tags: true, ..
            } => "task_metadata_with_tags",
            Self::V2ContainerMetadata { .. } | Self::V3ContainerMetadata { .. } => {
                "container_metadata"
            }
            Self::V2TaskStats | Self::V3TaskStats { .. } => "task_stats",
            Self::V2ContainerStats { .. } | Self::V3ContainerStats { .. } => "container_stats",
        }
    }
}

/// Match a request path (and query, for v1 credentials) to a route
pub fn match_route(path: &str, query: Option<&str>) -> Option<Route> {
    if path == V1_CREDENTIALS_PATH {
        return Some(Route::CredentialsV1 {
            credentials_id: query.and_then(credentials_id_from_query),
        });
    }
    if path == V2_CREDENTIALS_PATH {
        return Some(Route::CredentialsV2 {
            credentials_id: String::new(),
        });
    }
    if let Some(id) = path
        .strip_prefix(V2_CREDENTIALS_PATH)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        return Some(Route::CredentialsV2 {
            credentials_id: id.to_string(),
        });
    }
    if let Some(rest) = path.strip_prefix(V2_PREFIX) {
        return match_v2(rest);
    }
    if let Some(rest) = path.strip_prefix(V3_PREFIX) {
        return match_v3(rest);
    }
    None
}

fn match_v2(rest: &str) -> Option<Route> {
    let (base, container_id) = rest.split_once('/').unwrap_or((rest, ""));
    let container_id = (!container_id.is_empty()).then(|| container_id.to_string());

    match (base, container_id) {
        ("metadata", None) => Some(Route::V2TaskMetadata { with_tags: false }),
        ("metadataWithTags", None) => Some(Route::V2TaskMetadata { with_tags: true }),
        ("metadata" | "metadataWithTags", Some(container_id)) => {
            Some(Route::V2ContainerMetadata { container_id })
        }
        ("stats", None) => Some(Route::V2TaskStats),
        ("stats", Some(container_id)) => Some(Route::V2ContainerStats { container_id }),
        _ => None,
    }
}

fn match_v3(rest: &str) -> Option<Route> {
    let mut segments = rest.split('/');
    let endpoint_id = segments.next().unwrap_or_default().to_string();
    let tail: Vec<&str> = segments.collect();

    match tail.as_slice() {
        [] => Some(Route::V3ContainerMetadata { endpoint_id }),
        ["task"] => Some(Route::V3TaskMetadata {
            endpoint_id,
            with_tags: false,
        }),
        ["taskWithTags"] => Some(Route::V3TaskMetadata {
            endpoint_id,
            with_tags: true,
        }),
        ["stats"] => Some(Route::V3ContainerStats { endpoint_id }),
        ["task", "stats"] => Some(Route::V3TaskStats { endpoint_id }),
        _ => None,
    }
}

fn credentials_id_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == CREDENTIALS_ID_QUERY_PARAMETER)
        .map(|(_, value)| value.into_owned())
}
