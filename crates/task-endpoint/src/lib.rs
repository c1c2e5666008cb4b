//! Task metadata and credentials endpoint server
//!
//! This crate provides:
//! - Path routing for the v1, v2 and v3 endpoint families
//! - Caller identity resolution by source address or v3 endpoint id
//! - Credentials lookups with audit logging
//! - Task and container metadata documents, optionally with resource tags
//! - Docker stats passthrough
//! - Token-bucket rate limiting and Prometheus metrics

pub mod audit;
pub mod collaborators;
pub mod credentials;
pub mod error;
pub mod identity;
pub mod lookup;
pub mod memory;
pub mod metadata;
pub mod models;
pub mod observability;
pub mod rate_limit;
pub mod router;
pub mod server;
pub mod stats;

pub use audit::{AuditEntry, AuditLogger, FileAuditLogger, TracingAuditLogger};
pub use collaborators::{ControlPlaneClient, CredentialsManager, EngineState, StatsEngine};
pub use error::{AuditError, EndpointError, StatsError, TagsError};
pub use lookup::Lookup;
pub use memory::{MemoryCredentialsManager, MemoryEngineState, MemoryStatsEngine, MemoryTagStore};
pub use models::*;
pub use observability::{EndpointMetrics, StructuredLogger};
pub use server::{Collaborators, ServerConfig, TaskServer};
