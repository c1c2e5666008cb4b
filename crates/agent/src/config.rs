//! Agent configuration

use anyhow::Result;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use task_endpoint::rate_limit::{DEFAULT_BURST, DEFAULT_STEADY_STATE_RATE};
use task_endpoint::server::DEFAULT_PORT;
use task_endpoint::ServerConfig;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "TASK_ENDPOINT_CONFIG";

const ENV_PREFIX: &str = "TASK_ENDPOINT";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Address the task-facing server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Port for health and metrics
    #[serde(default = "default_introspection_port")]
    pub introspection_port: u16,

    #[serde(default = "default_cluster")]
    pub cluster: String,

    #[serde(default)]
    pub availability_zone: String,

    #[serde(default)]
    pub container_instance_arn: String,

    /// Requests per second admitted once the burst is spent
    #[serde(default = "default_steady_state_rate")]
    pub steady_state_rate: f64,

    #[serde(default = "default_burst")]
    pub burst: u32,

    #[serde(default = "default_tag_fetch_timeout_ms")]
    pub tag_fetch_timeout_ms: u64,

    #[serde(default)]
    pub tag_fetch_failure_fatal: bool,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Write credentials audit entries here instead of the log stream
    #[serde(default)]
    pub audit_log_path: Option<PathBuf>,
}

fn default_listen_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_introspection_port() -> u16 {
    51678
}

fn default_cluster() -> String {
    "default".to_string()
}

fn default_steady_state_rate() -> f64 {
    DEFAULT_STEADY_STATE_RATE
}

fn default_burst() -> u32 {
    DEFAULT_BURST
}

fn default_tag_fetch_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl AgentConfig {
    /// Load configuration from the optional config file and environment
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::from_sources(file.as_deref())
    }

    /// Environment variables override values from `file`
    pub fn from_sources(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Server settings, with the request timeout kept above the tag fetch timeout
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            listen_addr: self.listen_addr,
            port: self.port,
            cluster: self.cluster.clone(),
            availability_zone: self.availability_zone.clone(),
            container_instance_arn: self.container_instance_arn.clone(),
            steady_state_rate: self.steady_state_rate,
            burst: self.burst,
            tag_fetch_timeout: Duration::from_millis(self.tag_fetch_timeout_ms),
            tag_fetch_failure_fatal: self.tag_fetch_failure_fatal,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
        .normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn from_toml(contents: &str) -> AgentConfig {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        AgentConfig::from_sources(Some(file.path())).unwrap()
    }

    #[test]
    fn test_defaults_match_server_defaults() {
        let config = from_toml("");
        let server = config.server_config();
        let defaults = ServerConfig::default();

        assert_eq!(server.socket_addr(), defaults.socket_addr());
        assert_eq!(server.steady_state_rate, defaults.steady_state_rate);
        assert_eq!(server.burst, defaults.burst);
        assert_eq!(server.tag_fetch_timeout, defaults.tag_fetch_timeout);
        assert_eq!(server.request_timeout, defaults.request_timeout);
        assert_eq!(server.request_timeout, Duration::from_secs(10));
        assert_eq!(config.introspection_port, 51678);
        assert_eq!(config.cluster, "default");
        assert!(config.audit_log_path.is_none());
    }

    #[test]
    fn test_file_values_flow_into_server_config() {
        let config = from_toml(
            r#"
            cluster = "prod"
            availability_zone = "us-west-2b"
            container_instance_arn = "arn:aws:ecs:us-west-2:123:container-instance/abc"
            steady_state_rate = 10.0
            burst = 20
            tag_fetch_timeout_ms = 250
            tag_fetch_failure_fatal = true
            audit_log_path = "/var/log/task-endpoint/audit.log"
            "#,
        );
        let server = config.server_config();

        assert_eq!(server.cluster, "prod");
        assert_eq!(server.availability_zone, "us-west-2b");
        assert_eq!(server.steady_state_rate, 10.0);
        assert_eq!(server.burst, 20);
        assert_eq!(server.tag_fetch_timeout, Duration::from_millis(250));
        assert!(server.tag_fetch_failure_fatal);
        assert_eq!(
            config.audit_log_path,
            Some(PathBuf::from("/var/log/task-endpoint/audit.log"))
        );
    }

    #[test]
    fn test_request_timeout_raised_above_tag_timeout() {
        let config = from_toml(
            r#"
            tag_fetch_timeout_ms = 8000
            request_timeout_ms = 8000
            "#,
        );
        let server = config.server_config();

        assert_eq!(server.tag_fetch_timeout, Duration::from_secs(8));
        assert_eq!(server.request_timeout, Duration::from_secs(9));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AgentConfig::from_sources(Some(Path::new("/nonexistent/agent.toml"))).is_err());
    }
}
