//! 资源池配置
//!
//! Established once at process start and passed by reference into the pool.
//! Sources are layered: a TOML or JSON file first, then `RESOURCE_POOL__*`
//! environment variables (`RESOURCE_POOL__MAXIMUM_SIZE=2048`,
//! `RESOURCE_POOL__BACKEND_CONNECTION__PROVIDER=local`, ...).
//!
//! ```toml
//! namespace_key = "cc-resources"
//! maximum_size = 536870912
//!
//! [backend_connection]
//! provider = "local"
//! root = "/var/vcap/store/resource_pool"
//! ```

use crate::error::{PoolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "RESOURCE_POOL";

/// Pool configuration root
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PoolConfiguration {
    /// Logical bucket/prefix isolating this pool's objects from others on the same backend
    #[validate(length(min = 1, max = 255), custom(function = "validate_namespace_key"))]
    pub namespace_key: String,

    /// Upper bound (bytes) for any single stored object
    #[validate(range(min = 1))]
    pub maximum_size: u64,

    pub backend_connection: BackendConnection,

    #[serde(default)]
    #[validate(nested)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Namespace keys name one directory under the local root and one path
/// segment on the remote store: `[A-Za-z0-9._-]+`, never `.` or `..`
pub fn validate_namespace_key(value: &str) -> std::result::Result<(), ValidationError> {
    let single_segment = !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if single_segment {
        Ok(())
    } else {
        Err(ValidationError::new("namespace_key").with_message(
            format!("namespace_key must be a single path segment, got {:?}", value).into(),
        ))
    }
}

/// Storage provider selector
///
/// Parsed case-insensitively. `aws`, `s3` and `remote` all select the remote
/// object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Provider {
    Local,
    Remote,
    Memory,
}

impl TryFrom<String> for Provider {
    type Error = PoolError;

    fn try_from(value: String) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Ok(Provider::Local),
            "remote" | "aws" | "s3" => Ok(Provider::Remote),
            "memory" | "mock" => Ok(Provider::Memory),
            other => Err(PoolError::configuration(format!(
                "unknown backend provider: {:?}",
                other
            ))),
        }
    }
}

impl From<Provider> for String {
    fn from(provider: Provider) -> Self {
        provider.to_string()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Local => "local",
            Provider::Remote => "remote",
            Provider::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Access credentials for the remote variant; opaque to the pool
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(alias = "aws_access_key_id")]
    pub access_key_id: String,
    #[serde(alias = "aws_secret_access_key")]
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Backend connection profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConnection {
    pub provider: Provider,

    /// Root directory (local provider)
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Base URL of the object store (remote provider)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// Per-request timeout for the remote provider
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl BackendConnection {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            provider: Provider::Local,
            root: Some(root.into()),
            endpoint: None,
            credentials: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }

    pub fn memory() -> Self {
        Self {
            provider: Provider::Memory,
            root: None,
            endpoint: None,
            credentials: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }

    pub fn remote(endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            provider: Provider::Remote,
            root: None,
            endpoint: Some(endpoint.into()),
            credentials: Some(credentials),
            request_timeout_seconds: default_request_timeout(),
        }
    }

    /// 验证提供者所需的字段
    pub fn validate_profile(&self) -> Result<()> {
        match self.provider {
            Provider::Local => {
                if self.root.is_none() {
                    return Err(PoolError::configuration(
                        "local provider requires backend_connection.root",
                    ));
                }
            }
            Provider::Remote => {
                match self.endpoint.as_deref() {
                    Some(endpoint) if endpoint.starts_with("http://") || endpoint.starts_with("https://") => {}
                    Some(endpoint) => {
                        return Err(PoolError::configuration(format!(
                            "remote endpoint must be an http(s) URL, got {:?}",
                            endpoint
                        )))
                    }
                    None => {
                        return Err(PoolError::configuration(
                            "remote provider requires backend_connection.endpoint",
                        ))
                    }
                }
                match &self.credentials {
                    Some(c) if !c.access_key_id.is_empty() && !c.secret_access_key.is_empty() => {}
                    _ => {
                        return Err(PoolError::configuration(
                            "remote provider requires backend_connection.credentials",
                        ))
                    }
                }
                if self.request_timeout_seconds == 0 {
                    return Err(PoolError::configuration(
                        "request_timeout_seconds must be greater than 0",
                    ));
                }
            }
            Provider::Memory => {}
        }
        Ok(())
    }
}

/// Worker pool sizing for the reactor-thread bridge
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BridgeConfig {
    #[serde(default = "default_worker_threads")]
    #[validate(range(min = 1, max = 1024))]
    pub worker_threads: usize,
}

fn default_worker_threads() -> usize {
    num_cpus::get().max(1)
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    /// Directory for a daily rolling log file; stderr only when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            directory: None,
        }
    }
}

impl PoolConfiguration {
    pub fn new(
        namespace_key: impl Into<String>,
        maximum_size: u64,
        backend_connection: BackendConnection,
    ) -> Self {
        Self {
            namespace_key: namespace_key.into(),
            maximum_size,
            backend_connection,
            bridge: BridgeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// In-memory configuration for isolated test pools
    pub fn for_tests(maximum_size: u64) -> Self {
        Self::new("test-cc-resources", maximum_size, BackendConnection::memory())
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.bridge.worker_threads = worker_threads;
        self
    }

    /// Load from a TOML/JSON file with environment overrides, then validate
    ///
    /// # Errors
    ///
    /// `PoolError::Configuration` if the file is missing or malformed, or the
    /// resulting configuration is invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PoolError::configuration(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                PoolError::configuration(format!("failed to read {}: {}", path.display(), e))
            })?;

        let configuration: Self = settings.try_deserialize().map_err(|e| {
            PoolError::configuration(format!("failed to parse {}: {}", path.display(), e))
        })?;

        configuration.validate_all()?;
        Ok(configuration)
    }

    /// Report where the configuration came from
    ///
    /// Separate from [`PoolConfiguration::load`] because logging is only
    /// installed once the configuration is known.
    pub fn log_loaded(&self, path: &Path) {
        tracing::info!(
            path = %path.display(),
            namespace_key = %self.namespace_key,
            provider = %self.backend_connection.provider,
            maximum_size = self.maximum_size,
            worker_threads = self.bridge.worker_threads,
            "Loaded resource pool configuration"
        );
    }

    /// Field constraints plus provider-specific requirements
    pub fn validate_all(&self) -> Result<()> {
        self.validate()
            .map_err(|e| PoolError::configuration(e.to_string()))?;
        self.backend_connection.validate_profile()?;

        tracing::debug!("Resource pool configuration validated successfully");
        Ok(())
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| PoolError::Internal(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;

        tracing::info!("Saved resource pool configuration to: {}", path.display());
        Ok(())
    }
}
