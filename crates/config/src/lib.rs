//! Layered configuration for the interactives service.
//!
//! Values are resolved in order, later layers winning:
//! 1. Built-in defaults ([`Config::default()`]).
//! 2. An optional configuration file (TOML, YAML or JSON, by extension).
//!    Without an explicit path, `config.toml` in the platform config
//!    directory is used if it exists.
//! 3. Environment variables prefixed with `INTERACTIVES_`. Nested keys are
//!    separated by a double underscore, e.g. `INTERACTIVES_STORAGE__BUCKET`.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "INTERACTIVES_";
const DEFAULT_REGION: &str = "eu-west-1";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "interactives")
}

/// Directory for persistent data, falling back to the working directory.
fn data_dir() -> PathBuf {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf()).unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// When disabled, the service only serves published records, read-only.
    pub publishing_enabled: bool,
    /// Root of the public URLs handed out for each interactive.
    pub site_domain: String,
    /// Reject uploads whose content is already held by an active record.
    pub validate_sha: bool,
    pub max_upload_size_mb: u64,
    /// How many times a colliding generated identifier is regenerated.
    pub max_collisions: u32,
    /// Seconds to wait for in-flight requests on shutdown.
    pub graceful_shutdown_timeout: u64,
    pub pagination: PaginationConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    /// Where multipart uploads are spooled; the system temp dir if unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 27500)),
            publishing_enabled: true,
            site_domain: "http://localhost:27400".to_string(),
            validate_sha: true,
            max_upload_size_mb: 2500,
            max_collisions: 10,
            graceful_shutdown_timeout: 5,
            pagination: PaginationConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub default_limit: u32,
    pub default_offset: u32,
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { default_limit: 20, default_offset: 0, max_limit: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: data_dir().join("interactives.db") }
    }
}

/// Where uploaded archives are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default = "default_region")]
        region: String,
        /// Custom endpoint for S3-compatible services.
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        key_id: String,
        #[serde(default)]
        key_secret: String,
    },
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local { root: data_dir().join("uploads") }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// An explicit `path` must exist; the default location is only used when
    /// present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::Invalid(format!("configuration file {} does not exist", path.display())));
                }
                figment = figment.merge(Self::file_provider(path)?);
            },
            None => {
                if let Some(default) = project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
                    && default.is_file()
                {
                    tracing::debug!(path = %default.display(), "using default configuration file");
                    figment = figment.merge(Toml::file(default));
                }
            },
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn file_provider(path: &Path) -> Result<Figment> {
        let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => Figment::from(Toml::file(path)),
            Some("yaml" | "yml") => Figment::from(Yaml::file(path)),
            Some("json") => Figment::from(Json::file(path)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
        })
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_size_mb == 0 {
            exn::bail!(ErrorKind::Invalid("max_upload_size_mb must be greater than zero".to_string()));
        }
        if self.max_collisions == 0 {
            exn::bail!(ErrorKind::Invalid("max_collisions must be greater than zero".to_string()));
        }
        if self.pagination.max_limit == 0 {
            exn::bail!(ErrorKind::Invalid("pagination.max_limit must be greater than zero".to_string()));
        }
        if self.pagination.default_limit > self.pagination.max_limit {
            exn::bail!(ErrorKind::Invalid(format!(
                "pagination.default_limit ({}) exceeds pagination.max_limit ({})",
                self.pagination.default_limit, self.pagination.max_limit
            )));
        }
        if let StorageConfig::S3 { bucket, .. } = &self.storage
            && bucket.trim().is_empty()
        {
            exn::bail!(ErrorKind::Invalid("storage.bucket must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown_timeout)
    }
}
