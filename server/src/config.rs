//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Command line**: `--listen`
//! 2. **Environment variables**: `TERMGATE_LISTEN`,
//!    `TERMGATE_CONTROLLER_PASSWORD`, `TERMGATE_VIEWER_PASSWORD`
//! 3. **Config file**: path via `--config <path>`, or `termgate.toml` in CWD
//! 4. **Compiled defaults**: see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:7878"
//! flush_interval_ms = 16
//! refresh_interval_ms = 1000
//! max_frame_size = 1048576     # 1 MB
//! max_header_bytes = 16384
//! viewer_send_timeout_ms = 2000
//! default_rows = 24
//! default_cols = 80
//!
//! [auth]
//! controller_password = "drive"   # omit to allow anyone to drive
//! viewer_password = "watch"       # omit to allow anyone to watch
//!
//! [logging]
//! level = "info"
//!
//! [[assets]]
//! path = "/favicon.ico"
//! content_type = "image/x-icon"
//! file = "static/favicon.ico"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::assets::Asset;

/// Default config file looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "termgate.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to read asset {path}: {source}")]
    Asset {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Extra static files served by exact path.
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

/// Listener, transport and rendering-cadence settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `127.0.0.1:7878`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Output flush tick in milliseconds (default 16).
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// How often an idle `poll` reports `Refresh` (default 1000 ms).
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Largest client frame payload accepted, in bytes (default 1 MB).
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Largest request line + headers accepted, in bytes (default 16 KB).
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    /// A viewer whose send takes longer than this is dropped (default 2000 ms).
    #[serde(default = "default_viewer_send_timeout_ms")]
    pub viewer_send_timeout_ms: u64,
    /// Terminal rows assumed until the client reports a resize (default 24).
    #[serde(default = "default_rows")]
    pub default_rows: u16,
    /// Terminal columns assumed until the client reports a resize (default 80).
    #[serde(default = "default_cols")]
    pub default_cols: u16,
}

/// Per-role passwords. `None` disables the check for that role.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    pub controller_password: Option<String>,
    pub viewer_password: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// An extra asset read from disk at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    /// Exact request path, e.g. `/favicon.ico`.
    pub path: String,
    pub content_type: String,
    /// File to serve, relative to the working directory.
    pub file: PathBuf,
}

fn default_listen() -> String {
    "127.0.0.1:7878".to_string()
}
fn default_flush_interval_ms() -> u64 {
    16
}
fn default_refresh_interval_ms() -> u64 {
    1000
}
fn default_max_frame_size() -> usize {
    1024 * 1024 // 1 MB
}
fn default_max_header_bytes() -> usize {
    16 * 1024
}
fn default_viewer_send_timeout_ms() -> u64 {
    2000
}
fn default_rows() -> u16 {
    24
}
fn default_cols() -> u16 {
    80
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            flush_interval_ms: default_flush_interval_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
            max_frame_size: default_max_frame_size(),
            max_header_bytes: default_max_header_bytes(),
            viewer_send_timeout_ms: default_viewer_send_timeout_ms(),
            default_rows: default_rows(),
            default_cols: default_cols(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, that file must exist. Otherwise `termgate.toml` in
    /// the current directory is used when present, else compiled defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;
        if server.flush_interval_ms == 0 {
            return Err(ConfigError::Invalid("server.flush_interval_ms must be > 0".into()));
        }
        if server.viewer_send_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "server.viewer_send_timeout_ms must be > 0".into(),
            ));
        }
        if server.default_rows == 0 || server.default_cols == 0 {
            return Err(ConfigError::Invalid(
                "server.default_rows and server.default_cols must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `TERMGATE_*` overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(listen) = lookup("TERMGATE_LISTEN") {
            self.server.listen = listen;
        }
        if let Some(password) = lookup("TERMGATE_CONTROLLER_PASSWORD") {
            self.auth.controller_password = Some(password);
        }
        if let Some(password) = lookup("TERMGATE_VIEWER_PASSWORD") {
            self.auth.viewer_password = Some(password);
        }
    }

    /// Read every configured extra asset from disk.
    pub fn load_assets(&self) -> Result<Vec<Asset>, ConfigError> {
        self.assets
            .iter()
            .map(|a| {
                let body = std::fs::read(&a.file).map_err(|source| ConfigError::Asset {
                    path: a.file.clone(),
                    source,
                })?;
                Ok(Asset::new(a.path.clone(), a.content_type.clone(), body))
            })
            .collect()
    }
}
