//! Application configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CatalogLoader};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Master seed for the draw streams. Drawn from entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    /// Alternate content tables; the built-in tables are used when absent.
    #[serde(default)]
    pub content: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub autoplay: AutoplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoplayConfig {
    #[serde(default = "default_years")]
    pub years: u32,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_event_buffer() -> usize {
    64
}

fn default_years() -> u32 {
    20
}

fn default_mode() -> String {
    "campaign".to_string()
}

fn default_region() -> String {
    "coastal".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            years: default_years(),
            mode: default_mode(),
            region: default_region(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            seed: None,
            storage_dir: default_storage_dir(),
            content: None,
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
            autoplay: AutoplayConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config = serde_yaml::from_str(text).context("Failed to parse configuration")?;
        Ok(config)
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&data).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Reads `path` when given, otherwise every field takes its default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_yaml(path),
            None => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn catalog(&self) -> Result<Catalog> {
        match &self.content {
            Some(path) => CatalogLoader::new(".").load(path),
            None => Catalog::builtin().context("Built-in content tables are invalid"),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
