//! Runtime configuration for the backend.
//!
//! Settings come from a JSON file whose path is read from `DQ_PIPELINE_CONFIG`
//! (`pipeline.json` when unset). A missing file means all defaults. A few
//! deployment settings can then be overridden from the environment.

use crate::error::{PipelineError, Result};
use crate::pipeline::PipelineSettings;
use crate::sources::SourceDescriptor;
use crate::validation::schema::{SchemaRegistry, TableSchemaSpec, DEFAULT_MAX_DUPLICATE_KEYS};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "DQ_PIPELINE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "pipeline.json";

const DATABASE_PATH_ENV: &str = "DQ_DATABASE_PATH";
const HOST_ENV: &str = "DQ_HOST";
const PORT_ENV: &str = "DQ_PORT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file holding staging, quarantine and dimension tables.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Where uploaded CSV exports are kept, named by their MD5 digest.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Rows per bulk insert statement.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters kept of an aggregated validation message.
    #[serde(default = "default_max_error_len")]
    pub max_error_len: usize,
    /// Applies to every schema that does not set its own limit.
    #[serde(default = "default_max_duplicate_keys")]
    pub max_duplicate_keys: usize,
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
    /// Replaces the built-in staging schemas when non-empty.
    #[serde(default)]
    pub schemas: Vec<TableSchemaSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            host: default_host(),
            port: default_port(),
            upload_dir: default_upload_dir(),
            chunk_size: default_chunk_size(),
            max_error_len: default_max_error_len(),
            max_duplicate_keys: default_max_duplicate_keys(),
            sources: Vec::new(),
            schemas: Vec::new(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("articles.sqlite")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_chunk_size() -> usize {
    1000
}

fn default_max_error_len() -> usize {
    1000
}

fn default_max_duplicate_keys() -> usize {
    DEFAULT_MAX_DUPLICATE_KEYS
}

impl AppConfig {
    /// Loads the file named by `DQ_PIPELINE_CONFIG` and applies environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_path(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config: AppConfig = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        info!(
            "Loaded config from {} ({} sources)",
            path.display(),
            config.sources.len()
        );
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(DATABASE_PATH_ENV) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(host) = lookup(HOST_ENV) {
            self.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port
                .parse()
                .map_err(|_| PipelineError::Config(format!("{} is not a valid port: '{}'", PORT_ENV, port)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Config("chunk_size must be positive".to_string()));
        }
        if self.max_error_len == 0 {
            return Err(PipelineError::Config("max_error_len must be positive".to_string()));
        }
        let mut names = HashSet::new();
        for source in &self.sources {
            if !names.insert(source.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "source '{}' is declared more than once",
                    source.name
                )));
            }
        }
        Ok(())
    }

    pub fn registry(&self) -> Result<SchemaRegistry> {
        if self.schemas.is_empty() {
            SchemaRegistry::builtin(self.max_duplicate_keys)
        } else {
            SchemaRegistry::compile(&self.schemas, self.max_duplicate_keys)
        }
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            chunk_size: self.chunk_size,
            max_error_len: self.max_error_len,
        }
    }
}
