// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use url::Url;

/// Where the nine record tables are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Directory searched recursively for `<table>.csv`.
    Csv { path: PathBuf },
    /// Directory searched recursively for `<table>.parquet`.
    Parquet { path: PathBuf },
    /// Zip archive with `<table>.csv` entries.
    Zip { path: PathBuf },
    /// SQLite database with one table per category.
    Sqlite { path: PathBuf },
}

impl SourceConfig {
    pub fn path(&self) -> &Path {
        match self {
            SourceConfig::Csv { path }
            | SourceConfig::Parquet { path }
            | SourceConfig::Zip { path }
            | SourceConfig::Sqlite { path } => path,
        }
    }

    fn with_path(&self, path: PathBuf) -> Self {
        match self {
            SourceConfig::Csv { .. } => SourceConfig::Csv { path },
            SourceConfig::Parquet { .. } => SourceConfig::Parquet { path },
            SourceConfig::Zip { .. } => SourceConfig::Zip { path },
            SourceConfig::Sqlite { .. } => SourceConfig::Sqlite { path },
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Csv {
            path: PathBuf::from("data"),
        }
    }
}

/// GeoJSON boundary set used to check region names for map output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryConfig {
    pub url: Url,
    /// Feature property holding the region name.
    #[serde(default = "default_name_property")]
    pub name_property: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub source: SourceConfig,
    /// Rows kept by ranked views when the caller does not say otherwise.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub boundary: Option<BoundaryConfig>,
}

fn default_top_n() -> usize {
    10
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_name_property() -> String {
    "ST_NM".to_string()
}

impl Default for PulseConfig {
    fn default() -> Self {
        PulseConfig {
            source: SourceConfig::default(),
            top_n: default_top_n(),
            log_filter: default_log_filter(),
            boundary: None,
        }
    }
}

impl PulseConfig {
    /// Parse a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing pulsedash config")
    }

    /// Load `path` if given (it must exist), otherwise `pulsedash.yaml` when
    /// present, otherwise defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {:?}", p))?;
                Self::from_yaml(&text).with_context(|| format!("in {:?}", p))?
            }
            None => {
                let fallback = Path::new("pulsedash.yaml");
                if fallback.is_file() {
                    let text = fs::read_to_string(fallback)
                        .with_context(|| format!("reading config {:?}", fallback))?;
                    Self::from_yaml(&text)?
                } else {
                    debug!("no config file, using defaults");
                    PulseConfig::default()
                }
            }
        };
        Ok(config.with_env_overrides(|key| env::var(key).ok()))
    }

    /// Environment variables:
    /// - `PULSE_SOURCE_PATH` replaces the source path, keeping its kind
    /// - `PULSE_TOP_N` replaces `top_n`
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup("PULSE_SOURCE_PATH") {
            self.source = self.source.with_path(PathBuf::from(path));
        }
        if let Some(raw) = lookup("PULSE_TOP_N") {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.top_n = n,
                _ => warn!(value = %raw, "ignoring invalid PULSE_TOP_N"),
            }
        }
        self
    }
}
