//! Pipeline configuration: credentials, the entity reference table, retry
//! policy and per-source endpoints.
//!
//! Stored as a JSON file; every field is optional:
//! ```json
//! {
//!   "noaa_api_key": "...",
//!   "eia_api_key": "...",
//!   "output_dir": "data/raw",
//!   "retry": { "max_retries": 5, "backoff_factor": 2.0 },
//!   "entities": [
//!     { "name": "New York", "state": "New York",
//!       "noaa_station_id": "GHCND:USW00094728", "eia_region_code": "NYIS" }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error};

use crate::error::ConfigError;
use crate::fetch::RetryPolicy;

pub const NOAA_BASE_URL: &str = "https://www.ncdc.noaa.gov/cdo-web/api/v2/data";
pub const EIA_BASE_URL: &str = "https://api.eia.gov/v2/electricity/rto/region-data/data/";

/// A tracked city/region. Supplied by configuration, never created at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntityRef {
    pub name: String,
    pub state: String,
    #[serde(default)]
    pub noaa_station_id: Option<String>,
    #[serde(default)]
    pub eia_region_code: Option<String>,
}

impl EntityRef {
    pub fn new(
        name: &str,
        state: &str,
        noaa_station_id: Option<&str>,
        eia_region_code: Option<&str>,
    ) -> Self {
        Self {
            name: name.to_string(),
            state: state.to_string(),
            noaa_station_id: noaa_station_id.map(str::to_string),
            eia_region_code: eia_region_code.map(str::to_string),
        }
    }
}

/// The five-city reference table used when the config names no entities.
pub fn default_entities() -> Vec<EntityRef> {
    vec![
        EntityRef::new("New York", "New York", Some("GHCND:USW00094728"), Some("NYIS")),
        EntityRef::new("Chicago", "Illinois", Some("GHCND:USW00094846"), Some("PJM")),
        EntityRef::new("Houston", "Texas", Some("GHCND:USW00012960"), Some("ERCO")),
        EntityRef::new("Phoenix", "Arizona", Some("GHCND:USW00023183"), Some("AZPS")),
        EntityRef::new("Seattle", "Washington", Some("GHCND:USW00024233"), Some("SCL")),
    ]
}

/// Resolved secrets. A `None` (or blank) value makes that source unavailable.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub noaa_token: Option<String>,
    pub eia_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("noaa_token", &self.noaa_token.as_ref().map(|_| "<redacted>"))
            .field("eia_api_key", &self.eia_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Endpoint and per-request timeout of one source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl SourceSettings {
    pub fn noaa() -> Self {
        Self {
            base_url: NOAA_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    pub fn eia() -> Self {
        Self {
            base_url: EIA_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    noaa_api_key: Option<String>,
    #[serde(default)]
    eia_api_key: Option<String>,
    #[serde(default = "default_entities")]
    pub entities: Vec<EntityRef>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default = "SourceSettings::noaa")]
    pub noaa: SourceSettings,
    #[serde(default = "SourceSettings::eia")]
    pub eia: SourceSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            noaa_api_key: None,
            eia_api_key: None,
            entities: default_entities(),
            output_dir: default_output_dir(),
            retry: RetryPolicy::default(),
            noaa: SourceSettings::noaa(),
            eia: SourceSettings::eia(),
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`. A missing file yields the
    /// defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let config = match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content).map_err(|e| match e {
                ConfigError::Parse { error, .. } => ConfigError::Parse {
                    path: shown.clone(),
                    error,
                },
                other => other,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %shown, "Config file not found, using defaults");
                Self::default()
            }
            Err(error) => {
                return Err(ConfigError::Io { path: shown, error });
            }
        };

        Ok(config)
    }

    /// Like [`load`](Self::load), but an unreadable or invalid file falls back
    /// to the defaults so a run can still write its (empty) outputs. The error
    /// is handed back for the caller to report once the run is over.
    pub fn load_or_default(path: impl AsRef<Path>) -> (Self, Option<ConfigError>) {
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => {
                error!(error = %e, "Config unusable, continuing with defaults");
                (Self::default(), Some(e))
            }
        }
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content).map_err(|error| ConfigError::Parse {
            path: "<inline>".to_string(),
            error,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        for (i, entity) in self.entities.iter().enumerate() {
            if entity.name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("entities[{i}].name"),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }

    /// Overrides file credentials with `NOAA_API_KEY` / `EIA_API_KEY` when
    /// those are set and non-blank.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var("NOAA_API_KEY").ok(),
            std::env::var("EIA_API_KEY").ok(),
        )
    }

    pub fn with_overrides(mut self, noaa: Option<String>, eia: Option<String>) -> Self {
        if let Some(key) = non_blank(noaa) {
            self.noaa_api_key = Some(key);
        }
        if let Some(key) = non_blank(eia) {
            self.eia_api_key = Some(key);
        }
        self
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            noaa_token: non_blank(self.noaa_api_key.clone()),
            eia_api_key: non_blank(self.eia_api_key.clone()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
