//! Layered configuration: built-in defaults, then a RON file, then flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use ingest_core::{PollSettings, RequiredColumns, DEFAULT_PREVIEW_ROWS};
use ingest_engine::{ApiSettings, StagingSettings};
use ingest_logging::ingest_info;
use serde::{Deserialize, Serialize};

/// Picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "ingest.ron";
const DEFAULT_LEDGER_FILE: &str = ".ingest_jobs.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub staging: StagingConfig,
    pub ledger_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub jobs_path: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Give up after this many status requests. Unbounded when absent.
    pub max_polls: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Preview rows per sheet, header included.
    pub preview_rows: usize,
    pub required_columns: Vec<String>,
}

/// Values given on the command line; each one wins over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub interval_ms: Option<u64>,
    pub required_columns: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            staging: StagingConfig::default(),
            ledger_path: PathBuf::from(DEFAULT_LEDGER_FILE),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        let settings = ApiSettings::default();
        Self {
            base_url: settings.base_url,
            jobs_path: settings.jobs_path,
            connect_timeout_ms: duration_ms(settings.connect_timeout),
            request_timeout_ms: duration_ms(settings.request_timeout),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        let settings = PollSettings::default();
        Self {
            interval_ms: duration_ms(settings.interval),
            max_polls: settings.max_polls,
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            preview_rows: DEFAULT_PREVIEW_ROWS,
            required_columns: Vec::new(),
        }
    }
}

impl IngestConfig {
    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Read `explicit` if given, otherwise `ingest.ron` in `working_dir` when
    /// it exists, otherwise the defaults.
    pub fn load(explicit: Option<&Path>, working_dir: &Path) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = working_dir.join(DEFAULT_CONFIG_FILE);
                if !candidate.is_file() {
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let text = fs::read_to_string(&path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config = Self::from_ron(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        ingest_info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(base_url) = overrides.base_url {
            self.api.base_url = base_url;
        }
        if let Some(interval_ms) = overrides.interval_ms {
            self.polling.interval_ms = interval_ms;
        }
        if !overrides.required_columns.is_empty() {
            self.staging.required_columns = overrides.required_columns;
        }
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api.base_url.clone(),
            jobs_path: self.api.jobs_path.clone(),
            connect_timeout: Duration::from_millis(self.api.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.api.request_timeout_ms),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.polling.interval_ms),
            max_polls: self.polling.max_polls,
        }
    }

    pub fn staging_settings(&self) -> StagingSettings {
        StagingSettings {
            preview_rows: self.staging.preview_rows,
            required_columns: RequiredColumns::new(self.staging.required_columns.iter()),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
