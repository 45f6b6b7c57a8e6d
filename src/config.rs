// ⚙️ Settings - loaded once at process start, then passed around by reference
//
// Layout of the settings file:
//
//   file_name:
//     log_file: etl_project_log.txt
//     region_data_json_file: region_data.json
//     GDP_json_file: Countries_by_GDP.json
//     db_file: World_Economies.db
//   URL:
//     GDP_WIKIPEDIA_URL: https://en.wikipedia.org/wiki/List_of_countries_by_GDP_(nominal)
//   schedule:
//     on_fetch_failure: skip_cycle
//   http:
//     user_agent: gdp-etl/0.1

use crate::error::{EtlError, EtlResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings file looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "path_url_settings.yaml";

/// Environment variable that overrides [`DEFAULT_SETTINGS_FILE`]
pub const SETTINGS_ENV_VAR: &str = "GDP_ETL_SETTINGS";

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(rename = "file_name")]
    pub files: FileSettings,

    #[serde(rename = "URL")]
    pub urls: UrlSettings,

    #[serde(default)]
    pub schedule: ScheduleSettings,

    #[serde(default)]
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileSettings {
    pub log_file: PathBuf,
    pub region_data_json_file: PathBuf,
    #[serde(rename = "GDP_json_file")]
    pub gdp_json_file: PathBuf,
    pub db_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UrlSettings {
    #[serde(rename = "GDP_WIKIPEDIA_URL")]
    pub gdp_source_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default)]
    pub on_fetch_failure: FetchFailurePolicy,
}

/// What a cycle does when the source page can't be fetched or parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// Log the failure and wait for the next hour boundary
    #[default]
    SkipCycle,
    /// Stop the scheduler and exit with the error
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("gdp-etl/{}", env!("CARGO_PKG_VERSION"))
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> EtlResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("failed to read settings file {}: {}", path.display(), e))
        })?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> EtlResult<Self> {
        let settings: Settings = serde_yaml::from_str(content)
            .map_err(|e| EtlError::Config(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolve the settings path: `GDP_ETL_SETTINGS` if set, else the default file
    pub fn resolve_path() -> PathBuf {
        std::env::var_os(SETTINGS_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
    }

    fn validate(&self) -> EtlResult<()> {
        let paths = [
            ("log_file", &self.files.log_file),
            ("region_data_json_file", &self.files.region_data_json_file),
            ("GDP_json_file", &self.files.gdp_json_file),
            ("db_file", &self.files.db_file),
        ];
        for (key, path) in paths {
            if path.as_os_str().is_empty() {
                return Err(EtlError::Config(format!("file_name.{} is empty", key)));
            }
        }

        if self.urls.gdp_source_url.trim().is_empty() {
            return Err(EtlError::Config("URL.GDP_WIKIPEDIA_URL is empty".to_string()));
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
