use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    error::ConfigError,
    facts::NOTIFY_INTERVAL_SECS,
    heatmap::{series::DEFAULT_RANGE_MONTHS, ColorScale},
};

#[cfg(debug_assertions)]
pub const PROJECT_IDENTIFIER: &str = "fyi.angelo.hydrate-dashboard-dev";
#[cfg(not(debug_assertions))]
pub const PROJECT_IDENTIFIER: &str = "fyi.angelo.hydrate-dashboard";

#[cfg(debug_assertions)]
static PROJECT_DIR: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("fyi", "angelo", "hydrate-dashboard-dev"));
#[cfg(not(debug_assertions))]
static PROJECT_DIR: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("fyi", "angelo", "hydrate-dashboard"));

const CONFIG_FILE: &str = "config.json";
const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:11133";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HeatmapConfig {
    pub range_months: u32,
    pub color: ColorScale,
    /// Where to write the painted calendar, if anywhere
    pub svg_path: Option<PathBuf>,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            range_months: DEFAULT_RANGE_MONTHS,
            color: ColorScale::default(),
            svg_path: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base url of the host's command bridge
    pub gateway_url: String,

    /// Seconds after a drink before the host reminds you again
    pub notify_interval_secs: i64,

    pub heatmap: HeatmapConfig,

    pub sentry_dsn: Option<String>,

    /// Used when `RUST_LOG` is not set
    pub log_level: String,

    /// Overrides the platform data directory for rolling log files
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_owned(),
            notify_interval_secs: NOTIFY_INTERVAL_SECS,
            heatmap: HeatmapConfig::default(),
            sentry_dsn: None,
            log_level: "info".to_owned(),
            log_dir: None,
        }
    }
}

impl Config {
    /// `config.json` in the platform config directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        PROJECT_DIR
            .as_ref()
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
            .ok_or(ConfigError::NoProjectDir)
    }

    /// Reads the config at `path`, falling back to defaults when it doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        trace!("Config path: {path:?}");

        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                trace!("No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        let config: Self = serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |field, reason| ConfigError::Invalid {
            path: path.to_owned(),
            field,
            reason,
        };

        if self.heatmap.range_months == 0 {
            return Err(invalid("heatmap.range_months", "must be at least 1"));
        }
        if self.notify_interval_secs <= 0 {
            return Err(invalid("notify_interval_secs", "must be positive"));
        }
        Ok(())
    }

    /// Where rolling log files go: `log_dir` if set, else the platform data
    /// directory. `None` if neither exists.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.log_dir
            .clone()
            .or_else(|| PROJECT_DIR.as_ref().map(|dirs| dirs.data_dir().join("logs")))
    }

    pub fn gateway_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.gateway_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.gateway_url.clone(),
            source,
        })
    }
}
