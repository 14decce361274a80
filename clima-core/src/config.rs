use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    http::{cache::CacheConfig, retry::RetryConfig},
    model::{self, ForecastRequest},
    provider::openmeteo::DEFAULT_BASE_URL,
};

pub const DEFAULT_TRIGGER_DAY: u32 = 9;
pub const DEFAULT_TRIGGER_TIME: &str = "00:00";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// IANA name, or "auto" to let the provider pick from the coordinates.
    pub timezone: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: model::DEFAULT_LATITUDE,
            longitude: model::DEFAULT_LONGITUDE,
            timezone: model::DEFAULT_TIMEZONE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariablesConfig {
    pub hourly: Vec<String>,
    pub daily: Vec<String>,
}

impl Default for VariablesConfig {
    fn default() -> Self {
        Self {
            hourly: model::DEFAULT_HOURLY.iter().map(|s| s.to_string()).collect(),
            daily: model::DEFAULT_DAILY.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub past_days: u32,
    pub forecast_days: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            past_days: model::DEFAULT_PAST_DAYS,
            forecast_days: model::DEFAULT_FORECAST_DAYS,
        }
    }
}

/// When the scheduled fetch happens: every day at `time`, but only acted on
/// when the day of the month is `day_of_month`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub day_of_month: u32,
    /// Local time of day, "HH:MM".
    pub time: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            day_of_month: DEFAULT_TRIGGER_DAY,
            time: DEFAULT_TRIGGER_TIME.to_string(),
        }
    }
}

impl TriggerConfig {
    pub fn time_of_day(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, "%H:%M").with_context(|| {
            format!("Invalid trigger time '{}', expected HH:MM", self.time)
        })
    }
}

/// Top-level configuration. Every field has a compiled-in default, so an
/// absent or partial file is fine.
///
/// Example TOML:
/// ```toml
/// output_dir = "/var/lib/clima"
///
/// [trigger]
/// day_of_month = 9
/// time = "00:00"
///
/// [location]
/// latitude = 20.659698
/// longitude = -103.349609
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Base directory for `datos_clima/` and the HTTP cache. Defaults to the
    /// directory holding the executable.
    pub output_dir: Option<PathBuf>,
    pub api: ApiConfig,
    pub location: LocationConfig,
    pub variables: VariablesConfig,
    pub window: WindowConfig,
    pub trigger: TriggerConfig,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
}

impl Config {
    /// Load the platform config file, or defaults if there is none yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load an explicit config file; it must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Write a default config to `path` so it can be edited by hand.
    /// An existing file is left untouched.
    pub fn init(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(anyhow!("Config file already exists: {}", path.display()));
        }

        let cfg = Self::default();
        cfg.save_to(path)?;
        tracing::info!(path = %path.display(), "wrote default config");
        Ok(cfg)
    }

    /// Path to the platform config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "clima", "clima")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        let day = self.trigger.day_of_month;
        if !(1..=31).contains(&day) {
            bail!("trigger.day_of_month must be between 1 and 31, got {day}");
        }
        self.trigger.time_of_day()?;

        let LocationConfig {
            latitude, longitude, ..
        } = self.location;
        if !(-90.0..=90.0).contains(&latitude) {
            bail!("location.latitude must be within -90..=90, got {latitude}");
        }
        if !(-180.0..=180.0).contains(&longitude) {
            bail!("location.longitude must be within -180..=180, got {longitude}");
        }

        if self.variables.hourly.is_empty() {
            bail!("variables.hourly must list at least one variable");
        }
        if self.variables.daily.is_empty() {
            bail!("variables.daily must list at least one variable");
        }

        Ok(())
    }

    /// The request sent on every run.
    pub fn forecast_request(&self) -> ForecastRequest {
        ForecastRequest {
            latitude: self.location.latitude,
            longitude: self.location.longitude,
            hourly: self.variables.hourly.clone(),
            daily: self.variables.daily.clone(),
            timezone: self.location.timezone.clone(),
            past_days: self.window.past_days,
            forecast_days: self.window.forecast_days,
        }
    }

    /// Base directory for output, resolving the executable's directory when
    /// none is configured.
    pub fn output_base(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }

        let exe = std::env::current_exe().context("Failed to locate the running executable")?;
        exe.parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("Executable path has no parent: {}", exe.display()))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        Ok(self.output_base()?.join(".cache"))
    }
}
