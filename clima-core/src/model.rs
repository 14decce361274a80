use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Guadalajara, Jalisco.
pub const DEFAULT_LATITUDE: f64 = 20.659698;
pub const DEFAULT_LONGITUDE: f64 = -103.349609;

/// Hourly variables, in the order their columns appear in the output.
pub const DEFAULT_HOURLY: &[&str] = &[
    "temperature_2m",
    "precipitation_probability",
    "wind_speed_10m",
    "uv_index",
    "uv_index_clear_sky",
    "is_day",
    "sunshine_duration",
    "direct_radiation",
];

/// Daily variables, in the order their columns appear in the output.
pub const DEFAULT_DAILY: &[&str] = &[
    "weather_code",
    "temperature_2m_max",
    "temperature_2m_min",
    "sunrise",
    "sunset",
    "daylight_duration",
    "sunshine_duration",
    "uv_index_max",
    "uv_index_clear_sky_max",
    "precipitation_probability_max",
];

pub const DEFAULT_TIMEZONE: &str = "auto";
pub const DEFAULT_PAST_DAYS: u32 = 31;
pub const DEFAULT_FORECAST_DAYS: u32 = 1;

/// Everything needed to ask the provider for one forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub latitude: f64,
    pub longitude: f64,
    /// Order matters: response columns are matched back by position.
    pub hourly: Vec<String>,
    pub daily: Vec<String>,
    pub timezone: String,
    pub past_days: u32,
    pub forecast_days: u32,
}

impl Default for ForecastRequest {
    fn default() -> Self {
        Self {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
            hourly: DEFAULT_HOURLY.iter().map(|s| s.to_string()).collect(),
            daily: DEFAULT_DAILY.iter().map(|s| s.to_string()).collect(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            past_days: DEFAULT_PAST_DAYS,
            forecast_days: DEFAULT_FORECAST_DAYS,
        }
    }
}

/// Where the forecast is for, as reported back by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMeta {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above sea level.
    pub elevation: f64,
    pub timezone: String,
    pub timezone_abbreviation: String,
    pub utc_offset_seconds: i32,
}

/// One returned variable: its name and one value per block timestamp.
/// `None` marks a sample the provider could not compute.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// A group of variables sharing one timestamp sequence.
///
/// Timestamps are not stored; they are generated from `start`, `end` and
/// `interval` over the half-open range `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: TimeDelta,
    /// Same order as the variable names in the request.
    pub variables: Vec<Variable>,
}

impl VariableBlock {
    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResponse {
    pub location: LocationMeta,
    pub hourly: VariableBlock,
    pub daily: VariableBlock,
}
