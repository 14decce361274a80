use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::{
    error::DataError,
    http::HttpClient,
    model::{ForecastRequest, ForecastResponse, LocationMeta, Variable, VariableBlock},
};

use super::ForecastProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Fixed sampling of a block and how far a returned timestamp may sit from
/// its slot on that grid.
#[derive(Debug, Clone, Copy)]
struct Axis {
    name: &'static str,
    interval_seconds: i64,
    tolerance_seconds: i64,
}

/// Hourly times are plain unix seconds, always exactly one hour apart.
const HOURLY: Axis = Axis {
    name: "hourly",
    interval_seconds: 3600,
    tolerance_seconds: 0,
};

/// Daily times are local midnights; a DST change moves them by up to an hour.
const DAILY: Axis = Axis {
    name: "daily",
    interval_seconds: 86_400,
    tolerance_seconds: 3600,
};

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: HttpClient,
}

impl OpenMeteoProvider {
    pub fn new(http: HttpClient) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ForecastProvider for OpenMeteoProvider {
    async fn fetch(&self, request: &ForecastRequest) -> Result<ForecastResponse> {
        let query = query_params(request);

        let body = self
            .http
            .get_text(&self.base_url, &query)
            .await
            .context("Open-Meteo forecast request failed")?;

        parse_response(&body, request)
    }
}

/// Query string for `/v1/forecast`. Times come back as unix seconds so the
/// block start and interval can be read without timezone parsing.
pub fn query_params(request: &ForecastRequest) -> Vec<(&'static str, String)> {
    vec![
        ("latitude", request.latitude.to_string()),
        ("longitude", request.longitude.to_string()),
        ("hourly", request.hourly.join(",")),
        ("daily", request.daily.join(",")),
        ("timezone", request.timezone.clone()),
        ("past_days", request.past_days.to_string()),
        ("forecast_days", request.forecast_days.to_string()),
        ("timeformat", "unixtime".to_string()),
    ]
}

#[derive(Debug, Deserialize)]
struct OmResponse {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    elevation: f64,
    #[serde(default)]
    utc_offset_seconds: i32,
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    timezone_abbreviation: String,
    hourly: Option<OmBlock>,
    daily: Option<OmBlock>,
}

#[derive(Debug, Deserialize)]
struct OmBlock {
    time: Vec<i64>,
    #[serde(flatten)]
    columns: HashMap<String, Value>,
}

/// Turn a raw `/v1/forecast` body into the typed response, picking the
/// variables in the order `request` lists them.
pub fn parse_response(body: &str, request: &ForecastRequest) -> Result<ForecastResponse> {
    let parsed: OmResponse =
        serde_json::from_str(body).context("Failed to parse Open-Meteo forecast JSON")?;

    let location = LocationMeta {
        latitude: parsed.latitude,
        longitude: parsed.longitude,
        elevation: parsed.elevation,
        timezone: parsed.timezone,
        timezone_abbreviation: parsed.timezone_abbreviation,
        utc_offset_seconds: parsed.utc_offset_seconds,
    };

    let hourly = into_block(HOURLY, parsed.hourly, &request.hourly)?;
    let daily = into_block(DAILY, parsed.daily, &request.daily)?;

    Ok(ForecastResponse {
        location,
        hourly,
        daily,
    })
}

fn into_block(
    axis: Axis,
    raw: Option<OmBlock>,
    wanted: &[String],
) -> Result<VariableBlock, DataError> {
    let name = axis.name;
    let mut raw = raw.ok_or_else(|| DataError::MissingBlock {
        block: name.to_string(),
    })?;

    let first = raw.time.first().copied().unwrap_or(0);
    check_time_axis(axis, first, &raw.time)?;

    let count = raw.time.len() as i64;
    let last = first.saturating_add(count.saturating_mul(axis.interval_seconds));
    let start = to_utc(name, first)?;
    let end = to_utc(name, last)?;

    let variables = wanted
        .iter()
        .map(|variable| -> Result<Variable, DataError> {
            let column = raw.columns.remove(variable).ok_or_else(|| DataError::MissingVariable {
                block: name.to_string(),
                variable: variable.clone(),
            })?;

            let values: Vec<Option<f64>> =
                serde_json::from_value(column).map_err(|_| DataError::NonNumeric {
                    block: name.to_string(),
                    variable: variable.clone(),
                })?;

            Ok(Variable {
                name: variable.clone(),
                values,
            })
        })
        .collect::<Result<Vec<_>, DataError>>()?;

    Ok(VariableBlock {
        start,
        end,
        interval: TimeDelta::seconds(axis.interval_seconds),
        variables,
    })
}

/// Every returned timestamp must sit on the fixed grid starting at `first`,
/// give or take the axis tolerance.
fn check_time_axis(axis: Axis, first: i64, time: &[i64]) -> Result<(), DataError> {
    let mut shifted = 0;
    for (index, &actual) in time.iter().enumerate() {
        let expected = (index as i64)
            .saturating_mul(axis.interval_seconds)
            .saturating_add(first);
        let drift = actual.saturating_sub(expected).saturating_abs();
        if drift > axis.tolerance_seconds {
            return Err(DataError::TimeAxisMismatch {
                block: axis.name.to_string(),
                index,
                expected,
                actual,
            });
        }
        if drift > 0 {
            shifted += 1;
        }
    }

    if shifted > 0 {
        tracing::debug!(
            block = axis.name,
            shifted,
            "time axis shifted by a DST change, keeping the fixed interval"
        );
    }
    Ok(())
}

fn to_utc(block: &str, ts: i64) -> Result<DateTime<Utc>, DataError> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| DataError::InvalidTimestamp {
        block: block.to_string(),
        timestamp: ts,
    })
}
