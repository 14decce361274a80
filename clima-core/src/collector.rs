use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use std::{path::PathBuf, sync::Arc};

use crate::{
    Config,
    model::{ForecastRequest, LocationMeta},
    provider::{ForecastProvider, provider_from_config},
    schedule::Task,
    store::{OutputLayout, write_csv},
    table::Table,
};

const PREVIEW_ROWS: usize = 5;

/// What one run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub date: NaiveDate,
    pub hourly_path: PathBuf,
    pub hourly_rows: usize,
    pub daily_path: PathBuf,
    pub daily_rows: usize,
}

/// Fetches the forecast for a fixed request and dumps it to the day's CSV
/// files.
#[derive(Debug, Clone)]
pub struct Collector {
    provider: Arc<dyn ForecastProvider>,
    request: ForecastRequest,
    layout: OutputLayout,
}

impl Collector {
    pub fn new(
        provider: Arc<dyn ForecastProvider>,
        request: ForecastRequest,
        layout: OutputLayout,
    ) -> Self {
        Self {
            provider,
            request,
            layout,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = provider_from_config(config)?;
        let layout = OutputLayout::new(config.output_base()?);
        Ok(Self::new(provider, config.forecast_request(), layout))
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Fetch and save under today's local date.
    pub async fn run_once(&self) -> Result<RunReport> {
        self.run_for(Local::now().date_naive()).await
    }

    /// Fetch and save under `date`.
    ///
    /// Both tables are built before either file is written: a response that
    /// fails validation leaves the day's existing files untouched.
    pub async fn run_for(&self, date: NaiveDate) -> Result<RunReport> {
        let dir = self.layout.ensure_day_dir(date)?;
        tracing::info!(%date, dir = %dir.display(), "collecting forecast");

        let response = self
            .provider
            .fetch(&self.request)
            .await
            .context("Failed to fetch forecast")?;

        log_location(&response.location);

        let hourly = Table::from_block("hourly", &response.hourly)?;
        tracing::info!("hourly data:\n{}", hourly.preview(PREVIEW_ROWS));

        let daily = Table::from_block("daily", &response.daily)?;
        tracing::info!("daily data:\n{}", daily.preview(PREVIEW_ROWS));

        let hourly_path = self.layout.table_path(date, &hourly.name);
        let hourly_rows = write_csv(&hourly, &hourly_path)?;

        let daily_path = self.layout.table_path(date, &daily.name);
        let daily_rows = write_csv(&daily, &daily_path)?;

        tracing::info!(hourly_rows, daily_rows, "forecast saved");

        Ok(RunReport {
            date,
            hourly_path,
            hourly_rows,
            daily_path,
            daily_rows,
        })
    }
}

fn log_location(location: &LocationMeta) {
    tracing::info!(
        "Coordinates {}°N {}°E",
        location.latitude,
        location.longitude
    );
    tracing::info!("Elevation {} m asl", location.elevation);
    tracing::info!(
        "Timezone {} {}",
        location.timezone,
        location.timezone_abbreviation
    );
    tracing::info!(
        "Timezone difference to GMT+0 {} s",
        location.utc_offset_seconds
    );
}

#[async_trait]
impl Task for Collector {
    async fn run(&self) -> Result<()> {
        self.run_once().await.map(|_| ())
    }
}
