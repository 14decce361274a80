use crate::{
    Config, ForecastRequest, ForecastResponse,
    http::HttpClient,
    provider::openmeteo::OpenMeteoProvider,
};
use anyhow::Result;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openmeteo;

#[async_trait]
pub trait ForecastProvider: Send + Sync + Debug {
    /// Fetch one location's forecast. Blocks come back in request order.
    async fn fetch(&self, request: &ForecastRequest) -> Result<ForecastResponse>;
}

/// Build the Open-Meteo provider with the cache and retry policy from `config`.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn ForecastProvider>> {
    let cache_dir = config.cache_dir()?;
    let http = HttpClient::new(config.retry.clone())?.with_cache(&cache_dir, &config.cache);

    let provider: Arc<dyn ForecastProvider> =
        Arc::new(OpenMeteoProvider::new(http).with_base_url(config.api.base_url.clone()));

    Ok(provider)
}
