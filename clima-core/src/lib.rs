//! Core library for the `clima` forecast archiver.
//!
//! This crate defines:
//! - Configuration with compiled-in defaults
//! - The forecast provider abstraction and its Open-Meteo implementation
//! - An HTTP transport with response caching and retry
//! - Reshaping of response blocks into tables and CSV output
//! - The daily scheduler that drives collection
//!
//! It is used by `clima-cli`, but can also be reused by other binaries or services.

pub mod collector;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod provider;
pub mod schedule;
pub mod store;
pub mod table;

pub use collector::{Collector, RunReport};
pub use config::Config;
pub use error::DataError;
pub use model::{ForecastRequest, ForecastResponse, LocationMeta, Variable, VariableBlock};
pub use provider::{ForecastProvider, provider_from_config};
pub use schedule::{Job, Scheduler, Task};
pub use table::Table;
