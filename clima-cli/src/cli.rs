use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use clima_core::{
    Collector, Config, Job, Scheduler,
    schedule::on_day_of_month,
};
use std::{path::PathBuf, sync::Arc};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "clima", version, about = "Archive Open-Meteo forecasts as dated CSV files")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base directory for `datos_clima/`; overrides the config file.
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Wait for the configured trigger and collect when it fires (default).
    Run,

    /// Collect once right now, ignoring the trigger.
    Fetch,

    /// Print the effective configuration as TOML.
    Config {
        /// Print only the path of the platform config file.
        #[arg(long, conflicts_with = "init")]
        path: bool,

        /// Write a default config file (to `--config` if given) and exit.
        #[arg(long)]
        init: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        if let Some(Command::Config { init: true, .. }) = self.command {
            let path = match self.config {
                Some(path) => path,
                None => Config::config_file_path()?,
            };
            Config::init(&path)?;
            println!("{}", path.display());
            return Ok(());
        }

        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if let Some(dir) = self.output_dir {
            config.output_dir = Some(dir);
        }
        config.validate()?;

        match self.command.unwrap_or(Command::Run) {
            Command::Run => run_scheduler(&config).await,
            Command::Fetch => {
                let collector = Collector::from_config(&config)?;
                let report = collector.run_once().await?;
                println!("{}", report.hourly_path.display());
                println!("{}", report.daily_path.display());
                Ok(())
            }
            Command::Config { path, .. } => {
                if path {
                    println!("{}", Config::config_file_path()?.display());
                } else {
                    let toml = toml::to_string_pretty(&config)
                        .context("Failed to serialize configuration to TOML")?;
                    print!("{toml}");
                }
                Ok(())
            }
        }
    }
}

async fn run_scheduler(config: &Config) -> anyhow::Result<()> {
    let collector = Arc::new(Collector::from_config(config)?);
    let at = config.trigger.time_of_day()?;

    let job = Job::daily_at(at, collector, Local::now().naive_local())
        .when(on_day_of_month(config.trigger.day_of_month));

    tracing::info!(
        day_of_month = config.trigger.day_of_month,
        time = %config.trigger.time,
        output = %config.output_base()?.display(),
        "waiting for trigger"
    );

    let mut scheduler = Scheduler::new(job);
    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
