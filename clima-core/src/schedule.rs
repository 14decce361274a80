//! A daily job polled by an explicit loop.
//!
//! The job becomes due once per day at its time of day. When due, its guard
//! is checked against the current date; the task only runs if the guard
//! holds. Either way the job then moves on to the next day's occurrence, so
//! it fires at most once per calendar day.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::{fmt, future::Future, sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

#[async_trait]
pub trait Task: Send + Sync {
    async fn run(&self) -> Result<()>;
}

pub type Guard = Box<dyn Fn(NaiveDate) -> bool + Send + Sync>;

/// Guard that holds only on the given day of the month.
pub fn on_day_of_month(day: u32) -> Guard {
    Box::new(move |date| date.day() == day)
}

pub struct Job {
    at: NaiveTime,
    guard: Guard,
    task: Arc<dyn Task>,
    next_run: NaiveDateTime,
    last_run: Option<NaiveDateTime>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("at", &self.at)
            .field("next_run", &self.next_run)
            .field("last_run", &self.last_run)
            .finish_non_exhaustive()
    }
}

impl Job {
    /// Every day at `at`, starting with the first occurrence after `now`.
    pub fn daily_at(at: NaiveTime, task: Arc<dyn Task>, now: NaiveDateTime) -> Self {
        Self {
            at,
            guard: Box::new(|_| true),
            task,
            next_run: next_occurrence(at, now),
            last_run: None,
        }
    }

    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    pub fn next_run(&self) -> NaiveDateTime {
        self.next_run
    }

    /// Last time the task actually ran (guard held).
    pub fn last_run(&self) -> Option<NaiveDateTime> {
        self.last_run
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.next_run
    }
}

/// First `at` strictly after `now`.
fn next_occurrence(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not due yet.
    Idle,
    /// Due, but the guard did not hold.
    Skipped,
    Ran,
    /// Ran and returned an error; already logged.
    Failed,
}

#[derive(Debug)]
pub struct Scheduler {
    job: Job,
    tick: Duration,
}

impl Scheduler {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Evaluate the job once at `now`. A failing task is logged and does not
    /// stop the scheduler; it waits for the next occurrence like any other run.
    pub async fn run_pending(&mut self, now: NaiveDateTime) -> Outcome {
        if !self.job.is_due(now) {
            return Outcome::Idle;
        }

        let outcome = if (self.job.guard)(now.date()) {
            tracing::info!(%now, "scheduled job is due, running");
            self.job.last_run = Some(now);
            match self.job.task.run().await {
                Ok(()) => Outcome::Ran,
                Err(e) => {
                    tracing::error!(error = ?e, "scheduled run failed");
                    Outcome::Failed
                }
            }
        } else {
            tracing::debug!(date = %now.date(), "scheduled job skipped: guard does not hold");
            Outcome::Skipped
        };

        self.job.next_run = next_occurrence(self.job.at, now);
        tracing::debug!(next_run = %self.job.next_run, "job rescheduled");

        outcome
    }

    /// Poll once per tick against local wall-clock time until `shutdown`
    /// resolves.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!(next_run = %self.job.next_run, "scheduler started");

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_pending(Local::now().naive_local()).await;
                }
            }
        }
    }
}
