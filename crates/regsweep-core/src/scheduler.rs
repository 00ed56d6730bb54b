//! Single-flight cron scheduling.
//!
//! A [`CronScheduler`] fires one task on a cron schedule and never runs
//! two instances of it at once. A tick that cannot obtain the single
//! permit within a short timeout is dropped, not queued.

use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use cron::Schedule;
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::{watch, Semaphore};

use crate::error::{Result, SweepError};

/// How long a tick waits for the previous run to finish before skipping.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(1);

type Task = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// When a scheduler fires.
#[derive(Debug, Clone)]
pub enum Cadence {
    /// A cron schedule.
    Cron(Schedule),

    /// A fixed interval, `@every <duration>`.
    Every(Duration),
}

impl Cadence {
    /// First tick strictly after `from`.
    #[must_use]
    pub fn after(&self, from: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Cron(schedule) => schedule.after(from).next(),
            Self::Every(interval) => {
                let from = from.with_nanosecond(0).unwrap_or(*from);
                let interval = chrono::Duration::from_std(*interval).ok()?;
                from.checked_add_signed(interval)
            }
        }
    }

    /// Next tick from now.
    #[must_use]
    pub fn upcoming(&self) -> Option<DateTime<Utc>> {
        self.after(&Utc::now())
    }
}

/// Parses a schedule expression.
///
/// Standard 5-field expressions (`min hour dom mon dow`) run at second
/// zero and number weekdays 0-6 from Sunday. 6- and 7-field expressions
/// carry their own seconds field and use the 1-7 numbering of the
/// [`cron`] crate. `@daily`-style shortcuts and `@every <duration>`
/// (for example `@every 1h30m`) are accepted as well.
///
/// # Examples
///
/// ```
/// use regsweep_core::scheduler::parse_schedule;
///
/// assert!(parse_schedule("0 3 * * 1-5").is_ok());
/// assert!(parse_schedule("*/30 * * * * *").is_ok());
/// assert!(parse_schedule("@every 6h").is_ok());
/// assert!(parse_schedule("whenever").is_err());
/// ```
pub fn parse_schedule(expr: &str) -> Result<Cadence> {
    let expr = expr.trim();
    let invalid = |reason: &dyn std::fmt::Display| {
        SweepError::config(format!("invalid cron expression '{expr}': {reason}"))
    };

    if let Some(interval) = expr.strip_prefix("@every") {
        let interval = humantime::parse_duration(interval.trim()).map_err(|e| invalid(&e))?;
        // Intervals are whole seconds, at least one.
        let interval = Duration::from_secs(interval.as_secs().max(1));
        return Ok(Cadence::Every(interval));
    }

    let normalized = match expr {
        "@midnight" => "@daily".to_string(),
        "@annually" => "@yearly".to_string(),
        _ if !expr.starts_with('@') && expr.split_whitespace().count() == 5 => {
            let mut fields: Vec<&str> = expr.split_whitespace().collect();
            let weekdays = shift_weekdays(fields[4]).map_err(|e| invalid(&e))?;
            fields[4] = &weekdays;
            format!("0 {}", fields.join(" "))
        }
        _ => expr.to_string(),
    };

    Schedule::from_str(&normalized)
        .map(Cadence::Cron)
        .map_err(|e| invalid(&e))
}

/// Maps a 0-6 (Sunday first) weekday field onto the 1-7 numbering of the
/// `cron` crate. Names, `*` and `?` pass through.
fn shift_weekdays(field: &str) -> std::result::Result<String, String> {
    let shift = |day: &str| match day.parse::<u8>() {
        Ok(n @ 0..=6) => Ok((n + 1).to_string()),
        Ok(n) => Err(format!("day of week {n} out of range 0-6")),
        Err(_) => Ok(day.to_string()),
    };

    field
        .split(',')
        .map(|item| -> std::result::Result<String, String> {
            let (range, step) = item
                .split_once('/')
                .map_or((item, None), |(range, step)| (range, Some(step)));
            let mut shifted = match range {
                "*" | "?" => range.to_string(),
                _ => range
                    .split('-')
                    .map(shift)
                    .collect::<std::result::Result<Vec<_>, _>>()?
                    .join("-"),
            };
            if let Some(step) = step {
                shifted.push('/');
                shifted.push_str(step);
            }
            Ok(shifted)
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(|items| items.join(","))
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The task ran to completion.
    Ran,

    /// A previous run still held the permit.
    Skipped,

    /// The task panicked; the permit was released.
    Panicked,

    /// The scheduler has stopped and accepts no further runs.
    Stopped,
}

/// Cron scheduler guaranteeing at most one concurrent task execution.
#[derive(Clone)]
pub struct CronScheduler {
    expression: String,
    cadence: Cadence,
    passport: Arc<Semaphore>,
    acquire_timeout: Duration,
    task: Task,
    runs: Arc<AtomicU64>,
    skipped: Arc<AtomicU64>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("expression", &self.expression)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("runs", &self.runs())
            .field("skipped", &self.skipped())
            .finish_non_exhaustive()
    }
}

impl CronScheduler {
    /// Creates a scheduler running `task` on `expr`.
    pub fn new<F, Fut>(expr: &str, task: F) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cadence = parse_schedule(expr)?;
        Ok(Self {
            expression: expr.trim().to_string(),
            cadence,
            passport: Arc::new(Semaphore::new(1)),
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            task: Arc::new(move || task().boxed()),
            runs: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Sets how long a tick waits for the permit.
    #[must_use]
    pub const fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// The configured cron expression.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next time the schedule fires.
    #[must_use]
    pub fn next_tick(&self) -> Option<DateTime<Utc>> {
        self.cadence.upcoming()
    }

    /// Ticks that ran the task.
    #[must_use]
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Ticks dropped because a run was active.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Performs one tick: runs the task if no other run holds the permit.
    pub async fn trigger(&self) -> TickOutcome {
        tracing::info!("Attempting scheduled cleanup");

        let acquire = Arc::clone(&self.passport).acquire_owned();
        let permit = match tokio::time::timeout(self.acquire_timeout, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => {
                tracing::info!("Scheduler stopped, dropping tick");
                return TickOutcome::Stopped;
            }
            Err(_elapsed) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::info!("Previous cleanup still active, skipping");
                return TickOutcome::Skipped;
            }
        };

        self.runs.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Starting scheduled cleanup");

        // The permit moves into the task so it is released even on panic.
        let task = Arc::clone(&self.task);
        let handle = tokio::spawn(async move {
            let _permit = permit;
            task().await;
        });

        match handle.await {
            Ok(()) => TickOutcome::Ran,
            Err(e) => {
                tracing::error!(error = %e, "Scheduled cleanup panicked");
                TickOutcome::Panicked
            }
        }
    }

    /// Fires ticks on schedule until `shutdown` flips to true, then waits
    /// for an active run to finish.
    ///
    /// Once this returns, every clone of the scheduler refuses to run.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(cron = %self.expression, "Scheduler started");
        let mut last: Option<DateTime<Utc>> = None;

        while !*shutdown.borrow() {
            let from = last.map_or_else(Utc::now, |l| l.max(Utc::now()));
            let Some(next) = self.cadence.after(&from) else {
                tracing::warn!(cron = %self.expression, "Schedule has no upcoming ticks");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tracing::debug!(next = %next, "Waiting for next tick");

            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    last = Some(next);
                    let this = self.clone();
                    tokio::spawn(async move {
                        this.trigger().await;
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Scheduler stopping, waiting for active cleanup");
        let _permit = self.passport.acquire().await;
        self.passport.close();
        tracing::info!(runs = self.runs(), skipped = self.skipped(), "Scheduler stopped");
    }
}
