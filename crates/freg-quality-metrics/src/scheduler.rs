//! Periodic job scheduler.
//!
//! Every registered job gets its own tokio task that ticks at the job's
//! interval. Each tick spawns the run as a separate task, so jobs run in
//! parallel with each other and with scrapes.
//!
//! # Graceful Shutdown
//!
//! The loops exit when the cancellation token is triggered. Runs already in
//! flight are not awaited.

use crate::errors::MetricsError;
use crate::jobs::{run_job, Job, JobContext};
use crate::observability::metrics::{record_job_error, record_job_run};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// What to do when a tick arrives while the previous run is still going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Start another run anyway. Last writer wins.
    #[default]
    Allow,
    /// Drop the tick.
    SkipIfRunning,
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(OverlapPolicy::Allow),
            "skip" => Ok(OverlapPolicy::SkipIfRunning),
            other => Err(format!("expected 'allow' or 'skip', got '{}'", other)),
        }
    }
}

struct Registration {
    job: Arc<dyn Job>,
    interval: Duration,
    run_immediately: bool,
}

/// Holds job registrations until [`Scheduler::start`].
pub struct Scheduler {
    registrations: Vec<Registration>,
    overlap: OverlapPolicy,
}

impl Scheduler {
    pub fn new(overlap: OverlapPolicy) -> Self {
        Self {
            registrations: Vec::new(),
            overlap,
        }
    }

    /// Register `job` to run every `interval`, first at startup when
    /// `run_immediately` is set, otherwise one interval after startup.
    ///
    /// # Errors
    ///
    /// Returns `MetricsError::Scheduling` for a zero interval or a job name
    /// that is already registered.
    pub fn register_periodic(
        &mut self,
        job: Arc<dyn Job>,
        interval: Duration,
        run_immediately: bool,
    ) -> Result<(), MetricsError> {
        if interval.is_zero() {
            return Err(MetricsError::Scheduling(format!(
                "job {} has a zero interval",
                job.name()
            )));
        }
        if self
            .registrations
            .iter()
            .any(|r| r.job.name() == job.name())
        {
            return Err(MetricsError::Scheduling(format!(
                "job {} is already registered",
                job.name()
            )));
        }
        self.registrations.push(Registration {
            job,
            interval,
            run_immediately,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.registrations.iter().map(|r| r.job.name()).collect()
    }

    /// Spawn one loop per registered job. Returns the loop handles.
    pub fn start(self, ctx: JobContext, cancel_token: CancellationToken) -> Vec<JoinHandle<()>> {
        info!(
            target: "fqm.task.scheduler",
            jobs = self.registrations.len(),
            overlap = ?self.overlap,
            "Starting scheduler"
        );

        let ctx = Arc::new(ctx);
        self.registrations
            .into_iter()
            .map(|registration| {
                tokio::spawn(job_loop(
                    registration,
                    Arc::clone(&ctx),
                    self.overlap,
                    cancel_token.clone(),
                ))
            })
            .collect()
    }
}

#[instrument(skip_all, name = "fqm.task.scheduler", fields(job = %registration.job.name()))]
async fn job_loop(
    registration: Registration,
    ctx: Arc<JobContext>,
    overlap: OverlapPolicy,
    cancel_token: CancellationToken,
) {
    let Registration {
        job,
        interval,
        run_immediately,
    } = registration;

    debug!(
        target: "fqm.task.scheduler",
        interval_secs = interval.as_secs_f64(),
        run_immediately = run_immediately,
        "Job loop started"
    );

    let first_tick = if run_immediately {
        Instant::now()
    } else {
        Instant::now() + interval
    };
    let mut ticker = tokio::time::interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let in_flight = Arc::new(AtomicBool::new(false));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                spawn_run(Arc::clone(&job), Arc::clone(&ctx), overlap, Arc::clone(&in_flight));
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "fqm.task.scheduler",
                    job = %job.name(),
                    "Job loop received shutdown signal, exiting"
                );
                break;
            }
        }
    }
}

/// Clears the in-flight flag when the run ends, however it ends.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn spawn_run(
    job: Arc<dyn Job>,
    ctx: Arc<JobContext>,
    overlap: OverlapPolicy,
    in_flight: Arc<AtomicBool>,
) {
    let guard = match overlap {
        OverlapPolicy::Allow => None,
        OverlapPolicy::SkipIfRunning => {
            if in_flight.swap(true, Ordering::SeqCst) {
                warn!(
                    target: "fqm.task.scheduler",
                    job = %job.name(),
                    "Previous run still in flight, skipping tick"
                );
                record_job_run(job.name(), "skipped", None);
                return;
            }
            Some(InFlightGuard(in_flight))
        }
    };

    tokio::spawn(async move {
        let _guard = guard;
        let started = Instant::now();
        match run_job(job.as_ref(), &ctx).await {
            Ok(elapsed) => {
                debug!(
                    target: "fqm.job",
                    job = %job.name(),
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Job run complete"
                );
                record_job_run(job.name(), "success", Some(elapsed));
            }
            Err(e) => {
                error!(
                    target: "fqm.job",
                    job = %job.name(),
                    error = %e,
                    "Job run failed"
                );
                record_job_run(job.name(), "error", Some(started.elapsed()));
                record_job_error(job.name(), e.error_type());
            }
        }
    });
}
