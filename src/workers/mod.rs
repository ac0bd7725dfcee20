pub mod ingestion;
pub mod rollup;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use tokio::sync::Notify;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::WorkerConfig;
use crate::shutdown::Shutdown;
use crate::state::AppState;

/// Timeout for individual worker invocations (5 minutes).
const WORKER_TIMEOUT: Duration = Duration::from_secs(300);

/// How long abandoned work gets to unwind after the grace period.
const ABANDON_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    Ingestion,
    Rollup,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ingestion => "ingestion",
            Self::Rollup => "rollup",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: String,
    /// Zone the cron expression is read in.
    pub offset: FixedOffset,
    pub enabled: bool,
}

/// Count of job invocations currently running.
#[derive(Debug, Default)]
pub struct InFlight {
    active: AtomicUsize,
    idle: Notify,
}

pub struct InFlightGuard {
    owner: Arc<InFlight>,
}

impl InFlight {
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            owner: self.clone(),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.owner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.owner.idle.notify_waiters();
        }
    }
}

pub struct WorkerManager {
    state: AppState,
    stop: Shutdown,
    config: WorkerConfig,
    in_flight: Arc<InFlight>,
}

impl WorkerManager {
    /// `stop` ends scheduling; the state's own shutdown signal is fired only
    /// once the grace period runs out, abandoning whatever is still in flight.
    pub fn new(state: AppState, stop: Shutdown, config: &WorkerConfig) -> Self {
        Self {
            state,
            stop,
            config: config.clone(),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Single source of truth for the planned jobs and their cron schedules.
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![
            JobSpec {
                name: WorkerName::Ingestion,
                cron: self.config.ingest_cron.clone(),
                offset: Utc.fix(),
                enabled: true,
            },
            JobSpec {
                name: WorkerName::Rollup,
                cron: self.config.rollup_cron.clone(),
                offset: self.state.config().local_offset(),
                enabled: true,
            },
        ]
    }

    /// Start the scheduler and run until `stop` fires. Returns an error if the
    /// scheduler cannot be created or started.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping worker startup");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;

        self.register_jobs(&scheduler).await;

        scheduler.start().await?;

        tracing::info!("Worker manager started");
        self.stop.cancelled().await;

        let grace = self.config.shutdown_grace();
        tracing::info!(
            in_flight = self.in_flight.active(),
            grace_secs = grace.as_secs(),
            "Worker manager shutting down, draining in-flight work"
        );
        if tokio::time::timeout(grace, self.in_flight.wait_idle()).await.is_err() {
            tracing::warn!(
                in_flight = self.in_flight.active(),
                "Grace period elapsed, abandoning in-flight work"
            );
            self.state.shutdown_trigger().trigger();
            if tokio::time::timeout(ABANDON_TIMEOUT, self.in_flight.wait_idle())
                .await
                .is_err()
            {
                tracing::error!("In-flight work did not unwind after abandonment");
            }
        }

        if let Err(e) = scheduler.shutdown().await {
            tracing::warn!(error = %e, "Scheduler shutdown reported an error");
        }
        tracing::info!("Worker manager stopped");
        Ok(())
    }

    /// Register all jobs with the scheduler, using `planned_jobs()` as the single source of truth.
    async fn register_jobs(&self, scheduler: &JobScheduler) {
        for spec in self.planned_jobs() {
            if !spec.enabled {
                tracing::info!(name = spec.name.as_str(), "Skipping disabled worker");
                continue;
            }

            let state = self.state.clone();
            let name_str = spec.name.as_str();
            let ctx = JobContext {
                stop: self.stop.clone(),
                in_flight: self.in_flight.clone(),
            };

            match spec.name {
                WorkerName::Ingestion => {
                    add_job(scheduler, &spec, ctx, move || {
                        let state = state.clone();
                        async move {
                            ingestion::run(&state).await;
                        }
                    })
                    .await;
                }
                WorkerName::Rollup => {
                    add_job(scheduler, &spec, ctx, move || {
                        let state = state.clone();
                        async move {
                            rollup::run(&state).await;
                        }
                    })
                    .await;
                }
            }
            tracing::info!(name = name_str, cron = %spec.cron, offset = %spec.offset, "Registered worker");
        }
    }
}

struct JobContext {
    stop: Shutdown,
    in_flight: Arc<InFlight>,
}

/// Add a job to the scheduler with an overlap guard and timeout wrapper.
///
/// Invocations after `stop` fires are skipped, as are invocations that would
/// overlap a still-running one of the same job.
async fn add_job<Fut, F>(scheduler: &JobScheduler, spec: &JobSpec, ctx: JobContext, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let name = spec.name.as_str();
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async_tz(spec.cron.as_str(), spec.offset, move |_uuid, _lock| {
        if ctx.stop.is_cancelled() {
            tracing::debug!(worker = name, "Shutdown requested; not starting worker");
            return Box::pin(async {});
        }

        let guard = running.clone();
        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(
                worker = name,
                "Skipping worker invocation: previous run still in progress"
            );
            return Box::pin(async {});
        }

        let tracked = ctx.in_flight.enter();
        let fut = run();
        Box::pin(async move {
            match tokio::time::timeout(WORKER_TIMEOUT, fut).await {
                Ok(()) => {}
                Err(_) => {
                    tracing::error!(
                        worker = name,
                        timeout_secs = WORKER_TIMEOUT.as_secs(),
                        "Worker timed out"
                    );
                }
            }
            guard.store(false, Ordering::SeqCst);
            drop(tracked);
        })
    });

    match job {
        Ok(job) => {
            if let Err(err) = scheduler.add(job).await {
                tracing::error!(error = %err, cron = %spec.cron, worker = name, "Failed to add worker job");
            }
        }
        Err(err) => {
            tracing::error!(error = %err, cron = %spec.cron, worker = name, "Failed to create worker job")
        }
    }
}
