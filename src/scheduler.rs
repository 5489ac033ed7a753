//! Periodic job scheduler with a bounded worker pool
//!
//! The scheduler supervises a set of periodic jobs. Each job owns a timer
//! loop; when the timer fires, the scheduler tries to take a worker permit
//! without blocking. If the pool is exhausted the firing is skipped with a
//! warning - load shedding, never queuing.
//!
//! ## Cancellation
//!
//! Every job carries a watch channel. Stopping the scheduler (or removing
//! one job) flips the channel; the timer loop exits, and in-flight workers
//! drop their task future at the next await point. Dropping the future is
//! the cancellation: probes and sleeps are abandoned mid-await and any
//! spawned child process is killed.
//!
//! ## Retry
//!
//! A task that returns `Err` is re-attempted up to `max_retries` times with
//! linear backoff (`attempt + 1` seconds), checking for shutdown between
//! attempts.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use serde::Deserialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Scheduler tuning knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Size of the worker pool; bounds concurrent task executions
    pub worker_count: usize,

    /// Re-attempts after a failed task execution
    pub max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: 8,
            max_retries: 3,
        }
    }
}

impl SchedulerConfig {
    /// Bounds check, mirrored by the config loader.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_count == 0 {
            anyhow::bail!("scheduler.worker_count must be greater than 0");
        }
        if self.worker_count > 1000 {
            anyhow::bail!("scheduler.worker_count too large (max 1000)");
        }
        if self.max_retries > 10 {
            anyhow::bail!("scheduler.max_retries too large (max 10)");
        }
        Ok(())
    }
}

/// A task execution future, boxed so jobs can store heterogeneous tasks.
pub type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Factory producing one execution attempt. Each retry builds a fresh
/// future from this.
pub type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// A job registered with the scheduler: an id, an interval, and a task.
pub struct ScheduledJob {
    pub id: String,
    pub interval: Duration,
    pub task: TaskFn,
}

impl ScheduledJob {
    pub fn new<F, Fut>(id: impl Into<String>, interval: Duration, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            interval,
            task: Arc::new(move || Box::pin(task())),
        }
    }
}

struct JobHandle {
    shutdown: watch::Sender<bool>,
    runner: JoinHandle<()>,
}

#[derive(Default)]
struct SchedulerState {
    running: bool,
    jobs: HashMap<String, JobHandle>,
}

/// Worker-pool driven periodic task runner.
pub struct Scheduler {
    config: SchedulerConfig,
    workers: Arc<Semaphore>,
    state: Mutex<SchedulerState>,
    skipped: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let workers = Arc::new(Semaphore::new(config.worker_count));
        Self {
            config,
            workers,
            state: Mutex::new(SchedulerState::default()),
            skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Transition idle -> running. Fails on double start.
    pub fn start(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().expect("scheduler lock poisoned");
        if state.running {
            anyhow::bail!("scheduler is already running");
        }
        state.running = true;
        info!(worker_count = self.config.worker_count, "scheduler started");
        Ok(())
    }

    /// Whether the scheduler is currently running.
    pub fn is_running(&self) -> bool {
        self.state.lock().expect("scheduler lock poisoned").running
    }

    /// Number of currently registered jobs.
    pub fn job_count(&self) -> usize {
        self.state.lock().expect("scheduler lock poisoned").jobs.len()
    }

    /// Firings dropped because the worker pool was exhausted.
    pub fn skipped_count(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Register a job and kick an immediate first execution.
    ///
    /// Rejects when the scheduler is not running or the id is taken.
    pub fn add_job(&self, job: ScheduledJob) -> anyhow::Result<()> {
        let mut state = self.state.lock().expect("scheduler lock poisoned");
        if !state.running {
            anyhow::bail!("scheduler is not running");
        }
        if state.jobs.contains_key(&job.id) {
            anyhow::bail!("job with ID {} already exists", job.id);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = tokio::spawn(run_job(
            job.id.clone(),
            job.interval,
            job.task,
            Arc::clone(&self.workers),
            self.config.max_retries,
            Arc::clone(&self.skipped),
            shutdown_rx,
        ));

        debug!(job_id = %job.id, interval = ?job.interval, "job added");
        state.jobs.insert(
            job.id,
            JobHandle {
                shutdown: shutdown_tx,
                runner,
            },
        );
        Ok(())
    }

    /// Stop and forget one job. Errors when the id is unknown.
    pub async fn remove_job(&self, job_id: &str) -> anyhow::Result<()> {
        let handle = {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            state
                .jobs
                .remove(job_id)
                .ok_or_else(|| anyhow::anyhow!("job with ID {job_id} not found"))?
        };

        let _ = handle.shutdown.send(true);
        let _ = handle.runner.await;
        debug!(job_id, "job removed");
        Ok(())
    }

    /// Stop every job and wait for in-flight workers to finish.
    ///
    /// No-op when not running. Returns only after all outstanding task
    /// executions have completed or observed cancellation.
    pub async fn stop(&self) {
        let handles: Vec<JobHandle> = {
            let mut state = self.state.lock().expect("scheduler lock poisoned");
            if !state.running {
                return;
            }
            state.running = false;
            state.jobs.drain().map(|(_, handle)| handle).collect()
        };

        info!("stopping scheduler");
        for handle in &handles {
            let _ = handle.shutdown.send(true);
        }
        for handle in handles {
            let _ = handle.runner.await;
        }

        // Workers hold permits for as long as they run; owning the whole
        // pool means every worker has finished.
        let permits = self
            .workers
            .acquire_many(self.config.worker_count as u32)
            .await
            .expect("semaphore closed");
        drop(permits);

        info!("scheduler stopped");
    }
}

/// One job's timer loop: fire immediately, then on every interval tick,
/// until the shutdown channel flips.
async fn run_job(
    job_id: String,
    interval: Duration,
    task: TaskFn,
    workers: Arc<Semaphore>,
    max_retries: u32,
    skipped: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(job_id, "job started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                dispatch(&job_id, &task, &workers, max_retries, &skipped, &shutdown);
            }
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    debug!(job_id, "job stopped");
                    return;
                }
            }
        }
    }
}

/// Try to hand one firing to the worker pool; shed it when full.
fn dispatch(
    job_id: &str,
    task: &TaskFn,
    workers: &Arc<Semaphore>,
    max_retries: u32,
    skipped: &Arc<AtomicU64>,
    shutdown: &watch::Receiver<bool>,
) {
    match Arc::clone(workers).try_acquire_owned() {
        Ok(permit) => {
            let job_id = job_id.to_string();
            let task = Arc::clone(task);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let execution = execute_with_retry(&job_id, &task, max_retries, shutdown);
                // A panicking task must not take the scheduler down; log it
                // and hand the worker permit back.
                if std::panic::AssertUnwindSafe(execution)
                    .catch_unwind()
                    .await
                    .is_err()
                {
                    error!(job_id, "task panicked");
                }
                drop(permit);
            });
        }
        Err(_) => {
            skipped.fetch_add(1, Ordering::Relaxed);
            warn!(job_id, "no workers available, skipping job execution");
        }
    }
}

/// Run one firing with retry and linear backoff.
async fn execute_with_retry(
    job_id: &str,
    task: &TaskFn,
    max_retries: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    for attempt in 0..=max_retries {
        if *shutdown.borrow() {
            return;
        }

        let execution = (task)();
        tokio::select! {
            result = execution => match result {
                Ok(()) => {
                    if attempt > 0 {
                        info!(job_id, attempt = attempt + 1, "job succeeded after retry");
                    }
                    return;
                }
                Err(err) if attempt < max_retries => {
                    warn!(job_id, attempt = attempt + 1, error = %err, "job failed, retrying");
                    let backoff = Duration::from_secs(u64::from(attempt) + 1);
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => return,
                    }
                }
                Err(err) => {
                    error!(job_id, attempts = attempt + 1, error = %err, "job failed after all retries");
                }
            },
            _ = shutdown.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn scheduler(worker_count: usize, max_retries: u32) -> Scheduler {
        Scheduler::new(SchedulerConfig {
            worker_count,
            max_retries,
        })
    }

    #[test]
    fn config_bounds() {
        assert!(SchedulerConfig::default().validate().is_ok());
        assert!(SchedulerConfig {
            worker_count: 0,
            max_retries: 0
        }
        .validate()
        .is_err());
        assert!(SchedulerConfig {
            worker_count: 1001,
            max_retries: 0
        }
        .validate()
        .is_err());
        assert!(SchedulerConfig {
            worker_count: 1,
            max_retries: 11
        }
        .validate()
        .is_err());
    }

    #[tokio::test]
    async fn double_start_fails() {
        let scheduler = scheduler(2, 0);
        scheduler.start().unwrap();
        assert!(scheduler.start().is_err());
        scheduler.stop().await;
        // Restart after stop is allowed
        scheduler.start().unwrap();
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn add_job_requires_running_scheduler() {
        let scheduler = scheduler(2, 0);
        let job = ScheduledJob::new("j1", Duration::from_secs(60), || async { Ok(()) });
        assert!(scheduler.add_job(job).is_err());
    }

    #[tokio::test]
    async fn duplicate_job_id_rejected() {
        let scheduler = scheduler(2, 0);
        scheduler.start().unwrap();

        let job = ScheduledJob::new("j1", Duration::from_secs(60), || async { Ok(()) });
        scheduler.add_job(job).unwrap();

        let dup = ScheduledJob::new("j1", Duration::from_secs(60), || async { Ok(()) });
        assert!(scheduler.add_job(dup).is_err());
        assert_eq!(scheduler.job_count(), 1);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn job_fires_immediately_and_periodically() {
        let scheduler = scheduler(2, 0);
        scheduler.start().unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let job = ScheduledJob::new("tick", Duration::from_millis(50), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        scheduler.add_job(job).unwrap();

        tokio::time::sleep(Duration::from_millis(180)).await;
        scheduler.stop().await;

        let count = fired.load(Ordering::SeqCst);
        assert!(count >= 3, "expected immediate + periodic firings, got {count}");
    }

    #[tokio::test]
    async fn remove_job_stops_firing() {
        let scheduler = scheduler(2, 0);
        scheduler.start().unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let job = ScheduledJob::new("gone", Duration::from_millis(30), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        scheduler.add_job(job).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        scheduler.remove_job("gone").await.unwrap();
        let after_removal = fired.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), after_removal);

        assert!(scheduler.remove_job("gone").await.is_err());
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn pool_exhaustion_skips_instead_of_queuing() {
        let scheduler = scheduler(1, 0);
        scheduler.start().unwrap();

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for id in ["slow-a", "slow-b"] {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let job = ScheduledJob::new(id, Duration::from_millis(40), move || {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    // Longer than the interval, so firings overlap demand
                    tokio::time::sleep(Duration::from_millis(120)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            });
            scheduler.add_job(job).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        scheduler.stop().await;

        assert_eq!(peak.load(Ordering::SeqCst), 1, "only one worker slot exists");
        assert!(
            scheduler.skipped_count() > 0,
            "exhausted pool must skip firings"
        );
    }

    #[tokio::test]
    async fn failed_task_retries_with_backoff() {
        tokio::time::pause();

        let scheduler = scheduler(2, 2);
        scheduler.start().unwrap();

        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let job = ScheduledJob::new("flaky", Duration::from_secs(3600), move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    anyhow::bail!("transient failure");
                }
                Ok(())
            }
        });
        scheduler.add_job(job).unwrap();

        // First attempt at t=0, retries after 1s and 2s of backoff; step the
        // clock so each backoff timer fires in order
        for _ in 0..16 {
            tokio::time::advance(Duration::from_millis(250)).await;
            tokio::task::yield_now().await;
        }
        scheduler.stop().await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stop_waits_for_inflight_and_cancels_sleepers() {
        let scheduler = scheduler(2, 0);
        scheduler.start().unwrap();

        let entered = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let entered_clone = Arc::clone(&entered);
        let finished_clone = Arc::clone(&finished);

        let job = ScheduledJob::new("sleepy", Duration::from_secs(3600), move || {
            let entered = Arc::clone(&entered_clone);
            let finished = Arc::clone(&finished_clone);
            async move {
                entered.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(600)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        scheduler.add_job(job).unwrap();

        // Let the immediate firing enter its sleep
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(entered.load(Ordering::SeqCst), 1);

        // Stop must return promptly: the in-flight future is dropped at its
        // await point rather than slept to completion
        tokio::time::timeout(Duration::from_secs(2), scheduler.stop())
            .await
            .expect("stop should not block on a cancelled task");
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_task_releases_its_worker() {
        let scheduler = scheduler(1, 0);
        scheduler.start().unwrap();

        let job = ScheduledJob::new("boom", Duration::from_secs(3600), || async {
            panic!("task exploded");
        });
        scheduler.add_job(job).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The single worker slot must be free again for another job
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let job = ScheduledJob::new("after", Duration::from_secs(3600), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        scheduler.add_job(job).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop().await;

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
