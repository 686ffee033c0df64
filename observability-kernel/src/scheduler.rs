//! Periodic task driver running on a single background tokio task.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, trace};

/// Work executed on every tick of its period.
///
/// Bodies should be bounded: tasks run one after another on the same worker,
/// so a slow task delays every task due after it.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Runs one tick.
    async fn run(&self);
}

#[async_trait]
impl<F, Fut> PeriodicTask for F
where
    F: Send + Sync + Fn() -> Fut,
    Fut: Future<Output = ()> + Send,
{
    async fn run(&self) {
        (self)().await;
    }
}

struct Entry {
    name: String,
    period: Duration,
    task: Arc<dyn PeriodicTask>,
}

/// Collects periodic tasks before the worker is started.
#[derive(Default)]
pub struct PeriodicScheduler {
    entries: Vec<Entry>,
}

impl fmt::Debug for PeriodicScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicScheduler")
            .field(
                "tasks",
                &self
                    .entries
                    .iter()
                    .map(|entry| (entry.name.as_str(), entry.period))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl PeriodicScheduler {
    /// Creates a scheduler with no tasks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `task` to run every `period`, first after one full period.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidPeriod`] for a zero period.
    pub fn schedule(
        &mut self,
        name: impl Into<String>,
        period: Duration,
        task: impl PeriodicTask + 'static,
    ) -> SchedulerResult<()> {
        self.schedule_shared(name, period, Arc::new(task))
    }

    /// Registers an already shared task.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidPeriod`] for a zero period.
    pub fn schedule_shared(
        &mut self,
        name: impl Into<String>,
        period: Duration,
        task: Arc<dyn PeriodicTask>,
    ) -> SchedulerResult<()> {
        let name = name.into();
        if period.is_zero() {
            return Err(SchedulerError::InvalidPeriod { name });
        }
        self.entries.push(Entry { name, period, task });
        Ok(())
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no task is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawns the worker and returns a handle controlling it.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn start(self) -> SchedulerHandle {
        let closed = Arc::new(AtomicBool::new(false));
        let (shutdown, signal) = watch::channel(false);
        let worker = tokio::spawn(run_worker(self.entries, Arc::clone(&closed), signal));
        SchedulerHandle {
            closed,
            shutdown,
            worker: Some(worker),
        }
    }
}

/// Controls a running [`PeriodicScheduler`] worker.
///
/// Dropping the handle without calling [`Self::close`] also stops the worker
/// at its next wake-up.
pub struct SchedulerHandle {
    closed: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("closed", &self.is_closed())
            .field("worker", &self.worker.is_some())
            .finish()
    }
}

impl SchedulerHandle {
    /// Stops scheduling new ticks. A task already running finishes normally.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.shutdown.send_replace(true);
    }

    /// Returns `true` once [`Self::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Waits for the worker to exit. Call [`Self::close`] first.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Worker`] if the worker task was cancelled or
    /// panicked outside a task body.
    pub async fn join(&mut self) -> SchedulerResult<()> {
        if let Some(worker) = self.worker.take() {
            worker.await?;
        }
        Ok(())
    }

    /// Closes the scheduler and waits for the in-flight tick to finish.
    ///
    /// # Errors
    ///
    /// See [`Self::join`].
    pub async fn shutdown(mut self) -> SchedulerResult<()> {
        self.close();
        self.join().await
    }
}

async fn run_worker(
    entries: Vec<Entry>,
    closed: Arc<AtomicBool>,
    mut signal: watch::Receiver<bool>,
) {
    let started = Instant::now();
    let mut due: Vec<Instant> = entries
        .iter()
        .map(|entry| started + entry.period)
        .collect();
    debug!(tasks = entries.len(), "periodic scheduler started");

    loop {
        if closed.load(Ordering::Acquire) {
            break;
        }
        let Some(wake) = due.iter().min().copied() else {
            let _ = signal.changed().await;
            break;
        };

        tokio::select! {
            () = sleep_until(wake) => {}
            _ = signal.changed() => break,
        }

        for (entry, next) in entries.iter().zip(due.iter_mut()) {
            if closed.load(Ordering::Acquire) {
                break;
            }
            if *next > Instant::now() {
                continue;
            }
            run_isolated(entry).await;

            // Missed ticks are skipped rather than replayed in a burst.
            let now = Instant::now();
            *next += entry.period;
            if *next <= now {
                *next = now + entry.period;
            }
        }
    }

    debug!("periodic scheduler stopped");
}

async fn run_isolated(entry: &Entry) {
    trace!(task = %entry.name, "periodic task tick");
    if AssertUnwindSafe(entry.task.run())
        .catch_unwind()
        .await
        .is_err()
    {
        error!(task = %entry.name, "periodic task panicked");
    }
}

/// Errors produced by the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A task was registered with a zero period.
    #[error("task `{name}` must have a non-zero period")]
    InvalidPeriod {
        /// Name of the rejected task.
        name: String,
    },
    /// The worker task failed to complete.
    #[error("scheduler worker failed: {source}")]
    Worker {
        /// Source [`JoinError`].
        #[from]
        source: JoinError,
    },
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl PeriodicTask + 'static {
        let counter = Arc::clone(counter);
        move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn zero_period_is_rejected() {
        let mut scheduler = PeriodicScheduler::new();
        let err = scheduler
            .schedule("flush", Duration::ZERO, || async {})
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidPeriod { name } if name == "flush"));
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn tasks_run_repeatedly_until_shutdown() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = PeriodicScheduler::new();
        scheduler
            .schedule("tick", Duration::from_millis(10), counter_task(&counter))
            .unwrap();

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.shutdown().await.unwrap();

        let runs = counter.load(Ordering::SeqCst);
        assert!(runs >= 3, "expected several ticks, saw {runs}");
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(counter.load(Ordering::SeqCst), runs);
    }

    #[tokio::test]
    async fn tasks_due_together_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = PeriodicScheduler::new();
        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            scheduler
                .schedule(name, Duration::from_millis(20), move || {
                    let order = Arc::clone(&order);
                    async move {
                        order.lock().unwrap().push(name);
                    }
                })
                .unwrap();
        }

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await.unwrap();

        let order = order.lock().unwrap();
        assert!(order.len() >= 3);
        assert_eq!(&order[..3], ["first", "second", "third"]);
    }

    #[tokio::test]
    async fn panicking_task_does_not_stop_the_others() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = PeriodicScheduler::new();
        scheduler
            .schedule("explodes", Duration::from_millis(10), || async {
                panic!("task failure");
            })
            .unwrap();
        scheduler
            .schedule("counts", Duration::from_millis(10), counter_task(&counter))
            .unwrap();

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.shutdown().await.unwrap();

        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn shutdown_waits_for_the_in_flight_tick() {
        let finished = Arc::new(AtomicBool::new(false));
        let started = Arc::new(tokio::sync::Notify::new());
        let mut scheduler = PeriodicScheduler::new();
        {
            let finished = Arc::clone(&finished);
            let started = Arc::clone(&started);
            scheduler
                .schedule("slow", Duration::from_millis(5), move || {
                    let finished = Arc::clone(&finished);
                    let started = Arc::clone(&started);
                    async move {
                        started.notify_one();
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        finished.store(true, Ordering::SeqCst);
                    }
                })
                .unwrap();
        }

        let handle = scheduler.start();
        started.notified().await;
        assert!(!finished.load(Ordering::SeqCst));
        handle.shutdown().await.unwrap();
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn empty_scheduler_shuts_down_cleanly() {
        let handle = PeriodicScheduler::new().start();
        assert!(!handle.is_closed());
        handle.shutdown().await.unwrap();
    }
}
