//! The waterfall executor.
//!
//! Runs the jobs of a live [`JobQueue`] one at a time, in order. The run
//! settles with the value of the last job that ran, or with the first failure.
//! With `wait_for_items` set, an empty queue does not end the run: the
//! executor polls every `check_interval` until new jobs arrive, [`Executor::stop`]
//! is called, or `wait_timeout` runs out.

mod continuation;
mod wait;

pub use continuation::{Continuation, ContinuationHook, ContinuationState};

use crate::error::{WaterfallError, WaterfallResult};
use crate::job::Job;
use crate::options::RunOptions;
use crate::queue::JobQueue;
use continuation::ContinuationChain;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Construction options for an [`Executor`].
#[derive(Clone, Default)]
pub struct ExecutorConfig {
    on_new_continuation: Option<ContinuationHook>,
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback that receives every new continuation.
    ///
    /// The callback runs synchronously on the executor's task, right after a
    /// job is invoked and before its result is awaited. It does not affect
    /// scheduling.
    pub fn on_new_continuation<F>(mut self, hook: F) -> Self
    where
        F: Fn(Continuation) + Send + Sync + 'static,
    {
        self.on_new_continuation = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("on_new_continuation", &self.on_new_continuation.is_some())
            .finish()
    }
}

struct RunState<T> {
    queue: JobQueue<T>,
    options: RunOptions,
    active: Option<Uuid>,
    /// Set by [`Executor::stop`]; the run takes no further jobs from the queue.
    stopped: bool,
    waiting_since: Option<Instant>,
}

pub(crate) struct Shared<T> {
    state: Mutex<RunState<T>>,
    on_new_continuation: Option<ContinuationHook>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, RunState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the next job from the live queue, unless the run was stopped.
    fn next_job(&self) -> Option<Job<T>> {
        let queue = {
            let state = self.lock();
            if state.stopped {
                return None;
            }
            state.queue.clone()
        };
        queue.pop_front()
    }

    fn waiting_enabled(&self) -> bool {
        self.lock().options.wait_for_items
    }

    fn has_work_or_stopped(&self) -> bool {
        let queue = {
            let state = self.lock();
            if state.stopped || !state.options.wait_for_items {
                return true;
            }
            state.queue.clone()
        };
        !queue.is_empty()
    }
}

/// Marks a run as active for as long as it is alive.
struct ActiveRun<'a, T> {
    shared: &'a Shared<T>,
    id: Uuid,
}

impl<T> Drop for ActiveRun<'_, T> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        if state.active == Some(self.id) {
            state.active = None;
            state.waiting_since = None;
        }
    }
}

/// Sequential, dynamically extensible job runner.
///
/// Clones share the same state, so a clone can be handed to another task to
/// call [`Executor::stop`] or inspect the live queue.
pub struct Executor<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Executor<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Send + 'static> Default for Executor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Executor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Executor")
            .field("active", &state.active)
            .field("options", &state.options)
            .field("waiting", &state.waiting_since.is_some())
            .finish()
    }
}

impl<T: Send + 'static> Executor<T> {
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RunState {
                    queue: JobQueue::new(),
                    options: RunOptions::default(),
                    active: None,
                    stopped: false,
                    waiting_since: None,
                }),
                on_new_continuation: config.on_new_continuation,
            }),
        }
    }

    /// Run `jobs` in order and settle with the last job's value.
    ///
    /// `jobs` becomes the live queue for this run: anything pushed to it (or to
    /// any clone of it) before the executor reaches the end is executed too.
    /// Returns `Ok(None)` if no job ran.
    pub async fn exec<Q>(&self, jobs: Q, options: RunOptions) -> WaterfallResult<Option<T>>
    where
        Q: Into<JobQueue<T>>,
    {
        options.validate()?;
        let run = self.begin(jobs.into(), options)?;

        let outcome = self.drain(run.id).await;
        match &outcome {
            Ok(_) => info!("Waterfall run {} finished", run.id),
            Err(err) => warn!("Waterfall run {} failed: {}", run.id, err),
        }
        outcome
    }

    /// Stop the active run.
    ///
    /// Pending jobs are dropped and waiting is disabled. A job already in
    /// flight still completes and its value settles the run. Jobs pushed after
    /// this call stay in the queue but are not run. Does nothing when no run
    /// is active.
    pub fn stop(&self) {
        let (run_id, queue) = {
            let mut state = self.shared.lock();
            let Some(run_id) = state.active else {
                return;
            };
            state.stopped = true;
            state.options.wait_for_items = false;
            (run_id, state.queue.clone())
        };
        let dropped = queue.clear();
        info!(
            "Stopping waterfall run {} ({} pending jobs dropped)",
            run_id, dropped
        );
    }

    /// Handle to the live queue of the current (or most recent) run.
    pub fn queue(&self) -> JobQueue<T> {
        self.shared.lock().queue.clone()
    }

    /// Number of jobs still waiting in the live queue.
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().active.is_some()
    }

    /// True while the active run is in the wait state.
    pub fn is_waiting(&self) -> bool {
        self.shared.lock().waiting_since.is_some()
    }

    fn begin(
        &self,
        queue: JobQueue<T>,
        options: RunOptions,
    ) -> WaterfallResult<ActiveRun<'_, T>> {
        let id = Uuid::new_v4();
        let pending = queue.len();

        let previous = {
            let mut state = self.shared.lock();
            if state.active.is_some() {
                return Err(WaterfallError::AlreadyRunning);
            }
            state.active = Some(id);
            state.stopped = false;
            state.waiting_since = None;
            state.options = options;
            std::mem::replace(&mut state.queue, queue)
        };
        // Jobs left over from an earlier run are dropped outside the lock.
        drop(previous);

        info!("Waterfall run {} started with {} queued jobs", id, pending);
        Ok(ActiveRun {
            shared: &self.shared,
            id,
        })
    }

    async fn drain(&self, run_id: Uuid) -> WaterfallResult<Option<T>> {
        let mut chain = ContinuationChain::default();
        let mut last = None;
        let mut position = 0;

        let outcome = loop {
            if let Some(job) = self.shared.next_job() {
                debug!(
                    "Run {}: running job {} ({})",
                    run_id,
                    position,
                    job.label().unwrap_or("unlabeled")
                );
                let output = job.invoke();
                if let Some(hook) = &self.shared.on_new_continuation {
                    hook(chain.open(run_id, position));
                }

                match output.settle().await {
                    Ok(value) => last = Some(value),
                    Err(source) => break Err(WaterfallError::JobFailed { position, source }),
                }
                position += 1;
                continue;
            }

            if !self.shared.waiting_enabled() {
                debug!("Run {}: queue empty after {} jobs", run_id, position);
                break Ok(last);
            }

            if let Err(err) = wait::wait_for_jobs(&self.shared, run_id).await {
                break Err(err);
            }
        };

        chain.settle(&outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_empty_queue_settles_with_none() {
        let executor: Executor<u32> = Executor::new();
        let result = executor.exec(JobQueue::new(), RunOptions::default()).await;
        assert_eq!(result.unwrap(), None);
        assert!(!executor.is_running());
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_any_job() {
        let executor: Executor<u32> = Executor::new();
        let ran = Arc::new(Mutex::new(false));
        let job = {
            let ran = ran.clone();
            Job::value(move || {
                *ran.lock().unwrap() = true;
                1
            })
        };

        let err = executor
            .exec(
                vec![job],
                RunOptions::default().with_check_interval(Duration::ZERO),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WaterfallError::InvalidOptions(_)));
        assert!(!*ran.lock().unwrap());
        assert!(!executor.is_running());
    }

    #[test]
    fn test_stop_without_run_is_noop() {
        let executor: Executor<u32> = Executor::new();
        let queue = executor.queue();
        queue.push(Job::value(|| 1));

        executor.stop();
        executor.stop();

        assert_eq!(executor.pending(), 1);
        assert!(!executor.is_waiting());
    }

    #[tokio::test]
    async fn test_next_run_is_not_stopped_by_previous_stop() {
        let executor: Executor<u32> = Executor::new();
        let stopper = executor.clone();
        let first = executor
            .exec(
                vec![Job::value(move || {
                    stopper.stop();
                    1
                })],
                RunOptions::default(),
            )
            .await;
        assert_eq!(first.unwrap(), Some(1));

        let second = executor
            .exec(vec![Job::value(|| 2), Job::value(|| 3)], RunOptions::default())
            .await;
        assert_eq!(second.unwrap(), Some(3));
    }

    #[test]
    fn test_config_debug_hides_callback() {
        let config = ExecutorConfig::new().on_new_continuation(|_| {});
        assert_eq!(
            format!("{:?}", config),
            "ExecutorConfig { on_new_continuation: true }"
        );
    }
}
