//! Jobs: deferred units of work that produce a value now or later.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future produced by an asynchronous job.
pub type JobFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'static>>;

/// What a job yields when it is invoked.
pub enum JobOutput<T> {
    /// The job finished synchronously.
    Ready(anyhow::Result<T>),
    /// The job handed back a future that still has to settle.
    Pending(JobFuture<T>),
}

impl<T> JobOutput<T> {
    /// A successful synchronous value.
    pub fn ready(value: T) -> Self {
        Self::Ready(Ok(value))
    }

    /// A synchronous failure.
    pub fn failed(err: impl Into<anyhow::Error>) -> Self {
        Self::Ready(Err(err.into()))
    }

    /// An asynchronous result.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Wait for the outcome, suspending only if the job was asynchronous.
    pub(crate) async fn settle(self) -> anyhow::Result<T> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

impl<T> fmt::Debug for JobOutput<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(Ok(_)) => f.write_str("JobOutput::Ready(Ok(..))"),
            Self::Ready(Err(e)) => write!(f, "JobOutput::Ready(Err({}))", e),
            Self::Pending(_) => f.write_str("JobOutput::Pending(..)"),
        }
    }
}

type JobFn<T> = Box<dyn FnOnce() -> JobOutput<T> + Send + 'static>;

/// A unit of work queued on a waterfall executor.
///
/// The executor invokes each job exactly once and drops it right after its
/// outcome is known.
pub struct Job<T> {
    run: JobFn<T>,
    label: Option<String>,
}

impl<T: Send + 'static> Job<T> {
    /// Create a job from a closure returning a [`JobOutput`].
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> JobOutput<T> + Send + 'static,
    {
        Self {
            run: Box::new(f),
            label: None,
        }
    }

    /// A job that produces its value synchronously.
    pub fn value<F>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::new(move || JobOutput::ready(f()))
    }

    /// A synchronous job that may fail.
    pub fn fallible<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        Self::new(move || JobOutput::Ready(f()))
    }

    /// A job whose value arrives through a future.
    ///
    /// The closure runs when the job is invoked; the returned future is then
    /// awaited before the next job starts.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::new(move || JobOutput::pending(f()))
    }
}

impl<T> Job<T> {
    /// Attach a label, used in log output.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(crate) fn invoke(self) -> JobOutput<T> {
        (self.run)()
    }
}

impl<T> fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("label", &self.label).finish_non_exhaustive()
    }
}
