//! Sequential "waterfall" job execution.
//!
//! An [`Executor`] drains a live [`JobQueue`] one job at a time, in order, and
//! settles with the value of the last job. Jobs may produce their value
//! immediately or through a future. With [`RunOptions::wait_for_items`] the run
//! stays open after the queue empties and keeps picking up jobs pushed onto the
//! queue until [`Executor::stop`] is called or the wait times out.

mod config;
mod error;
mod executor;
mod job;
mod options;
mod queue;
pub mod shell;

pub use config::{OPTIONS_ENV_VAR, load_options_file, load_run_options, resolve_options_path};
pub use error::{WaterfallError, WaterfallResult};
pub use executor::{Continuation, ContinuationHook, ContinuationState, Executor, ExecutorConfig};
pub use job::{Job, JobFuture, JobOutput};
pub use options::{DEFAULT_CHECK_INTERVAL, RunOptions};
pub use queue::JobQueue;
