//! Observers for in-flight continuations.
//!
//! Every time the executor invokes a job it starts a new continuation: "wait
//! for this job's result, then run everything after it". A [`Continuation`]
//! lets a caller watch one of those, e.g. for progress reporting. Each
//! continuation of a run settles with the run's own outcome, latest first.

use crate::error::WaterfallResult;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Settlement state of a continuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContinuationState {
    /// The run has not settled yet.
    Pending,
    /// The run settled with a value.
    Resolved,
    /// The run failed; carries the error message.
    Failed(String),
    /// The run future was dropped before it settled.
    Abandoned,
}

impl ContinuationState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Handle to one continuation of a waterfall run.
#[derive(Debug, Clone)]
pub struct Continuation {
    run_id: Uuid,
    position: usize,
    state: watch::Receiver<ContinuationState>,
}

impl Continuation {
    /// Id of the run this continuation belongs to.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Zero-based position of the job that started this continuation.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Current state, without waiting.
    pub fn state(&self) -> ContinuationState {
        self.state.borrow().clone()
    }

    /// Wait until the continuation settles.
    pub async fn settled(&mut self) -> ContinuationState {
        match self.state.wait_for(ContinuationState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => ContinuationState::Abandoned,
        }
    }
}

/// Callback invoked with every new continuation.
pub type ContinuationHook = Arc<dyn Fn(Continuation) + Send + Sync>;

/// The open continuations of one run, oldest first.
#[derive(Default)]
pub(crate) struct ContinuationChain {
    senders: Vec<watch::Sender<ContinuationState>>,
}

impl ContinuationChain {
    pub(crate) fn open(&mut self, run_id: Uuid, position: usize) -> Continuation {
        let (tx, rx) = watch::channel(ContinuationState::Pending);
        self.senders.push(tx);
        Continuation {
            run_id,
            position,
            state: rx,
        }
    }

    /// Settle every open continuation with the run's outcome, innermost first.
    pub(crate) fn settle<T>(self, outcome: &WaterfallResult<T>) {
        let state = match outcome {
            Ok(_) => ContinuationState::Resolved,
            Err(err) => ContinuationState::Failed(err.to_string()),
        };
        for tx in self.senders.into_iter().rev() {
            tx.send_replace(state.clone());
        }
    }
}

impl fmt::Debug for ContinuationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuationChain")
            .field("open", &self.senders.len())
            .finish()
    }
}
