//! The live job queue shared between an executor and its producers.
//!
//! Cloning a [`JobQueue`] yields another handle to the same queue. The executor
//! pops from the front while producers push to the back; each operation takes
//! a short-lived lock that is never held while a job (or a job's drop glue)
//! runs, so jobs may themselves push new work.

use crate::job::Job;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct JobQueue<T> {
    inner: Arc<Mutex<VecDeque<Job<T>>>>,
}

impl<T> JobQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Job<T>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a job to the back of the queue.
    pub fn push(&self, job: Job<T>) {
        self.lock().push_back(job);
    }

    /// Append several jobs, preserving their order.
    pub fn extend(&self, jobs: impl IntoIterator<Item = Job<T>>) {
        let jobs: Vec<Job<T>> = jobs.into_iter().collect();
        self.lock().extend(jobs);
    }

    /// Number of jobs still pending.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every pending job. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let drained: Vec<Job<T>> = self.lock().drain(..).collect();
        drained.len()
    }

    /// True if both handles refer to the same queue.
    pub fn same_queue(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn pop_front(&self) -> Option<Job<T>> {
        self.lock().pop_front()
    }
}

impl<T> Clone for JobQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<Job<T>> for JobQueue<T> {
    fn from_iter<I: IntoIterator<Item = Job<T>>>(iter: I) -> Self {
        Self {
            inner: Arc::new(Mutex::new(iter.into_iter().collect())),
        }
    }
}

impl<T> From<Vec<Job<T>>> for JobQueue<T> {
    fn from(jobs: Vec<Job<T>>) -> Self {
        jobs.into_iter().collect()
    }
}

impl<T> fmt::Debug for JobQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue").field("pending", &self.len()).finish()
    }
}
