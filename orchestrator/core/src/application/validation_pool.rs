// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Validation Pool
//!
//! Bounded worker pool for background jobs that must outlive the request
//! that started them (post-stream compliance validation, memory recording).
//! Jobs run under the pool's own cancellation scope, never the request's;
//! their errors are logged and dropped.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::domain::error::GuidanceError;

/// Guards closing and reopening the tracker. `wait_idle` may only reopen
/// when no other waiter still needs it closed and shutdown has not begun.
struct Lifecycle {
    accepting: bool,
    idle_waiters: usize,
}

pub struct ValidationPool {
    permits: Arc<Semaphore>,
    root: CancellationToken,
    tracker: TaskTracker,
    lifecycle: Mutex<Lifecycle>,
}

impl ValidationPool {
    pub fn new(workers: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            root: CancellationToken::new(),
            tracker: TaskTracker::new(),
            lifecycle: Mutex::new(Lifecycle {
                accepting: true,
                idle_waiters: 0,
            }),
        }
    }

    /// Queue a job. It starts once a worker slot is free and receives a
    /// token that fires when the pool is cancelled. Returns `false` after
    /// shutdown, when the job is dropped unrun.
    pub fn submit<F, Fut>(&self, job_name: &'static str, job: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), GuidanceError>> + Send + 'static,
    {
        if !self.lifecycle.lock().accepting {
            warn!(job = job_name, "Validation pool is shut down, dropping job");
            return false;
        }

        let permits = self.permits.clone();
        let cancel = self.root.child_token();
        self.tracker.spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(job = job_name, "Background job cancelled before start");
                    return;
                }
                permit = permits.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            match job(cancel).await {
                Ok(()) => debug!(job = job_name, "Background job finished"),
                Err(GuidanceError::Cancelled) => debug!(job = job_name, "Background job cancelled"),
                Err(e) => warn!(job = job_name, error = %e, "Background job failed"),
            }
        });
        true
    }

    /// Number of queued or running jobs
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every job submitted so far has finished. The pool keeps
    /// accepting work afterwards unless it was shut down meanwhile.
    pub async fn wait_idle(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.idle_waiters += 1;
            self.tracker.close();
        }
        self.tracker.wait().await;

        let mut lifecycle = self.lifecycle.lock();
        lifecycle.idle_waiters -= 1;
        if lifecycle.idle_waiters == 0 && lifecycle.accepting {
            self.tracker.reopen();
        }
    }

    /// Signal every queued and running job to stop.
    pub fn cancel(&self) {
        self.root.cancel();
    }

    /// Stop accepting work and drain what is already queued.
    pub async fn shutdown(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.accepting = false;
            self.tracker.close();
        }
        info!(in_flight = self.tracker.len(), "Draining validation pool");
        self.tracker.wait().await;
    }
}
