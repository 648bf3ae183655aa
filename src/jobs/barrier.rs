//! # Job Barrier
//!
//! Blocks the calling thread until a set of jobs reached a terminal status,
//! a timeout elapsed or the caller cancelled the wait. The remote jobs are
//! never cancelled by the barrier.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::job::{Job, JobId, JobRegistry, JobStatus};
use crate::observability::{Event, Logger};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cooperative cancellation flag shared between a waiter and its owner
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Why the barrier returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    /// Every job is terminal
    Completed,
    TimedOut,
    Cancelled,
}

/// Last observed status per job
#[derive(Debug, Clone)]
pub struct BarrierResult {
    pub outcome: BarrierOutcome,
    pub statuses: BTreeMap<JobId, JobStatus>,
}

impl BarrierResult {
    /// All jobs finished successfully
    pub fn is_success(&self) -> bool {
        self.outcome == BarrierOutcome::Completed
            && self.statuses.values().all(|s| *s == JobStatus::Finished)
    }

    /// First job that did not finish, with its status
    pub fn first_unfinished(&self) -> Option<(JobId, JobStatus)> {
        self.statuses
            .iter()
            .find(|(_, status)| **status != JobStatus::Finished)
            .map(|(id, status)| (*id, *status))
    }
}

/// Waits for a set of jobs
pub struct JobBarrier<'a> {
    registry: &'a dyn JobRegistry,
    jobs: Vec<Job>,
    timeout: Duration,
    poll_interval: Duration,
    cancellation: Option<CancellationToken>,
}

impl<'a> JobBarrier<'a> {
    pub fn new(registry: &'a dyn JobRegistry, jobs: impl IntoIterator<Item = Job>) -> Self {
        Self {
            registry,
            jobs: jobs.into_iter().collect(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancellation: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Poll the registry until every job is terminal, the timeout elapses or
    /// the token is cancelled.
    pub fn wait_for_jobs(self) -> BarrierResult {
        let deadline = Instant::now() + self.timeout;
        let mut statuses: BTreeMap<JobId, JobStatus> =
            self.jobs.iter().map(|job| (job.id, job.status)).collect();

        loop {
            for (id, status) in statuses.iter_mut() {
                if status.is_terminal() {
                    continue;
                }
                // Registry hiccups are retried on the next poll
                match self.registry.job(*id) {
                    Ok(job) => *status = job.status,
                    Err(e) => Logger::warn(
                        Event::JobNotFinished.as_str(),
                        &[
                            ("error", e.to_string().as_str()),
                            ("job", id.to_string().as_str()),
                        ],
                    ),
                }
            }

            if statuses.values().all(JobStatus::is_terminal) {
                return self.finish(BarrierOutcome::Completed, statuses);
            }
            if self.is_cancelled() {
                return self.finish(BarrierOutcome::Cancelled, statuses);
            }
            let now = Instant::now();
            if now >= deadline {
                return self.finish(BarrierOutcome::TimedOut, statuses);
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    fn finish(&self, outcome: BarrierOutcome, statuses: BTreeMap<JobId, JobStatus>) -> BarrierResult {
        let result = BarrierResult { outcome, statuses };
        if let Some((job, status)) = result.first_unfinished() {
            let outcome = format!("{:?}", result.outcome);
            Logger::warn(
                Event::JobNotFinished.as_str(),
                &[
                    ("job", job.to_string().as_str()),
                    ("outcome", outcome.as_str()),
                    ("status", status.as_str()),
                ],
            );
        }
        result
    }
}
