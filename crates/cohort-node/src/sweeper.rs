//! Settlement sweeper.
//!
//! A periodic pass over open groups:
//! - past expiry: lock if a tier is reached, otherwise cancel/expire
//! - still live: refresh cached progress
//!
//! Each group is its own transaction. A failure on one group is logged and
//! recorded in the [`SweepReport`]; the pass carries on with the rest.

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::models::GroupStatus;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Backoff for transient store errors during a sweep.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying only retryable errors with exponential backoff.
    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    warn!(attempt, ?delay, "transient store error, retrying: {}", e);
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub group_id: u64,
    pub error: String,
}

/// What one sweep pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub locked: Vec<u64>,
    pub expired: Vec<u64>,
    pub cancelled: Vec<u64>,
    /// Live groups whose cache was refreshed
    pub refreshed: usize,
    /// Groups that left `open` concurrently before the sweep reached them
    pub skipped: Vec<u64>,
    pub failed: Vec<SweepFailure>,
}

impl SweepReport {
    /// True when no group changed state or failed.
    pub fn is_quiet(&self) -> bool {
        self.locked.is_empty()
            && self.expired.is_empty()
            && self.cancelled.is_empty()
            && self.failed.is_empty()
    }

    fn record(&mut self, group_id: u64, status: GroupStatus) {
        match status {
            GroupStatus::Locked => self.locked.push(group_id),
            GroupStatus::Expired => self.expired.push(group_id),
            GroupStatus::Cancelled => self.cancelled.push(group_id),
            GroupStatus::Open => {}
        }
    }
}

pub struct Sweeper {
    engine: Arc<Engine>,
    interval: Duration,
    retry: RetryPolicy,
}

impl Sweeper {
    pub fn new(engine: Arc<Engine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One full pass. Fails only if the open groups cannot be listed.
    ///
    /// Walks the open-group index, so the cost follows the number of open
    /// groups rather than every group ever created.
    pub fn sweep_once(&self) -> Result<SweepReport> {
        let now = self.engine.now();
        let storage = self.engine.storage();
        let mut open = Vec::new();
        for group_id in storage.open_group_ids()? {
            match storage.get_group(group_id)? {
                Some(group) if group.is_open() => open.push(group),
                // closed between the index scan and the read
                _ => {}
            }
        }

        let mut report = SweepReport::default();
        for group in open {
            let group_id = group.id;
            let overdue = group.expires_at < now;
            let outcome = if overdue {
                self.retry
                    .run(|| self.settle_overdue(group_id))
                    .map(|status| report.record(group_id, status))
            } else {
                self.retry
                    .run(|| self.engine.refresh_progress(group_id))
                    .map(|_| report.refreshed += 1)
            };

            match outcome {
                Ok(()) => {}
                Err(Error::GroupNotOpen { status, .. }) => {
                    debug!(group_id, %status, "group settled concurrently, skipping");
                    report.skipped.push(group_id);
                }
                Err(e) => {
                    warn!(group_id, "sweep failed for group: {}", e);
                    report.failed.push(SweepFailure {
                        group_id,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Lock a group past its expiry if it reached a tier, else close it.
    fn settle_overdue(&self, group_id: u64) -> Result<GroupStatus> {
        let progress = self.engine.refresh_progress(group_id)?;
        if progress.has_tier() {
            match self.engine.lock(group_id) {
                Ok(_) => return Ok(GroupStatus::Locked),
                // weighted count reached a tier but headcount did not; it can never lock now
                Err(Error::MinimumParticipantsNotMet { required, actual }) => {
                    warn!(group_id, required, actual, "overdue group below minimum, closing instead");
                }
                Err(e) => return Err(e),
            }
        }
        self.engine.cancel_or_expire(group_id)
    }

    /// Sweep forever on the configured interval.
    pub async fn run(self: Arc<Self>) {
        info!("Settlement sweeper running every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let sweeper = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || sweeper.sweep_once()).await {
                Ok(Ok(report)) if report.is_quiet() => {
                    debug!(refreshed = report.refreshed, "sweep complete");
                }
                Ok(Ok(report)) => {
                    info!(
                        locked = report.locked.len(),
                        expired = report.expired.len(),
                        cancelled = report.cancelled.len(),
                        failed = report.failed.len(),
                        refreshed = report.refreshed,
                        "sweep complete"
                    );
                }
                Ok(Err(e)) => error!("Sweep failed: {}", e),
                Err(e) => error!("Sweep task failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retry_gives_up_after_attempts() {
        let policy = RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let calls = Cell::new(0);
        let result: Result<()> = policy.run(|| {
            calls.set(calls.get() + 1);
            Err(Error::TransientStore("busy".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_recovers_from_transient_error() {
        let policy = RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
        };
        let calls = Cell::new(0);
        let result = policy.run(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 2 {
                Err(Error::TransientStore("busy".into()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0);
        let result: Result<()> = policy.run(|| {
            calls.set(calls.get() + 1);
            Err(Error::group_not_found(1))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
