//! Bounded-concurrency execution of independent units.
//!
//! The scheduler builds a dedicated pool of exactly `limit` threads and starts
//! one worker per thread. Workers pull units from a shared queue until it is
//! empty, so no more than `limit` units ever run at once and each running
//! unit holds at most one input and one output descriptor.
//!
//! Failure handling follows [`FailurePolicy`]. With the default
//! [`FailurePolicy::Abort`], the first failure stops admission of new units
//! while units already running finish on their own; the call returns once
//! every admitted unit has resolved.

use crate::error::{BatchError, UnitFailure};
use anyhow::{Context, Result, anyhow};
use crossbeam_channel::unbounded;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error};

/// What to do once a unit fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop admitting new units; let running ones finish.
    #[default]
    Abort,
    /// Keep going and report every failure at the end.
    Continue,
}

/// Summary of a successful run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Units handed to a worker.
    pub admitted: usize,
    pub succeeded: usize,
    /// Highest number of units observed running at the same time.
    pub peak_concurrency: usize,
}

/// Runs units on a fixed-size worker pool.
#[derive(Clone, Copy, Debug)]
pub struct Scheduler {
    limit: usize,
    policy: FailurePolicy,
}

impl Scheduler {
    /// A scheduler running at most `limit` units at once (minimum 1).
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            policy: FailurePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `work` over every unit.
    ///
    /// Units are dequeued in order; completion order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns a [`BatchError`] (inside the `anyhow::Error`) listing every
    /// failed unit, or an error if the worker pool cannot be built.
    pub fn run<T, L, F>(&self, units: Vec<T>, label: L, work: F) -> Result<RunReport>
    where
        T: Send,
        L: Fn(&T) -> String + Sync,
        F: Fn(T) -> Result<()> + Sync,
    {
        if units.is_empty() {
            return Ok(RunReport::default());
        }
        let workers = self.limit.min(units.len());

        let (tx, rx) = unbounded::<(usize, T)>();
        for item in units.into_iter().enumerate() {
            // Cannot fail: `rx` outlives every send.
            let _ = tx.send(item);
        }
        drop(tx);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("shardfix-worker-{i}"))
            .build()
            .context("build worker pool")?;

        let stop = AtomicBool::new(false);
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let admitted = AtomicUsize::new(0);
        let succeeded = AtomicUsize::new(0);
        let failures: Mutex<Vec<(usize, UnitFailure)>> = Mutex::new(Vec::new());

        pool.scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| {
                    while let Ok((index, unit)) = rx.recv() {
                        if stop.load(Ordering::Acquire) {
                            continue;
                        }
                        admitted.fetch_add(1, Ordering::Relaxed);
                        let now = running.fetch_add(1, Ordering::AcqRel) + 1;
                        peak.fetch_max(now, Ordering::AcqRel);

                        let name = label(&unit);
                        debug!(unit = %name, "unit started");
                        // A panicking unit fails alone instead of tearing down the pool.
                        let outcome = catch_unwind(AssertUnwindSafe(|| work(unit)))
                            .unwrap_or_else(|payload| {
                                Err(anyhow!("unit panicked: {}", panic_message(payload.as_ref())))
                            });
                        running.fetch_sub(1, Ordering::AcqRel);

                        match outcome {
                            Ok(()) => {
                                succeeded.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                error!(unit = %name, error = %format!("{e:#}"), "unit failed");
                                if self.policy == FailurePolicy::Abort {
                                    stop.store(true, Ordering::Release);
                                }
                                failures
                                    .lock()
                                    .unwrap_or_else(PoisonError::into_inner)
                                    .push((index, UnitFailure { label: name, error: e }));
                            }
                        }
                    }
                });
            }
        });

        let admitted = admitted.into_inner();
        let mut failures = failures.into_inner().unwrap_or_else(PoisonError::into_inner);
        if !failures.is_empty() {
            failures.sort_by_key(|(index, _)| *index);
            return Err(BatchError {
                admitted,
                failures: failures.into_iter().map(|(_, f)| f).collect(),
            }
            .into());
        }

        Ok(RunReport {
            admitted,
            succeeded: succeeded.into_inner(),
            peak_concurrency: peak.into_inner(),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
