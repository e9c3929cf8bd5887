//! Bounded parallel integration.
//!
//! `[lower_limit, upper_limit]` is cut into sub-intervals of width 0.5.
//! Each one is integrated on a worker slot; at most `max_threads` slots
//! exist, and a slot is reused only after the orchestrator has harvested
//! its previous result. Harvesting always picks the lowest finished slot.

mod slots;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::debug;

use crate::integrator::integrate;
use crate::step::StepSize;
use slots::{Harvest, SlotTable};

pub const SUB_INTERVAL_WIDTH: f64 = 0.5;
pub const DEFAULT_MAX_THREADS: usize = 16;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("upper limit {upper} is below lower limit {lower}")]
    InvalidRange { lower: i64, upper: i64 },
    #[error("max_threads must be at least 1")]
    InvalidThreadCount,
    #[error("range [{lower}, {upper}] has more sub-intervals than fit in usize")]
    RangeTooLarge { lower: i64, upper: i64 },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("integrand panicked on sub-interval {index} [{lower}, {upper}]: {message}")]
    WorkerPanicked {
        index: usize,
        lower: f64,
        upper: f64,
        message: String,
    },
}

/// How the orchestrator waits for a slot to free up.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Reclaim {
    /// Sleep on a condition variable that workers signal on completion.
    #[default]
    Block,
    /// Re-scan the slots in a tight loop.
    Spin,
}

/// One 0.5-wide piece of the overall interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubInterval {
    pub index: usize,
    pub lower: f64,
    pub upper: f64,
}

impl SubInterval {
    pub fn new(lower_limit: i64, index: usize) -> Self {
        let lower = lower_limit as f64 + SUB_INTERVAL_WIDTH * index as f64;
        Self {
            index,
            lower,
            upper: lower + SUB_INTERVAL_WIDTH,
        }
    }
}

/// Number of sub-intervals covering `[lower_limit, upper_limit]`.
pub fn sub_interval_count(lower_limit: i64, upper_limit: i64) -> Result<usize, IntegrationError> {
    if upper_limit < lower_limit {
        return Err(IntegrationError::InvalidRange {
            lower: lower_limit,
            upper: upper_limit,
        });
    }
    usize::try_from(upper_limit.abs_diff(lower_limit))
        .ok()
        .and_then(|width| width.checked_mul(2))
        .ok_or(IntegrationError::RangeTooLarge {
            lower: lower_limit,
            upper: upper_limit,
        })
}

/// Sub-intervals in dispatch order, built lazily.
pub fn partition(
    lower_limit: i64,
    upper_limit: i64,
) -> Result<impl ExactSizeIterator<Item = SubInterval>, IntegrationError> {
    let count = sub_interval_count(lower_limit, upper_limit)?;
    Ok((0..count).map(move |index| SubInterval::new(lower_limit, index)))
}

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    max_threads: usize,
    step: StepSize,
    reclaim: Reclaim,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            step: StepSize::default(),
            reclaim: Reclaim::default(),
        }
    }
}

impl Scheduler {
    pub fn new(max_threads: usize, step: StepSize) -> Self {
        Self {
            max_threads,
            step,
            reclaim: Reclaim::default(),
        }
    }

    pub fn with_reclaim(mut self, reclaim: Reclaim) -> Self {
        self.reclaim = reclaim;
        self
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    pub fn step(&self) -> StepSize {
        self.step
    }

    pub fn reclaim(&self) -> Reclaim {
        self.reclaim
    }

    /// Integrates `f` over `[lower_limit, upper_limit]` on at most
    /// `max_threads` concurrent workers and sums the partial results.
    ///
    /// If the integrand panics on any worker, no further sub-intervals are
    /// started, every running worker is waited for, and the failure with the
    /// lowest sub-interval index is returned.
    pub fn run<F>(&self, f: F, lower_limit: i64, upper_limit: i64) -> Result<f64, IntegrationError>
    where
        F: Fn(f64) -> f64 + Sync,
    {
        if self.max_threads == 0 {
            return Err(IntegrationError::InvalidThreadCount);
        }
        let count = sub_interval_count(lower_limit, upper_limit)?;
        if count == 0 {
            return Ok(0.0);
        }

        let slot_count = self.max_threads.min(count);
        let step = self.step;
        let reclaim = self.reclaim;
        debug!(
            sub_intervals = count,
            slot_count,
            step = step.get(),
            ?reclaim,
            "starting parallel integration"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(slot_count)
            .thread_name(|i| format!("riemann-slot-{}", i))
            .build()?;
        let table = SlotTable::new(slot_count);
        let f = &f;
        let table_ref = &table;

        let mut total = 0.0;
        let mut failures = Vec::new();

        pool.in_place_scope(|scope| {
            for index in 0..count {
                let sub_interval = SubInterval::new(lower_limit, index);
                let slot = if sub_interval.index < slot_count {
                    sub_interval.index
                } else {
                    let harvest = table_ref.reclaim(reclaim);
                    debug!(slot = harvest.slot, index = harvest.sub_interval.index, "reclaimed slot");
                    let slot = harvest.slot;
                    match harvest.outcome {
                        Ok(value) => total += value,
                        Err(_) => {
                            failures.push(harvest);
                            break;
                        }
                    }
                    slot
                };

                table_ref.start(slot, sub_interval);
                debug!(slot, index = sub_interval.index, "dispatched sub-interval");
                scope.spawn(move |_| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        integrate(f, sub_interval.lower, sub_interval.upper, step)
                    }))
                    .map_err(panic_message);
                    table_ref.complete(slot, sub_interval, outcome);
                });
            }

            for harvest in table_ref.drain(reclaim) {
                match harvest.outcome {
                    Ok(value) => total += value,
                    Err(_) => failures.push(harvest),
                }
            }
        });

        if let Some(failure) = lowest_failure(failures) {
            return Err(failure);
        }

        debug!(total, "parallel integration finished");
        Ok(total)
    }
}

/// Integrates `f` over `[lower_limit, upper_limit]` using blocking reclaim.
pub fn parallel_integrate<F>(
    f: F,
    lower_limit: i64,
    upper_limit: i64,
    max_threads: usize,
    step: StepSize,
) -> Result<f64, IntegrationError>
where
    F: Fn(f64) -> f64 + Sync,
{
    Scheduler::new(max_threads, step).run(f, lower_limit, upper_limit)
}

fn lowest_failure(failures: Vec<Harvest>) -> Option<IntegrationError> {
    failures
        .into_iter()
        .min_by_key(|harvest| harvest.sub_interval.index)
        .map(|harvest| IntegrationError::WorkerPanicked {
            index: harvest.sub_interval.index,
            lower: harvest.sub_interval.lower,
            upper: harvest.sub_interval.upper,
            message: harvest.outcome.err().unwrap_or_default(),
        })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread::{self, ThreadId};

    fn step(value: f64) -> StepSize {
        StepSize::new(value).unwrap()
    }

    #[test]
    fn test_partition_layout() {
        let parts: Vec<SubInterval> = partition(-1, 1).unwrap().collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], SubInterval { index: 0, lower: -1.0, upper: -0.5 });
        assert_eq!(parts[3], SubInterval { index: 3, lower: 0.5, upper: 1.0 });
        for pair in parts.windows(2) {
            assert_eq!(pair[0].upper, pair[1].lower);
        }
    }

    #[test]
    fn test_empty_interval_is_zero() {
        assert_eq!(partition(3, 3).unwrap().len(), 0);
        assert_eq!(partition(0, 10).unwrap().len(), 20);
        assert_eq!(parallel_integrate(|x| x, 3, 3, 4, step(0.1)).unwrap(), 0.0);
    }

    #[test]
    fn test_rejects_reversed_range() {
        let err = parallel_integrate(|x| x, 5, 2, 4, step(0.1)).unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidRange { lower: 5, upper: 2 }));
    }

    #[test]
    fn test_rejects_range_wider_than_usize() {
        let (lower, upper) = (-(1i64 << 62), 1i64 << 62);
        let err = sub_interval_count(lower, upper).unwrap_err();
        assert!(matches!(err, IntegrationError::RangeTooLarge { .. }));

        let err = parallel_integrate(|x| x, i64::MIN, i64::MAX, 4, step(0.1)).unwrap_err();
        assert!(matches!(err, IntegrationError::RangeTooLarge { .. }));
    }

    #[test]
    fn test_partition_is_lazy_for_huge_ranges() {
        let mut parts = partition(0, 100_000_000_000).unwrap();
        assert_eq!(parts.len(), 200_000_000_000);
        assert_eq!(parts.next(), Some(SubInterval { index: 0, lower: 0.0, upper: 0.5 }));
    }

    #[test]
    fn test_rejects_zero_threads() {
        let err = parallel_integrate(|x| x, 0, 2, 0, step(0.1)).unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidThreadCount));
    }

    #[test]
    fn test_each_sub_interval_counted_once() {
        let s = 1e-4;
        // Each 0.5-wide piece samples both of its endpoints, so the excess
        // is at most one step per piece.
        for max_threads in [1, 3, 4, 20, 64] {
            for reclaim in [Reclaim::Block, Reclaim::Spin] {
                let total = Scheduler::new(max_threads, step(s))
                    .with_reclaim(reclaim)
                    .run(|_| 1.0, 0, 10)
                    .unwrap();
                assert!(
                    (total - 10.0).abs() <= 20.0 * s + 1e-9,
                    "max_threads={} reclaim={:?} total={}",
                    max_threads,
                    reclaim,
                    total
                );
            }
        }
    }

    #[test]
    fn test_dedicated_slots_match_sum_of_pieces() {
        let s = step(1e-3);
        let f = |x: f64| x * x;
        let expected: f64 = partition(0, 2)
            .unwrap()
            .map(|sub| integrate(f, sub.lower, sub.upper, s))
            .sum();
        // Four pieces on four slots: drain sums them in slot (= index) order.
        let total = parallel_integrate(f, 0, 2, 4, s).unwrap();
        assert_eq!(total, expected);
    }

    #[test]
    fn test_worker_threads_bounded_by_max_threads() {
        let seen: Mutex<HashSet<ThreadId>> = Mutex::new(HashSet::new());
        let total = parallel_integrate(
            |_| {
                seen.lock().unwrap().insert(thread::current().id());
                1.0
            },
            0,
            6,
            3,
            step(1e-2),
        )
        .unwrap();

        assert!(total > 5.9);
        let threads = seen.lock().unwrap();
        assert!(threads.len() <= 3, "used {} threads", threads.len());
        assert!(!threads.contains(&thread::current().id()));
    }

    #[test]
    fn test_panicking_integrand_is_reported() {
        for reclaim in [Reclaim::Block, Reclaim::Spin] {
            let err = Scheduler::new(2, step(1e-2))
                .with_reclaim(reclaim)
                .run(
                    |x| {
                        if x >= 1.0 {
                            panic!("integrand blew up");
                        }
                        x
                    },
                    0,
                    4,
                )
                .unwrap_err();

            match err {
                IntegrationError::WorkerPanicked { index, message, .. } => {
                    assert!(index >= 1, "index {} should start at or past x=0.5", index);
                    assert_eq!(message, "integrand blew up");
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_reports_lowest_failing_index() {
        let err = parallel_integrate(|_| panic!("always"), 0, 2, 8, step(0.1)).unwrap_err();
        assert!(matches!(err, IntegrationError::WorkerPanicked { index: 0, .. }));
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(42u8)), "non-string panic payload");
    }
}
