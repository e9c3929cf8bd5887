use crate::scheduler::{IntegrationError, Reclaim, Scheduler, DEFAULT_MAX_THREADS};
use crate::step::{ConfigurationError, StepSize};

/// Left-rectangle Riemann sum of `f` from `lower` to `upper`.
///
/// Samples start at `lower` and advance by `step` while `x <= upper`, so
/// the last sample may land slightly short of or on `upper` depending on
/// accumulated rounding. No compensation is applied to the running sum.
pub fn integrate<F>(f: F, lower: f64, upper: f64, step: StepSize) -> f64
where
    F: Fn(f64) -> f64,
{
    let dx = step.get();
    let mut x = lower;
    let mut sum = 0.0;
    while x <= upper {
        sum += f(x) * dx;
        x += dx;
    }
    sum
}

/// Integration settings shared by the sequential and parallel entry points.
///
/// Each call copies the current step before it starts.
#[derive(Debug, Clone)]
pub struct Integrator {
    step: StepSize,
    max_threads: usize,
    reclaim: Reclaim,
}

impl Default for Integrator {
    fn default() -> Self {
        Self {
            step: StepSize::default(),
            max_threads: DEFAULT_MAX_THREADS,
            reclaim: Reclaim::default(),
        }
    }
}

impl Integrator {
    pub fn new(step: f64) -> Result<Self, ConfigurationError> {
        Ok(Self {
            step: StepSize::new(step)?,
            ..Self::default()
        })
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_reclaim(mut self, reclaim: Reclaim) -> Self {
        self.reclaim = reclaim;
        self
    }

    /// Replaces the step. On error the previous step is kept.
    pub fn set_step(&mut self, step: f64) -> Result<(), ConfigurationError> {
        self.step = StepSize::new(step)?;
        Ok(())
    }

    pub fn step(&self) -> StepSize {
        self.step
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    pub fn integrate<F>(&self, f: F, lower: f64, upper: f64) -> f64
    where
        F: Fn(f64) -> f64,
    {
        integrate(f, lower, upper, self.step)
    }

    pub fn parallel_integrate<F>(&self, f: F, lower_limit: i64, upper_limit: i64) -> Result<f64, IntegrationError>
    where
        F: Fn(f64) -> f64 + Sync,
    {
        self.scheduler().run(f, lower_limit, upper_limit)
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.max_threads, self.step).with_reclaim(self.reclaim)
    }
}
