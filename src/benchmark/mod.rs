use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::integrator::Integrator;
use crate::scheduler::Reclaim;
use crate::step::StepSize;

pub const MIN_EXPONENT: u32 = 1;
pub const MAX_EXPONENT: u32 = 15;

/// Integrand timed by the benchmark: x^2 + 4x + x.
pub fn reference_integrand(x: f64) -> f64 {
    x * x + 4.0 * x + x
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Parallel,
    Sequential,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Parallel => "parallel",
            Mode::Sequential => "sequential",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Parallel => write!(f, "Parallel integration"),
            Mode::Sequential => write!(f, "Single-core integration"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRow {
    pub exponent: u32,
    pub step: f64,
    pub mode: Mode,
    pub value: f64,
    pub elapsed: Duration,
}

impl fmt::Display for BenchmarkRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {}, with precision 1e-{} took {:.2?} to finish.",
            self.mode, self.value, self.exponent, self.elapsed
        )
    }
}

/// One sweep over step sizes `10^-from ..= 10^-to`.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub from: u32,
    pub to: u32,
    pub lower: i64,
    pub upper: i64,
    pub max_threads: usize,
    pub reclaim: Reclaim,
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<()> {
        for exponent in [self.from, self.to] {
            if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
                bail!(
                    "Precision exponent {} outside {}..={}",
                    exponent,
                    MIN_EXPONENT,
                    MAX_EXPONENT
                );
            }
        }
        if self.from > self.to {
            bail!("First exponent {} is greater than last exponent {}", self.from, self.to);
        }
        if self.lower > self.upper {
            bail!("Lower limit {} is greater than upper limit {}", self.lower, self.upper);
        }
        if self.max_threads == 0 {
            bail!("Thread count must be at least 1");
        }
        Ok(())
    }

    pub fn exponents(&self) -> impl Iterator<Item = u32> {
        self.from..=self.to
    }

    /// Number of rows a full sweep produces.
    pub fn total_runs(&self) -> usize {
        self.exponents().count() * 2
    }
}

/// Runs the parallel and then the sequential integrator for every step in
/// the sweep, handing each row to `on_row` as soon as it is measured.
/// An error from `on_row` stops the sweep before the next run.
pub fn run_sweep<R>(config: &BenchmarkConfig, mut on_row: R) -> Result<Vec<BenchmarkRow>>
where
    R: FnMut(&BenchmarkRow) -> Result<()>,
{
    config.validate()?;

    let mut integrator = Integrator::default()
        .with_max_threads(config.max_threads)
        .with_reclaim(config.reclaim);
    let mut rows = Vec::with_capacity(config.total_runs());

    for exponent in config.exponents() {
        let step = StepSize::from_exponent(exponent)
            .with_context(|| format!("Invalid step for precision 1e-{}", exponent))?
            .get();
        integrator.set_step(step)?;

        let start = Instant::now();
        let value = integrator
            .parallel_integrate(reference_integrand, config.lower, config.upper)
            .with_context(|| format!("Parallel integration failed at precision 1e-{}", exponent))?;
        rows.push(BenchmarkRow {
            exponent,
            step,
            mode: Mode::Parallel,
            value,
            elapsed: start.elapsed(),
        });

        let start = Instant::now();
        let value = integrator.integrate(reference_integrand, config.lower as f64, config.upper as f64);
        rows.push(BenchmarkRow {
            exponent,
            step,
            mode: Mode::Sequential,
            value,
            elapsed: start.elapsed(),
        });

        for row in &rows[rows.len() - 2..] {
            info!(exponent, mode = row.mode.as_str(), value = row.value, elapsed = ?row.elapsed, "benchmark run");
            on_row(row)?;
        }
    }

    Ok(rows)
}
