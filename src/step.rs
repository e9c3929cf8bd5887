use thiserror::Error;

/// Step used when nothing else is configured; quick enough on most machines.
pub const DEFAULT_STEP: f64 = 5e-8;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("step size must lie strictly between 0 and 1, got {0}")]
    StepOutOfRange(f64),
}

/// Distance between sampled x values, also used as the `dx` multiplier.
///
/// Always strictly inside `(0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct StepSize(f64);

impl StepSize {
    pub fn new(value: f64) -> Result<Self, ConfigurationError> {
        // NaN fails both comparisons
        if value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(ConfigurationError::StepOutOfRange(value))
        }
    }

    /// Step of `10^-exponent`, the form the benchmark sweeps over.
    pub fn from_exponent(exponent: u32) -> Result<Self, ConfigurationError> {
        Self::new(1.0 / 10f64.powi(exponent as i32))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for StepSize {
    fn default() -> Self {
        Self(DEFAULT_STEP)
    }
}
