//! Fixed-step Riemann integration, sequential and on a bounded pool of
//! worker slots.

pub mod benchmark;
pub mod integrator;
pub mod parallel;
pub mod report;
pub mod scheduler;
pub mod step;

pub use integrator::{integrate, Integrator};
pub use scheduler::{parallel_integrate, IntegrationError, Reclaim, Scheduler, SubInterval};
pub use step::{ConfigurationError, StepSize};
