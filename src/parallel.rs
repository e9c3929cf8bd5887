/// Slot count the benchmark uses when none is given on the command line.
pub const BENCHMARK_MAX_THREADS: usize = 4;

/// Resolves how many worker slots the parallel integrator may use.
pub struct WorkerBudget {
    max_threads: usize,
    cpus: usize,
}

impl WorkerBudget {
    pub fn new(max_threads: Option<usize>) -> Self {
        Self::with_cpus(max_threads, num_cpus::get())
    }

    fn with_cpus(max_threads: Option<usize>, cpus: usize) -> Self {
        Self {
            max_threads: max_threads.unwrap_or(BENCHMARK_MAX_THREADS),
            cpus,
        }
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    pub fn cpus(&self) -> usize {
        self.cpus
    }

    /// More slots than cores: workers time-share and wall times stop
    /// reflecting the parallel speedup.
    pub fn oversubscribed(&self) -> bool {
        self.max_threads > self.cpus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_budget_is_kept() {
        assert_eq!(WorkerBudget::new(Some(3)).max_threads(), 3);
    }

    #[test]
    fn test_default_budget() {
        let budget = WorkerBudget::new(None);
        assert_eq!(budget.max_threads(), BENCHMARK_MAX_THREADS);
        assert!(budget.cpus() >= 1);
    }

    #[test]
    fn test_oversubscription() {
        assert!(WorkerBudget::with_cpus(Some(8), 2).oversubscribed());
        assert!(!WorkerBudget::with_cpus(None, 4).oversubscribed());
        assert!(!WorkerBudget::with_cpus(Some(1), 16).oversubscribed());
    }
}
