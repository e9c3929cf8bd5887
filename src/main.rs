use std::path::PathBuf;
use std::time::Instant;
use anyhow::Result;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use riemann::benchmark::{run_sweep, BenchmarkConfig};
use riemann::parallel::WorkerBudget;
use riemann::report::{create_progress_bar, CsvWriter};
use riemann::Reclaim;

#[derive(Parser, Debug)]
#[command(name = "riemann")]
#[command(about = "Benchmark sequential vs. parallel Riemann integration of x^2 + 4x + x", long_about = None)]
struct Args {
    /// First precision exponent (step = 1e-FROM)
    #[arg(long, default_value_t = 6)]
    from: u32,

    /// Last precision exponent, inclusive
    #[arg(long, default_value_t = 9)]
    to: u32,

    /// Lower integration limit
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    lower: i64,

    /// Upper integration limit
    #[arg(long, default_value_t = 8, allow_hyphen_values = true)]
    upper: i64,

    /// Maximum number of worker slots (defaults to 4)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Busy-poll for free slots instead of blocking
    #[arg(long)]
    spin: bool,

    /// Also write every run to this CSV file
    #[arg(short = 'o', long, value_name = "PATH")]
    csv: Option<PathBuf>,

    /// Disable progress bar
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let budget = WorkerBudget::new(args.threads);
    if budget.oversubscribed() {
        warn!(
            "{} worker slots requested on {} CPUs; timings will include contention",
            budget.max_threads(),
            budget.cpus()
        );
    }
    let config = BenchmarkConfig {
        from: args.from,
        to: args.to,
        lower: args.lower,
        upper: args.upper,
        max_threads: budget.max_threads(),
        reclaim: if args.spin { Reclaim::Spin } else { Reclaim::Block },
    };
    config.validate()?;

    println!("The following operation will be executed:");
    println!("\\int_{{{}}}^{{{}}}{{(x^2 + 4*x + x)dx}}", config.lower, config.upper);
    println!(
        "Using up to {} worker slots ({:?} reclaim)",
        config.max_threads, config.reclaim
    );

    let mut csv = match &args.csv {
        Some(path) => Some(CsvWriter::new(path)?),
        None => None,
    };

    // Setup progress bar
    let progress = if !args.quiet {
        Some(create_progress_bar(config.total_runs())?)
    } else {
        None
    };

    let start_time = Instant::now();

    run_sweep(&config, |row| {
        match &progress {
            Some(pb) => {
                pb.suspend(|| println!("{}", row));
                pb.inc(1);
            }
            None => println!("{}", row),
        }

        match csv.as_mut() {
            Some(writer) => writer.write_row(row),
            None => Ok(()),
        }
    })?;

    // Finalize progress
    if let Some(ref pb) = progress {
        pb.finish_with_message("done");
    }

    if let Some(writer) = csv {
        let rows = writer.rows_written();
        writer.finish()?;
        if let Some(path) = &args.csv {
            println!("Wrote {} rows to {}", rows, path.display());
        }
    }

    println!("Benchmark finished in {:.2?}.", start_time.elapsed());

    Ok(())
}
