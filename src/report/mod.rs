use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::benchmark::BenchmarkRow;

pub const CSV_HEADER: &str = "exponent,step,mode,value,elapsed_secs";

pub struct CsvWriter {
    writer: BufWriter<File>,
    rows_written: usize,
}

impl CsvWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .with_context(|| {
                format!("Failed to create output file: {}", path.as_ref().display())
            })?;

        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", CSV_HEADER)?;

        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    pub fn write_row(&mut self, row: &BenchmarkRow) -> Result<()> {
        writeln!(
            self.writer,
            "{},{:e},{},{},{}",
            row.exponent,
            row.step,
            row.mode.as_str(),
            row.value,
            row.elapsed.as_secs_f64()
        )?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush CSV output")
    }
}

pub fn create_progress_bar(total_runs: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total_runs as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} runs {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmark::Mode;
    use std::time::Duration;

    #[test]
    fn test_csv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.csv");

        let mut writer = CsvWriter::new(&path).unwrap();
        writer
            .write_row(&BenchmarkRow {
                exponent: 2,
                step: 0.01,
                mode: Mode::Parallel,
                value: 12.5,
                elapsed: Duration::from_millis(250),
            })
            .unwrap();
        assert_eq!(writer.rows_written(), 1);
        writer.finish().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec![CSV_HEADER, "2,1e-2,parallel,12.5,0.25"]);
    }

    #[test]
    fn test_progress_bar_length() {
        let pb = create_progress_bar(8).unwrap();
        assert_eq!(pb.length(), Some(8));
    }
}
