//! Gitpulse CLI: run workers, enqueue jobs, ingest and report.

use anyhow::Result;
use clap::Parser;
use gitpulse::engine::arg_parser::Cli;
use gitpulse::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
