//! Barrier demo
//!
//! Five workers, twenty tasks: task `i` computes `(i % 5) * 10`, so every
//! phase aggregates to 100. A second run shows a failing task being
//! reported without stalling its phase.
//!
//! # Environment Variables
//!
//! - `PHASEPOOL_LOG=debug` - Log filter (default `info`)
//! - `PHASEPOOL_*` - Pool settings, see `PoolConfig::from_env`

use std::time::Duration;

use phasepool::{init_logging, PhasePool, PoolConfig, PoolResult};
use tracing::info;

const NUM_WORKERS: usize = 5;
const NUM_TASKS: usize = 20;

// PHASEPOOL_LOG=debug cargo run -p phasepool-barrier
fn main() -> PoolResult<()> {
    init_logging();
    println!("=== phasepool barrier demo ===\n");

    run_even_phases()?;
    run_with_failure()?;

    println!("\n=== Demo Complete ===");
    Ok(())
}

fn run_even_phases() -> PoolResult<()> {
    let mut pool = PhasePool::<i64>::new(NUM_WORKERS)?;

    for i in 0..NUM_TASKS {
        let id = (i % NUM_WORKERS) as i64;
        pool.spawn(move || {
            std::thread::sleep(Duration::from_millis(10 * id as u64));
            Ok::<_, String>(id * 10)
        })?;
    }

    for _ in 0..NUM_TASKS / NUM_WORKERS {
        let report = pool.wait_report(Duration::from_secs(5))?;
        println!(
            "{}: aggregate {} from {} results in {:?}",
            report.phase, report.aggregate, report.succeeded, report.elapsed
        );
    }

    if let Some(summary) = pool.shutdown() {
        info!(phases = summary.phases, executed = summary.executed, "even run finished");
    }
    Ok(())
}

fn run_with_failure() -> PoolResult<()> {
    let config = PoolConfig::from_env().num_workers(3);
    let mut pool = PhasePool::<i64>::builder(config)
        .on_phase(|report| {
            for failure in &report.failures {
                println!(
                    "  task {} (index {}) failed: {}",
                    failure.submission, failure.index, failure.error
                );
            }
        })
        .spawn()?;

    pool.spawn(|| Ok::<_, String>(10))?;
    pool.spawn(|| Err::<i64, _>("division by zero"))?;
    pool.spawn(|| Ok::<_, String>(30))?;

    let report = pool.wait_report(Duration::from_secs(5))?;
    println!(
        "{}: aggregate {} with {} failure(s)",
        report.phase,
        report.aggregate,
        report.failures.len()
    );

    pool.shutdown();
    Ok(())
}
