//! Stress test - many short phases
//!
//! Usage: `stress [phases] [workers]`

use std::time::{Duration, Instant};

use phasepool::{init_logging, Collect, PoolBuilder, PoolConfig, PoolResult};
use tracing::warn;

fn main() -> PoolResult<()> {
    init_logging();
    println!("=== phasepool Stress Test ===\n");

    let mut args = std::env::args().skip(1);
    let num_phases: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(10_000);
    let num_workers: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(8);
    let num_tasks = num_phases * num_workers;

    println!("Running {} phases on {} workers ({} tasks)...", num_phases, num_workers, num_tasks);

    let config = PoolConfig::from_env().num_workers(num_workers);
    let mut pool = PoolBuilder::with_aggregate(config, Collect).spawn()?;

    let start = Instant::now();
    for i in 0..num_tasks as u64 {
        pool.spawn(move || Ok::<_, String>(i))?;
    }
    let submit_time = start.elapsed();
    println!("Submit time: {:?}", submit_time);

    let mut max_lag = 0usize;
    let mut expected_next = 0u64;
    let mut out_of_order = 0usize;
    for done in 0..num_phases {
        let report = pool.wait_report(Duration::from_secs(30))?;
        for value in &report.aggregate {
            if *value != expected_next {
                out_of_order += 1;
            }
            expected_next = value + 1;
        }
        max_lag = max_lag.max(pool.queue_depths().dispatched);

        if (done + 1) % 1000 == 0 {
            print!("\rPhases: {}/{}", done + 1, num_phases);
        }
    }
    let elapsed = start.elapsed();

    let stats = pool.stats();
    pool.shutdown();

    println!("\n\n=== Results ===");
    println!("Phases:       {}", stats.phases);
    println!("Executed:     {}", stats.executed);
    println!("Total time:   {:?}", elapsed);
    println!(
        "Throughput:   {:.0} phases/sec",
        num_phases as f64 / elapsed.as_secs_f64()
    );
    println!("Max lag:      {} (bound {})", max_lag, num_workers);

    if out_of_order > 0 {
        warn!(out_of_order, "results drained out of submission order");
    }
    if stats.executed != stats.submitted {
        warn!(executed = stats.executed, submitted = stats.submitted, "lost tasks");
    }
    Ok(())
}
