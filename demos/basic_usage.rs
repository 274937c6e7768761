//! Basic usage example of the sandpool worker pool

use sandpool::{
    AccessKind, PoolConfig, PoolManager, Result, SandboxConfig,
};
use std::time::Duration;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    println!("Sandpool Worker Pool Example");
    println!("============================");

    // Create a pool with sandboxed workers
    let config = PoolConfig::new()
        .with_worker_capacity(8)
        .with_sandbox(SandboxConfig {
            total_bytes: 1024 * 1024, // 1MB sandbox per worker
            page_size: 4096,
        });

    let manager = PoolManager::new(config)?;
    let ids = manager.initialize_pool(3)?;
    println!("Pool initialized with {} workers", ids.len());

    // Create a shared buffer visible to every worker
    println!("\nCreating shared buffer 'results' (64KB)...");
    let buffer = manager.create_shared_buffer("results", 64 * 1024)?;
    println!("  Registered workers: {:?}", buffer.registered_workers());

    // Attach a message listener that touches the shared buffer
    let worker = manager.worker(ids[0]).expect("worker exists");
    let tracker = worker.tracker().clone();
    worker.on_message(move |event| {
        // The payload is opaque to the pool; a real extraction backend
        // would parse it here
        let scratch = tracker.allocate(event.payload.len());
        tracker.deallocate(scratch);
        Ok(())
    });
    worker.on_error(|err| eprintln!("listener fault: {}", err));

    // Post messages and wait for the last delivery
    println!("\nPosting 5 messages to worker {}...", worker.id());
    let mut last = None;
    for i in 0..5u8 {
        last = Some(worker.post_message(vec![i; 16])?);
    }
    worker.wait_for(last.expect("ticket"), Duration::from_secs(5))?;
    println!("All messages delivered");

    // Log an audited access to the shared region
    worker.access_shared("results", AccessKind::Write)?;
    let log = manager.registry().access_log("results")?;
    println!("Access log entries: {}", log.len());

    // Pool-wide statistics
    let stats = manager.pool_memory_stats();
    println!("\nPool statistics:");
    println!("  Active workers: {}", stats.active_workers);
    println!("  Total allocations: {}", stats.total_allocations);
    println!("  Leaked allocations: {}", stats.total_leaked);
    println!("  Shared buffers: {}", stats.shared_buffers);

    // Coordinated teardown
    println!("\nTerminating pool...");
    manager.terminate_all();
    println!("Done. Active workers: {}", manager.active_worker_count());

    Ok(())
}
