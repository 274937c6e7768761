//! Tests for worker lifecycle, bounded queueing, and event dispatch

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Mutex,
    };
    use std::time::Duration;

    use sandpool::{EventKind, PoolError, WorkerConfig, WorkerHandle};

    const WAIT: Duration = Duration::from_secs(5);

    fn spawn_worker(capacity: usize) -> Arc<WorkerHandle> {
        WorkerHandle::spawn(1, &WorkerConfig::new().with_capacity(capacity))
            .expect("Failed to spawn worker")
    }

    #[test]
    fn worker_starts_ready() {
        let worker = spawn_worker(4);
        let state = worker.state();
        assert!(state.initialized);
        assert!(state.ready);
        assert!(!state.processing);
        assert!(!state.terminated);
        assert_eq!(state.current_load, 0);
        assert_eq!(state.queue_len, 0);
    }

    #[test]
    fn delivery_is_fifo() {
        let worker = spawn_worker(16);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        worker.on_message(move |event| {
            sink.lock().unwrap().push(event.payload.as_ref().clone());
            Ok(())
        });

        let mut last = None;
        for i in 0..10u8 {
            last = Some(worker.post_message(vec![i]).expect("post failed"));
        }
        worker.wait_for(last.unwrap(), WAIT).expect("delivery timed out");

        let seen = seen.lock().unwrap();
        let expected: Vec<Vec<u8>> = (0..10u8).map(|i| vec![i]).collect();
        assert_eq!(*seen, expected);
    }

    #[test]
    fn terminated_is_monotonic_and_terminate_is_idempotent() {
        let worker = spawn_worker(4);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        worker.on_terminate(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        worker.terminate();
        assert!(worker.state().terminated);
        assert!(!worker.state().ready);

        worker.terminate();
        worker.terminate();
        assert!(worker.state().terminated);
        // Terminate notification fires exactly once, on the transition
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn post_on_terminated_worker_fails_without_side_effects() {
        let worker = spawn_worker(4);
        worker.terminate();

        let result = worker.post_message(b"late".to_vec());
        assert!(matches!(result, Err(PoolError::WorkerTerminated { .. })));
        assert_eq!(worker.current_load(), 0);
        assert_eq!(worker.queue_len(), 0);
    }

    #[test]
    fn capacity_bound_and_recovery() {
        // Scenario: capacity 2, "a" and "b" accepted, "c" rejected while
        // load stays 2, and a slot opens once "a" completes.
        let worker = spawn_worker(2);
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let gate = Mutex::new(gate_rx);
        worker.on_message(move |_| {
            gate.lock().unwrap().recv().ok();
            Ok(())
        });

        let a = worker.post_message(b"a".to_vec()).expect("post a");
        let _b = worker.post_message(b"b".to_vec()).expect("post b");
        assert_eq!(worker.current_load(), 2);

        let c = worker.post_message(b"c".to_vec());
        assert!(matches!(c, Err(PoolError::CapacityExceeded { capacity: 2, .. })));
        assert_eq!(worker.current_load(), 2);

        gate_tx.send(()).expect("release a");
        worker.wait_for(a, WAIT).expect("a not delivered");
        assert_eq!(worker.current_load(), 1);

        let d = worker.post_message(b"d".to_vec()).expect("post d after drain");
        gate_tx.send(()).expect("release b");
        gate_tx.send(()).expect("release d");
        worker.wait_for(d, WAIT).expect("d not delivered");
        assert_eq!(worker.current_load(), 0);
    }

    #[test]
    fn failing_listeners_do_not_halt_delivery() {
        let worker = spawn_worker(4);
        let delivered = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        worker.on_message(|_| {
            Err(PoolError::invalid_parameter("payload", "first listener rejects"))
        });
        worker.on_message(|_| panic!("second listener panics"));
        let tail = delivered.clone();
        worker.on_message(move |_| {
            tail.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let faults = errors.clone();
        worker.on_error(move |err| {
            assert!(matches!(err, PoolError::Listener { .. }));
            faults.fetch_add(1, Ordering::SeqCst);
        });

        let ticket = worker.post_message(b"payload".to_vec()).expect("post");
        worker.wait_for(ticket, WAIT).expect("delivery timed out");

        // The last listener still observed the message, both faults were
        // surfaced, and the worker survived
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 2);
        assert!(worker.state().ready);

        let again = worker.post_message(b"again".to_vec()).expect("post again");
        worker.wait_for(again, WAIT).expect("second delivery timed out");
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn off_unregisters_a_listener() {
        let worker = spawn_worker(4);
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = hits.clone();
        let id = worker.on_message(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let first = worker.post_message(b"one".to_vec()).expect("post");
        worker.wait_for(first, WAIT).expect("delivery timed out");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(worker.off(EventKind::Message, id));
        assert!(!worker.off(EventKind::Message, id));

        let second = worker.post_message(b"two".to_vec()).expect("post");
        worker.wait_for(second, WAIT).expect("delivery timed out");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registration_after_termination_never_fires() {
        let worker = spawn_worker(4);
        worker.terminate();

        let fired = Arc::new(AtomicUsize::new(0));
        let messages = fired.clone();
        worker.on_message(move |_| {
            messages.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let terminations = fired.clone();
        worker.on_terminate(move |_| {
            terminations.fetch_add(1, Ordering::SeqCst);
        });

        assert!(worker.post_message(b"x".to_vec()).is_err());
        worker.terminate();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn caller_deadline_is_local_and_delivery_still_happens() {
        let worker = spawn_worker(4);
        let delivered = Arc::new(AtomicUsize::new(0));
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let gate = Mutex::new(gate_rx);
        let sink = delivered.clone();
        worker.on_message(move |_| {
            gate.lock().unwrap().recv().ok();
            sink.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let ticket = worker.post_message(b"slow".to_vec()).expect("post");
        let result = worker.wait_for(ticket, Duration::from_millis(50));
        assert!(matches!(result, Err(PoolError::Timeout { .. })));

        // Expiry did not cancel anything; the message is still delivered
        gate_tx.send(()).expect("open gate");
        worker.wait_for(ticket, WAIT).expect("delivery timed out");
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn terminate_clears_queue_and_load() {
        let worker = spawn_worker(8);
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let gate = Mutex::new(gate_rx);
        worker.on_message(move |_| {
            gate.lock().unwrap().recv().ok();
            Ok(())
        });

        for _ in 0..5 {
            worker.post_message(b"queued".to_vec()).expect("post");
        }
        assert_eq!(worker.current_load(), 5);

        drop(gate_tx); // unblock any mid-delivery listener
        worker.terminate();
        assert_eq!(worker.current_load(), 0);
        assert_eq!(worker.queue_len(), 0);
    }

    #[test]
    fn sandboxed_worker_accounting_resets_on_terminate() {
        let config = WorkerConfig::new()
            .with_capacity(4)
            .with_sandbox(sandpool::SandboxConfig {
                total_bytes: 64 * 1024,
                page_size: 4 * 1024,
            });
        let worker = WorkerHandle::spawn(7, &config).expect("spawn");

        let sandbox = worker.sandbox().expect("sandbox configured").clone();
        let _view = sandbox.allocate(10_000).expect("sandbox allocate");
        worker.tracker().allocate(10_000);
        assert!(sandbox.used_memory() > 0);
        assert!(worker.tracker().stats().estimated_bytes > 0);

        worker.terminate();
        assert_eq!(sandbox.used_memory(), 0);
        assert_eq!(worker.tracker().stats().estimated_bytes, 0);
    }
}
