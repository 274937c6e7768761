//! Tests for memory accounting invariants

#[cfg(test)]
mod tests {
    use sandpool::{MemoryTracker, PagedPool};

    /// `estimated == sum(outstanding)` and `leaked == allocs - deallocs`
    /// must hold at every observation point
    fn assert_invariants(tracker: &MemoryTracker, outstanding: &[(u64, usize)]) {
        let stats = tracker.stats();
        let expected: usize = outstanding.iter().map(|(_, size)| size).sum();
        assert_eq!(stats.estimated_bytes, expected);
        assert_eq!(stats.leaked, stats.allocations - stats.deallocations);
        assert_eq!(tracker.active_allocations(), outstanding.len());
    }

    #[test]
    fn invariants_hold_across_interleaved_operations() {
        let tracker = MemoryTracker::new();
        let mut outstanding: Vec<(u64, usize)> = Vec::new();
        assert_invariants(&tracker, &outstanding);

        for size in [100, 2000, 30, 4096, 1] {
            let id = tracker.allocate(size);
            outstanding.push((id, size));
            assert_invariants(&tracker, &outstanding);
        }

        // Free in arbitrary order
        for index in [2usize, 0, 1] {
            let (id, _) = outstanding.remove(index);
            assert!(tracker.deallocate(id));
            assert_invariants(&tracker, &outstanding);
        }
    }

    #[test]
    fn allocate_then_immediate_deallocate_is_neutral() {
        let tracker = MemoryTracker::new();
        tracker.allocate(777);
        let before = tracker.stats().estimated_bytes;

        let id = tracker.allocate(12_345);
        assert!(tracker.deallocate(id));
        assert_eq!(tracker.stats().estimated_bytes, before);
    }

    #[test]
    fn unknown_ids_never_change_estimated() {
        let tracker = MemoryTracker::new();
        let id = tracker.allocate(512);
        let snapshot = tracker.stats();

        assert!(!tracker.deallocate(id + 1000));
        assert_eq!(tracker.stats(), snapshot);

        assert!(tracker.deallocate(id));
        assert!(!tracker.deallocate(id));
        assert_eq!(tracker.stats().estimated_bytes, 0);
        assert_eq!(tracker.stats().deallocations, 1);
    }

    #[test]
    fn leaked_ids_match_outstanding_allocations() {
        let tracker = MemoryTracker::new();
        let kept_a = tracker.allocate(10);
        let freed = tracker.allocate(20);
        let kept_b = tracker.allocate(30);
        tracker.deallocate(freed);

        let mut expected = vec![kept_a, kept_b];
        expected.sort_unstable();
        assert_eq!(tracker.leaked_ids(), expected);
        assert_eq!(tracker.stats().leaked, 2);
    }

    #[test]
    fn tracker_is_unbounded_while_pool_is_bounded() {
        // Capacity bounding lives in the paged pool, not the tracker
        let tracker = MemoryTracker::new();
        let huge = tracker.allocate(usize::MAX / 2);
        assert!(tracker.deallocate(huge));

        let pool = PagedPool::new(4 * 4096, 4096).expect("pool");
        assert!(pool.allocate(5 * 4096).is_err());
    }

    #[test]
    fn concurrent_allocation_keeps_counters_consistent() {
        let tracker = std::sync::Arc::new(MemoryTracker::new());
        let mut threads = Vec::new();
        for _ in 0..4 {
            let tracker = tracker.clone();
            threads.push(std::thread::spawn(move || {
                for _ in 0..250 {
                    let id = tracker.allocate(64);
                    assert!(tracker.deallocate(id));
                }
            }));
        }
        for thread in threads {
            thread.join().expect("allocator thread");
        }

        let stats = tracker.stats();
        assert_eq!(stats.allocations, 1000);
        assert_eq!(stats.deallocations, 1000);
        assert_eq!(stats.leaked, 0);
        assert_eq!(stats.estimated_bytes, 0);
        assert!(stats.peak_bytes >= 64);
    }
}
