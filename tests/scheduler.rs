//! Concurrency bound and failure policies of the worker pool.

mod scheduler_tests {
    use anyhow::bail;
    use shardfix::{BatchError, FailurePolicy, Scheduler};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_never_exceeds_limit() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let report = Scheduler::new(3)
            .run(
                (0..24).collect(),
                |n: &u32| n.to_string(),
                |_| {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(15));
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .unwrap();

        assert_eq!(report.admitted, 24);
        assert_eq!(report.succeeded, 24);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(report.peak_concurrency <= 3);
        assert!(report.peak_concurrency >= 1);
    }

    #[test]
    fn test_fewer_units_than_limit() {
        let report = Scheduler::new(16)
            .run(vec!["a", "b"], |s: &&str| s.to_string(), |_| Ok(()))
            .unwrap();
        assert_eq!(report.succeeded, 2);
        assert!(report.peak_concurrency <= 2);
    }

    #[test]
    fn test_abort_lets_running_units_finish() {
        let finished = Mutex::new(Vec::new());
        let err = Scheduler::new(2)
            .run(
                (0..10).collect(),
                |n: &u32| format!("unit-{n}"),
                |n| {
                    if n == 0 {
                        bail!("first unit broke");
                    }
                    sleep(Duration::from_millis(30));
                    finished.lock().unwrap().push(n);
                    Ok(())
                },
            )
            .unwrap_err();

        let batch = err.downcast_ref::<BatchError>().unwrap();
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].label, "unit-0");
        assert!(err.to_string().contains("unit-0"));

        let finished = finished.into_inner().unwrap();
        // Whatever was admitted ran to completion; the rest never started.
        assert_eq!(finished.len() + 1, batch.admitted);
        assert!(batch.admitted < 10);
    }

    #[test]
    fn test_sequential_abort_admits_exactly_up_to_failure() {
        let started = AtomicUsize::new(0);
        let err = Scheduler::new(1)
            .with_policy(FailurePolicy::Abort)
            .run(
                (0..8).collect(),
                |n: &u32| n.to_string(),
                |n| {
                    started.fetch_add(1, Ordering::SeqCst);
                    if n == 2 { bail!("boom") } else { Ok(()) }
                },
            )
            .unwrap_err();
        assert_eq!(started.load(Ordering::SeqCst), 3);
        assert_eq!(err.downcast_ref::<BatchError>().unwrap().admitted, 3);
    }
}
