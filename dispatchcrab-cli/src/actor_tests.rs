#[cfg(test)]
mod tests {
    use crate::actor::{ThrottleActor, ThrottleHandle};
    use crate::provider::SimulatedProvider;
    use dispatchcrab::{
        DispatchMode, Dispatcher, ManualClock, RateLimitConfig, Throttle, ThrottleConfig,
        ThrottleError, plan,
    };
    use std::time::{Duration, SystemTime};

    fn clock() -> ManualClock {
        ManualClock::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }

    #[tokio::test]
    async fn test_basic_acquisition() {
        let clock = clock();
        let throttle = Throttle::with_clock(ThrottleConfig::generation(), clock.clone());
        let handle = ThrottleActor::spawn(100, throttle);

        let first = handle.acquire().await.unwrap();
        let second = handle.acquire().await.unwrap();

        assert_eq!(first.waited, Duration::ZERO);
        assert_eq!(second.waited, Duration::from_millis(6_010));
        assert_eq!(second.dispatched_today, 2);

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.dispatched_today, 2);
        assert_eq!(stats.remaining_today, 1_498);
    }

    #[tokio::test]
    async fn test_concurrent_handles_share_the_quota() {
        let config = ThrottleConfig {
            max_per_day: 10,
            ..ThrottleConfig::generation()
        };
        let handle = ThrottleActor::spawn(100, Throttle::with_clock(config, clock()));

        // Send multiple concurrent acquisitions
        let mut handles = vec![];
        for _ in 0..20 {
            let h = handle.clone();
            handles.push(tokio::spawn(async move { h.acquire().await }));
        }

        let mut admitted = 0;
        let mut rejected = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(ThrottleError::DailyQuotaExceeded { .. }) => rejected += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        // Should admit exactly the daily quota
        assert_eq!(admitted, 10);
        assert_eq!(rejected, 10);
    }

    #[tokio::test]
    async fn test_batch_acquisition_and_reset() {
        let handle = ThrottleActor::spawn(
            10,
            Throttle::with_clock(ThrottleConfig::bulk_email(), clock()),
        );

        let acquisition = handle.acquire_batch(40).await.unwrap();
        assert_eq!(acquisition.units, 40);
        assert_eq!(
            handle.acquire_batch(51).await.unwrap_err(),
            ThrottleError::BatchSizeTooLarge {
                requested: 51,
                max: 50
            }
        );

        handle.reset().await.unwrap();
        assert_eq!(handle.stats().await.unwrap().dispatched_today, 0);
    }

    #[tokio::test]
    async fn test_dispatcher_runs_through_handle() {
        let config = RateLimitConfig::new(120, 50, 100).unwrap();
        let plan = plan(0u64, 1_000, 50, &config).unwrap();

        let clock = clock();
        let throttle = Throttle::with_clock(ThrottleConfig::bulk_email(), clock.clone());
        let mut handle = ThrottleActor::spawn(10, throttle);
        let mut provider = SimulatedProvider::new(0, false);

        let report = Dispatcher::new(&mut handle, DispatchMode::PerBatch)
            .run(&plan, &mut provider)
            .await;

        assert!(report.is_complete());
        assert_eq!(report.dispatched, 20);
        assert_eq!(provider.sent(), 20);
        assert_eq!(clock.total_slept(), report.waited);
    }

    #[tokio::test]
    async fn test_closed_actor_is_reported() {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx);
        let handle = ThrottleHandle::from_sender(tx);

        assert_eq!(handle.acquire().await.unwrap_err(), ThrottleError::Closed);
    }
}
