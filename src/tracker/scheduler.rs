use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::engine::Tracker;

/// Drives [`Tracker::tick`] on a fixed cadence.
///
/// Cadence is measured start-to-start. Cycles never overlap: a cycle that
/// outlives the interval pushes the next tick back rather than running a
/// second cycle alongside it or dropping a tick.
pub struct Scheduler {
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(poll_interval: Duration) -> Self {
        Scheduler { poll_interval }
    }

    /// Run the first cycle immediately, then one per interval until
    /// `shutdown` resolves. An in-flight cycle is dropped on shutdown.
    pub async fn run<F>(&self, tracker: &mut Tracker, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Scheduler started (interval={:?})", self.poll_interval);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tracker.tick() => {}
            }
        }
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Observation, RunnerRecord, UpdateInstruction};
    use crate::db::RunnerStore;
    use crate::error::{FeedError, StoreError};
    use crate::feed::OddsFeed;
    use crate::matching::TrackMatcher;
    use crate::status::StatusBoard;
    use crate::tracker::activity::{ActiveRule, ActiveWindow, ActivityPolicy};
    use crate::tracker::cache::RunnerCache;
    use crate::tracker::clock::FixedClock;
    use crate::tracker::detector::ChangeDetector;
    use crate::tracker::writer::BatchWriter;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::Europe::London;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Feed that takes `delay` to answer and always fails afterwards.
    struct SlowFailingFeed {
        delay: Duration,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl OddsFeed for SlowFailingFeed {
        async fn fetch(&self) -> Result<Vec<Observation>, FeedError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Err(FeedError::Timeout)
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl RunnerStore for EmptyStore {
        async fn load_day(&self, _race_date: NaiveDate) -> Result<Vec<RunnerRecord>, StoreError> {
            Ok(vec![])
        }

        async fn update_runner(&self, update: &UpdateInstruction) -> Result<(), StoreError> {
            Err(StoreError::NotFound(update.runner_id))
        }
    }

    fn tracker(feed: Arc<SlowFailingFeed>, status: StatusBoard) -> Tracker {
        let noon = London
            .with_ymd_and_hms(2024, 6, 18, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        Tracker::new(
            feed,
            Arc::new(EmptyStore),
            RunnerCache::new(Duration::from_secs(300)),
            ChangeDetector::new(
                0.01,
                TrackMatcher::default(),
                ActivityPolicy::new(ActiveRule::FailOpen, chrono::Duration::minutes(30), London),
            ),
            BatchWriter::new(50),
            ActiveWindow::new(7, 21),
            London,
            Arc::new(FixedClock(noon)),
            status,
        )
    }

    fn feed(delay: Duration) -> Arc<SlowFailingFeed> {
        Arc::new(SlowFailingFeed {
            delay,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_first_cycle_then_fixed_interval() {
        let feed = feed(Duration::from_millis(100));
        let status = StatusBoard::new(Utc::now());
        let mut t = tracker(feed.clone(), status.clone());

        Scheduler::new(Duration::from_secs(10))
            .run(&mut t, tokio::time::sleep(Duration::from_secs(25)))
            .await;

        // ticks at 0s, 10s, 20s
        assert_eq!(feed.started.load(Ordering::SeqCst), 3);
        // every cycle failed, none stopped the loop
        assert_eq!(status.snapshot().await.cycles_failed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_cycle_delays_next_tick_without_overlap() {
        let feed = feed(Duration::from_secs(15));
        let mut t = tracker(feed.clone(), StatusBoard::new(Utc::now()));

        Scheduler::new(Duration::from_secs(10))
            .run(&mut t, tokio::time::sleep(Duration::from_secs(40)))
            .await;

        // cycles start at 0s, 15s, 30s; one never starts before the last finished
        assert_eq!(feed.started.load(Ordering::SeqCst), 3);
        assert_eq!(feed.finished.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_in_flight_cycle() {
        let feed = feed(Duration::from_secs(60));
        let mut t = tracker(feed.clone(), StatusBoard::new(Utc::now()));

        Scheduler::new(Duration::from_secs(10))
            .run(&mut t, tokio::time::sleep(Duration::from_secs(1)))
            .await;

        assert_eq!(feed.started.load(Ordering::SeqCst), 1);
        assert_eq!(feed.finished.load(Ordering::SeqCst), 0);
    }
}
