use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::activity::ActiveWindow;
use super::cache::RunnerCache;
use super::clock::Clock;
use super::detector::{ChangeDetector, UnmatchReason, Unmatched};
use super::writer::BatchWriter;
use crate::db::RunnerStore;
use crate::error::CycleError;
use crate::feed::OddsFeed;
use crate::matching::tracks::track_kind;
use crate::status::StatusBoard;

/// How many unmatched observations are kept for diagnostics per cycle.
const UNMATCHED_SAMPLE: usize = 3;

/// Summary of one completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub observations: usize,
    pub matched: usize,
    pub price_changes: usize,
    pub heartbeats: usize,
    pub instructions: usize,
    pub unmatched: usize,
    pub unmatched_sample: Vec<Unmatched>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Local time is outside the polling window; nothing was fetched.
    OutsideActiveHours,
    /// The feed answered with no priced runners.
    NoObservations,
    Completed(CycleReport),
}

/// Everything one polling cycle touches. Owns the runner cache, so only one
/// cycle can mutate it at a time.
pub struct Tracker {
    feed: Arc<dyn OddsFeed>,
    store: Arc<dyn RunnerStore>,
    cache: RunnerCache,
    detector: ChangeDetector,
    writer: BatchWriter,
    window: ActiveWindow,
    tz: Tz,
    clock: Arc<dyn Clock>,
    status: StatusBoard,
}

impl Tracker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        feed: Arc<dyn OddsFeed>,
        store: Arc<dyn RunnerStore>,
        cache: RunnerCache,
        detector: ChangeDetector,
        writer: BatchWriter,
        window: ActiveWindow,
        tz: Tz,
        clock: Arc<dyn Clock>,
        status: StatusBoard,
    ) -> Self {
        Tracker {
            feed,
            store,
            cache,
            detector,
            writer,
            window,
            tz,
            clock,
            status,
        }
    }

    /// Fetch, match, write. Outside the active window this returns
    /// immediately without touching the feed or the store.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError> {
        let now = self.clock.now();
        if !self.window.contains(now, self.tz) {
            return Ok(CycleOutcome::OutsideActiveHours);
        }

        let started = Instant::now();
        let observations = self.feed.fetch().await?;
        if observations.is_empty() {
            return Ok(CycleOutcome::NoObservations);
        }

        let today = now.with_timezone(&self.tz).date_naive();
        if let Err(e) = self.cache.refresh_if_expired(self.store.as_ref(), today).await {
            if !self.cache.is_loaded() {
                return Err(CycleError::CacheUnavailable(e));
            }
            warn!("Runner cache refresh failed, matching against stale data: {}", e);
        }
        if self.cache.is_empty() {
            warn!("No runners stored for {}, every observation will be unmatched", today);
        }

        let plan = self.detector.plan(&observations, &mut self.cache, now);
        let applied = self.writer.apply(self.store.as_ref(), &plan.instructions).await;
        // an unwritten price must be seen as a change again next cycle
        for failure in &applied.failed {
            if let Some(&(odds, previous_odds)) = plan.prior_prices.get(&failure.runner_id) {
                self.cache.restore_price(failure.runner_id, odds, previous_odds);
            }
        }

        Ok(CycleOutcome::Completed(CycleReport {
            observations: observations.len(),
            matched: plan.matched,
            price_changes: plan.price_changes,
            heartbeats: plan.heartbeats,
            instructions: plan.instructions.len(),
            unmatched: plan.unmatched.len(),
            unmatched_sample: plan.unmatched.into_iter().take(UNMATCHED_SAMPLE).collect(),
            succeeded: applied.succeeded.len(),
            failed: applied.failed.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        }))
    }

    /// Run one cycle and absorb its outcome into logs and the status board.
    /// Never fails: the next tick always gets its turn.
    pub async fn tick(&mut self) {
        let at = self.clock.now();
        match self.run_cycle().await {
            Ok(CycleOutcome::OutsideActiveHours) => {
                info!(
                    "Outside active hours ({:02}:00-{:02}:59 {}), now {}",
                    self.window.start_hour,
                    self.window.end_hour,
                    self.tz,
                    local_time(at, self.tz)
                );
                self.status.record_skipped().await;
            }
            Ok(CycleOutcome::NoObservations) => {
                warn!("No priced runners returned from {}", self.feed.name());
                self.status.record_completed(at, None, self.cache.len()).await;
            }
            Ok(CycleOutcome::Completed(report)) => {
                log_report(&report);
                self.status
                    .record_completed(at, Some(report), self.cache.len())
                    .await;
            }
            Err(e) => {
                error!("Update cycle failed: {}", e);
                self.status.record_failed(at, e.to_string()).await;
            }
        }
    }

    pub fn cache(&self) -> &RunnerCache {
        &self.cache
    }

    /// Release the cached card; the next cycle reloads from the store.
    pub fn teardown(&mut self) {
        self.cache.teardown();
    }
}

fn local_time(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%H:%M:%S").to_string()
}

fn log_report(report: &CycleReport) {
    info!(
        "{}/{} runners matched ({} changed, {} heartbeat), {} written, {} failed, {} unmatched in {}ms",
        report.matched,
        report.observations,
        report.price_changes,
        report.heartbeats,
        report.succeeded,
        report.failed,
        report.unmatched,
        report.duration_ms
    );
    for u in &report.unmatched_sample {
        match &u.reason {
            UnmatchReason::UnknownHorse => match track_kind(&u.track_name) {
                Some(kind) => info!(
                    "  unmatched \"{}\" @ {} ({:?}): not on today's card",
                    u.horse_name, u.track_name, kind
                ),
                None => info!(
                    "  unmatched \"{}\" @ {}: not a UK course",
                    u.horse_name, u.track_name
                ),
            },
            UnmatchReason::TrackMismatch { stored_tracks, .. } => info!(
                "  unmatched \"{}\": feed \"{}\" vs stored \"{}\"",
                u.horse_name,
                u.track_name,
                stored_tracks.join(",")
            ),
        }
    }
    if report.unmatched > report.unmatched_sample.len() {
        info!(
            "  ... and {} more unmatched",
            report.unmatched - report.unmatched_sample.len()
        );
    }
}
