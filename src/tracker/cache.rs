//! Per-day runner index so a polling cycle never queries the store per
//! observation.
//!
//! The whole day's card is loaded in one query and indexed by normalised
//! horse name. A name can map to several runners (same horse name at two
//! meetings, or two entries on one card), which is why track matching is
//! needed downstream. The index is rebuilt wholesale once the TTL lapses or
//! the race date rolls over; between reloads the detector patches cached
//! odds in place so repeat observations see the latest price.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::db::models::RunnerRecord;
use crate::db::RunnerStore;
use crate::error::StoreError;
use crate::matching::normalize_horse_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Never loaded (or torn down).
    Cold,
    /// Loaded for the current race date and younger than the TTL.
    Warm,
    /// Past its TTL or loaded for a previous race date.
    Stale,
}

pub struct RunnerCache {
    ttl: Duration,
    /// normalized horse name → runners with that name today
    by_name: HashMap<String, Vec<RunnerRecord>>,
    race_date: Option<NaiveDate>,
    loaded_at: Option<Instant>,
    runner_count: usize,
}

impl RunnerCache {
    pub fn new(ttl: Duration) -> Self {
        RunnerCache {
            ttl,
            by_name: HashMap::new(),
            race_date: None,
            loaded_at: None,
            runner_count: 0,
        }
    }

    pub fn state(&self, today: NaiveDate) -> CacheState {
        match (self.loaded_at, self.race_date) {
            (Some(at), Some(date)) if date == today && at.elapsed() < self.ttl => CacheState::Warm,
            (Some(_), _) => CacheState::Stale,
            _ => CacheState::Cold,
        }
    }

    /// Whether any load has ever succeeded (stale data counts).
    pub fn is_loaded(&self) -> bool {
        self.loaded_at.is_some()
    }

    /// Reload unless warm. Returns whether a reload happened.
    ///
    /// On store failure the previous contents stay in place and the error is
    /// returned for the caller to decide whether stale data is usable.
    pub async fn refresh_if_expired(
        &mut self,
        store: &dyn RunnerStore,
        today: NaiveDate,
    ) -> Result<bool, StoreError> {
        if self.state(today) == CacheState::Warm {
            return Ok(false);
        }
        self.refresh(store, today).await?;
        Ok(true)
    }

    /// Unconditional reload of `today`'s card.
    pub async fn refresh(&mut self, store: &dyn RunnerStore, today: NaiveDate) -> Result<(), StoreError> {
        debug!("Refreshing runner cache for {}", today);
        let runners = store.load_day(today).await?;
        self.load(runners, today);
        info!(
            "Runner cache loaded: {} runners, {} unique names ({})",
            self.runner_count,
            self.by_name.len(),
            today
        );
        Ok(())
    }

    /// Replace the index with `runners` for `race_date`.
    pub fn load(&mut self, runners: Vec<RunnerRecord>, race_date: NaiveDate) {
        let mut by_name: HashMap<String, Vec<RunnerRecord>> = HashMap::new();
        let runner_count = runners.len();
        for runner in runners {
            by_name
                .entry(normalize_horse_name(&runner.horse_name))
                .or_default()
                .push(runner);
        }
        self.by_name = by_name;
        self.runner_count = runner_count;
        self.race_date = Some(race_date);
        self.loaded_at = Some(Instant::now());
    }

    /// Drop everything and return to `Cold`.
    pub fn teardown(&mut self) {
        self.by_name.clear();
        self.runner_count = 0;
        self.race_date = None;
        self.loaded_at = None;
    }

    /// Runners stored under an already-normalised name; empty when unknown.
    pub fn get_candidates(&self, normalized_name: &str) -> &[RunnerRecord] {
        self.by_name
            .get(normalized_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn candidates_mut(&mut self, normalized_name: &str) -> Option<&mut [RunnerRecord]> {
        self.by_name.get_mut(normalized_name).map(Vec::as_mut_slice)
    }

    /// Put back a runner's cached price, e.g. after its price write failed.
    /// Returns false when the runner is no longer cached.
    pub fn restore_price(&mut self, runner_id: i64, odds: f64, previous_odds: Option<f64>) -> bool {
        match self
            .by_name
            .values_mut()
            .flat_map(|runners| runners.iter_mut())
            .find(|r| r.id == runner_id)
        {
            Some(runner) => {
                runner.odds = odds;
                runner.previous_odds = previous_odds;
                true
            }
            None => false,
        }
    }

    /// Number of cached runners.
    pub fn len(&self) -> usize {
        self.runner_count
    }

    pub fn is_empty(&self) -> bool {
        self.runner_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::UpdateInstruction;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn runner(id: i64, horse: &str, track: &str, odds: f64) -> RunnerRecord {
        RunnerRecord {
            id,
            horse_name: horse.to_string(),
            track_name: track.to_string(),
            odds,
            previous_odds: None,
            race_time: Some("14:30".to_string()),
            is_active: true,
            odds_changed_at: None,
            last_updated_at: None,
        }
    }

    /// Store that serves a fixed card and can be switched to failing.
    struct CardStore {
        runners: Vec<RunnerRecord>,
        loads: AtomicUsize,
        fail: AtomicBool,
    }

    impl CardStore {
        fn new(runners: Vec<RunnerRecord>) -> Self {
            CardStore {
                runners,
                loads: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl RunnerStore for CardStore {
        async fn load_day(&self, _race_date: NaiveDate) -> Result<Vec<RunnerRecord>, StoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Poisoned);
            }
            Ok(self.runners.clone())
        }

        async fn update_runner(&self, _update: &UpdateInstruction) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 18).unwrap()
    }

    #[test]
    fn test_groups_by_normalized_name() {
        let mut cache = RunnerCache::new(Duration::from_secs(300));
        cache.load(
            vec![
                runner(1, "Frankel", "Ascot", 3.0),
                runner(2, "FRANKEL ", "York", 5.0),
                runner(3, "Ruler\u{2019}s Gold", "Ayr", 8.0),
            ],
            today(),
        );

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get_candidates("frankel").len(), 2);
        assert_eq!(cache.get_candidates("ruler's gold")[0].id, 3);
        assert!(cache.get_candidates("nijinsky").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_machine_cold_warm_stale() {
        let store = CardStore::new(vec![runner(1, "Frankel", "Ascot", 3.0)]);
        let mut cache = RunnerCache::new(Duration::from_secs(300));
        assert_eq!(cache.state(today()), CacheState::Cold);

        assert!(cache.refresh_if_expired(&store, today()).await.unwrap());
        assert_eq!(cache.state(today()), CacheState::Warm);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(!cache.refresh_if_expired(&store, today()).await.unwrap());
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.state(today()), CacheState::Stale);
        assert!(cache.refresh_if_expired(&store, today()).await.unwrap());
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.state(today()), CacheState::Warm);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_race_date_is_stale() {
        let store = CardStore::new(vec![]);
        let mut cache = RunnerCache::new(Duration::from_secs(300));
        cache.refresh(&store, today()).await.unwrap();

        let tomorrow = today().succ_opt().unwrap();
        assert_eq!(cache.state(tomorrow), CacheState::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reload_keeps_previous_contents() {
        let store = CardStore::new(vec![runner(1, "Frankel", "Ascot", 3.0)]);
        let mut cache = RunnerCache::new(Duration::from_secs(300));
        cache.refresh(&store, today()).await.unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        store.fail.store(true, Ordering::SeqCst);
        assert!(cache.refresh_if_expired(&store, today()).await.is_err());

        assert!(cache.is_loaded());
        assert_eq!(cache.get_candidates("frankel").len(), 1);
        assert_eq!(cache.state(today()), CacheState::Stale);
    }

    #[tokio::test]
    async fn test_first_load_failure_stays_cold() {
        let store = CardStore::new(vec![]);
        store.fail.store(true, Ordering::SeqCst);
        let mut cache = RunnerCache::new(Duration::from_secs(300));
        assert!(cache.refresh_if_expired(&store, today()).await.is_err());
        assert_eq!(cache.state(today()), CacheState::Cold);
        assert!(!cache.is_loaded());
    }

    #[test]
    fn test_in_place_mutation_and_teardown() {
        let mut cache = RunnerCache::new(Duration::from_secs(300));
        cache.load(vec![runner(1, "Frankel", "Ascot", 3.0)], today());

        cache.candidates_mut("frankel").unwrap()[0].odds = 3.5;
        assert_eq!(cache.get_candidates("frankel")[0].odds, 3.5);

        cache.teardown();
        assert_eq!(cache.state(today()), CacheState::Cold);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_restore_price() {
        let mut cache = RunnerCache::new(Duration::from_secs(300));
        cache.load(vec![runner(1, "Frankel", "Ascot", 3.0), runner(2, "Frankel", "York", 6.0)], today());
        let r = &mut cache.candidates_mut("frankel").unwrap()[1];
        r.odds = 7.0;
        r.previous_odds = Some(6.0);

        assert!(cache.restore_price(2, 6.0, None));
        let york = &cache.get_candidates("frankel")[1];
        assert_eq!(york.odds, 6.0);
        assert_eq!(york.previous_odds, None);
        assert!(!cache.restore_price(99, 1.5, None));
    }
}
