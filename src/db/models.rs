use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One runner (horse entered in a race) on the current race day, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerRecord {
    pub id: i64,
    pub horse_name: String,
    pub track_name: String,
    /// Current decimal price (always > 0)
    pub odds: f64,
    /// Price immediately before the most recent change
    pub previous_odds: Option<f64>,
    /// Scheduled off time as seeded, usually "HH:MM" local time
    pub race_time: Option<String>,
    /// Derived from `race_time` on every update, never authoritative
    pub is_active: bool,
    pub odds_changed_at: Option<DateTime<Utc>>,
    /// `None` until the tracker has touched the row at least once
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// Seed row for the runners table.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct NewRunner {
    pub horse_name: String,
    pub track_name: String,
    pub race_date: NaiveDate,
    pub race_time: Option<String>,
    pub odds: f64,
}

/// A single feed-reported price, valid for one polling cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub horse_name: String,
    pub track_name: String,
    pub race_time: Option<String>,
    /// Decimal odds, rounded to 2dp, always > 0
    pub odds: f64,
}

/// The subset of runner fields an update writes.
///
/// Heartbeats carry only `last_updated_at` and `is_active`; price changes
/// additionally carry the new and previous odds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunnerUpdate {
    pub odds: Option<f64>,
    pub previous_odds: Option<f64>,
    pub odds_changed_at: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
    pub is_active: bool,
}

impl RunnerUpdate {
    pub fn price_change(previous: f64, odds: f64, now: DateTime<Utc>, is_active: bool) -> Self {
        RunnerUpdate {
            odds: Some(odds),
            previous_odds: Some(previous),
            odds_changed_at: Some(now),
            last_updated_at: now,
            is_active,
        }
    }

    pub fn heartbeat(now: DateTime<Utc>, is_active: bool) -> Self {
        RunnerUpdate {
            odds: None,
            previous_odds: None,
            odds_changed_at: None,
            last_updated_at: now,
            is_active,
        }
    }

    pub fn is_price_change(&self) -> bool {
        self.odds.is_some()
    }

    /// Fold a later update for the same runner into this one.
    ///
    /// Freshness fields always come from `later`; price fields only when
    /// `later` itself moved the price, so an earlier in-cycle change survives
    /// a trailing heartbeat.
    pub fn overlay(&mut self, later: RunnerUpdate) {
        if later.is_price_change() {
            self.odds = later.odds;
            self.previous_odds = later.previous_odds;
            self.odds_changed_at = later.odds_changed_at;
        }
        self.last_updated_at = later.last_updated_at;
        self.is_active = later.is_active;
    }
}

/// A pending write against one runner row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateInstruction {
    pub runner_id: i64,
    pub fields: RunnerUpdate,
}
