use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use super::activity::ActivityPolicy;
use super::cache::RunnerCache;
use crate::db::models::{Observation, RunnerUpdate, UpdateInstruction};
use crate::matching::{find_track_fuzzy, normalize_horse_name, TrackMatcher, DEFAULT_SIMILARITY_THRESHOLD};

/// Relative move above which a price change is logged at info level.
const NOTABLE_MOVE_PCT: f64 = 10.0;

/// Absorbs binary error in 2dp prices so a move of exactly the threshold
/// is never material.
const ODDS_EPSILON: f64 = 1e-9;

/// Why an observation could not be tied to a stored runner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnmatchReason {
    /// No runner with this name on today's card.
    UnknownHorse,
    /// Name found, but none of its runners ran at a matching track.
    TrackMismatch {
        stored_tracks: Vec<String>,
        /// Closest catalogue course for the feed label, if any
        feed_track_resolved: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unmatched {
    pub horse_name: String,
    pub track_name: String,
    pub odds: f64,
    #[serde(flatten)]
    pub reason: UnmatchReason,
}

/// Output of one detection pass.
#[derive(Debug, Default)]
pub struct Plan {
    /// At most one per runner, in first-seen order
    pub instructions: Vec<UpdateInstruction>,
    pub matched: usize,
    pub price_changes: usize,
    pub heartbeats: usize,
    pub unmatched: Vec<Unmatched>,
    /// Cached `(odds, previous_odds)` of each repriced runner before this
    /// pass touched it
    pub prior_prices: HashMap<i64, (f64, Option<f64>)>,
}

/// Turns observations into update instructions against the cached card.
pub struct ChangeDetector {
    /// Minimum absolute price delta treated as a real move
    threshold: f64,
    tracks: TrackMatcher,
    activity: ActivityPolicy,
}

impl ChangeDetector {
    pub fn new(threshold: f64, tracks: TrackMatcher, activity: ActivityPolicy) -> Self {
        ChangeDetector {
            threshold,
            tracks,
            activity,
        }
    }

    /// Match every observation and decide between a price change and a
    /// heartbeat.
    ///
    /// Matched runners' cached odds are updated as soon as a change is seen,
    /// so a second observation of the same runner within the batch compares
    /// against the new price. Instructions for the same runner are coalesced,
    /// the later one's fields taking precedence.
    pub fn plan(
        &self,
        observations: &[Observation],
        cache: &mut RunnerCache,
        now: DateTime<Utc>,
    ) -> Plan {
        let mut plan = Plan::default();
        let mut slot_by_runner: HashMap<i64, usize> = HashMap::new();

        for obs in observations {
            let key = normalize_horse_name(&obs.horse_name);
            let candidates = cache.get_candidates(&key);
            if candidates.is_empty() {
                plan.unmatched.push(Unmatched {
                    horse_name: obs.horse_name.clone(),
                    track_name: obs.track_name.clone(),
                    odds: obs.odds,
                    reason: UnmatchReason::UnknownHorse,
                });
                continue;
            }

            let Some(idx) = candidates
                .iter()
                .position(|r| self.tracks.is_match(&obs.track_name, &r.track_name))
            else {
                let stored_tracks = candidates.iter().map(|r| r.track_name.clone()).collect();
                plan.unmatched.push(Unmatched {
                    horse_name: obs.horse_name.clone(),
                    track_name: obs.track_name.clone(),
                    odds: obs.odds,
                    reason: UnmatchReason::TrackMismatch {
                        stored_tracks,
                        feed_track_resolved: find_track_fuzzy(&obs.track_name, DEFAULT_SIMILARITY_THRESHOLD)
                            .map(|t| t.name.to_string()),
                    },
                });
                continue;
            };
            let Some(runner) = cache.candidates_mut(&key).and_then(|c| c.get_mut(idx)) else {
                continue;
            };

            plan.matched += 1;
            let is_active = self.activity.is_active(runner.race_time.as_deref(), now);

            let fields = if self.is_material(runner.odds, obs.odds) {
                let pct = ((obs.odds - runner.odds) / runner.odds * 100.0).abs();
                if pct > NOTABLE_MOVE_PCT {
                    info!(
                        "{} ({}): {:.2} → {:.2} ({:.1}%)",
                        obs.horse_name, runner.track_name, runner.odds, obs.odds, pct
                    );
                }
                plan.prior_prices
                    .entry(runner.id)
                    .or_insert((runner.odds, runner.previous_odds));
                let update = RunnerUpdate::price_change(runner.odds, obs.odds, now, is_active);
                runner.odds = obs.odds;
                runner.previous_odds = update.previous_odds;
                plan.price_changes += 1;
                update
            } else {
                plan.heartbeats += 1;
                RunnerUpdate::heartbeat(now, is_active)
            };
            runner.is_active = is_active;

            match slot_by_runner.get(&runner.id) {
                Some(&slot) => plan.instructions[slot].fields.overlay(fields),
                None => {
                    slot_by_runner.insert(runner.id, plan.instructions.len());
                    plan.instructions.push(UpdateInstruction {
                        runner_id: runner.id,
                        fields,
                    });
                }
            }
        }

        debug!(
            "Planned {} updates ({} changes, {} heartbeats, {} unmatched)",
            plan.instructions.len(),
            plan.price_changes,
            plan.heartbeats,
            plan.unmatched.len()
        );
        plan
    }

    fn is_material(&self, stored: f64, observed: f64) -> bool {
        (stored - observed).abs() > self.threshold + ODDS_EPSILON
    }
}
