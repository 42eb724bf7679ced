use super::normalize::{normalize_track_name, strip_city_suffix, strip_parenthesized};
use super::tracks::canonical_track;

/// One way of deciding that a feed track label and a stored track name
/// refer to the same course. Each is a pure predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStrategy {
    /// Case-insensitive equality.
    Exact,
    /// Equality once the stored name's "(AW)"-style qualifier is dropped.
    StrippedQualifier,
    /// Either name contains the other, with or without the qualifier.
    Substring,
    /// As `Substring`, after dropping a trailing "City" from both sides.
    CitySuffix,
    /// Both labels resolve to the same catalogue course by name or alias.
    CatalogueAlias,
}

impl TrackStrategy {
    pub fn matches(self, api_track: &str, stored_track: &str) -> bool {
        let api = normalize_track_name(api_track);
        let stored = normalize_track_name(stored_track);
        match self {
            TrackStrategy::Exact => api == stored,
            TrackStrategy::StrippedQualifier => api == strip_parenthesized(&stored),
            TrackStrategy::Substring => {
                either_contains(&api, &stored)
                    || either_contains(&api, &strip_parenthesized(&stored))
            }
            TrackStrategy::CitySuffix => {
                let stored_bare = strip_parenthesized(&stored);
                either_contains(strip_city_suffix(&api), strip_city_suffix(&stored_bare))
            }
            TrackStrategy::CatalogueAlias => {
                match (canonical_track(&api), canonical_track(&stored)) {
                    (Some(a), Some(b)) => a.name == b.name,
                    _ => false,
                }
            }
        }
    }
}

/// Substring test in both directions; an empty side never matches.
fn either_contains(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(b) || b.contains(a)
}

/// Ordered, short-circuiting list of [`TrackStrategy`] predicates.
///
/// Any single strategy accepting the pair is a match.
#[derive(Debug, Clone)]
pub struct TrackMatcher {
    strategies: Vec<TrackStrategy>,
}

impl Default for TrackMatcher {
    fn default() -> Self {
        TrackMatcher::new(vec![
            TrackStrategy::Exact,
            TrackStrategy::StrippedQualifier,
            TrackStrategy::Substring,
            TrackStrategy::CitySuffix,
        ])
    }
}

impl TrackMatcher {
    pub fn new(strategies: Vec<TrackStrategy>) -> Self {
        TrackMatcher { strategies }
    }

    /// Default strategies plus [`TrackStrategy::CatalogueAlias`] as a last resort.
    pub fn with_catalogue_aliases() -> Self {
        let mut matcher = Self::default();
        matcher.strategies.push(TrackStrategy::CatalogueAlias);
        matcher
    }

    /// First strategy that accepts the pair, if any.
    pub fn matching_strategy(&self, api_track: &str, stored_track: &str) -> Option<TrackStrategy> {
        self.strategies
            .iter()
            .copied()
            .find(|s| s.matches(api_track, stored_track))
    }

    pub fn is_match(&self, api_track: &str, stored_track: &str) -> bool {
        self.matching_strategy(api_track, stored_track).is_some()
    }
}
