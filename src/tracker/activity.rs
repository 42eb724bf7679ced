//! Time-of-day rules: when polling is allowed, and whether a runner's race
//! is still live.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// What to do when a runner's race time is missing or cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ActiveRule {
    /// Treat the runner as active.
    #[value(name = "active")]
    FailOpen,
    /// Treat the runner as inactive.
    #[value(name = "inactive")]
    FailClosed,
}

/// Decides `is_active` for a runner from its scheduled race time.
#[derive(Debug, Clone)]
pub struct ActivityPolicy {
    pub rule: ActiveRule,
    /// How long after the off a runner still counts as active
    pub grace: Duration,
    pub tz: Tz,
}

impl ActivityPolicy {
    pub fn new(rule: ActiveRule, grace: Duration, tz: Tz) -> Self {
        ActivityPolicy { rule, grace, tz }
    }

    /// Active until `race_time + grace`; falls back to `rule` when the time is
    /// absent or unreadable.
    pub fn is_active(&self, race_time: Option<&str>, now: DateTime<Utc>) -> bool {
        match race_time.and_then(|t| self.resolve_race_time(t, now)) {
            Some(off) => now <= off + self.grace,
            None => self.rule == ActiveRule::FailOpen,
        }
    }

    /// Absolute off time. Bare clock times are placed on today's date in the
    /// policy's timezone.
    pub fn resolve_race_time(&self, raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }

        let time = parse_clock_time(raw)?;
        let today = now.with_timezone(&self.tz).date_naive();
        self.tz
            .from_local_datetime(&today.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

const CLOCK_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];

fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    CLOCK_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
}

/// Inclusive local-hour range during which the tracker polls.
///
/// `7..=21` means 07:00:00 through 21:59:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl ActiveWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        ActiveWindow { start_hour, end_hour }
    }

    pub fn contains(&self, now: DateTime<Utc>, tz: Tz) -> bool {
        let hour = now.with_timezone(&tz).hour();
        (self.start_hour..=self.end_hour).contains(&hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::London;

    fn london(h: u32, m: u32) -> DateTime<Utc> {
        // 18 June 2024, BST (UTC+1)
        London
            .with_ymd_and_hms(2024, 6, 18, h, m, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn policy(rule: ActiveRule) -> ActivityPolicy {
        ActivityPolicy::new(rule, Duration::minutes(30), London)
    }

    #[test]
    fn test_active_before_and_within_grace() {
        let p = policy(ActiveRule::FailOpen);
        assert!(p.is_active(Some("14:30"), london(13, 0)));
        assert!(p.is_active(Some("14:30"), london(14, 59)));
        assert!(p.is_active(Some("14:30"), london(15, 0)));
    }

    #[test]
    fn test_inactive_after_grace() {
        let p = policy(ActiveRule::FailOpen);
        assert!(!p.is_active(Some("14:30"), london(15, 1)));
    }

    #[test]
    fn test_fail_open_on_missing_or_garbage() {
        let p = policy(ActiveRule::FailOpen);
        assert!(p.is_active(None, london(23, 0)));
        assert!(p.is_active(Some("after lunch"), london(23, 0)));
    }

    #[test]
    fn test_fail_closed_on_missing_or_garbage() {
        let p = policy(ActiveRule::FailClosed);
        assert!(!p.is_active(None, london(9, 0)));
        assert!(!p.is_active(Some("25:99"), london(9, 0)));
        // parsable times are unaffected by the rule
        assert!(p.is_active(Some("14:30"), london(9, 0)));
    }

    #[test]
    fn test_race_time_formats() {
        let p = policy(ActiveRule::FailClosed);
        let now = london(9, 0);
        let expected = london(14, 30);
        assert_eq!(p.resolve_race_time("14:30", now), Some(expected));
        assert_eq!(p.resolve_race_time("2:30 PM", now), Some(expected));
        assert_eq!(p.resolve_race_time("2:30pm", now), Some(expected));
        assert_eq!(
            p.resolve_race_time("2024-06-18T13:30:00Z", now),
            Some(expected)
        );
        assert_eq!(p.resolve_race_time("9:05", now), Some(london(9, 5)));
    }

    #[test]
    fn test_window_inclusive_hours() {
        let w = ActiveWindow::new(7, 21);
        assert!(!w.contains(london(6, 59), London));
        assert!(w.contains(london(7, 0), London));
        assert!(w.contains(london(21, 59), London));
        assert!(!w.contains(london(22, 5), London));
    }
}
