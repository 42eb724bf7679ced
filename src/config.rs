use chrono_tz::Tz;
use clap::Parser;
use std::time::Duration;

use crate::tracker::{ActiveRule, ActiveWindow};

/// Live horse-racing odds tracker
#[derive(Parser, Debug, Clone)]
#[command(name = "racing-odds-tracker", version, about)]
pub struct Config {
    /// Odds feed base URL, e.g. http://feed.example.com
    #[arg(long, env = "FEED_BASE_URL")]
    pub feed_base_url: Option<String>,

    /// Path of the horse-racing races endpoint on the feed host
    #[arg(long, env = "FEED_PATH", default_value = "/v2/bet365/sports/horse-racing/races")]
    pub feed_path: String,

    /// Shared secret sent as the x-rapidapi-proxy-secret header
    #[arg(long, env = "FEED_PROXY_SECRET")]
    pub feed_proxy_secret: Option<String>,

    /// Feed request timeout in seconds
    #[arg(long, env = "FEED_TIMEOUT_SECS", default_value = "8")]
    pub feed_timeout_secs: u64,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "racing.db")]
    pub database_path: String,

    /// Create the runners table if missing (local setups only)
    #[arg(long, env = "INIT_SCHEMA", default_value = "false")]
    pub init_schema: bool,

    /// Polling interval in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "10")]
    pub poll_interval_secs: u64,

    /// First local hour (inclusive) in which polling runs
    #[arg(long, env = "ACTIVE_START_HOUR", default_value = "7")]
    pub active_start_hour: u32,

    /// Last local hour (inclusive) in which polling runs
    #[arg(long, env = "ACTIVE_END_HOUR", default_value = "21")]
    pub active_end_hour: u32,

    /// IANA timezone for the active window, race times and race date
    #[arg(long, env = "TIMEZONE", default_value = "Europe/London")]
    pub timezone: String,

    /// Runner cache time-to-live in seconds
    #[arg(long, env = "CACHE_TTL_SECS", default_value = "300")]
    pub cache_ttl_secs: u64,

    /// Updates per concurrent write batch
    #[arg(long, env = "BATCH_SIZE", default_value = "50")]
    pub batch_size: usize,

    /// Minimum absolute decimal-odds move recorded as a price change
    #[arg(long, env = "ODDS_CHANGE_THRESHOLD", default_value = "0.01")]
    pub odds_change_threshold: f64,

    /// Minutes after the off a runner is still considered active
    #[arg(long, env = "ACTIVE_GRACE_MINS", default_value = "30")]
    pub active_grace_mins: i64,

    /// Activity to assume when a race time is missing or unreadable
    #[arg(long, env = "UNPARSABLE_RACE_TIME", value_enum, default_value = "active")]
    pub unparsable_race_time: ActiveRule,

    /// Also match track labels that are catalogue aliases of each other
    #[arg(long, env = "MATCH_TRACK_ALIASES", default_value = "false")]
    pub match_track_aliases: bool,

    /// Status server listen address
    #[arg(long, env = "STATUS_ADDR", default_value = "0.0.0.0:8080")]
    pub status_addr: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let Some(base) = self.feed_base_url.as_deref() else {
            anyhow::bail!("FEED_BASE_URL is required");
        };
        let parsed = url::Url::parse(base)
            .map_err(|e| anyhow::anyhow!("FEED_BASE_URL {:?} is not a valid URL: {}", base, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("FEED_BASE_URL must be http or https");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if self.feed_timeout_secs == 0 {
            anyhow::bail!("feed_timeout_secs must be positive");
        }
        if self.cache_ttl_secs == 0 {
            anyhow::bail!("cache_ttl_secs must be positive");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be positive");
        }
        if self.active_start_hour > 23 || self.active_end_hour > 23 {
            anyhow::bail!("active hours must be between 0 and 23");
        }
        if self.active_start_hour > self.active_end_hour {
            anyhow::bail!("active_start_hour must not be after active_end_hour");
        }
        if self.odds_change_threshold <= 0.0 {
            anyhow::bail!("odds_change_threshold must be positive");
        }
        if self.active_grace_mins < 0 {
            anyhow::bail!("active_grace_mins must not be negative");
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("unknown timezone {:?}: {}", self.timezone, e))
    }

    pub fn feed_url(&self) -> &str {
        self.feed_base_url.as_deref().unwrap_or_default()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn active_grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.active_grace_mins)
    }

    pub fn active_window(&self) -> ActiveWindow {
        ActiveWindow::new(self.active_start_hour, self.active_end_hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["racing-odds-tracker"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let c = parse(&["--feed-base-url", "http://127.0.0.1"]);
        c.validate().unwrap();
        assert_eq!(c.poll_interval(), Duration::from_secs(10));
        assert_eq!(c.feed_timeout(), Duration::from_secs(8));
        assert_eq!(c.cache_ttl(), Duration::from_secs(300));
        assert_eq!(c.batch_size, 50);
        assert_eq!(c.odds_change_threshold, 0.01);
        assert_eq!(c.active_window(), ActiveWindow::new(7, 21));
        assert_eq!(c.unparsable_race_time, ActiveRule::FailOpen);
        assert_eq!(c.tz().unwrap(), chrono_tz::Europe::London);
    }

    #[test]
    fn test_missing_feed_url_is_fatal() {
        let mut c = parse(&["--feed-base-url", "http://127.0.0.1"]);
        c.feed_base_url = None;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = ["--feed-base-url", "http://127.0.0.1"];
        for extra in [
            vec!["--batch-size", "0"],
            vec!["--poll-interval-secs", "0"],
            vec!["--active-start-hour", "22", "--active-end-hour", "7"],
            vec!["--active-end-hour", "24"],
            vec!["--timezone", "Mars/Olympus"],
            vec!["--odds-change-threshold", "0"],
        ] {
            let mut args = base.to_vec();
            args.extend(extra.iter());
            assert!(parse(&args).validate().is_err(), "accepted {:?}", extra);
        }
        assert!(parse(&["--feed-base-url", "not a url"]).validate().is_err());
        assert!(parse(&["--feed-base-url", "ftp://feed"]).validate().is_err());
    }

    #[test]
    fn test_fail_closed_flag() {
        let c = parse(&["--feed-base-url", "http://x", "--unparsable-race-time", "inactive"]);
        assert_eq!(c.unparsable_race_time, ActiveRule::FailClosed);
    }
}
