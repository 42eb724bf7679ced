use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::odds::parse_decimal_odds;
use super::provider::OddsFeed;
use crate::db::models::Observation;
use crate::error::FeedError;

/// Track label used when a race arrives without a league.
const UNKNOWN_TRACK: &str = "Unknown Race";

/// HTTP client for the bookmaker horse-racing feed.
#[derive(Clone)]
pub struct OddsFeedClient {
    http: Client,
    url: String,
    proxy_secret: Option<String>,
}

impl OddsFeedClient {
    /// `timeout` bounds the whole request; an expired request is aborted
    /// and reported as [`FeedError::Timeout`].
    pub fn new(
        base_url: &str,
        path: &str,
        proxy_secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(OddsFeedClient {
            http,
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            proxy_secret,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl OddsFeed for OddsFeedClient {
    fn name(&self) -> &str {
        "bet365"
    }

    async fn fetch(&self) -> Result<Vec<Observation>, FeedError> {
        debug!("Fetching odds feed from {}", self.url);

        let mut req = self.http.get(&self.url).header("accept", "*/*");
        if let Some(secret) = &self.proxy_secret {
            req = req.header("x-rapidapi-proxy-secret", secret);
        }
        let resp = req.send().await?;

        if resp.status() != StatusCode::OK {
            return Err(FeedError::Status(resp.status().as_u16()));
        }

        let body = resp.text().await?;
        let raw: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| FeedError::Malformed(e.to_string()))?;

        parse_races_response(&raw)
    }
}

/// Flatten `{ races: [ { league, time, horses: [ { na, OD } ] } ] }` into
/// observations. Entries without a name or price, starting-price-only
/// entries, and unparsable prices are dropped individually.
pub fn parse_races_response(raw: &serde_json::Value) -> Result<Vec<Observation>, FeedError> {
    if !raw.is_object() {
        return Err(FeedError::Malformed("expected a JSON object".into()));
    }
    let races = match raw.get("races") {
        None | Some(serde_json::Value::Null) => return Ok(vec![]),
        Some(serde_json::Value::Array(a)) => a,
        Some(_) => return Err(FeedError::Malformed("`races` is not an array".into())),
    };

    let mut observations = Vec::new();
    for race in races {
        let track = race["league"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_TRACK);
        let race_time = race["time"].as_str().map(str::to_string);

        let horses = match race["horses"].as_array() {
            Some(h) => h,
            None => continue,
        };

        observations.extend(horses.iter().filter_map(|horse| {
            let name = horse["na"].as_str().map(str::trim).filter(|s| !s.is_empty())?;
            let odds = parse_decimal_odds(horse["OD"].as_str()?)?;
            Some(Observation {
                horse_name: name.to_string(),
                track_name: track.to_string(),
                race_time: race_time.clone(),
                odds,
            })
        }));
    }

    debug!("{} races, {} priced runners from feed", races.len(), observations.len());
    Ok(observations)
}
