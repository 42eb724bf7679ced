use async_trait::async_trait;

use crate::db::models::Observation;
use crate::error::FeedError;

/// Source of live price observations for one polling cycle.
#[async_trait]
pub trait OddsFeed: Send + Sync {
    /// Fetch and flatten the current feed snapshot.
    async fn fetch(&self) -> Result<Vec<Observation>, FeedError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
