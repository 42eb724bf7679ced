use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StoreError;

use super::models::{RunnerRecord, UpdateInstruction};

/// The two operations the tracker needs from whatever holds the runners.
#[async_trait]
pub trait RunnerStore: Send + Sync {
    /// Every runner seeded for the given race date.
    async fn load_day(&self, race_date: NaiveDate) -> Result<Vec<RunnerRecord>, StoreError>;

    /// Apply a partial update to one runner row.
    async fn update_runner(&self, update: &UpdateInstruction) -> Result<(), StoreError>;
}
