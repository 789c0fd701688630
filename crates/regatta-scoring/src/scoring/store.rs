use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::domain::{Entry, Race, RaceResult, RegattaId};
use super::engine::ScoringInput;
use super::errors::ScoringWarning;
use super::policy::ScoringConfig;
use super::standings::Standing;

/// Published standings for one regatta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingsSnapshot {
    pub regatta_id: RegattaId,
    pub generation: u64,
    pub published_at: DateTime<Utc>,
    pub races_scored: u32,
    pub discards: u32,
    pub standings: Vec<Standing>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ScoringWarning>,
}

/// Source of truth for rosters, race results and scoring configuration.
pub trait ResultStore: Send + Sync {
    fn confirmed_entries(&self, regatta: &RegattaId) -> Result<Vec<Entry>, StoreError>;
    fn race_results(&self, regatta: &RegattaId) -> Result<Vec<RaceResult>, StoreError>;
    fn scoring_config(&self, regatta: &RegattaId) -> Result<ScoringConfig, StoreError>;
    fn races(&self, regatta: &RegattaId) -> Result<Vec<Race>, StoreError>;
    /// Inserts or replaces the result keyed by (regatta, race, entry).
    fn upsert_race_result(&self, result: RaceResult) -> Result<(), StoreError>;
    fn put_scoring_config(
        &self,
        regatta: &RegattaId,
        config: ScoringConfig,
    ) -> Result<(), StoreError>;

    /// Reads everything a recompute needs. Stores that can read atomically should override this.
    fn load_scoring_input(&self, regatta: &RegattaId) -> Result<ScoringInput, StoreError> {
        Ok(ScoringInput {
            regatta_id: regatta.clone(),
            config: self.scoring_config(regatta)?,
            entries: self.confirmed_entries(regatta)?,
            results: self.race_results(regatta)?,
        })
    }
}

/// Holds the last published snapshot per regatta.
pub trait SnapshotStore: Send + Sync {
    fn publish(&self, snapshot: StandingsSnapshot) -> Result<Arc<StandingsSnapshot>, StoreError>;
    fn latest(&self, regatta: &RegattaId) -> Result<Option<Arc<StandingsSnapshot>>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("regatta {0} not found")]
    RegattaNotFound(RegattaId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store rejected write: {0}")]
    Rejected(String),
}
