//! Recalculation coordinator: the single entry point that recomputes and publishes standings.
//!
//! Recomputes for one regatta run one at a time behind a per-regatta lane; different regattas
//! never share a lock. Every request takes a ticket from a monotonic counter before queueing. A
//! recompute records the counter value at the moment it starts reading, and a queued request
//! whose ticket is covered by a later-started recompute reuses that snapshot instead of scoring
//! again: the covering read began after the request arrived, so no earlier write is lost.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};
use tracing::{debug, info, warn};

use super::domain::{RaceResult, RegattaId};
use super::engine::score_regatta;
use super::errors::ScoringError;
use super::export::{result_rows, standing_rows, ResultRow, StandingRow};
use super::policy::ScoringConfig;
use super::rules;
use super::store::{ResultStore, SnapshotStore, StandingsSnapshot, StoreError};

#[derive(Default)]
struct LaneState {
    covered_through: u64,
    last: Option<Arc<StandingsSnapshot>>,
}

#[derive(Default)]
struct Lane {
    state: Mutex<LaneState>,
    /// Result writes share this; a configuration change holds it exclusively.
    writes: RwLock<()>,
}

pub struct RecalculationCoordinator<S, P> {
    results: Arc<S>,
    snapshots: Arc<P>,
    lanes: Mutex<HashMap<RegattaId, Arc<Lane>>>,
    tickets: AtomicU64,
}

impl<S, P> RecalculationCoordinator<S, P>
where
    S: ResultStore + 'static,
    P: SnapshotStore + 'static,
{
    pub fn new(results: Arc<S>, snapshots: Arc<P>) -> Self {
        Self {
            results,
            snapshots,
            lanes: Mutex::new(HashMap::new()),
            tickets: AtomicU64::new(0),
        }
    }

    pub fn result_store(&self) -> &Arc<S> {
        &self.results
    }

    fn lane(&self, regatta: &RegattaId) -> Arc<Lane> {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        lanes.entry(regatta.clone()).or_default().clone()
    }

    fn take_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Recomputes standings, waiting behind any recompute already running for this regatta.
    pub fn recompute(
        &self,
        regatta: &RegattaId,
    ) -> Result<Arc<StandingsSnapshot>, RecomputeError> {
        let ticket = self.take_ticket();
        let lane = self.lane(regatta);
        let mut state = lane.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.run(regatta, ticket, &mut state)
    }

    /// Like [`recompute`](Self::recompute) but fails fast while another recompute holds the
    /// regatta.
    pub fn try_recompute(
        &self,
        regatta: &RegattaId,
    ) -> Result<Arc<StandingsSnapshot>, RecomputeError> {
        let ticket = self.take_ticket();
        let lane = self.lane(regatta);
        let mut state = match lane.state.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                return Err(RecomputeError::InProgress(regatta.clone()));
            }
        };
        self.run(regatta, ticket, &mut state)
    }

    fn run(
        &self,
        regatta: &RegattaId,
        ticket: u64,
        state: &mut MutexGuard<'_, LaneState>,
    ) -> Result<Arc<StandingsSnapshot>, RecomputeError> {
        if state.covered_through >= ticket {
            if let Some(last) = &state.last {
                debug!(%regatta, generation = last.generation, "reusing in-flight recompute");
                return Ok(last.clone());
            }
        }

        let started_at = self.tickets.load(Ordering::SeqCst);
        let input = self.results.load_scoring_input(regatta)?;
        let scored = score_regatta(&input)?;

        for warning in &scored.warnings {
            warn!(%regatta, %warning, "incomplete scoring data");
        }

        let previous = self.snapshots.latest(regatta)?;
        let generation = previous.map(|snapshot| snapshot.generation).unwrap_or(0) + 1;
        let snapshot = self.snapshots.publish(StandingsSnapshot {
            regatta_id: regatta.clone(),
            generation,
            published_at: Utc::now(),
            races_scored: scored.races_scored,
            discards: scored.discards,
            standings: scored.standings,
            warnings: scored.warnings,
        })?;

        info!(
            %regatta,
            generation,
            races_scored = snapshot.races_scored,
            entries = snapshot.standings.len(),
            "standings published"
        );

        state.covered_through = started_at;
        state.last = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Last published snapshot, if any. Never recomputes.
    pub fn standings(
        &self,
        regatta: &RegattaId,
    ) -> Result<Option<Arc<StandingsSnapshot>>, RecomputeError> {
        Ok(self.snapshots.latest(regatta)?)
    }

    /// Writes a result without recomputing; callers schedule the recompute.
    pub fn record_result(&self, result: RaceResult) -> Result<(), RecomputeError> {
        let lane = self.lane(&result.regatta_id);
        let _writes = lane.writes.read().unwrap_or_else(PoisonError::into_inner);
        self.results.upsert_race_result(result)?;
        Ok(())
    }

    /// Writes a result and recomputes the regatta.
    pub fn submit_result(
        &self,
        result: RaceResult,
    ) -> Result<Arc<StandingsSnapshot>, RecomputeError> {
        let regatta = result.regatta_id.clone();
        self.record_result(result)?;
        self.recompute(&regatta)
    }

    /// Sets the scoring configuration of a regatta that has no results yet.
    pub fn configure(
        &self,
        regatta: &RegattaId,
        config: ScoringConfig,
    ) -> Result<(), RecomputeError> {
        rules::validate(&config).map_err(ScoringError::from)?;
        let lane = self.lane(regatta);
        let _writes = lane.writes.write().unwrap_or_else(PoisonError::into_inner);

        if !self.results.race_results(regatta)?.is_empty() {
            return Err(RecomputeError::ConfigurationLocked(regatta.clone()));
        }
        self.results.put_scoring_config(regatta, config)?;
        Ok(())
    }

    /// Replaces the scoring configuration and re-scores the whole series.
    pub fn rescore(
        &self,
        regatta: &RegattaId,
        config: ScoringConfig,
    ) -> Result<Arc<StandingsSnapshot>, RecomputeError> {
        rules::validate(&config).map_err(ScoringError::from)?;
        {
            let lane = self.lane(regatta);
            let _state = lane.state.lock().unwrap_or_else(PoisonError::into_inner);
            self.results.put_scoring_config(regatta, config)?;
        }
        info!(%regatta, "scoring configuration replaced; re-scoring");
        self.recompute(regatta)
    }

    fn published(&self, regatta: &RegattaId) -> Result<Arc<StandingsSnapshot>, RecomputeError> {
        self.snapshots
            .latest(regatta)?
            .ok_or_else(|| RecomputeError::NotPublished(regatta.clone()))
    }

    pub fn export_standings(
        &self,
        regatta: &RegattaId,
    ) -> Result<Vec<StandingRow>, RecomputeError> {
        let snapshot = self.published(regatta)?;
        Ok(standing_rows(&snapshot))
    }

    pub fn export_results(&self, regatta: &RegattaId) -> Result<Vec<ResultRow>, RecomputeError> {
        let snapshot = self.published(regatta)?;
        let races = self.results.races(regatta)?;
        Ok(result_rows(&snapshot, &races))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RecomputeError {
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("a recompute for regatta {0} is already in progress")]
    InProgress(RegattaId),
    #[error("regatta {0} has results; use an explicit re-score to change its configuration")]
    ConfigurationLocked(RegattaId),
    #[error("no standings have been published for regatta {0}")]
    NotPublished(RegattaId),
    #[error("recompute worker failed: {0}")]
    Worker(String),
}
