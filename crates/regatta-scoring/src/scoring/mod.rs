//! Regatta scoring: low-point race scoring, discards, tie-breaks and published standings.
//!
//! The pure pipeline (`rules`, `points`, `discard`, `standings`, `engine`) turns one regatta's
//! roster, results and configuration into ranked standings. The [`RecalculationCoordinator`]
//! serializes recomputes per regatta and publishes snapshots through the store seams.

pub mod coordinator;
pub(crate) mod discard;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod export;
pub mod import;
pub mod memory;
pub(crate) mod points;
pub mod policy;
pub mod router;
pub mod rules;
pub(crate) mod standings;
pub mod store;

#[cfg(test)]
mod tests;

pub use coordinator::{RecalculationCoordinator, RecomputeError};
pub use domain::{
    Entry, EntryId, OutcomeError, OutcomeStatus, Race, RaceNumber, RaceOutcome, RaceResult,
    Regatta, RegattaId, ResultCode, ResultSubmission,
};
pub use engine::{score_regatta, ScoredRegatta, ScoringInput};
pub use errors::{ConfigurationIssue, PositionCollision, ScoringError, ScoringWarning};
pub use export::{ExportError, ExportFormat, ResultRow, StandingRow};
pub use import::ImportError;
pub use memory::{InMemoryResultStore, InMemorySnapshotStore};
pub use points::RacePoints;
pub use policy::{
    DiscardSchedule, DiscardStep, FleetBasis, ScoringConfig, StatusPointPolicy, TieBreakPolicy,
    UnstartedPolicy, WithdrawalPolicy,
};
pub use router::scoring_router;
pub use standings::Standing;
pub use store::{ResultStore, SnapshotStore, StandingsSnapshot, StoreError};
