use serde::Serialize;
use std::fmt;

use super::domain::{EntryId, RaceNumber};

/// Several entries recorded with the same finishing position in one race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionCollision {
    pub position: u32,
    pub entries: Vec<EntryId>,
}

impl fmt::Display for PositionCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries: Vec<&str> = self.entries.iter().map(|entry| entry.0.as_str()).collect();
        write!(f, "position {} ({})", self.position, entries.join(", "))
    }
}

fn describe_collisions(collisions: &[PositionCollision]) -> String {
    collisions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fatal scoring failures; any of these aborts the whole recompute.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("race {race} has duplicate finishing positions: {}", describe_collisions(.collisions))]
    AmbiguousResults {
        race: RaceNumber,
        collisions: Vec<PositionCollision>,
    },
    #[error("invalid scoring configuration: {0}")]
    InvalidConfiguration(#[from] ConfigurationIssue),
    #[error("invalid result for entry {entry} in race {race}: {reason}")]
    InvalidResult {
        race: RaceNumber,
        entry: EntryId,
        reason: String,
    },
    #[error("points for entry {entry} are too large to total")]
    PointsOverflow { entry: EntryId },
}

/// Ways a scoring configuration can be missing or self-contradictory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationIssue {
    #[error("no discard schedule configured")]
    MissingDiscardSchedule,
    #[error("discard schedule thresholds start at 1 race")]
    ZeroThreshold,
    #[error("discard schedule thresholds must increase (found {next} after {previous})")]
    UnorderedSchedule { previous: u32, next: u32 },
    #[error("discards may not decrease as races are added (step from {from_races} races)")]
    DecreasingDiscards { from_races: u32 },
    #[error("step from {from_races} races discards {discards}, leaving no race to count")]
    DiscardsExceedRaces { from_races: u32, discards: u32 },
    #[error("scheduled race count must be at least 1")]
    ZeroScheduledRaces,
    #[error(
        "minimum of {min_races} races for a discard can never be met in a {scheduled}-race series"
    )]
    UnreachableDiscardThreshold { min_races: u32, scheduled: u32 },
}

/// Non-fatal findings surfaced alongside published standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringWarning {
    /// Entry has no result in a race other entries were scored in; scored DNC.
    IncompleteData { race: RaceNumber, entry: EntryId },
    /// Result recorded for an entry that is not on the roster; left out of standings.
    UnknownEntry { race: RaceNumber, entry: EntryId },
}

impl fmt::Display for ScoringWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringWarning::IncompleteData { race, entry } => {
                write!(f, "entry {entry} has no result in race {race}; scored DNC")
            }
            ScoringWarning::UnknownEntry { race, entry } => {
                write!(f, "race {race} has a result for unknown entry {entry}")
            }
        }
    }
}
