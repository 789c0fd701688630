//! Points calculator: one race's raw results to per-entry points.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use super::domain::{EntryId, RaceNumber, RaceOutcome, RaceResult, ResultCode};
use super::errors::{PositionCollision, ScoringError, ScoringWarning};
use super::rules::ScoringRules;

/// Points one entry earned in one race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RacePoints {
    pub race: RaceNumber,
    pub points: Decimal,
    pub outcome: RaceOutcome,
    /// False when the entry had no result and was filled in as DNC.
    pub recorded: bool,
    /// True when a points override replaced the computed value.
    pub manual: bool,
    pub discarded: bool,
}

/// How an entry takes part in race scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    /// Scored in every race; a missing result becomes DNC, with a warning when `warn_if_missing`.
    Scored { warn_if_missing: bool },
    /// Known to the roster but left out of the standings.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct RaceScore {
    pub race: RaceNumber,
    pub finishers: u32,
    pub points: BTreeMap<EntryId, RacePoints>,
    pub warnings: Vec<ScoringWarning>,
}

pub fn calculate_race_points(
    race: RaceNumber,
    results: &[&RaceResult],
    rules: &ScoringRules,
    confirmed_entries: u32,
    roster: &BTreeMap<EntryId, Participation>,
) -> Result<RaceScore, ScoringError> {
    check_positions(race, results)?;

    let finishers = results
        .iter()
        .filter(|result| matches!(result.outcome, RaceOutcome::Finished { .. }))
        .count();
    let finishers = u32::try_from(finishers).unwrap_or(u32::MAX);
    let status_points = rules.status_points(finishers, confirmed_entries);

    let mut points = BTreeMap::new();
    let mut warnings = Vec::new();

    for result in results {
        match roster.get(&result.entry_id) {
            Some(Participation::Scored { .. }) => {}
            Some(Participation::Ignored) => continue,
            None => {
                warnings.push(ScoringWarning::UnknownEntry {
                    race,
                    entry: result.entry_id.clone(),
                });
                continue;
            }
        }

        let computed = match result.outcome {
            RaceOutcome::Finished { position } => Decimal::from(position),
            RaceOutcome::Status(code) => status_points.points_for(code),
        };

        points.insert(
            result.entry_id.clone(),
            RacePoints {
                race,
                points: result.points_override.unwrap_or(computed),
                outcome: result.outcome,
                recorded: true,
                manual: result.points_override.is_some(),
                discarded: false,
            },
        );
    }

    for (entry, participation) in roster {
        let Participation::Scored { warn_if_missing } = participation else {
            continue;
        };
        if points.contains_key(entry) {
            continue;
        }
        if *warn_if_missing {
            warnings.push(ScoringWarning::IncompleteData {
                race,
                entry: entry.clone(),
            });
        }
        points.insert(
            entry.clone(),
            RacePoints {
                race,
                points: status_points.points_for(ResultCode::Dnc),
                outcome: RaceOutcome::Status(ResultCode::Dnc),
                recorded: false,
                manual: false,
                discarded: false,
            },
        );
    }

    Ok(RaceScore {
        race,
        finishers,
        points,
        warnings,
    })
}

fn check_positions(race: RaceNumber, results: &[&RaceResult]) -> Result<(), ScoringError> {
    let mut by_position: BTreeMap<u32, Vec<EntryId>> = BTreeMap::new();
    let mut seen: BTreeMap<&EntryId, usize> = BTreeMap::new();

    for result in results {
        *seen.entry(&result.entry_id).or_default() += 1;
        if let Some(position) = result.outcome.position() {
            by_position
                .entry(position)
                .or_default()
                .push(result.entry_id.clone());
        }
    }

    if let Some((entry, _)) = seen.into_iter().find(|(_, count)| *count > 1) {
        return Err(ScoringError::InvalidResult {
            race,
            entry: entry.clone(),
            reason: "more than one result recorded for the same entry".to_string(),
        });
    }

    let collisions: Vec<PositionCollision> = by_position
        .into_iter()
        .filter(|(_, entries)| entries.len() > 1)
        .map(|(position, mut entries)| {
            entries.sort();
            PositionCollision { position, entries }
        })
        .collect();

    if collisions.is_empty() {
        Ok(())
    } else {
        Err(ScoringError::AmbiguousResults { race, collisions })
    }
}
