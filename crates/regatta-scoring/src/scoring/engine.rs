//! Pure scoring pipeline: rules, race points, discards and standings in one pass.

use std::collections::{BTreeMap, BTreeSet};

use super::discard::{apply_discards, select_discards};
use super::domain::{Entry, EntryId, RaceNumber, RaceResult, RegattaId};
use super::errors::{ScoringError, ScoringWarning};
use super::points::{calculate_race_points, Participation, RacePoints};
use super::policy::{ScoringConfig, UnstartedPolicy, WithdrawalPolicy};
use super::rules::ScoringRules;
use super::standings::{aggregate, EntryScores, Standing};

/// Everything a recompute reads for one regatta.
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub regatta_id: RegattaId,
    pub config: ScoringConfig,
    pub entries: Vec<Entry>,
    pub results: Vec<RaceResult>,
}

/// Output of one scoring pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredRegatta {
    pub races_scored: u32,
    pub discards: u32,
    pub standings: Vec<Standing>,
    pub warnings: Vec<ScoringWarning>,
}

pub fn score_regatta(input: &ScoringInput) -> Result<ScoredRegatta, ScoringError> {
    let rules = ScoringRules::resolve(&input.config)?;

    let mut roster: BTreeMap<EntryId, &Entry> = BTreeMap::new();
    for entry in &input.entries {
        roster.entry(entry.entry_id.clone()).or_insert(entry);
    }
    let confirmed_entries = u32::try_from(roster.len()).unwrap_or(u32::MAX);

    let mut by_race: BTreeMap<RaceNumber, Vec<&RaceResult>> = BTreeMap::new();
    let mut started: BTreeSet<&EntryId> = BTreeSet::new();
    for result in &input.results {
        if result.race == 0 {
            return Err(ScoringError::InvalidResult {
                race: result.race,
                entry: result.entry_id.clone(),
                reason: "race numbers start at 1".to_string(),
            });
        }
        by_race.entry(result.race).or_default().push(result);
        started.insert(&result.entry_id);
    }

    let mut participation = BTreeMap::new();
    let mut unstarted = Vec::new();
    for (entry_id, entry) in &roster {
        if entry.withdrawn && rules.withdrawal() == WithdrawalPolicy::Exclude {
            participation.insert(entry_id.clone(), Participation::Ignored);
        } else if !started.contains(entry_id) {
            participation.insert(entry_id.clone(), Participation::Ignored);
            if rules.unstarted() == UnstartedPolicy::RankLast {
                unstarted.push(*entry);
            }
        } else {
            participation.insert(
                entry_id.clone(),
                Participation::Scored {
                    warn_if_missing: !entry.withdrawn,
                },
            );
        }
    }

    let races_scored = u32::try_from(by_race.len()).unwrap_or(u32::MAX);
    let discards = rules.discards_for(races_scored);

    let mut per_entry: BTreeMap<EntryId, Vec<RacePoints>> = BTreeMap::new();
    let mut warnings = Vec::new();
    for (race, results) in &by_race {
        let score =
            calculate_race_points(*race, results, &rules, confirmed_entries, &participation)?;
        warnings.extend(score.warnings);
        for (entry_id, points) in score.points {
            per_entry.entry(entry_id).or_default().push(points);
        }
    }

    let mut scores = Vec::with_capacity(per_entry.len() + unstarted.len());
    for (entry_id, mut races) in per_entry {
        let Some(entry) = roster.get(&entry_id) else {
            continue;
        };
        let races_sailed = races
            .iter()
            .filter(|race| race.outcome.counts_as_sailed())
            .count();
        let races_sailed = u32::try_from(races_sailed).unwrap_or(u32::MAX);
        let discarded =
            select_discards(&races, discards, races_sailed, rules.min_races_for_discard());
        apply_discards(&mut races, &discarded);
        scores.push(EntryScores {
            entry: (*entry).clone(),
            races,
        });
    }
    scores.extend(unstarted.into_iter().map(|entry| EntryScores {
        entry: entry.clone(),
        races: Vec::new(),
    }));

    let standings = aggregate(scores, rules.tie_break())?;

    Ok(ScoredRegatta {
        races_scored,
        discards,
        standings,
        warnings,
    })
}
