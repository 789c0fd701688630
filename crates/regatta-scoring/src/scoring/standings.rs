//! Standings aggregator: net/total points, ordering, tie-breaks and ranks.

use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use super::domain::{Entry, EntryId, RaceNumber, RaceOutcome};
use super::errors::ScoringError;
use super::points::RacePoints;
use super::policy::TieBreakPolicy;

/// One entry's line in the series standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub rank: u32,
    pub entry_id: EntryId,
    pub sail_number: String,
    pub boat_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipper_name: Option<String>,
    pub net_points: Decimal,
    pub total_points: Decimal,
    pub races_sailed: u32,
    pub discards: u32,
    pub races: Vec<RacePoints>,
}

/// Per-race points for one entry, race-ordered, with discard flags already applied.
#[derive(Debug, Clone)]
pub struct EntryScores {
    pub entry: Entry,
    pub races: Vec<RacePoints>,
}

struct Tally {
    entry: Entry,
    races: Vec<RacePoints>,
    net: Decimal,
    total: Decimal,
    places: BTreeMap<u32, u32>,
    by_race: BTreeMap<RaceNumber, Decimal>,
}

impl Tally {
    fn new(scores: EntryScores) -> Result<Self, ScoringError> {
        let EntryScores { entry, races } = scores;
        let overflow = || ScoringError::PointsOverflow {
            entry: entry.entry_id.clone(),
        };
        let mut net = Decimal::ZERO;
        let mut total = Decimal::ZERO;
        let mut places = BTreeMap::new();
        let mut by_race = BTreeMap::new();

        for race in &races {
            total = total.checked_add(race.points).ok_or_else(overflow)?;
            by_race.insert(race.race, race.points);
            if race.discarded {
                continue;
            }
            net = net.checked_add(race.points).ok_or_else(overflow)?;
            if let RaceOutcome::Finished { position } = race.outcome {
                *places.entry(position).or_insert(0) += 1;
            }
        }

        Ok(Self {
            entry,
            races,
            net,
            total,
            places,
            by_race,
        })
    }

    fn into_standing(self, rank: u32) -> Standing {
        let races_sailed = self
            .races
            .iter()
            .filter(|race| race.outcome.counts_as_sailed())
            .count();
        let discards = self.races.iter().filter(|race| race.discarded).count();

        Standing {
            rank,
            entry_id: self.entry.entry_id,
            sail_number: self.entry.sail_number,
            boat_name: self.entry.boat_name,
            skipper_name: self.entry.skipper_name,
            net_points: self.net,
            total_points: self.total,
            races_sailed: u32::try_from(races_sailed).unwrap_or(u32::MAX),
            discards: u32::try_from(discards).unwrap_or(u32::MAX),
            races: self.races,
        }
    }
}

/// Orders entries into standings. Entries without any race points are listed last.
pub fn aggregate(
    scores: Vec<EntryScores>,
    tie_break: TieBreakPolicy,
) -> Result<Vec<Standing>, ScoringError> {
    let tallies = scores
        .into_iter()
        .map(Tally::new)
        .collect::<Result<Vec<_>, _>>()?;
    let (started, unstarted): (Vec<_>, Vec<_>) = tallies
        .into_iter()
        .partition(|tally| !tally.races.is_empty());

    let mut started = started;
    started.sort_by(|a, b| {
        compare(a, b, tie_break).then_with(|| a.entry.entry_id.cmp(&b.entry.entry_id))
    });

    let mut ranks = Vec::with_capacity(started.len());
    let mut previous: Option<(u32, usize)> = None;
    for index in 0..started.len() {
        let rank = match previous {
            Some((rank, prev)) if compare(&started[prev], &started[index], tie_break).is_eq() => {
                rank
            }
            _ => position_rank(index),
        };
        previous = Some((rank, index));
        ranks.push(rank);
    }

    let mut ranked: Vec<Standing> = started
        .into_iter()
        .zip(ranks)
        .map(|(tally, rank)| tally.into_standing(rank))
        .collect();

    let mut unstarted = unstarted;
    unstarted.sort_by(|a, b| a.entry.entry_id.cmp(&b.entry.entry_id));
    let last_rank = position_rank(ranked.len());
    ranked.extend(
        unstarted
            .into_iter()
            .map(|tally| tally.into_standing(last_rank)),
    );

    Ok(ranked)
}

fn position_rank(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

fn compare(a: &Tally, b: &Tally, tie_break: TieBreakPolicy) -> Ordering {
    a.net.cmp(&b.net).then_with(|| {
        let places = match tie_break {
            TieBreakPolicy::Countback => compare_places(a, b),
            TieBreakPolicy::HeadToHead => Ordering::Equal,
        };
        places.then_with(|| compare_latest_races(a, b))
    })
}

/// More firsts wins, then more seconds, and so on. Discarded races do not count.
fn compare_places(a: &Tally, b: &Tally) -> Ordering {
    let positions: BTreeSet<u32> = a.places.keys().chain(b.places.keys()).copied().collect();
    for position in positions {
        let ours = a.places.get(&position).copied().unwrap_or(0);
        let theirs = b.places.get(&position).copied().unwrap_or(0);
        if ours != theirs {
            return theirs.cmp(&ours);
        }
    }
    Ordering::Equal
}

/// Lower score in the last race wins, then the race before it, and so on.
fn compare_latest_races(a: &Tally, b: &Tally) -> Ordering {
    let races: BTreeSet<RaceNumber> = a.by_race.keys().chain(b.by_race.keys()).copied().collect();
    for race in races.into_iter().rev() {
        if let (Some(ours), Some(theirs)) = (a.by_race.get(&race), b.by_race.get(&race)) {
            let ordering = ours.cmp(theirs);
            if ordering.is_ne() {
                return ordering;
            }
        }
    }
    Ordering::Equal
}
