//! Discard selector.

use rust_decimal::Decimal;
use std::collections::BTreeSet;

use super::domain::RaceNumber;
use super::points::RacePoints;

/// Picks the races an entry drops: its `discards` worst scores, earliest race first on ties.
///
/// Returns an empty set when the entry has sailed fewer than `min_races_for_discard` races.
/// At least one race always counts, and a race scored zero is never dropped.
pub fn select_discards(
    races: &[RacePoints],
    discards: u32,
    races_sailed: u32,
    min_races_for_discard: u32,
) -> BTreeSet<RaceNumber> {
    if discards == 0 || races_sailed < min_races_for_discard {
        return BTreeSet::new();
    }

    let allowed = usize::try_from(discards)
        .unwrap_or(usize::MAX)
        .min(races.len().saturating_sub(1));

    let mut ranked: Vec<&RacePoints> = races.iter().collect();
    ranked.sort_by(|a, b| b.points.cmp(&a.points).then(a.race.cmp(&b.race)));

    ranked
        .into_iter()
        .filter(|race| race.points > Decimal::ZERO)
        .take(allowed)
        .map(|race| race.race)
        .collect()
}

/// Marks the selected races as discarded in place.
pub fn apply_discards(races: &mut [RacePoints], discarded: &BTreeSet<RaceNumber>) {
    for race in races.iter_mut() {
        race.discarded = discarded.contains(&race.race);
    }
}
