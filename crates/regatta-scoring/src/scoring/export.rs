//! Flattened results and standings tables for CSV/JSON consumers.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

use super::domain::{Race, RaceNumber};
use super::store::StandingsSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

/// One standings line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingRow {
    pub position: u32,
    pub sail_number: String,
    pub boat_name: String,
    pub net_points: Decimal,
    pub total_points: Decimal,
    pub races_sailed: u32,
}

/// One entry's line for one race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRow {
    pub race: RaceNumber,
    pub division: Option<String>,
    pub provisional: bool,
    pub position: Option<u32>,
    pub sail_number: String,
    pub boat_name: String,
    pub skipper_name: Option<String>,
    pub points: Decimal,
    pub status: &'static str,
    pub discarded: bool,
    pub manual: bool,
}

pub fn standing_rows(snapshot: &StandingsSnapshot) -> Vec<StandingRow> {
    snapshot
        .standings
        .iter()
        .map(|standing| StandingRow {
            position: standing.rank,
            sail_number: standing.sail_number.clone(),
            boat_name: standing.boat_name.clone(),
            net_points: standing.net_points,
            total_points: standing.total_points,
            races_sailed: standing.races_sailed,
        })
        .collect()
}

/// Race-by-race rows: finishers in finishing order, then everyone else by points.
pub fn result_rows(snapshot: &StandingsSnapshot, races: &[Race]) -> Vec<ResultRow> {
    let races: BTreeMap<RaceNumber, &Race> = races.iter().map(|race| (race.number, race)).collect();

    let mut rows: Vec<ResultRow> = snapshot
        .standings
        .iter()
        .flat_map(|standing| {
            standing.races.iter().map(|points| {
                let race = races.get(&points.race);
                ResultRow {
                    race: points.race,
                    division: race.and_then(|race| race.division.clone()),
                    provisional: !race.map(|race| race.completed).unwrap_or(false),
                    position: points.outcome.position(),
                    sail_number: standing.sail_number.clone(),
                    boat_name: standing.boat_name.clone(),
                    skipper_name: standing.skipper_name.clone(),
                    points: points.points,
                    status: points.outcome.status().label(),
                    discarded: points.discarded,
                    manual: points.manual,
                }
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        a.race
            .cmp(&b.race)
            .then_with(|| match (a.position, b.position) {
                (Some(ours), Some(theirs)) => ours.cmp(&theirs),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.points.cmp(&b.points),
            })
            .then_with(|| a.sail_number.cmp(&b.sail_number))
    });
    rows
}

pub fn write_csv<W, T>(writer: W, rows: &[T]) -> Result<(), ExportError>
where
    W: Write,
    T: Serialize,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn to_csv_string<T: Serialize>(rows: &[T]) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, rows)?;
    String::from_utf8(buffer).map_err(|err| ExportError::Encoding(err.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("export write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("export produced invalid utf-8: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::{EntryId, RaceOutcome, RegattaId, ResultCode};
    use crate::scoring::points::RacePoints;
    use crate::scoring::standings::Standing;
    use chrono::{TimeZone, Utc};

    fn race_points(race: u32, outcome: RaceOutcome, points: i64, discarded: bool) -> RacePoints {
        RacePoints {
            race,
            points: Decimal::from(points),
            outcome,
            recorded: true,
            manual: false,
            discarded,
        }
    }

    fn snapshot() -> StandingsSnapshot {
        StandingsSnapshot {
            regatta_id: RegattaId::from("r1"),
            generation: 1,
            published_at: Utc.with_ymd_and_hms(2026, 5, 2, 15, 0, 0).unwrap(),
            races_scored: 1,
            discards: 0,
            standings: vec![
                Standing {
                    rank: 1,
                    entry_id: EntryId::from("A"),
                    sail_number: "USA 1".to_string(),
                    boat_name: "Alpha".to_string(),
                    skipper_name: Some("Ana".to_string()),
                    net_points: Decimal::from(1),
                    total_points: Decimal::from(1),
                    races_sailed: 1,
                    discards: 0,
                    races: vec![race_points(1, RaceOutcome::Finished { position: 1 }, 1, false)],
                },
                Standing {
                    rank: 2,
                    entry_id: EntryId::from("B"),
                    sail_number: "USA 2".to_string(),
                    boat_name: "Bravo".to_string(),
                    skipper_name: None,
                    net_points: Decimal::from(3),
                    total_points: Decimal::from(3),
                    races_sailed: 0,
                    discards: 0,
                    races: vec![race_points(
                        1,
                        RaceOutcome::Status(ResultCode::Dns),
                        3,
                        false,
                    )],
                },
            ],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn standings_csv_uses_export_field_names() {
        let csv = to_csv_string(&standing_rows(&snapshot())).expect("csv renders");
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("position,sail_number,boat_name,net_points,total_points,races_sailed")
        );
        assert_eq!(lines.next(), Some("1,USA 1,Alpha,1,1,1"));
        assert_eq!(lines.next(), Some("2,USA 2,Bravo,3,3,0"));
    }

    #[test]
    fn result_rows_carry_status_and_race_metadata() {
        let races = vec![Race {
            number: 1,
            division: Some("Gold".to_string()),
            completed: true,
        }];
        let rows = result_rows(&snapshot(), &races);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].position, Some(1));
        assert_eq!(rows[0].status, "finished");
        assert_eq!(rows[1].position, None);
        assert_eq!(rows[1].status, "DNS");
        assert_eq!(rows[1].division.as_deref(), Some("Gold"));
        assert!(!rows[1].provisional);

        let csv = to_csv_string(&rows).expect("csv renders");
        assert!(csv.starts_with(
            "race,division,provisional,position,sail_number,boat_name,skipper_name,points,status"
        ));
        assert!(csv.contains("1,Gold,false,,USA 2,Bravo,,3,DNS,false,false"));
    }
}
