//! Roster and result loading from race-office CSV sheets and JSON configuration files.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::str::FromStr;

use super::domain::{Entry, EntryId, OutcomeStatus, RaceResult, RegattaId, ResultSubmission};
use super::policy::ScoringConfig;
use super::rules;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("csv import failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("json import failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("import read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Invalid { line: u64, reason: String },
}

#[derive(Debug, Deserialize)]
struct EntryRow {
    entry_id: String,
    sail_number: String,
    boat_name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    skipper_name: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    withdrawn: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    race: String,
    entry_id: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    position: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    points_override: Option<String>,
}

pub fn parse_entries<R: Read>(reader: R, regatta: &RegattaId) -> Result<Vec<Entry>, ImportError> {
    let mut csv_reader = csv_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut entries = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = line_of(&record);
        let row: EntryRow = record.deserialize(Some(&headers))?;

        if row.entry_id.is_empty() {
            return Err(invalid(line, "entry_id is required"));
        }
        let withdrawn = match row.withdrawn.as_deref() {
            None => false,
            Some(flag) => parse_flag(flag).ok_or_else(|| {
                invalid(line, format!("withdrawn must be true or false, got '{flag}'"))
            })?,
        };

        entries.push(Entry {
            entry_id: EntryId(row.entry_id),
            regatta_id: regatta.clone(),
            sail_number: row.sail_number,
            boat_name: row.boat_name,
            skipper_name: row.skipper_name,
            withdrawn,
        });
    }

    Ok(entries)
}

pub fn parse_results<R: Read>(
    reader: R,
    regatta: &RegattaId,
) -> Result<Vec<RaceResult>, ImportError> {
    let mut csv_reader = csv_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut results = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = line_of(&record);
        let row: ResultRow = record.deserialize(Some(&headers))?;

        let race = parse_field::<u32>(line, "race", &row.race)?;
        let position = row
            .position
            .as_deref()
            .map(|value| parse_field::<u32>(line, "position", value))
            .transpose()?;
        let status = row
            .status
            .as_deref()
            .map(OutcomeStatus::from_str)
            .transpose()
            .map_err(|err| invalid(line, err.to_string()))?;
        let points_override = row
            .points_override
            .as_deref()
            .map(|value| parse_field::<Decimal>(line, "points_override", value))
            .transpose()?;

        let submission = ResultSubmission {
            status,
            position,
            points_override,
        };
        let result = submission
            .into_result(regatta.clone(), race, EntryId(row.entry_id))
            .map_err(|err| invalid(line, err.to_string()))?;
        results.push(result);
    }

    Ok(results)
}

/// Reads a JSON scoring configuration and rejects it early if it would not resolve.
pub fn load_scoring_config<R: Read>(reader: R) -> Result<ScoringConfig, ImportError> {
    let config: ScoringConfig = serde_json::from_reader(reader)?;
    rules::validate(&config).map_err(|issue| invalid(0, issue.to_string()))?;
    Ok(config)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|position| position.line()).unwrap_or(0)
}

fn invalid(line: u64, reason: impl Into<String>) -> ImportError {
    ImportError::Invalid {
        line,
        reason: reason.into(),
    }
}

fn parse_field<T: FromStr>(line: u64, field: &str, value: &str) -> Result<T, ImportError> {
    value
        .parse()
        .map_err(|_| invalid(line, format!("{field} '{value}' is not valid")))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::domain::{RaceOutcome, ResultCode};
    use crate::scoring::policy::{DiscardStep, TieBreakPolicy};

    fn regatta() -> RegattaId {
        RegattaId::from("spring-series")
    }

    #[test]
    fn entries_csv_fills_optional_columns() {
        let csv = "\
entry_id, sail_number, boat_name, skipper_name, withdrawn
A, GBR 1, Alpha, Ana Smith,
B, GBR 2, Bravo, , yes
";
        let entries = parse_entries(csv.as_bytes(), &regatta()).expect("entries parse");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].skipper_name.as_deref(), Some("Ana Smith"));
        assert!(!entries[0].withdrawn);
        assert_eq!(entries[1].skipper_name, None);
        assert!(entries[1].withdrawn);
        assert_eq!(entries[1].regatta_id, regatta());
    }

    #[test]
    fn results_csv_accepts_positions_and_codes() {
        let csv = "\
race,entry_id,status,position,points_override
1,A,,1,
1,B,finished,2,
1,C,dnf,,
2,C,DSQ,,2.5
";
        let results = parse_results(csv.as_bytes(), &regatta()).expect("results parse");
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].outcome, RaceOutcome::Finished { position: 1 });
        assert_eq!(results[2].outcome, RaceOutcome::Status(ResultCode::Dnf));
        assert_eq!(results[3].points_override, Some(Decimal::new(25, 1)));
    }

    #[test]
    fn invalid_result_rows_report_their_line() {
        let csv = "\
race,entry_id,status,position,points_override
1,A,,1,
1,B,DNS,4,
";
        match parse_results(csv.as_bytes(), &regatta()) {
            Err(ImportError::Invalid { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("cannot carry a finishing position"));
            }
            other => panic!("expected invalid row, got {other:?}"),
        }

        let csv = "race,entry_id,status,position,points_override\nzero,A,,1,\n";
        assert!(matches!(
            parse_results(csv.as_bytes(), &regatta()),
            Err(ImportError::Invalid { line: 2, .. })
        ));
    }

    #[test]
    fn scoring_config_json_is_validated() {
        let config = load_scoring_config(
            r#"{"discard_schedule":[{"from_races":4,"discards":1}],"tie_break":"head_to_head"}"#
                .as_bytes(),
        )
        .expect("config loads");
        assert_eq!(
            config.discard_schedule.steps(),
            &[DiscardStep {
                from_races: 4,
                discards: 1
            }]
        );
        assert_eq!(config.tie_break, TieBreakPolicy::HeadToHead);

        assert!(matches!(
            load_scoring_config(r#"{"discard_schedule":[]}"#.as_bytes()),
            Err(ImportError::Invalid { .. })
        ));
    }
}
