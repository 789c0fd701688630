use chrono::SecondsFormat;
use clap::ValueEnum;
use metrics_exporter_prometheus::PrometheusHandle;
use regatta_scoring::error::AppError;
use regatta_scoring::scoring::export::{result_rows, standing_rows, to_csv_string};
use regatta_scoring::scoring::import::{load_scoring_config, parse_entries, parse_results};
use regatta_scoring::scoring::{
    ExportError, InMemoryResultStore, InMemorySnapshotStore, RacePoints, RaceNumber,
    RecalculationCoordinator, RecomputeError, Regatta, RegattaId, ResultRow, ResultStore,
    ScoringConfig, StandingsSnapshot,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type ScoringService =
    RecalculationCoordinator<InMemoryResultStore, InMemorySnapshotStore>;

pub(crate) fn scoring_service(store: InMemoryResultStore) -> Arc<ScoringService> {
    Arc::new(RecalculationCoordinator::new(
        Arc::new(store),
        Arc::new(InMemorySnapshotStore::default()),
    ))
}

/// One discard from four races, two from eight.
pub(crate) fn default_scoring_config() -> ScoringConfig {
    ScoringConfig::with_schedule([(1, 0), (4, 1), (8, 2)])
}

/// Files describing one regatta to preload into the in-memory store.
#[derive(Debug, Clone)]
pub(crate) struct RegattaSource {
    pub(crate) regatta: RegattaId,
    pub(crate) name: String,
    pub(crate) entries: PathBuf,
    pub(crate) results: Option<PathBuf>,
    pub(crate) config: Option<PathBuf>,
}

/// Registers the regatta and its roster, then records every result. Returns the result count.
pub(crate) fn load_regatta(
    store: &InMemoryResultStore,
    source: &RegattaSource,
) -> Result<usize, AppError> {
    let scoring = match &source.config {
        Some(path) => load_scoring_config(File::open(path)?)?,
        None => default_scoring_config(),
    };
    store
        .insert_regatta(Regatta {
            regatta_id: source.regatta.clone(),
            name: source.name.clone(),
            scoring,
        })
        .map_err(RecomputeError::from)?;

    for entry in parse_entries(File::open(&source.entries)?, &source.regatta)? {
        store.insert_entry(entry).map_err(RecomputeError::from)?;
    }

    let Some(path) = &source.results else {
        return Ok(0);
    };
    let results = parse_results(File::open(path)?, &source.regatta)?;
    let recorded = results.len();
    for result in results {
        store
            .upsert_race_result(result)
            .map_err(RecomputeError::from)?;
    }
    Ok(recorded)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum View {
    #[default]
    Standings,
    Results,
}

pub(crate) fn render(
    snapshot: &StandingsSnapshot,
    results: &[ResultRow],
    view: View,
    format: OutputFormat,
) -> Result<String, AppError> {
    let rendered = match (view, format) {
        (View::Standings, OutputFormat::Table) => render_standings_table(snapshot),
        (View::Results, OutputFormat::Table) => render_results_table(results),
        (View::Standings, OutputFormat::Csv) => to_csv_string(&standing_rows(snapshot))?,
        (View::Results, OutputFormat::Csv) => to_csv_string(results)?,
        (View::Standings, OutputFormat::Json) => {
            serde_json::to_string_pretty(snapshot).map_err(ExportError::from)?
        }
        (View::Results, OutputFormat::Json) => {
            serde_json::to_string_pretty(results).map_err(ExportError::from)?
        }
    };
    Ok(rendered)
}

/// Race-by-race series grid. Discarded scores are shown in parentheses.
pub(crate) fn render_standings_table(snapshot: &StandingsSnapshot) -> String {
    let races: BTreeSet<RaceNumber> = snapshot
        .standings
        .iter()
        .flat_map(|standing| standing.races.iter().map(|race| race.race))
        .collect();

    let mut header = format!("{:<4} {:<10} {:<18}", "Pos", "Sail", "Boat");
    for race in &races {
        header.push_str(&format!(" {:>9}", format!("R{race}")));
    }
    header.push_str(&format!(" {:>7} {:>7}", "Total", "Net"));

    let mut lines = vec![
        format!(
            "Generation {} published {} | {} races scored, {} discard(s)",
            snapshot.generation,
            snapshot
                .published_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            snapshot.races_scored,
            snapshot.discards
        ),
        header,
    ];

    for standing in &snapshot.standings {
        let by_race: BTreeMap<RaceNumber, &RacePoints> = standing
            .races
            .iter()
            .map(|race| (race.race, race))
            .collect();
        let mut line = format!(
            "{:<4} {:<10} {:<18}",
            standing.rank, standing.sail_number, standing.boat_name
        );
        for race in &races {
            let cell = by_race
                .get(race)
                .map(|points| race_cell(points))
                .unwrap_or_else(|| "-".to_string());
            line.push_str(&format!(" {cell:>9}"));
        }
        line.push_str(&format!(
            " {:>7} {:>7}",
            standing.total_points.to_string(),
            standing.net_points.to_string()
        ));
        lines.push(line);
    }

    for warning in &snapshot.warnings {
        lines.push(format!("! {warning}"));
    }
    lines.join("\n")
}

fn race_cell(points: &RacePoints) -> String {
    let value = match points.outcome.code() {
        Some(code) => format!("{} {code}", points.points),
        None => points.points.to_string(),
    };
    if points.discarded {
        format!("({value})")
    } else {
        value
    }
}

pub(crate) fn render_results_table(rows: &[ResultRow]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    let mut current_race = None;
    for row in rows {
        if current_race != Some(row.race) {
            current_race = Some(row.race);
            let division = row.division.as_deref().unwrap_or("all boats");
            let state = if row.provisional { "provisional" } else { "final" };
            lines.push(format!("Race {} ({division}, {state})", row.race));
        }
        let place = row
            .position
            .map(|position| position.to_string())
            .unwrap_or_else(|| row.status.to_string());
        let marker = match (row.discarded, row.manual) {
            (true, true) => " discarded, manual",
            (true, false) => " discarded",
            (false, true) => " manual",
            (false, false) => "",
        };
        lines.push(format!(
            "  {:<4} {:<10} {:<18} {:>6}{marker}",
            place,
            row.sail_number,
            row.boat_name,
            row.points.to_string()
        ));
    }
    lines.join("\n")
}

/// Rows for the per-race view of a published snapshot.
pub(crate) fn results_for(
    service: &ScoringService,
    regatta: &RegattaId,
    snapshot: &StandingsSnapshot,
) -> Result<Vec<ResultRow>, AppError> {
    let races = service
        .result_store()
        .races(regatta)
        .map_err(RecomputeError::from)?;
    Ok(result_rows(snapshot, &races))
}
