use crate::infra::{
    default_scoring_config, load_regatta, render, render_results_table, render_standings_table,
    results_for, scoring_service, OutputFormat, RegattaSource, ScoringService, View,
};
use clap::Args;
use regatta_scoring::error::AppError;
use regatta_scoring::scoring::{
    Entry, EntryId, InMemoryResultStore, Race, RaceResult, RecomputeError, Regatta, RegattaId,
    ResultCode,
};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Regatta identifier used in output and warnings
    #[arg(long, default_value = "regatta")]
    pub(crate) regatta: String,
    /// Entries CSV (entry_id, sail_number, boat_name, skipper_name, withdrawn)
    #[arg(long)]
    pub(crate) entries: PathBuf,
    /// Results CSV (race, entry_id, status, position, points_override)
    #[arg(long)]
    pub(crate) results: PathBuf,
    /// Scoring configuration JSON; defaults to one discard from four races, two from eight
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,
    /// Series standings or the race-by-race results
    #[arg(long, value_enum, default_value_t = View::Standings)]
    pub(crate) view: View,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the race-by-race results after the final standings
    #[arg(long)]
    pub(crate) show_results: bool,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        regatta,
        entries,
        results,
        config,
        format,
        view,
    } = args;

    let source = RegattaSource {
        regatta: RegattaId(regatta.clone()),
        name: regatta,
        entries,
        results: Some(results),
        config,
    };
    let store = InMemoryResultStore::default();
    load_regatta(&store, &source)?;

    let service = scoring_service(store);
    let snapshot = service.recompute(&source.regatta)?;
    for warning in &snapshot.warnings {
        eprintln!("warning: {warning}");
    }

    let rows = results_for(&service, &source.regatta, &snapshot)?;
    println!("{}", render(&snapshot, &rows, view, format)?);
    Ok(())
}

pub(crate) fn demo_regatta() -> RegattaId {
    RegattaId::from("autumn-open")
}

/// In-memory store holding the demo regatta and its roster, without results.
pub(crate) fn demo_store() -> Result<InMemoryResultStore, AppError> {
    let store = InMemoryResultStore::default();
    let regatta = demo_regatta();
    store
        .insert_regatta(Regatta {
            regatta_id: regatta.clone(),
            name: "Autumn Open".to_string(),
            scoring: default_scoring_config(),
        })
        .map_err(RecomputeError::from)?;

    let roster = [
        ("A", "GBR 101", "Aurora", Some("Ann Lee")),
        ("B", "GBR 202", "Bellatrix", None),
        ("C", "GBR 303", "Corsair", Some("Cal Ortiz")),
    ];
    for (id, sail, boat, skipper) in roster {
        store
            .insert_entry(Entry {
                entry_id: EntryId::from(id),
                regatta_id: regatta.clone(),
                sail_number: sail.to_string(),
                boat_name: boat.to_string(),
                skipper_name: skipper.map(str::to_string),
                withdrawn: false,
            })
            .map_err(RecomputeError::from)?;
    }

    for number in 1..=4 {
        store
            .insert_race(
                &regatta,
                Race {
                    number,
                    division: Some("IRC 1".to_string()),
                    completed: number < 4,
                },
            )
            .map_err(RecomputeError::from)?;
    }
    Ok(store)
}

fn finish(race: u32, id: &str, position: u32) -> RaceResult {
    RaceResult::finished(demo_regatta(), race, EntryId::from(id), position)
}

fn code(race: u32, id: &str, code: ResultCode) -> RaceResult {
    RaceResult::status(demo_regatta(), race, EntryId::from(id), code)
}

/// Results for the full demo series, race 3 already corrected.
pub(crate) fn demo_results() -> Vec<RaceResult> {
    vec![
        finish(1, "A", 1),
        finish(1, "B", 2),
        finish(1, "C", 3),
        finish(2, "A", 2),
        finish(2, "B", 1),
        code(2, "C", ResultCode::Dnf),
        finish(3, "A", 3),
        code(3, "B", ResultCode::Dns),
        code(3, "C", ResultCode::Dnf),
        finish(4, "A", 1),
        finish(4, "B", 2),
        finish(4, "C", 3),
    ]
}

fn record(service: &ScoringService, results: Vec<RaceResult>) -> Result<(), AppError> {
    for result in results {
        service.record_result(result)?;
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let regatta = demo_regatta();
    let service = scoring_service(demo_store()?);
    let (early, late): (Vec<_>, Vec<_>) =
        demo_results().into_iter().partition(|result| result.race <= 2);

    println!("Regatta scoring demo: Autumn Open, three boats, one discard from four races");

    record(&service, early)?;
    let snapshot = service.recompute(&regatta)?;
    println!("\nAfter race 2");
    println!("{}", render_standings_table(&snapshot));

    println!("\nRace 3 is entered with Aurora and Bellatrix both in third place");
    record(
        &service,
        vec![
            finish(3, "A", 3),
            finish(3, "B", 3),
            code(3, "C", ResultCode::Dnf),
        ],
    )?;
    match service.recompute(&regatta) {
        Err(RecomputeError::Scoring(err)) => {
            println!("Race committee alert: {err}");
            println!("Published standings stay at generation {}", snapshot.generation);
        }
        Err(other) => return Err(other.into()),
        Ok(unexpected) => println!(
            "Race 3 scored without complaint (generation {})",
            unexpected.generation
        ),
    }

    println!("\nCorrection: Bellatrix did not start race 3; race 4 is sailed");
    record(&service, late)?;
    let snapshot = service.recompute(&regatta)?;
    println!("{}", render_standings_table(&snapshot));

    if args.show_results {
        let rows = results_for(&service, &regatta, &snapshot)?;
        println!("\n{}", render_results_table(&rows));
    }
    Ok(())
}
