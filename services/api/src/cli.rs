use crate::demo::{run_demo, run_score, DemoArgs, ScoreArgs};
use crate::infra::RegattaSource;
use crate::server;
use clap::{Args, Parser, Subcommand};
use regatta_scoring::error::AppError;
use regatta_scoring::scoring::RegattaId;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Regatta Scoring",
    about = "Score sailing regattas and serve published standings",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a regatta offline from entries and results CSV files
    Score(ScoreArgs),
    /// Walk through a four-race series, including a race committee correction
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Preload the demo regatta
    #[arg(long)]
    pub(crate) demo: bool,
    /// Identifier for a regatta preloaded from --entries
    #[arg(long, default_value = "regatta")]
    pub(crate) regatta: String,
    /// Entries CSV to preload (entry_id, sail_number, boat_name, skipper_name, withdrawn)
    #[arg(long)]
    pub(crate) entries: Option<PathBuf>,
    /// Results CSV to preload (race, entry_id, status, position, points_override)
    #[arg(long, requires = "entries")]
    pub(crate) results: Option<PathBuf>,
    /// Scoring configuration JSON for the preloaded regatta
    #[arg(long, requires = "entries")]
    pub(crate) config: Option<PathBuf>,
}

impl ServeArgs {
    pub(crate) fn source(&self) -> Option<RegattaSource> {
        let entries = self.entries.clone()?;
        Some(RegattaSource {
            regatta: RegattaId(self.regatta.clone()),
            name: self.regatta.clone(),
            entries,
            results: self.results.clone(),
            config: self.config.clone(),
        })
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args),
        Command::Demo(args) => run_demo(args),
    }
}
