mod inventory;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use replaylens_aggregate::{
    correlate_operations, EditOperationLog, SessionAnalysis, SessionAnalyzer,
};
use replaylens_core::ReplayProfile;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::inventory::{build_inventory, FileStatCache};

const LOG_LEVEL_ENV: &str = "REPLAYLENS_LOG_LEVEL";

#[derive(Parser, Debug)]
#[command(name = "replaylens")]
#[command(about = "Replay agent session logs and summarise each context window")]
struct Cli {
    /// Replay profile (TOML). Falls back to REPLAYLENS_PROFILE, then built-in defaults.
    #[arg(long, global = true)]
    profile: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Window summaries, boundaries and diagnostics for one session log
    Manifest {
        log: PathBuf,
        /// Editing-session state file to cross-check file edits against
        #[arg(long)]
        edits: Option<PathBuf>,
    },
    /// Only the deduplicated compaction boundaries
    Boundaries { log: PathBuf },
    /// Place every operation of an editing-session log into a window
    Correlate {
        log: PathBuf,
        #[arg(long)]
        edits: PathBuf,
    },
    /// Every file the session touched, with its current state on disk
    Inventory {
        log: PathBuf,
        #[arg(long)]
        edits: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let profile =
        ReplayProfile::resolve(cli.profile.as_deref()).context("failed to load replay profile")?;
    let analyzer = SessionAnalyzer::new(profile);

    match cli.command {
        Commands::Manifest { log, edits } => {
            let analysis = analyze(&analyzer, &log)?;
            let edits = edits.as_deref().map(load_edits).transpose()?;
            let manifest = analysis.manifest(edits.as_ref())?;
            emit(&manifest)?;
        }
        Commands::Boundaries { log } => {
            let analysis = analyze(&analyzer, &log)?;
            emit(&analysis.scan)?;
        }
        Commands::Correlate { log, edits } => {
            let analysis = analyze(&analyzer, &log)?;
            let edits = load_edits(&edits)?;
            let correlation = correlate_operations(&edits, &analysis.classifier());
            emit(&correlation)?;
        }
        Commands::Inventory { log, edits } => {
            let analysis = analyze(&analyzer, &log)?;
            let edits = edits.as_deref().map(load_edits).transpose()?;
            let mut cache = FileStatCache::new();
            let inventory = build_inventory(&analysis, edits.as_ref(), &mut cache)?;
            info!(
                files = inventory.len(),
                lookups = cache.lookups(),
                "inventory complete"
            );
            emit(&inventory)?;
        }
    }

    Ok(())
}

fn analyze(analyzer: &SessionAnalyzer, log: &Path) -> Result<SessionAnalysis> {
    analyzer
        .analyze_file(log)
        .with_context(|| format!("failed to analyze {}", log.display()))
}

fn load_edits(path: &Path) -> Result<EditOperationLog> {
    EditOperationLog::read(path)
        .with_context(|| format!("failed to load edits from {}", path.display()))
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("failed to write json")?;
    writeln!(out)?;
    Ok(())
}

fn init_logging(debug: bool) {
    let level = if debug {
        "debug".to_string()
    } else if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
        level
    } else {
        "info".to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("log_init_error: a global subscriber is already installed");
    }
}
