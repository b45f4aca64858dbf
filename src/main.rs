//! Tournament settlement CLI
//!
//! Streams CSV input and writes CSV results to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- standings stats.csv [scoring.csv] > standings.csv
//! cargo run -- ledger ops.csv > wallets.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//! - `SETTLEMENT_SUSPENSION_THRESHOLD`: Balance at which accounts are suspended

use log::debug;
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;
use tourney_settlement::io::{read_stat_sheet, write_leaderboard};
use tourney_settlement::{
    aggregate_standings, assign_ranks, EngineConfig, Ledger, Result, ScoringTable,
    SettlementError,
};

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match (args.get(1).map(String::as_str), args.get(2)) {
        (Some("standings"), Some(stats_path)) => standings(stats_path, args.get(3)),
        (Some("ledger"), Some(ops_path)) => ledger(ops_path),
        _ => Err(SettlementError::Usage),
    }
}

fn standings(stats_path: &str, scoring_path: Option<&String>) -> Result<()> {
    let scoring = match scoring_path {
        Some(path) => ScoringTable::from_csv(BufReader::new(File::open(path)?))?,
        None => ScoringTable::default(),
    };

    let sheet = read_stat_sheet(BufReader::new(File::open(stats_path)?))?;
    debug!("Read {} match entries", sheet.entries.len());

    let standings = aggregate_standings(&sheet.entries, &scoring, &sheet.team_names);

    let stdout = io::stdout();
    let handle = stdout.lock();
    write_leaderboard(handle, &assign_ranks(standings))
}

fn ledger(ops_path: &str) -> Result<()> {
    let config = EngineConfig::from_env();
    let file = File::open(ops_path)?;

    let mut ledger = Ledger::with_threshold(config.suspension_threshold);
    ledger.process_csv(BufReader::new(file))?;
    debug!(
        "Applied {} transactions, conservation holds: {}",
        ledger.transactions().len(),
        ledger.verify_conservation()
    );

    let stdout = io::stdout();
    let handle = stdout.lock();
    ledger.write_output(handle)
}
