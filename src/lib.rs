//! # Tournament Settlement Engine
//!
//! Turns per-match team statistics into deterministic standings, taxes prize
//! payouts, and moves virtual currency (UC) through an append-only ledger
//! with balance-driven account suspension.
//!
//! ## Design Principles
//!
//! - **Integer money, exact rates**: UC is an `i64`; tax rates use `rust_decimal`
//! - **Ledger conservation**: every wallet balance equals the signed sum of its transactions
//! - **One comparator**: all leaderboards are ordered by [`compare_standings`]
//! - **At-most-once distribution**: a tournament's prizes are paid exactly once
//! - **Bounded ingestion**: large stat batches run in the background behind a safety timer
//!
//! ## Example
//!
//! ```
//! use tourney_settlement::{solo_tax, repeat_winner_tax};
//!
//! let solo = solo_tax(100).unwrap();
//! assert_eq!((solo.tax_amount, solo.net_amount), (22, 78));
//!
//! let repeat = repeat_winner_tax(1000, 3).unwrap();
//! assert_eq!(repeat.net_amount, 800);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod io;
pub mod ledger;
pub mod ranking;
pub mod rate;
pub mod scoring;
pub mod settlement;
pub mod stats;
pub mod tax;
pub mod tournament;
pub mod transaction;
pub mod transfer;
pub mod types;
pub mod wallet;

pub use config::{EngineConfig, HouseAccounts};
pub use engine::SettlementEngine;
pub use error::{ErrorKind, Result, SettlementError};
pub use ingest::{MatchStatus, SubmitOutcome, TeamMatchStats};
pub use ledger::{Ledger, SuspensionEvent};
pub use ranking::{assign_ranks, compare_standings, rank_standings, RankedStanding};
pub use rate::Rate;
pub use scoring::ScoringTable;
pub use settlement::{DistributionContext, DistributionReport};
pub use stats::{aggregate_standings, MatchStatEntry, PlayerKills, TeamStanding};
pub use tax::{
    distribute_to_loser_tiers, repeat_winner_tax, solo_tax, split_repeat_winner_tax,
    RepeatWinnerTaxResult, SoloTaxResult, TaxSplit, TierDistribution,
};
pub use tournament::{Team, TournamentSetup, TournamentWinner};
pub use transaction::{Transaction, TxKind};
pub use transfer::{TransferRequest, TransferStatus};
pub use types::{MatchId, PlayerId, TeamId, TournamentId, TransferId, Uc};
pub use wallet::{SuspensionChange, Wallet};
