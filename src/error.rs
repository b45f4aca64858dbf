//! Error types for the settlement engine.

use crate::types::{MatchId, PlayerId, TeamId, TournamentId, TransferId, Uc};
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, SettlementError>;

/// Broad classification of a [`SettlementError`].
///
/// Callers use this to decide how to react: a `Conflict` means the request
/// was already applied (or is being applied) and can be treated as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Io,
}

/// Errors that can occur during engine operation.
#[derive(Error, Debug)]
pub enum SettlementError {
    /// Failed to open or read an input file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid record in a CSV input
    #[error("Invalid record at row {row}: {message}")]
    InvalidRecord { row: usize, message: String },

    /// Monetary amount outside the accepted range
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Uc, reason: &'static str },

    /// Malformed stat batch
    #[error("Invalid stat batch for match {match_id}: {message}")]
    InvalidBatch { match_id: MatchId, message: String },

    /// Invalid engine configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Player {0} cannot request a transfer from themselves")]
    SelfTransfer(PlayerId),

    #[error("Player {player_id} has {available} UC, {required} UC required")]
    InsufficientFunds {
        player_id: PlayerId,
        available: Uc,
        required: Uc,
    },

    #[error("Prizes for tournament {0} have already been distributed")]
    AlreadyDistributed(TournamentId),

    #[error("Prize distribution for tournament {0} is already in progress")]
    DistributionInProgress(TournamentId),

    #[error("Position {position} is already taken in match {match_id}")]
    DuplicatePosition { match_id: MatchId, position: u32 },

    #[error("Match {match_id} is still processing job {job_id}")]
    MatchBusy { match_id: MatchId, job_id: u64 },

    #[error("Tournament {0} is already registered")]
    TournamentExists(TournamentId),

    #[error("Transfer {0} is no longer pending")]
    TransferNotPending(TransferId),

    #[error("Tournament {0} not found")]
    TournamentNotFound(TournamentId),

    #[error("Team {team_id} is not registered in tournament {tournament_id}")]
    TeamNotFound {
        tournament_id: TournamentId,
        team_id: TeamId,
    },

    #[error("Transfer {0} not found")]
    TransferNotFound(TransferId),

    #[error("Tournament {0} has no declared winners")]
    NoWinnersDeclared(TournamentId),

    /// Missing or unknown CLI arguments
    #[error("Usage: tourney-settlement <standings <stats.csv> [scoring.csv] | ledger <ops.csv>>")]
    Usage,
}

impl SettlementError {
    /// Classifies the error for callers that branch on outcome rather than cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SettlementError::Io(_) | SettlementError::Csv(_) => ErrorKind::Io,
            SettlementError::InvalidRecord { .. }
            | SettlementError::InvalidAmount { .. }
            | SettlementError::InvalidBatch { .. }
            | SettlementError::InvalidConfig(_)
            | SettlementError::SelfTransfer(_)
            | SettlementError::InsufficientFunds { .. }
            | SettlementError::Usage => ErrorKind::Validation,
            SettlementError::AlreadyDistributed(_)
            | SettlementError::DistributionInProgress(_)
            | SettlementError::DuplicatePosition { .. }
            | SettlementError::MatchBusy { .. }
            | SettlementError::TournamentExists(_)
            | SettlementError::TransferNotPending(_) => ErrorKind::Conflict,
            SettlementError::TournamentNotFound(_)
            | SettlementError::TeamNotFound { .. }
            | SettlementError::TransferNotFound(_)
            | SettlementError::NoWinnersDeclared(_) => ErrorKind::NotFound,
        }
    }

    /// Returns `true` if the request was already applied and can be ignored.
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_distributed_is_conflict() {
        let err = SettlementError::AlreadyDistributed(7);
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Prizes for tournament 7 have already been distributed");
    }

    #[test]
    fn test_kinds_are_distinct() {
        let invalid = SettlementError::InvalidAmount {
            amount: 0,
            reason: "must be positive",
        };
        assert_eq!(invalid.kind(), ErrorKind::Validation);
        assert_eq!(SettlementError::SelfTransfer(3).kind(), ErrorKind::Validation);
        assert_eq!(
            SettlementError::TournamentNotFound(1).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SettlementError::MatchBusy {
                match_id: 1,
                job_id: 2
            }
            .kind(),
            ErrorKind::Conflict
        );
    }
}
