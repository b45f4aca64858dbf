//! Identifier and money aliases shared across the engine.

/// Player identifier.
pub type PlayerId = u32;

/// Team identifier, unique within a tournament.
pub type TeamId = u32;

pub type TournamentId = u32;

pub type MatchId = u32;

/// Transfer request identifier.
pub type TransferId = u64;

/// Virtual currency amount. Signed because wallet balances may go negative.
pub type Uc = i64;
