//! The settlement engine facade.
//!
//! Owns the shared state (tournament registry, stat store, ledger, transfer
//! book and match statuses), each behind its own lock, and exposes the
//! boundary operations. Every lock is held for one logical unit only; no
//! lock is held across an `.await`.
//!
//! Lock order, where more than one is taken: tournaments, stats, transfers,
//! ledger, statuses.

use crate::config::EngineConfig;
use crate::error::{Result, SettlementError};
use crate::ingest::MatchStatusBoard;
use crate::ledger::{Ledger, SuspensionEvent};
use crate::ranking::{assign_ranks, rank_standings, RankedStanding};
use crate::scoring::ScoringTable;
use crate::settlement::{plan_distribution, DistributionContext, DistributionReport};
use crate::stats::{aggregate_standings, StatStore, TeamStanding};
use crate::tournament::{Tournament, TournamentSetup, TournamentWinner};
use crate::transaction::Transaction;
use crate::transfer::{TransferBook, TransferRequest, TransferStatus};
use crate::types::{MatchId, PlayerId, TournamentId, TransferId, Uc};
use crate::wallet::Wallet;
use log::{error, info};
use parking_lot::Mutex;
use std::collections::HashMap;

/// The settlement engine.
///
/// Shared across request handlers behind an `Arc`. Stat ingestion spawns
/// background tasks that hold their own `Arc` clone.
pub struct SettlementEngine {
    config: EngineConfig,
    scoring: ScoringTable,
    pub(crate) tournaments: Mutex<HashMap<TournamentId, Tournament>>,
    pub(crate) stats: Mutex<StatStore>,
    transfers: Mutex<TransferBook>,
    ledger: Mutex<Ledger>,
    pub(crate) statuses: Mutex<MatchStatusBoard>,
}

impl SettlementEngine {
    /// Creates an engine with empty state.
    pub fn new(config: EngineConfig, scoring: ScoringTable) -> Self {
        let ledger = Ledger::with_threshold(config.suspension_threshold);
        SettlementEngine {
            config,
            scoring,
            tournaments: Mutex::new(HashMap::new()),
            stats: Mutex::new(StatStore::new()),
            transfers: Mutex::new(TransferBook::new()),
            ledger: Mutex::new(ledger),
            statuses: Mutex::new(MatchStatusBoard::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scoring(&self) -> &ScoringTable {
        &self.scoring
    }

    /// Adds a tournament to the registry.
    pub fn register_tournament(&self, setup: TournamentSetup) -> Result<()> {
        let mut tournaments = self.tournaments.lock();
        if tournaments.contains_key(&setup.id) {
            return Err(SettlementError::TournamentExists(setup.id));
        }
        info!("Registered tournament {} ({} teams)", setup.id, setup.teams.len());
        tournaments.insert(setup.id, Tournament::new(setup));
        Ok(())
    }

    /// Aggregates stored stats into unordered standings, for the whole
    /// tournament or a single match.
    pub fn aggregate_standings(
        &self,
        tournament_id: TournamentId,
        match_id: Option<MatchId>,
    ) -> Result<Vec<TeamStanding>> {
        let team_names = self
            .tournaments
            .lock()
            .get(&tournament_id)
            .map(Tournament::team_names)
            .ok_or(SettlementError::TournamentNotFound(tournament_id))?;
        let entries = self.stats.lock().entries(tournament_id, match_id);
        Ok(aggregate_standings(&entries, &self.scoring, &team_names))
    }

    /// Aggregated and ranked standings, numbered from 1.
    pub fn leaderboard(
        &self,
        tournament_id: TournamentId,
        match_id: Option<MatchId>,
    ) -> Result<Vec<RankedStanding>> {
        Ok(assign_ranks(self.aggregate_standings(tournament_id, match_id)?))
    }

    /// Declares the top `top_n` teams of the final standings as winners.
    pub fn declare_winners(
        &self,
        tournament_id: TournamentId,
        top_n: usize,
    ) -> Result<Vec<TournamentWinner>> {
        let ranked = rank_standings(self.aggregate_standings(tournament_id, None)?);
        let team_ids: Vec<_> = ranked.iter().take(top_n).map(|s| s.team_id).collect();

        let mut tournaments = self.tournaments.lock();
        let tournament = tournaments
            .get_mut(&tournament_id)
            .ok_or(SettlementError::TournamentNotFound(tournament_id))?;
        let winners = tournament.declare_winners(&team_ids)?.to_vec();
        info!(
            "Tournament {}: declared {} winners {:?}",
            tournament_id,
            winners.len(),
            team_ids
        );
        Ok(winners)
    }

    /// Winner rows of a tournament.
    pub fn winners(&self, tournament_id: TournamentId) -> Result<Vec<TournamentWinner>> {
        self.tournaments
            .lock()
            .get(&tournament_id)
            .map(|t| t.winners().to_vec())
            .ok_or(SettlementError::TournamentNotFound(tournament_id))
    }

    /// Distributes prizes and returns the updated winner rows.
    ///
    /// See [`distribute_tournament_prizes_with_report`](Self::distribute_tournament_prizes_with_report).
    pub fn distribute_tournament_prizes(
        &self,
        tournament_id: TournamentId,
        grants: &HashMap<PlayerId, Uc>,
        context: &DistributionContext,
    ) -> Result<Vec<TournamentWinner>> {
        self.distribute_tournament_prizes_with_report(tournament_id, grants, context)
            .map(|report| report.winners)
    }

    /// Taxes and credits `grants` (player → gross prize) for a declared
    /// tournament, at most once.
    ///
    /// A second call fails with [`SettlementError::AlreadyDistributed`] and
    /// writes nothing. Each credit is its own atomic ledger unit; winners are
    /// marked distributed only after every credit succeeded.
    pub fn distribute_tournament_prizes_with_report(
        &self,
        tournament_id: TournamentId,
        grants: &HashMap<PlayerId, Uc>,
        context: &DistributionContext,
    ) -> Result<DistributionReport> {
        let plan = {
            let mut tournaments = self.tournaments.lock();
            let tournament = tournaments
                .get_mut(&tournament_id)
                .ok_or(SettlementError::TournamentNotFound(tournament_id))?;
            tournament.begin_distribution()?;
            match plan_distribution(tournament, grants, context, &self.config.accounts) {
                Ok(plan) => plan,
                Err(e) => {
                    tournament.abort_distribution();
                    return Err(e);
                }
            }
        };

        for credit in &plan.credits {
            let result = self
                .ledger
                .lock()
                .credit(credit.player_id, credit.amount, &credit.description);
            if let Err(e) = result {
                error!(
                    "Tournament {}: credit of {} UC to player {} failed: {}",
                    tournament_id, credit.amount, credit.player_id, e
                );
                self.abort_distribution(tournament_id);
                return Err(e);
            }
        }

        let winners = {
            let mut tournaments = self.tournaments.lock();
            let tournament = tournaments
                .get_mut(&tournament_id)
                .ok_or(SettlementError::TournamentNotFound(tournament_id))?;
            tournament.complete_distribution(&plan.team_totals)
        };

        info!(
            "Tournament {}: distributed {} credits to {} winners ({} grants skipped)",
            tournament_id,
            plan.credits.len(),
            plan.payouts.len(),
            plan.skipped_players.len()
        );
        Ok(DistributionReport { winners, plan })
    }

    fn abort_distribution(&self, tournament_id: TournamentId) {
        if let Some(tournament) = self.tournaments.lock().get_mut(&tournament_id) {
            tournament.abort_distribution();
        }
    }

    /// Credits a player's wallet. Returns the new balance.
    pub fn credit(&self, player_id: PlayerId, amount: Uc, description: &str) -> Result<Uc> {
        self.ledger.lock().credit(player_id, amount, description)
    }

    /// Debits a player's wallet. The balance may go negative.
    pub fn debit(&self, player_id: PlayerId, amount: Uc, description: &str) -> Result<Uc> {
        self.ledger.lock().debit(player_id, amount, description)
    }

    pub fn ensure_wallet(&self, player_id: PlayerId) -> Wallet {
        self.ledger.lock().ensure_wallet(player_id).clone()
    }

    pub fn wallet(&self, player_id: PlayerId) -> Option<Wallet> {
        self.ledger.lock().wallet(player_id).cloned()
    }

    pub fn balance(&self, player_id: PlayerId) -> Uc {
        self.ledger.lock().balance(player_id)
    }

    pub fn set_manual_override(&self, player_id: PlayerId, enabled: bool) {
        self.ledger.lock().set_manual_override(player_id, enabled);
    }

    pub fn history(&self, player_id: PlayerId) -> Vec<Transaction> {
        self.ledger
            .lock()
            .history(player_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Number of ledger transactions written so far.
    pub fn transaction_count(&self) -> usize {
        self.ledger.lock().transactions().len()
    }

    pub fn verify_conservation(&self) -> bool {
        self.ledger.lock().verify_conservation()
    }

    /// Drains pending suspension notifications.
    pub fn take_notifications(&self) -> Vec<SuspensionEvent> {
        self.ledger.lock().take_notifications()
    }

    /// `requester` asks `approver` to send them `amount` UC.
    pub fn request_transfer(
        &self,
        requester: PlayerId,
        approver: PlayerId,
        amount: Uc,
        note: &str,
    ) -> Result<TransferId> {
        let id = self
            .transfers
            .lock()
            .request(requester, approver, amount, note)?;
        info!(
            "Transfer {}: player {} requested {} UC from player {}",
            id, requester, amount, approver
        );
        Ok(id)
    }

    /// The approver confirms a pending request; UC moves from approver to
    /// requester as one unit, or not at all.
    pub fn approve_transfer(&self, id: TransferId, approver: PlayerId) -> Result<TransferRequest> {
        let mut transfers = self.transfers.lock();
        let request = transfers.pending_for(id, approver)?.clone();

        let description = if request.note.is_empty() {
            format!("Transfer {} from {} to {}", id, request.approver, request.requester)
        } else {
            format!("Transfer {}: {}", id, request.note)
        };
        self.ledger.lock().transfer(
            request.approver,
            request.requester,
            request.amount,
            &description,
        )?;

        info!("Transfer {} approved by player {}", id, approver);
        transfers.settle(id, approver, TransferStatus::Approved)
    }

    /// The approver declines a pending request. No UC moves.
    pub fn reject_transfer(&self, id: TransferId, approver: PlayerId) -> Result<TransferRequest> {
        let request = self
            .transfers
            .lock()
            .settle(id, approver, TransferStatus::Rejected)?;
        info!("Transfer {} rejected by player {}", id, approver);
        Ok(request)
    }
}

impl Default for SettlementEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default(), ScoringTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::stats::{MatchStatEntry, PlayerKills};
    use crate::tournament::Team;
    use crate::wallet::SuspensionChange;
    use chrono::{TimeZone, Utc};

    fn engine_with_results() -> SettlementEngine {
        let engine = SettlementEngine::default();
        engine
            .register_tournament(TournamentSetup {
                id: 1,
                name: "Finals".to_string(),
                teams: vec![
                    Team {
                        id: 1,
                        name: "Solo Ace".to_string(),
                        players: vec![10],
                        is_solo: true,
                    },
                    Team {
                        id: 2,
                        name: "Duo".to_string(),
                        players: vec![20, 21],
                        is_solo: false,
                    },
                    Team {
                        id: 3,
                        name: "Trio".to_string(),
                        players: vec![30, 31, 32],
                        is_solo: false,
                    },
                ],
            })
            .unwrap();

        let rows = [(1, 1, 1, 8), (1, 2, 2, 3), (1, 3, 3, 1), (2, 2, 1, 6), (2, 1, 3, 2), (2, 3, 2, 0)];
        let entries = rows
            .iter()
            .map(|&(match_id, team_id, position, kills)| MatchStatEntry {
                match_id,
                team_id,
                position,
                created_at: Utc.with_ymd_and_hms(2024, 6, 1, match_id, 0, 0).unwrap(),
                player_kills: vec![PlayerKills {
                    player_id: team_id * 10,
                    kills,
                }],
            })
            .collect();
        engine.stats.lock().upsert(1, entries);
        engine
    }

    #[test]
    fn test_leaderboard() {
        let engine = engine_with_results();
        let board = engine.leaderboard(1, None).unwrap();

        // Solo Ace: 10 kills + 10 + 5 = 25; Duo: 9 + 6 + 10 = 25; Trio: 1 + 5 + 6 = 12
        // Tied on total and dinners; Duo has more placement points (16 vs 15)
        let order: Vec<_> = board.iter().map(|r| r.standing.team_id).collect();
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(board[0].standing.team_name, "Duo");

        let match_one = engine.leaderboard(1, Some(1)).unwrap();
        assert_eq!(match_one[0].standing.team_id, 1);
        assert!(engine.leaderboard(9, None).is_err());
    }

    #[test]
    fn test_distribution_is_idempotent() {
        let engine = engine_with_results();
        engine.declare_winners(1, 2).unwrap();
        let grants = HashMap::from([(20, 300), (21, 300), (10, 100), (30, 50)]);
        let context = DistributionContext::default();

        let winners = engine
            .distribute_tournament_prizes(1, &grants, &context)
            .unwrap();
        assert!(winners.iter().all(|w| w.is_distributed));
        assert_eq!(winners[0].team_id, 2);
        assert_eq!(winners[0].amount, 600);
        assert_eq!(winners[1].amount, 78);
        assert_eq!(engine.balance(20), 300);
        assert_eq!(engine.balance(10), 78);
        assert_eq!(engine.balance(30), 0);

        let written = engine.transaction_count();
        let err = engine
            .distribute_tournament_prizes(1, &grants, &context)
            .unwrap_err();
        assert!(matches!(err, SettlementError::AlreadyDistributed(1)));
        assert!(err.is_conflict());
        assert_eq!(engine.transaction_count(), written);
        assert_eq!(engine.balance(20), 300);
        assert!(engine.verify_conservation());
    }

    #[test]
    fn test_failed_plan_moves_nothing_and_can_retry() {
        let engine = engine_with_results();
        engine.declare_winners(1, 2).unwrap();
        let context = DistributionContext::default();

        let bad = HashMap::from([(20, 300), (21, -300)]);
        assert!(engine.distribute_tournament_prizes(1, &bad, &context).is_err());
        assert_eq!(engine.transaction_count(), 0);
        assert!(engine.winners(1).unwrap().iter().all(|w| !w.is_distributed));

        let good = HashMap::from([(20, 300), (21, 300)]);
        assert!(engine.distribute_tournament_prizes(1, &good, &context).is_ok());
    }

    #[test]
    fn test_overflowing_grants_release_the_tournament() {
        let engine = engine_with_results();
        engine.declare_winners(1, 2).unwrap();
        let context = DistributionContext::default();

        let huge = HashMap::from([(20, Uc::MAX), (21, 1)]);
        let err = engine
            .distribute_tournament_prizes(1, &huge, &context)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(engine.transaction_count(), 0);

        let good = HashMap::from([(20, 5)]);
        assert!(engine.distribute_tournament_prizes(1, &good, &context).is_ok());
        assert_eq!(engine.balance(20), 5);
    }

    #[test]
    fn test_distribution_requires_declared_winners() {
        let engine = engine_with_results();
        let err = engine
            .distribute_tournament_prizes(1, &HashMap::new(), &DistributionContext::default())
            .unwrap_err();
        assert!(matches!(err, SettlementError::NoWinnersDeclared(1)));
        assert!(matches!(
            engine.distribute_tournament_prizes(5, &HashMap::new(), &DistributionContext::default()),
            Err(SettlementError::TournamentNotFound(5))
        ));
    }

    #[test]
    fn test_register_twice_is_conflict() {
        let engine = engine_with_results();
        let err = engine
            .register_tournament(TournamentSetup {
                id: 1,
                name: "Dup".to_string(),
                teams: Vec::new(),
            })
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_transfer_flow() {
        let engine = SettlementEngine::default();
        engine.credit(2, 100, "top-up").unwrap();

        let id = engine.request_transfer(1, 2, 60, "rent").unwrap();
        assert_eq!(engine.balance(1), 0);

        // Only the approver may approve
        assert!(engine.approve_transfer(id, 1).is_err());

        let request = engine.approve_transfer(id, 2).unwrap();
        assert_eq!(request.status, TransferStatus::Approved);
        assert_eq!(engine.balance(1), 60);
        assert_eq!(engine.balance(2), 40);
        assert!(engine.approve_transfer(id, 2).unwrap_err().is_conflict());
        assert!(engine.verify_conservation());
    }

    #[test]
    fn test_transfer_insufficient_funds_stays_pending() {
        let engine = SettlementEngine::default();
        engine.credit(2, 10, "top-up").unwrap();
        let id = engine.request_transfer(1, 2, 60, "").unwrap();

        assert!(matches!(
            engine.approve_transfer(id, 2),
            Err(SettlementError::InsufficientFunds { .. })
        ));
        assert_eq!(engine.balance(2), 10);

        let rejected = engine.reject_transfer(id, 2).unwrap();
        assert_eq!(rejected.status, TransferStatus::Rejected);
    }

    #[test]
    fn test_suspension_notifications_surface() {
        let engine = SettlementEngine::default();
        engine.debit(5, 30, "chargeback").unwrap();
        let events = engine.take_notifications();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].change, SuspensionChange::Suspended);
        assert!(engine.wallet(5).unwrap().suspended);
    }
}
