//! Tournament registry records and the settlement state machine.

use crate::error::{Result, SettlementError};
use crate::types::{PlayerId, TeamId, TournamentId, Uc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A team entered in a tournament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub players: Vec<PlayerId>,

    /// A single unteamed player; prizes are subject to solo tax.
    #[serde(default)]
    pub is_solo: bool,
}

/// Tournament definition supplied by the (external) tournament CRUD layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentSetup {
    pub id: TournamentId,
    pub name: String,
    pub teams: Vec<Team>,
}

/// A winning team's prize row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TournamentWinner {
    pub team_id: TeamId,

    /// 1-based final placement.
    pub position: u32,

    /// Net UC credited to the team's players, filled in by distribution.
    pub amount: Uc,

    /// One-way latch: false until the tournament's prizes are distributed.
    pub is_distributed: bool,
}

/// Where a tournament is in the settlement lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SettlementState {
    NotDeclared,
    DeclaredPendingDistribution,

    /// A distribution call currently owns the tournament.
    Distributing,
    Distributed,
}

/// A registered tournament with its winners and settlement state.
#[derive(Debug, Clone)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    teams: HashMap<TeamId, Team>,
    winners: Vec<TournamentWinner>,
    state: SettlementState,
}

impl Tournament {
    pub fn new(setup: TournamentSetup) -> Self {
        Tournament {
            id: setup.id,
            name: setup.name,
            teams: setup.teams.into_iter().map(|t| (t.id, t)).collect(),
            winners: Vec::new(),
            state: SettlementState::NotDeclared,
        }
    }

    pub fn team(&self, team_id: TeamId) -> Option<&Team> {
        self.teams.get(&team_id)
    }

    pub fn has_team(&self, team_id: TeamId) -> bool {
        self.teams.contains_key(&team_id)
    }

    /// Team names keyed by ID, for standings output.
    pub fn team_names(&self) -> HashMap<TeamId, String> {
        self.teams
            .values()
            .map(|t| (t.id, t.name.clone()))
            .collect()
    }

    pub fn winners(&self) -> &[TournamentWinner] {
        &self.winners
    }

    pub fn state(&self) -> SettlementState {
        self.state
    }

    /// Returns `true` if any winner row is already marked distributed.
    pub fn is_distributed(&self) -> bool {
        self.winners.iter().any(|w| w.is_distributed)
    }

    /// Writes winner rows for the given teams, best first.
    pub fn declare_winners(&mut self, ranked_teams: &[TeamId]) -> Result<&[TournamentWinner]> {
        self.ensure_not_settled()?;
        self.winners = ranked_teams
            .iter()
            .enumerate()
            .map(|(idx, team_id)| TournamentWinner {
                team_id: *team_id,
                position: idx as u32 + 1,
                amount: 0,
                is_distributed: false,
            })
            .collect();
        self.state = if self.winners.is_empty() {
            SettlementState::NotDeclared
        } else {
            SettlementState::DeclaredPendingDistribution
        };
        Ok(&self.winners)
    }

    /// Claims the tournament for a distribution run.
    ///
    /// Fails if prizes were already distributed, another run holds the
    /// claim, or no winners are declared.
    pub fn begin_distribution(&mut self) -> Result<()> {
        self.ensure_not_settled()?;
        if self.winners.is_empty() {
            return Err(SettlementError::NoWinnersDeclared(self.id));
        }
        self.state = SettlementState::Distributing;
        Ok(())
    }

    /// Releases the claim after a failed run; winners stay undistributed.
    pub fn abort_distribution(&mut self) {
        if self.state == SettlementState::Distributing {
            self.state = SettlementState::DeclaredPendingDistribution;
        }
    }

    /// Marks every winner distributed and records each team's net payout.
    pub fn complete_distribution(&mut self, team_totals: &HashMap<TeamId, Uc>) -> Vec<TournamentWinner> {
        for winner in &mut self.winners {
            winner.amount = team_totals.get(&winner.team_id).copied().unwrap_or(0);
            winner.is_distributed = true;
        }
        self.state = SettlementState::Distributed;
        self.winners.clone()
    }

    fn ensure_not_settled(&self) -> Result<()> {
        match self.state {
            SettlementState::Distributed => Err(SettlementError::AlreadyDistributed(self.id)),
            SettlementState::Distributing => Err(SettlementError::DistributionInProgress(self.id)),
            _ if self.is_distributed() => Err(SettlementError::AlreadyDistributed(self.id)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> TournamentSetup {
        TournamentSetup {
            id: 1,
            name: "Spring Cup".to_string(),
            teams: vec![
                Team {
                    id: 10,
                    name: "Alpha".to_string(),
                    players: vec![1, 2],
                    is_solo: false,
                },
                Team {
                    id: 20,
                    name: "Lone Wolf".to_string(),
                    players: vec![3],
                    is_solo: true,
                },
            ],
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut tournament = Tournament::new(setup());
        assert_eq!(tournament.state(), SettlementState::NotDeclared);
        assert!(matches!(
            tournament.begin_distribution(),
            Err(SettlementError::NoWinnersDeclared(1))
        ));

        tournament.declare_winners(&[20, 10]).unwrap();
        assert_eq!(tournament.winners()[0].team_id, 20);
        assert_eq!(tournament.winners()[1].position, 2);
        assert_eq!(tournament.state(), SettlementState::DeclaredPendingDistribution);

        tournament.begin_distribution().unwrap();
        assert!(matches!(
            tournament.begin_distribution(),
            Err(SettlementError::DistributionInProgress(1))
        ));

        let totals = HashMap::from([(20, 78), (10, 50)]);
        let winners = tournament.complete_distribution(&totals);
        assert!(winners.iter().all(|w| w.is_distributed));
        assert_eq!(winners[0].amount, 78);

        assert!(matches!(
            tournament.begin_distribution(),
            Err(SettlementError::AlreadyDistributed(1))
        ));
        assert!(tournament.declare_winners(&[10]).is_err());
    }

    #[test]
    fn test_abort_returns_to_pending() {
        let mut tournament = Tournament::new(setup());
        tournament.declare_winners(&[10]).unwrap();
        tournament.begin_distribution().unwrap();
        tournament.abort_distribution();

        assert_eq!(tournament.state(), SettlementState::DeclaredPendingDistribution);
        assert!(!tournament.is_distributed());
        tournament.begin_distribution().unwrap();
    }

    #[test]
    fn test_team_lookup() {
        let tournament = Tournament::new(setup());
        assert!(tournament.has_team(10));
        assert!(!tournament.has_team(99));
        assert!(tournament.team(20).unwrap().is_solo);
        assert_eq!(tournament.team_names()[&10], "Alpha");
    }
}
