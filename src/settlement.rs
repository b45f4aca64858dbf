//! Prize distribution planning.
//!
//! A distribution is computed up front as a [`DistributionPlan`]: the full
//! list of ledger credits plus each winning team's net total. Nothing is
//! written while planning, so every validation failure leaves the ledger
//! untouched. The engine then applies the credits one atomic unit at a time
//! and only marks the tournament distributed once all of them succeeded.
//!
//! Tax composition order is fixed: solo tax first, then repeat-winner tax on
//! the solo net amount.

use crate::config::HouseAccounts;
use crate::error::{Result, SettlementError};
use crate::tax::{
    distribute_to_loser_tiers, repeat_winner_tax, solo_tax, split_repeat_winner_tax,
    RepeatWinnerTaxResult, SoloTaxResult, TaxSplit,
};
use crate::tournament::{Tournament, TournamentWinner};
use crate::types::{PlayerId, TeamId, TournamentId, Uc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Externally computed inputs for a distribution.
///
/// Win counts and loser tiers depend on season history that the engine does
/// not own; the caller resolves them for the right season and passes them in.
#[derive(Debug, Clone, Default)]
pub struct DistributionContext {
    /// Tournament wins per player within the trailing window. Missing means 0.
    pub win_counts: HashMap<PlayerId, u32>,

    /// Up to three groups of the season's biggest net losers, biggest first.
    pub loser_tiers: Vec<Vec<PlayerId>>,
}

/// What a planned credit is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CreditPurpose {
    Prize,
    LoserSupport,
    BonusPool,
    Fund,
    Org,
}

/// One ledger credit of a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCredit {
    pub player_id: PlayerId,
    pub amount: Uc,
    pub purpose: CreditPurpose,
    pub description: String,
}

/// Tax outcome for one prize recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerPayout {
    pub player_id: PlayerId,
    pub team_id: TeamId,
    pub gross: Uc,
    pub solo: SoloTaxResult,
    pub repeat: RepeatWinnerTaxResult,
}

impl PlayerPayout {
    /// Amount credited to the player after both taxes.
    pub fn net(&self) -> Uc {
        self.repeat.net_amount
    }
}

/// Everything a distribution will write, computed before any write happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionPlan {
    pub tournament_id: TournamentId,
    pub payouts: Vec<PlayerPayout>,
    pub credits: Vec<PlannedCredit>,
    pub repeat_split: TaxSplit,

    /// Net UC per winning team.
    pub team_totals: HashMap<TeamId, Uc>,

    /// Grant recipients that are not on a winning team.
    pub skipped_players: Vec<PlayerId>,
}

/// Result of a completed distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionReport {
    pub winners: Vec<TournamentWinner>,
    pub plan: DistributionPlan,
}

/// Computes the credits for distributing `grants` (player → gross prize).
///
/// Players not on a winning team are skipped, not rejected. Negative grants
/// and malformed loser tiers fail the whole plan.
pub fn plan_distribution(
    tournament: &Tournament,
    grants: &HashMap<PlayerId, Uc>,
    context: &DistributionContext,
    accounts: &HouseAccounts,
) -> Result<DistributionPlan> {
    let winning_team: HashMap<PlayerId, (TeamId, u32)> = tournament
        .winners()
        .iter()
        .filter_map(|w| tournament.team(w.team_id).map(|t| (t, w.position)))
        .flat_map(|(team, position)| team.players.iter().map(move |p| (*p, (team.id, position))))
        .collect();

    let mut recipients: Vec<(PlayerId, Uc)> = grants.iter().map(|(p, a)| (*p, *a)).collect();
    recipients.sort_unstable_by_key(|(player_id, _)| *player_id);

    let mut payouts = Vec::new();
    let mut credits = Vec::new();
    let mut skipped_players = Vec::new();
    let mut team_totals: HashMap<TeamId, Uc> = HashMap::new();
    let mut loser_support: BTreeMap<PlayerId, Uc> = BTreeMap::new();
    let mut bonus_pool: Uc = 0;
    let mut repeat_tax_total: Uc = 0;

    for (player_id, gross) in recipients {
        let Some(&(team_id, position)) = winning_team.get(&player_id) else {
            skipped_players.push(player_id);
            continue;
        };
        let is_solo = tournament.team(team_id).map(|t| t.is_solo).unwrap_or(false);

        let solo = if is_solo {
            solo_tax(gross)?
        } else if gross < 0 {
            return Err(SettlementError::InvalidAmount {
                amount: gross,
                reason: "prize amounts cannot be negative",
            });
        } else {
            SoloTaxResult::exempt(gross)
        };
        let win_count = context.win_counts.get(&player_id).copied().unwrap_or(0);
        let repeat = repeat_winner_tax(solo.net_amount, win_count)?;

        if solo.loser_amount > 0 {
            let tiers = distribute_to_loser_tiers(solo.loser_amount, &context.loser_tiers)?;
            if tiers.is_empty() {
                add_to(&mut bonus_pool, solo.loser_amount)?;
            }
            for tier in tiers {
                for member in &tier.members {
                    add_to(loser_support.entry(*member).or_insert(0), tier.per_member)?;
                }
                add_to(&mut bonus_pool, tier.remainder)?;
            }
        }
        add_to(&mut bonus_pool, solo.pool_amount)?;
        add_to(&mut repeat_tax_total, repeat.tax_amount)?;

        let payout = PlayerPayout {
            player_id,
            team_id,
            gross,
            solo,
            repeat,
        };
        add_to(team_totals.entry(team_id).or_insert(0), payout.net())?;
        credits.push(PlannedCredit {
            player_id,
            amount: payout.net(),
            purpose: CreditPurpose::Prize,
            description: format!(
                "{} prize, position {} (gross {}, solo tax {}, repeat-winner tax {})",
                tournament.name, position, gross, solo.tax_amount, repeat.tax_amount
            ),
        });
        payouts.push(payout);
    }

    for (player_id, amount) in loser_support {
        credits.push(PlannedCredit {
            player_id,
            amount,
            purpose: CreditPurpose::LoserSupport,
            description: format!("{} solo tax loser support", tournament.name),
        });
    }
    credits.push(PlannedCredit {
        player_id: accounts.bonus_pool,
        amount: bonus_pool,
        purpose: CreditPurpose::BonusPool,
        description: format!("{} solo tax bonus pool", tournament.name),
    });

    let repeat_split = split_repeat_winner_tax(repeat_tax_total)?;
    credits.push(PlannedCredit {
        player_id: accounts.fund,
        amount: repeat_split.fund,
        purpose: CreditPurpose::Fund,
        description: format!("{} repeat-winner tax fund share", tournament.name),
    });
    credits.push(PlannedCredit {
        player_id: accounts.org,
        amount: repeat_split.org,
        purpose: CreditPurpose::Org,
        description: format!("{} repeat-winner tax org share", tournament.name),
    });

    // The ledger rejects non-positive amounts.
    credits.retain(|c| c.amount > 0);

    Ok(DistributionPlan {
        tournament_id: tournament.id,
        payouts,
        credits,
        repeat_split,
        team_totals,
        skipped_players,
    })
}

fn add_to(total: &mut Uc, amount: Uc) -> Result<()> {
    *total = total
        .checked_add(amount)
        .ok_or(SettlementError::InvalidAmount {
            amount,
            reason: "distribution total exceeds the UC range",
        })?;
    Ok(())
}
