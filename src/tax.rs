//! Prize taxation.
//!
//! Two independent, pure calculators run before a gross prize is credited:
//!
//! - **Solo tax**: a flat 22% on prizes won by an unteamed player. The tax is
//!   split 60% to loser support (spread over up to three loser tiers) and the
//!   remainder to the bonus pool.
//! - **Repeat-winner tax**: a rate tiered by the player's recent win count.
//!   Aggregated repeat-winner tax is split 60% to the fund and 40% to the org,
//!   with the org share rounded up.
//!
//! All arithmetic is integer UC with exact fractional rates; every split is
//! built so that its parts add back to the whole.

use crate::error::{Result, SettlementError};
use crate::rate::Rate;
use crate::types::{PlayerId, Uc};
use serde::Serialize;

/// Solo tax rate.
pub const SOLO_TAX_PERCENT: u32 = 22;

/// Share of solo tax that goes to loser support; the rest feeds the bonus pool.
pub const LOSER_SUPPORT_PERCENT: u32 = 60;

/// Repeat-winner tiers as `(minimum wins, percent)`, highest threshold first.
pub const REPEAT_WINNER_TIERS: [(u32, u32); 3] = [(4, 30), (3, 20), (2, 10)];

/// Share of aggregated repeat-winner tax that goes to the fund (floored).
pub const FUND_PERCENT: u32 = 60;

/// Share of aggregated repeat-winner tax that goes to the org (ceiled).
pub const ORG_PERCENT: u32 = 40;

/// Outcome of the solo tax on one prize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SoloTaxResult {
    pub original_amount: Uc,
    pub tax_amount: Uc,
    pub net_amount: Uc,
    pub rate: Rate,
    pub is_solo: bool,

    /// Part of `tax_amount` routed to loser tiers.
    pub loser_amount: Uc,

    /// Part of `tax_amount` routed to the bonus pool. Absorbs rounding.
    pub pool_amount: Uc,
}

impl SoloTaxResult {
    /// Result for a prize that is not subject to solo tax.
    pub fn exempt(amount: Uc) -> Self {
        SoloTaxResult {
            original_amount: amount,
            tax_amount: 0,
            net_amount: amount,
            rate: Rate::ZERO,
            is_solo: false,
            loser_amount: 0,
            pool_amount: 0,
        }
    }
}

/// Outcome of the repeat-winner tax on one prize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepeatWinnerTaxResult {
    pub original_amount: Uc,
    pub tax_amount: Uc,
    pub net_amount: Uc,
    pub rate: Rate,
    pub win_count: u32,
}

/// One loser tier's share of the loser-support pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierDistribution {
    /// 1-based tier number.
    pub tier: usize,
    pub weight: Rate,

    /// UC assigned to the whole tier.
    pub distribution: Uc,

    /// UC credited to each member: `distribution / members.len()`, floored.
    pub per_member: Uc,
    pub members: Vec<PlayerId>,

    /// What is left of `distribution` after paying every member.
    pub remainder: Uc,
}

/// Fund/org split of aggregated repeat-winner tax.
///
/// `fund + org` may exceed `total` by one unit because the org share is
/// rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxSplit {
    pub total: Uc,
    pub fund: Uc,
    pub org: Uc,
}

fn ensure_non_negative(amount: Uc) -> Result<()> {
    if amount < 0 {
        return Err(SettlementError::InvalidAmount {
            amount,
            reason: "prize amounts cannot be negative",
        });
    }
    Ok(())
}

/// Applies the 22% solo tax to `amount` and splits the tax into loser
/// support and bonus pool.
pub fn solo_tax(amount: Uc) -> Result<SoloTaxResult> {
    ensure_non_negative(amount)?;

    let rate = Rate::percent(SOLO_TAX_PERCENT);
    let tax_amount = rate.floor_of(amount);
    let loser_amount = Rate::percent(LOSER_SUPPORT_PERCENT).floor_of(tax_amount);

    Ok(SoloTaxResult {
        original_amount: amount,
        tax_amount,
        net_amount: amount - tax_amount,
        rate,
        is_solo: true,
        loser_amount,
        pool_amount: tax_amount - loser_amount,
    })
}

/// Tier weights (percent) for the given number of tiers.
fn tier_weights(tier_count: usize) -> Option<&'static [u32]> {
    match tier_count {
        1 => Some(&[100]),
        2 => Some(&[60, 40]),
        3 => Some(&[50, 30, 20]),
        _ => None,
    }
}

/// Spreads `loser_amount` over one to three loser tiers.
///
/// Every tier but the last receives `floor(loser_amount × weight)`; the last
/// tier receives whatever is left, so the tier distributions always add up to
/// `loser_amount`. An empty `tiers` slice yields no distributions.
pub fn distribute_to_loser_tiers(
    loser_amount: Uc,
    tiers: &[Vec<PlayerId>],
) -> Result<Vec<TierDistribution>> {
    ensure_non_negative(loser_amount)?;
    if tiers.is_empty() {
        return Ok(Vec::new());
    }

    let weights = tier_weights(tiers.len()).ok_or_else(|| {
        SettlementError::InvalidConfig(format!(
            "at most 3 loser tiers are supported, got {}",
            tiers.len()
        ))
    })?;
    if let Some(idx) = tiers.iter().position(|members| members.is_empty()) {
        return Err(SettlementError::InvalidConfig(format!(
            "loser tier {} has no members",
            idx + 1
        )));
    }

    let last = tiers.len() - 1;
    let mut assigned = 0;
    let mut distributions = Vec::with_capacity(tiers.len());

    for (idx, (members, pct)) in tiers.iter().zip(weights).enumerate() {
        let weight = Rate::percent(*pct);
        let distribution = if idx == last {
            loser_amount - assigned
        } else {
            weight.floor_of(loser_amount)
        };
        assigned += distribution;

        let per_member = distribution / members.len() as Uc;
        distributions.push(TierDistribution {
            tier: idx + 1,
            weight,
            distribution,
            per_member,
            members: members.clone(),
            remainder: distribution - per_member * members.len() as Uc,
        });
    }

    Ok(distributions)
}

/// Rate for a player with `win_count` recent tournament wins.
pub fn repeat_winner_rate(win_count: u32) -> Rate {
    REPEAT_WINNER_TIERS
        .iter()
        .find(|(min_wins, _)| win_count >= *min_wins)
        .map(|(_, pct)| Rate::percent(*pct))
        .unwrap_or(Rate::ZERO)
}

/// Applies the repeat-winner tax to `amount`.
pub fn repeat_winner_tax(amount: Uc, win_count: u32) -> Result<RepeatWinnerTaxResult> {
    ensure_non_negative(amount)?;

    let rate = repeat_winner_rate(win_count);
    let tax_amount = rate.floor_of(amount);

    Ok(RepeatWinnerTaxResult {
        original_amount: amount,
        tax_amount,
        net_amount: amount - tax_amount,
        rate,
        win_count,
    })
}

/// Splits aggregated repeat-winner tax between fund and org.
pub fn split_repeat_winner_tax(total: Uc) -> Result<TaxSplit> {
    ensure_non_negative(total)?;

    Ok(TaxSplit {
        total,
        fund: Rate::percent(FUND_PERCENT).floor_of(total),
        org: Rate::percent(ORG_PERCENT).ceil_of(total),
    })
}
