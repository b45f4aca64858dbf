//! Deterministic standings order.
//!
//! Every leaderboard (live match standings and final tournament standings)
//! must go through [`compare_standings`] so that the cascade cannot diverge
//! between call sites.

use crate::stats::TeamStanding;
use serde::Serialize;
use std::cmp::Ordering;

/// Tiebreaker cascade:
///
/// 1. `total` descending
/// 2. `chicken_dinners` descending
/// 3. `placement_points` descending
/// 4. `total_kills` descending
/// 5. `last_match_position` ascending
pub fn compare_standings(a: &TeamStanding, b: &TeamStanding) -> Ordering {
    b.total()
        .cmp(&a.total())
        .then_with(|| b.chicken_dinners.cmp(&a.chicken_dinners))
        .then_with(|| b.placement_points.cmp(&a.placement_points))
        .then_with(|| b.total_kills.cmp(&a.total_kills))
        .then_with(|| a.last_match_position.cmp(&b.last_match_position))
}

/// Orders standings best-first. Fully tied teams keep their input order.
pub fn rank_standings(mut standings: Vec<TeamStanding>) -> Vec<TeamStanding> {
    standings.sort_by(compare_standings);
    standings
}

/// A standing with its 1-based leaderboard rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedStanding {
    pub rank: u32,
    #[serde(flatten)]
    pub standing: TeamStanding,
}

/// Ranks standings and numbers them from 1.
pub fn assign_ranks(standings: Vec<TeamStanding>) -> Vec<RankedStanding> {
    rank_standings(standings)
        .into_iter()
        .enumerate()
        .map(|(idx, standing)| RankedStanding {
            rank: idx as u32 + 1,
            standing,
        })
        .collect()
}
