//! Per-match stat records and the standings aggregator.

use crate::scoring::ScoringTable;
use crate::types::{MatchId, PlayerId, TeamId, TournamentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kill count for one player in one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerKills {
    pub player_id: PlayerId,
    pub kills: u32,
}

/// One team's result in one match.
///
/// Rows are immutable once stored; a resubmission for the same
/// `(match_id, team_id)` replaces the whole row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStatEntry {
    pub match_id: MatchId,
    pub team_id: TeamId,

    /// 1-based finishing rank, unique within the match.
    pub position: u32,

    pub created_at: DateTime<Utc>,
    pub player_kills: Vec<PlayerKills>,
}

impl MatchStatEntry {
    /// Total kills across all players of the team in this match.
    pub fn kills(&self) -> u32 {
        self.player_kills.iter().map(|p| p.kills).sum()
    }
}

/// A team's accumulated tournament (or single-match) standing.
///
/// `total` is derived from `total_kills + placement_points` on every read and
/// is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamStanding {
    pub team_id: TeamId,
    pub team_name: String,
    pub total_kills: u32,
    pub placement_points: u32,
    pub chicken_dinners: u32,
    pub matches_played: u32,

    /// Position in the most recent match the team played.
    pub last_match_position: u32,
}

impl TeamStanding {
    /// Primary score: kills plus placement points.
    pub fn total(&self) -> u32 {
        self.total_kills + self.placement_points
    }
}

struct Accumulator<'a> {
    kills: u32,
    placement_points: u32,
    chicken_dinners: u32,
    matches_played: u32,
    latest: &'a MatchStatEntry,
}

/// Folds match entries into one standing per team.
///
/// Teams without entries do not appear in the output. Output order follows
/// the first appearance of each team in `entries`; use
/// [`rank_standings`](crate::ranking::rank_standings) to order it.
///
/// When two entries of a team share the latest `created_at`, the one seen
/// first wins.
pub fn aggregate_standings(
    entries: &[MatchStatEntry],
    scoring: &ScoringTable,
    team_names: &HashMap<TeamId, String>,
) -> Vec<TeamStanding> {
    let mut order: Vec<TeamId> = Vec::new();
    let mut groups: HashMap<TeamId, Accumulator<'_>> = HashMap::new();

    for entry in entries {
        let points = scoring.points_for(entry.position);
        let dinner = u32::from(entry.position == 1);
        match groups.get_mut(&entry.team_id) {
            Some(acc) => {
                acc.kills += entry.kills();
                acc.placement_points += points;
                acc.chicken_dinners += dinner;
                acc.matches_played += 1;
                if entry.created_at > acc.latest.created_at {
                    acc.latest = entry;
                }
            }
            None => {
                order.push(entry.team_id);
                groups.insert(
                    entry.team_id,
                    Accumulator {
                        kills: entry.kills(),
                        placement_points: points,
                        chicken_dinners: dinner,
                        matches_played: 1,
                        latest: entry,
                    },
                );
            }
        }
    }

    order
        .into_iter()
        .filter_map(|team_id| {
            let acc = groups.remove(&team_id)?;
            Some(TeamStanding {
                team_id,
                team_name: team_names
                    .get(&team_id)
                    .cloned()
                    .unwrap_or_else(|| format!("#{}", team_id)),
                total_kills: acc.kills,
                placement_points: acc.placement_points,
                chicken_dinners: acc.chicken_dinners,
                matches_played: acc.matches_played,
                last_match_position: acc.latest.position,
            })
        })
        .collect()
}

/// Stored match entries, grouped by tournament.
#[derive(Debug, Default)]
pub struct StatStore {
    entries: HashMap<TournamentId, Vec<MatchStatEntry>>,
}

impl StatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries for a tournament, optionally narrowed to one match.
    pub fn entries(&self, tournament_id: TournamentId, match_id: Option<MatchId>) -> Vec<MatchStatEntry> {
        self.entries
            .get(&tournament_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| match_id.map_or(true, |m| e.match_id == m))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Positions already stored for a match, with the team holding each.
    pub fn positions(&self, tournament_id: TournamentId, match_id: MatchId) -> HashMap<u32, TeamId> {
        self.entries
            .get(&tournament_id)
            .into_iter()
            .flatten()
            .filter(|e| e.match_id == match_id)
            .map(|e| (e.position, e.team_id))
            .collect()
    }

    /// Inserts entries, replacing any stored row for the same
    /// `(match_id, team_id)`. A replaced row keeps its original `created_at`.
    ///
    /// Returns the number of rows replaced.
    pub fn upsert(&mut self, tournament_id: TournamentId, batch: Vec<MatchStatEntry>) -> usize {
        let stored = self.entries.entry(tournament_id).or_default();
        let mut replaced = 0;
        for mut entry in batch {
            match stored
                .iter_mut()
                .find(|e| e.match_id == entry.match_id && e.team_id == entry.team_id)
            {
                Some(existing) => {
                    entry.created_at = existing.created_at;
                    *existing = entry;
                    replaced += 1;
                }
                None => stored.push(entry),
            }
        }
        replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn entry(match_id: MatchId, team_id: TeamId, position: u32, kills: &[u32], minute: u32) -> MatchStatEntry {
        MatchStatEntry {
            match_id,
            team_id,
            position,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
            player_kills: kills
                .iter()
                .enumerate()
                .map(|(idx, k)| PlayerKills {
                    player_id: team_id * 10 + idx as u32,
                    kills: *k,
                })
                .collect(),
        }
    }

    #[test]
    fn test_aggregates_per_team() {
        let entries = vec![
            entry(1, 1, 1, &[3, 2], 0),
            entry(1, 2, 2, &[4], 0),
            entry(2, 1, 3, &[1, 1], 30),
            entry(2, 2, 1, &[0], 30),
        ];
        let names = HashMap::from([(1, "Alpha".to_string())]);
        let standings = aggregate_standings(&entries, &ScoringTable::default(), &names);

        assert_eq!(standings.len(), 2);
        let alpha = &standings[0];
        assert_eq!(alpha.team_name, "Alpha");
        assert_eq!(alpha.total_kills, 7);
        assert_eq!(alpha.placement_points, 10 + 5);
        assert_eq!(alpha.chicken_dinners, 1);
        assert_eq!(alpha.matches_played, 2);
        assert_eq!(alpha.last_match_position, 3);
        assert_eq!(alpha.total(), 22);

        let bravo = &standings[1];
        assert_eq!(bravo.team_name, "#2");
        assert_eq!(bravo.total_kills, 4);
        assert_eq!(bravo.placement_points, 16);
        assert_eq!(bravo.chicken_dinners, 1);
        assert_eq!(bravo.last_match_position, 1);
    }

    #[test]
    fn test_last_position_uses_latest_created_at() {
        // Entries arrive out of chronological order
        let entries = vec![entry(2, 1, 6, &[0], 45), entry(1, 1, 2, &[0], 10)];
        let standings = aggregate_standings(&entries, &ScoringTable::default(), &HashMap::new());
        assert_eq!(standings[0].last_match_position, 6);
    }

    #[test]
    fn test_store_upsert_replaces_row() {
        let mut store = StatStore::new();
        store.upsert(1, vec![entry(1, 1, 3, &[2], 0), entry(1, 2, 1, &[5], 0)]);

        let mut corrected = entry(1, 1, 2, &[4], 50);
        corrected.player_kills[0].kills = 6;
        assert_eq!(store.upsert(1, vec![corrected]), 1);

        let stored = store.entries(1, Some(1));
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].position, 2);
        assert_eq!(stored[0].kills(), 6);
        assert_eq!(stored[0].created_at.minute(), 0);
        assert_eq!(store.positions(1, 1), HashMap::from([(2, 1), (1, 2)]));
        assert!(store.entries(1, Some(2)).is_empty());
        assert!(store.entries(9, None).is_empty());
    }

    #[test]
    fn test_empty_input_yields_no_standings() {
        let standings = aggregate_standings(&[], &ScoringTable::default(), &HashMap::new());
        assert!(standings.is_empty());
    }
}
