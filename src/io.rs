//! CSV input and output for the command-line tool.

use crate::error::{Result, SettlementError};
use crate::ranking::RankedStanding;
use crate::stats::{MatchStatEntry, PlayerKills};
use crate::types::{MatchId, PlayerId, TeamId};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, Trim};
use log::warn;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};

/// One player's line in a match stat sheet.
#[derive(Debug, Deserialize)]
pub struct StatRecord {
    #[serde(rename = "match")]
    pub match_id: MatchId,
    #[serde(rename = "team")]
    pub team_id: TeamId,
    pub team_name: String,
    pub position: u32,
    #[serde(rename = "player")]
    pub player_id: PlayerId,
    pub kills: u32,
    pub created_at: DateTime<Utc>,
}

/// Match entries read from a stat sheet, plus the team names it mentions.
#[derive(Debug, Default)]
pub struct StatSheet {
    pub entries: Vec<MatchStatEntry>,
    pub team_names: HashMap<TeamId, String>,
}

/// Reads a per-player stat sheet and groups it into one entry per team per
/// match.
///
/// Unparseable rows and rows whose position disagrees with earlier rows for
/// the same team and match are logged at warn level and skipped. Two teams
/// claiming the same position in one match is an error.
pub fn read_stat_sheet<R: Read>(reader: R) -> Result<StatSheet> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let mut grouped: BTreeMap<(MatchId, TeamId), MatchStatEntry> = BTreeMap::new();
    let mut team_names = HashMap::new();

    for (row_idx, result) in csv_reader.deserialize::<StatRecord>().enumerate() {
        let row_num = row_idx + 2; // 1-indexed, accounting for header row
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Row {}: CSV parse error: {}", row_num, e);
                continue;
            }
        };
        if record.position == 0 {
            warn!("Row {}: position must be at least 1", row_num);
            continue;
        }

        let entry = grouped
            .entry((record.match_id, record.team_id))
            .or_insert_with(|| MatchStatEntry {
                match_id: record.match_id,
                team_id: record.team_id,
                position: record.position,
                created_at: record.created_at,
                player_kills: Vec::new(),
            });
        if entry.position != record.position {
            warn!(
                "Row {}: team {} already has position {} in match {}, ignoring",
                row_num, record.team_id, entry.position, record.match_id
            );
            continue;
        }
        entry.created_at = entry.created_at.max(record.created_at);
        entry.player_kills.push(PlayerKills {
            player_id: record.player_id,
            kills: record.kills,
        });
        team_names.entry(record.team_id).or_insert(record.team_name);
    }

    let mut taken: HashMap<(MatchId, u32), TeamId> = HashMap::new();
    for entry in grouped.values() {
        if taken.insert((entry.match_id, entry.position), entry.team_id).is_some() {
            return Err(SettlementError::DuplicatePosition {
                match_id: entry.match_id,
                position: entry.position,
            });
        }
    }

    Ok(StatSheet {
        entries: grouped.into_values().collect(),
        team_names,
    })
}

/// Writes a ranked leaderboard as CSV.
pub fn write_leaderboard<W: Write>(writer: W, board: &[RankedStanding]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "rank",
        "team",
        "team_name",
        "kills",
        "placement_points",
        "chicken_dinners",
        "matches_played",
        "last_position",
        "total",
    ])?;

    for row in board {
        let s = &row.standing;
        csv_writer.write_record([
            row.rank.to_string(),
            s.team_id.to_string(),
            s.team_name.clone(),
            s.total_kills.to_string(),
            s.placement_points.to_string(),
            s.chicken_dinners.to_string(),
            s.matches_played.to_string(),
            s.last_match_position.to_string(),
            s.total().to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::assign_ranks;
    use crate::scoring::ScoringTable;
    use crate::stats::aggregate_standings;
    use std::io::Cursor;

    const SHEET: &str = "match,team,team_name,position,player,kills,created_at
1,1,Alpha,1,11,4,2024-05-01T12:00:00Z
1,1,Alpha,1,12,2,2024-05-01T12:00:00Z
1,2,Bravo,2,21,3,2024-05-01T12:00:00Z
2,2,Bravo,1,21,1,2024-05-01T13:00:00Z
2,1,Alpha,4,11,0,2024-05-01T13:00:00Z
";

    #[test]
    fn test_read_groups_players_into_entries() {
        let sheet = read_stat_sheet(Cursor::new(SHEET)).unwrap();
        assert_eq!(sheet.entries.len(), 4);
        let alpha_first = &sheet.entries[0];
        assert_eq!(alpha_first.team_id, 1);
        assert_eq!(alpha_first.kills(), 6);
        assert_eq!(sheet.team_names[&2], "Bravo");
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let csv = "match,team,team_name,position,player,kills,created_at
1,1,Alpha,1,11,4,2024-05-01T12:00:00Z
1,1,Alpha,3,12,9,2024-05-01T12:00:00Z
1,2,Bravo,0,21,3,2024-05-01T12:00:00Z
x,2,Bravo,2,21,3,2024-05-01T12:00:00Z
";
        let sheet = read_stat_sheet(Cursor::new(csv)).unwrap();
        assert_eq!(sheet.entries.len(), 1);
        assert_eq!(sheet.entries[0].kills(), 4);
    }

    #[test]
    fn test_shared_position_is_an_error() {
        let csv = "match,team,team_name,position,player,kills,created_at
1,1,Alpha,1,11,4,2024-05-01T12:00:00Z
1,2,Bravo,1,21,3,2024-05-01T12:00:00Z
";
        assert!(matches!(
            read_stat_sheet(Cursor::new(csv)),
            Err(SettlementError::DuplicatePosition { position: 1, .. })
        ));
    }

    #[test]
    fn test_write_leaderboard() {
        let sheet = read_stat_sheet(Cursor::new(SHEET)).unwrap();
        let standings = aggregate_standings(&sheet.entries, &ScoringTable::default(), &sheet.team_names);
        let mut output = Vec::new();
        write_leaderboard(&mut output, &assign_ranks(standings)).unwrap();

        let output = String::from_utf8(output).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(
            lines[0],
            "rank,team,team_name,kills,placement_points,chicken_dinners,matches_played,last_position,total"
        );
        // Alpha: 6 kills + 10 + 4 = 20; Bravo: 4 kills + 6 + 10 = 20, Bravo has more placement points
        assert_eq!(lines[1], "1,2,Bravo,4,16,1,2,1,20");
        assert_eq!(lines[2], "2,1,Alpha,6,14,1,2,4,20");
    }
}
