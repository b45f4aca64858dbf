//! Placement points table.
//!
//! The position → points curve is an external rule set, so it is injected
//! into the engine rather than hard-coded in the aggregator.

use crate::error::{Result, SettlementError};
use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;

/// Maps a 1-based finishing position to placement points.
///
/// Positions absent from the table score zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringTable {
    points: BTreeMap<u32, u32>,
}

#[derive(Debug, Deserialize)]
struct ScoringRecord {
    position: u32,
    points: u32,
}

impl ScoringTable {
    /// Builds a table from `(position, points)` pairs.
    pub fn new<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let mut points = BTreeMap::new();
        for (position, value) in pairs {
            if position == 0 {
                return Err(SettlementError::InvalidConfig(
                    "scoring positions are 1-based".to_string(),
                ));
            }
            if points.insert(position, value).is_some() {
                return Err(SettlementError::InvalidConfig(format!(
                    "position {} appears twice in the scoring table",
                    position
                )));
            }
        }
        Ok(ScoringTable { points })
    }

    /// Loads a `position,points` CSV with a header row.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
        let mut pairs = Vec::new();
        for result in csv_reader.deserialize::<ScoringRecord>() {
            let record = result?;
            pairs.push((record.position, record.points));
        }
        Self::new(pairs)
    }

    /// Points awarded for finishing at `position`.
    pub fn points_for(&self, position: u32) -> u32 {
        self.points.get(&position).copied().unwrap_or(0)
    }
}

impl Default for ScoringTable {
    /// Conventional battle-royale curve: 10, 6, 5, 4, 3, 2, 1, 1.
    fn default() -> Self {
        let points = [10, 6, 5, 4, 3, 2, 1, 1]
            .into_iter()
            .enumerate()
            .map(|(idx, pts)| (idx as u32 + 1, pts))
            .collect();
        ScoringTable { points }
    }
}
