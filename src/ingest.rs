//! Bulk ingestion of match statistics.
//!
//! Small batches are written inline. Larger ones mark the match
//! `Processing`, hand the write to a background task and return at once.
//! Every background job carries a job ID; status writes from the worker and
//! from the safety timer only take effect while the match still holds that
//! same job, so a late job can never release a newer one. A batch is checked
//! against the stored positions and written under the same stats lock hold.

use crate::engine::SettlementEngine;
use crate::error::{Result, SettlementError};
use crate::stats::{MatchStatEntry, PlayerKills};
use crate::tournament::Tournament;
use crate::types::{MatchId, TeamId, TournamentId};
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// One team's result as submitted by the scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMatchStats {
    pub team_id: TeamId,
    pub position: u32,
    pub player_kills: Vec<PlayerKills>,
}

/// Response to a stat submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubmitOutcome {
    /// Written inline.
    Done { duration_ms: u64 },

    /// Accepted; a background job is writing it.
    Processing { job_id: u64 },
}

/// Ingestion status of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStatus {
    Ready,
    Processing { job_id: u64 },
}

pub(crate) type MatchKey = (TournamentId, MatchId);

/// Per-match ingestion status with a monotonic job counter.
#[derive(Debug, Default)]
pub struct MatchStatusBoard {
    statuses: HashMap<MatchKey, MatchStatus>,
    next_job_id: u64,
}

impl MatchStatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, key: MatchKey) -> MatchStatus {
        self.statuses.get(&key).copied().unwrap_or(MatchStatus::Ready)
    }

    /// Marks the match `Processing` under a fresh job ID.
    pub fn begin(&mut self, key: MatchKey) -> Result<u64> {
        if let MatchStatus::Processing { job_id } = self.status(key) {
            return Err(SettlementError::MatchBusy {
                match_id: key.1,
                job_id,
            });
        }
        self.next_job_id += 1;
        let job_id = self.next_job_id;
        self.statuses.insert(key, MatchStatus::Processing { job_id });
        Ok(job_id)
    }

    /// Returns the match to `Ready` if `job_id` still owns it.
    ///
    /// Returns `false` when the match is ready already or owned by another job.
    pub fn finish(&mut self, key: MatchKey, job_id: u64) -> bool {
        if self.status(key) == (MatchStatus::Processing { job_id }) {
            self.statuses.insert(key, MatchStatus::Ready);
            true
        } else {
            false
        }
    }
}

/// Checks a batch against the tournament and the rows already stored for
/// the match.
///
/// `stored_positions` maps each stored position to the team holding it.
/// A team in the batch may move to a new position; its old row is replaced.
pub fn validate_batch(
    tournament: &Tournament,
    match_id: MatchId,
    stats: &[TeamMatchStats],
    stored_positions: &HashMap<u32, TeamId>,
) -> Result<()> {
    if stats.is_empty() {
        return Err(SettlementError::InvalidBatch {
            match_id,
            message: "batch contains no teams".to_string(),
        });
    }

    let batch_teams: HashSet<TeamId> = stats.iter().map(|s| s.team_id).collect();
    if batch_teams.len() != stats.len() {
        return Err(SettlementError::InvalidBatch {
            match_id,
            message: "a team appears more than once".to_string(),
        });
    }

    let mut seen_positions = HashSet::new();
    for team_stats in stats {
        if team_stats.position == 0 {
            return Err(SettlementError::InvalidBatch {
                match_id,
                message: format!("team {} has position 0", team_stats.team_id),
            });
        }
        if !tournament.has_team(team_stats.team_id) {
            return Err(SettlementError::TeamNotFound {
                tournament_id: tournament.id,
                team_id: team_stats.team_id,
            });
        }

        let taken_by_other = stored_positions
            .get(&team_stats.position)
            .map_or(false, |holder| !batch_teams.contains(holder));
        if !seen_positions.insert(team_stats.position) || taken_by_other {
            return Err(SettlementError::DuplicatePosition {
                match_id,
                position: team_stats.position,
            });
        }
    }

    Ok(())
}

fn into_entries(match_id: MatchId, stats: Vec<TeamMatchStats>) -> Vec<MatchStatEntry> {
    let created_at = Utc::now();
    stats
        .into_iter()
        .map(|s| MatchStatEntry {
            match_id,
            team_id: s.team_id,
            position: s.position,
            created_at,
            player_kills: s.player_kills,
        })
        .collect()
}

impl SettlementEngine {
    /// Ingests one match's per-team stats.
    ///
    /// Batches of up to `sync_team_threshold` teams are written before
    /// returning. Larger batches are written by a background task and the
    /// call returns [`SubmitOutcome::Processing`]; background failures are
    /// logged, never returned. Must be called from within a Tokio runtime.
    pub async fn submit_match_stats(
        self: &Arc<Self>,
        tournament_id: TournamentId,
        match_id: MatchId,
        stats: Vec<TeamMatchStats>,
    ) -> Result<SubmitOutcome> {
        let started = Instant::now();
        let key = (tournament_id, match_id);

        if stats.len() <= self.config().sync_team_threshold {
            let replaced = self.validate_and_write(tournament_id, match_id, stats, None)?;
            let duration_ms = started.elapsed().as_millis() as u64;
            info!(
                "Match {}/{} ingested inline in {} ms ({} rows replaced)",
                tournament_id, match_id, duration_ms, replaced
            );
            return Ok(SubmitOutcome::Done { duration_ms });
        }

        let job_id = self.validate_and_claim(tournament_id, match_id, &stats)?;
        info!(
            "Match {}/{}: {} teams queued as job {}",
            tournament_id,
            match_id,
            stats.len(),
            job_id
        );

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let writer = Arc::clone(&engine);
            let outcome = tokio::task::spawn_blocking(move || {
                writer.validate_and_write(tournament_id, match_id, stats, Some(job_id))
            })
            .await;

            match outcome {
                Ok(Ok(replaced)) => info!(
                    "Job {} for match {}/{} finished ({} rows replaced)",
                    job_id, tournament_id, match_id, replaced
                ),
                Ok(Err(e)) => error!("Job {} for match {}/{} failed: {}", job_id, tournament_id, match_id, e),
                Err(e) => error!("Job {} for match {}/{} panicked: {}", job_id, tournament_id, match_id, e),
            }

            if !engine.statuses.lock().finish(key, job_id) {
                debug!(
                    "Job {} for match {}/{} no longer owned the match status",
                    job_id, tournament_id, match_id
                );
            }
        });

        self.arm_safety_timer(key, job_id);
        Ok(SubmitOutcome::Processing { job_id })
    }

    /// Current ingestion status of a match.
    pub fn match_status(&self, tournament_id: TournamentId, match_id: MatchId) -> MatchStatus {
        self.statuses.lock().status((tournament_id, match_id))
    }

    /// Checks `stats` against the rows stored for the match and writes them
    /// under one hold of the stats lock. While the match is processing, only
    /// the job `owner` may write.
    pub(crate) fn validate_and_write(
        &self,
        tournament_id: TournamentId,
        match_id: MatchId,
        stats: Vec<TeamMatchStats>,
        owner: Option<u64>,
    ) -> Result<usize> {
        let tournaments = self.tournaments.lock();
        let tournament = tournaments
            .get(&tournament_id)
            .ok_or(SettlementError::TournamentNotFound(tournament_id))?;
        let mut store = self.stats.lock();
        match self.statuses.lock().status((tournament_id, match_id)) {
            MatchStatus::Processing { job_id } if owner != Some(job_id) => {
                return Err(SettlementError::MatchBusy { match_id, job_id });
            }
            _ => {}
        }

        let stored_positions = store.positions(tournament_id, match_id);
        validate_batch(tournament, match_id, &stats, &stored_positions)?;
        Ok(store.upsert(tournament_id, into_entries(match_id, stats)))
    }

    /// Validates a background batch and marks the match as processing, as
    /// one step against concurrent writers.
    fn validate_and_claim(
        &self,
        tournament_id: TournamentId,
        match_id: MatchId,
        stats: &[TeamMatchStats],
    ) -> Result<u64> {
        let key = (tournament_id, match_id);
        let tournaments = self.tournaments.lock();
        let tournament = tournaments
            .get(&tournament_id)
            .ok_or(SettlementError::TournamentNotFound(tournament_id))?;
        let store = self.stats.lock();
        let mut statuses = self.statuses.lock();
        if let MatchStatus::Processing { job_id } = statuses.status(key) {
            return Err(SettlementError::MatchBusy { match_id, job_id });
        }

        validate_batch(tournament, match_id, stats, &store.positions(tournament_id, match_id))?;
        statuses.begin(key)
    }

    /// Forces the match back to `Ready` after the safety timeout if `job_id`
    /// still holds it. Does not stop the worker.
    pub(crate) fn arm_safety_timer(self: &Arc<Self>, key: MatchKey, job_id: u64) {
        let engine = Arc::downgrade(self);
        let timeout = self.config().safety_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(engine) = engine.upgrade() else {
                return;
            };
            if engine.statuses.lock().finish(key, job_id) {
                warn!(
                    "Job {} for match {}/{} exceeded {:?}; match forced back to ready",
                    job_id, key.0, key.1, timeout
                );
            }
        });
    }
}
