//! Round orchestration: load prior state, compute in memory, commit once

use persistence::{CommitReceipt, Multipliers, PersistenceError, RoundCommit, ScoreStore};
use scoring_engine::aggregator;
use scoring_engine::multiplier::initial_multipliers;
use scoring_engine::{
    PerformanceRecord, PlayerId, PriorState, RoundEngine, RoundInput, RoundNumber, RoundResult,
    RuleSet, ScoringError, SeasonAggregate, Standing, TeamId, TeamMembership,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Rounds are committed in order; round n needs round n-1
    #[error("Cannot run round {round}: round {missing} has not been committed")]
    RoundSkipped { round: RoundNumber, missing: RoundNumber },
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Outcome of a committed round
#[derive(Debug, Clone)]
pub struct RoundRun {
    pub receipt: CommitReceipt,
    pub commit: RoundCommit,
}

/// A team's stored rounds and their running total
#[derive(Debug, Clone, Serialize)]
pub struct TeamHistory {
    pub team_id: TeamId,
    pub rounds: Vec<RoundResult>,
    pub cumulative_total: f64,
}

/// Drives rounds against a score store
pub struct RoundService<S: ScoreStore> {
    store: S,
    engine: RoundEngine,
}

impl<S: ScoreStore> RoundService<S> {
    pub fn new(store: S, ruleset: RuleSet) -> Self {
        Self { store, engine: RoundEngine::new(ruleset) }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ruleset(&self) -> &RuleSet {
        self.engine.ruleset()
    }

    /// Seed season-start multipliers from prior-season aggregates; players
    /// with no prior data start at neutral.
    pub async fn initialize_season(
        &self,
        prior: &BTreeMap<PlayerId, SeasonAggregate>,
        players: impl IntoIterator<Item = PlayerId>,
    ) -> Result<Multipliers> {
        if !self.store.committed_rounds().await?.is_empty() {
            warn!("Re-seeding the season baseline after rounds were committed");
        }

        let baseline = initial_multipliers(prior, players, self.ruleset());
        self.store.store_baseline(&baseline).await?;

        info!(
            "Season baseline stored for {} players ({} with prior data)",
            baseline.len(),
            prior.len()
        );
        Ok(baseline)
    }

    /// Score a round and commit it as one unit.
    ///
    /// Prior state always comes from the store as of round n-1, so running a
    /// committed round again recomputes the same commit and replaces it.
    /// Nothing is written unless the whole round computes.
    pub async fn run_round(
        &self,
        round: RoundNumber,
        performances: &[PerformanceRecord],
        memberships: &[TeamMembership],
    ) -> Result<RoundRun> {
        if round == 0 {
            return Err(ScoringError::InvalidRound(round).into());
        }

        let committed = self.store.committed_rounds().await?;
        let previous = round - 1;
        if previous > 0 && !committed.contains(&previous) {
            return Err(ServiceError::RoundSkipped { round, missing: previous });
        }
        if committed.contains(&round) {
            info!("Round {} already committed; recomputing from round {} state", round, previous);
        }
        if let Some(stale) = committed.iter().filter(|r| **r > round).max() {
            warn!(
                "Re-running round {} while rounds up to {} are committed; those rounds are now stale",
                round, stale
            );
        }

        let prior = PriorState {
            multipliers: self.store.multipliers_after(previous).await?,
            aggregates: self.store.season_aggregates(previous).await?,
        };
        if previous == 0 && prior.multipliers.is_empty() {
            warn!("No season baseline stored; every player starts at neutral");
        }

        let input = RoundInput { round, performances, memberships };
        let commit = RoundCommit::from(self.engine.process(&input, &prior)?);
        let receipt = self.store.commit_round(commit.clone()).await?;

        info!(
            "Round {} committed ({} teams, {} players, {} flags{})",
            round,
            commit.results.len(),
            commit.player_lines.len(),
            commit.flags.len(),
            if receipt.replaced { ", replaced earlier commit" } else { "" }
        );

        Ok(RoundRun { receipt, commit })
    }

    pub async fn standings(&self) -> Result<Vec<Standing>> {
        Ok(self.store.ledger().await?.standings())
    }

    pub async fn team_history(&self, team_id: TeamId) -> Result<TeamHistory> {
        let rounds = self.store.round_results(team_id).await?;
        let cumulative_total = rounds.iter().map(|r| r.total).sum();
        Ok(TeamHistory { team_id, rounds, cumulative_total })
    }

    /// League-wide leaders over every committed round
    pub async fn top_scorers(&self, limit: usize) -> Result<Vec<SeasonAggregate>> {
        let latest = self.store.committed_rounds().await?.last().copied().unwrap_or(0);
        let aggregates = self.store.season_aggregates(latest).await?;
        Ok(aggregator::top_scorers(&aggregates, limit).into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::InMemoryStore;
    use scoring_engine::Overs;

    async fn service() -> RoundService<InMemoryStore> {
        let mut store = InMemoryStore::with_default_config();
        store.initialize().await.unwrap();
        RoundService::new(store, RuleSet::standard().unwrap())
    }

    fn team(team_id: TeamId) -> TeamMembership {
        TeamMembership {
            team_id,
            players: [1, 2, 3].into_iter().collect(),
            captain: 1,
            vice_captain: 2,
            wicketkeeper: 3,
        }
    }

    fn records(match_id: u32) -> Vec<PerformanceRecord> {
        vec![
            PerformanceRecord::new(1, match_id).with_batting(50, 33, true),
            PerformanceRecord::new(2, match_id).with_bowling(3, Overs::new(8, 0), 32, 0),
            PerformanceRecord::new(3, match_id).with_fielding(1, 0, 0).as_wicketkeeper(),
        ]
    }

    #[tokio::test]
    async fn test_round_zero_rejected() {
        let service = service().await;
        let err = service.run_round(0, &records(1), &[team(1)]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Scoring(ScoringError::InvalidRound(0))));
    }

    #[tokio::test]
    async fn test_cannot_skip_rounds() {
        let service = service().await;
        let err = service.run_round(2, &records(1), &[team(1)]).await.unwrap_err();

        assert!(matches!(err, ServiceError::RoundSkipped { round: 2, missing: 1 }));
        assert!(service.store().committed_rounds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_baseline_applies_to_round_one() {
        let service = service().await;
        let prior: BTreeMap<PlayerId, SeasonAggregate> = [(1, 900.0), (2, 100.0)]
            .into_iter()
            .map(|(player_id, raw_points)| {
                let totals =
                    scoring_engine::StatLine { matches: 14, raw_points, ..Default::default() };
                (player_id, SeasonAggregate { player_id, through_round: 14, totals })
            })
            .collect();
        service.initialize_season(&prior, [1, 2, 3]).await.unwrap();

        let run = service.run_round(1, &records(1), &[team(1)]).await.unwrap();

        let players = &run.commit.results[0].players;
        assert_eq!(players[&1].multiplier, 0.69);
        assert_eq!(players[&2].multiplier, 5.0);
        assert_eq!(players[&3].multiplier, 1.0);
        assert!(!run.receipt.replaced);
    }

    #[tokio::test]
    async fn test_team_history_and_standings() {
        let service = service().await;
        service.initialize_season(&BTreeMap::new(), [1, 2, 3]).await.unwrap();
        let mut other = team(2);
        other.captain = 2;
        other.vice_captain = 1;

        service.run_round(1, &records(1), &[team(1), other.clone()]).await.unwrap();
        service.run_round(2, &records(2), &[team(1), other]).await.unwrap();

        let history = service.team_history(1).await.unwrap();
        assert_eq!(history.rounds.len(), 2);
        assert_eq!(history.cumulative_total, history.rounds.iter().map(|r| r.total).sum::<f64>());

        let standings = service.standings().await.unwrap();
        assert_eq!(standings.len(), 2);
        assert_eq!(standings[0].rank, 1);
        assert_eq!(standings[0].rounds_counted, 2);

        let leaders = service.top_scorers(2).await.unwrap();
        assert_eq!(leaders.len(), 2);
        assert!(leaders[0].raw_score() >= leaders[1].raw_score());
        assert_eq!(leaders[0].totals.matches, 2);
    }
}
