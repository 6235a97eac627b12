use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    aggregator::{self, compute_round},
    calculator,
    error::{Result, ScoringError},
    models::*,
    multiplier::{advance_multipliers, compute_targets},
    ruleset::RuleSet,
};

/// Everything a round is scored from, loaded up front by the caller
#[derive(Debug, Clone)]
pub struct RoundInput<'a> {
    pub round: RoundNumber,
    pub performances: &'a [PerformanceRecord],
    pub memberships: &'a [TeamMembership],
}

/// Stored state as of the end of the previous round
#[derive(Debug, Clone, Default)]
pub struct PriorState {
    pub multipliers: BTreeMap<PlayerId, PlayerMultiplier>,
    pub aggregates: BTreeMap<PlayerId, SeasonAggregate>,
}

/// A fully computed round, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: RoundNumber,
    pub ruleset_version: String,
    pub results: Vec<RoundResult>,
    pub player_lines: Vec<PlayerRoundLine>,
    pub aggregates: BTreeMap<PlayerId, SeasonAggregate>,
    pub multipliers: BTreeMap<PlayerId, PlayerMultiplier>,
    pub flags: Vec<AuditFlag>,
}

/// Pure, in-memory round pipeline: score, aggregate, then drift
pub struct RoundEngine {
    ruleset: RuleSet,
}

impl RoundEngine {
    pub fn new(ruleset: RuleSet) -> Self {
        Self { ruleset }
    }

    pub fn ruleset(&self) -> &RuleSet {
        &self.ruleset
    }

    /// Compute one round. Identical inputs always give an identical outcome.
    ///
    /// Team results use the multipliers as they stood after the previous
    /// round; the drifted multipliers in the outcome are for the next round.
    pub fn process(&self, input: &RoundInput<'_>, prior: &PriorState) -> Result<RoundOutcome> {
        let round = input.round;
        if round == 0 {
            return Err(ScoringError::InvalidRound(round));
        }

        info!(
            "Processing round {} with rule set {}: {} performances, {} teams",
            round,
            self.ruleset.version,
            input.performances.len(),
            input.memberships.len()
        );

        let mut memberships: Vec<&TeamMembership> = input.memberships.iter().collect();
        memberships.sort_by_key(|m| m.team_id);
        for pair in memberships.windows(2) {
            if pair[0].team_id == pair[1].team_id {
                return Err(ScoringError::DuplicateTeam { team_id: pair[0].team_id, round });
            }
        }

        let performances = aggregator::dedupe_by_player(input.performances);
        let mut flags = self.data_quality_flags(&performances);

        let rostered: BTreeSet<PlayerId> =
            memberships.iter().flat_map(|m| m.players.iter().copied()).collect();
        for player_id in performances.keys().filter(|p| !rostered.contains(p)) {
            debug!("Player {} is on no roster; counted league-wide only", player_id);
            flags.push(AuditFlag::UnrosteredPlayer { player_id: *player_id });
        }
        for player_id in rostered.iter().filter(|p| !prior.multipliers.contains_key(p)) {
            flags.push(AuditFlag::MissingMultiplier { player_id: *player_id });
        }

        let results = memberships
            .iter()
            .map(|membership| {
                compute_round(membership, &performances, &prior.multipliers, &self.ruleset, round)
            })
            .collect::<Result<Vec<_>>>()?;

        let lines = aggregator::league_round_lines(input.performances, round, &self.ruleset);
        let aggregates = aggregator::season_totals(
            season_lines(&prior.aggregates).iter().chain(lines.values()),
        );

        let targets = compute_targets(&aggregates, &self.ruleset);
        let (multipliers, drift_flags) =
            advance_multipliers(&prior.multipliers, &targets, round, &self.ruleset);
        flags.extend(drift_flags);

        info!(
            "Round {} computed: {} team results, {} players scored, {} flags",
            round,
            results.len(),
            lines.len(),
            flags.len()
        );

        Ok(RoundOutcome {
            round,
            ruleset_version: self.ruleset.version.clone(),
            results,
            player_lines: lines.into_values().collect(),
            aggregates,
            multipliers,
            flags,
        })
    }

    fn data_quality_flags(
        &self,
        performances: &BTreeMap<PlayerId, Vec<PerformanceRecord>>,
    ) -> Vec<AuditFlag> {
        performances
            .values()
            .flatten()
            .flat_map(|record| {
                calculator::score(record, &self.ruleset).flags.into_iter().map(|flag| {
                    warn!(
                        "Data quality flag {:?} for player {} in match {} (neutral factor applied)",
                        flag, record.player_id, record.match_id
                    );
                    AuditFlag::DataQuality {
                        player_id: record.player_id,
                        match_id: record.match_id,
                        flag,
                    }
                })
            })
            .collect()
    }
}

/// Prior season totals expressed as round lines so they merge like any other
fn season_lines(aggregates: &BTreeMap<PlayerId, SeasonAggregate>) -> Vec<PlayerRoundLine> {
    aggregates
        .values()
        .map(|a| PlayerRoundLine {
            player_id: a.player_id,
            round: a.through_round,
            line: a.totals.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(team_id: TeamId, players: &[PlayerId]) -> TeamMembership {
        TeamMembership {
            team_id,
            players: players.iter().copied().collect(),
            captain: players[0],
            vice_captain: players[1],
            wicketkeeper: players[2],
        }
    }

    fn neutral(players: &[PlayerId]) -> PriorState {
        PriorState {
            multipliers: players
                .iter()
                .map(|&player_id| {
                    (player_id, PlayerMultiplier { player_id, value: 1.0, last_updated_round: 0 })
                })
                .collect(),
            aggregates: BTreeMap::new(),
        }
    }

    fn performances() -> Vec<PerformanceRecord> {
        vec![
            PerformanceRecord::new(1, 100).with_batting(50, 33, true),
            PerformanceRecord::new(2, 100).with_bowling(3, Overs::new(8, 0), 32, 0),
            PerformanceRecord::new(3, 100).with_batting(0, 2, true).with_fielding(2, 1, 0),
            PerformanceRecord::new(9, 100).with_batting(20, 0, false),
        ]
    }

    #[test]
    fn test_process_is_deterministic() {
        let engine = RoundEngine::new(RuleSet::standard().unwrap());
        let records = performances();
        let teams = vec![membership(2, &[1, 2, 3]), membership(1, &[3, 2, 1])];
        let input = RoundInput { round: 1, performances: &records, memberships: &teams };
        let prior = neutral(&[1, 2, 3]);

        let first = engine.process(&input, &prior).unwrap();
        let second = engine.process(&input, &prior).unwrap();

        assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
        let team_order: Vec<_> = first.results.iter().map(|r| r.team_id).collect();
        assert_eq!(team_order, vec![1, 2]);
    }

    #[test]
    fn test_same_player_scored_per_team_role() {
        let engine = RoundEngine::new(RuleSet::standard().unwrap());
        let records = performances();
        let teams = vec![membership(1, &[1, 2, 3]), membership(2, &[2, 3, 1])];
        let input = RoundInput { round: 1, performances: &records, memberships: &teams };

        let outcome = engine.process(&input, &neutral(&[1, 2, 3])).unwrap();

        let raw = outcome.results[0].players[&1].raw_points;
        assert_eq!(outcome.results[0].players[&1].points, raw * 2.0);
        assert_eq!(outcome.results[1].players[&1].points, raw);
    }

    #[test]
    fn test_unrostered_player_counted_league_wide_only() {
        let engine = RoundEngine::new(RuleSet::standard().unwrap());
        let records = performances();
        let teams = vec![membership(1, &[1, 2, 3])];
        let input = RoundInput { round: 1, performances: &records, memberships: &teams };

        let outcome = engine.process(&input, &neutral(&[1, 2, 3])).unwrap();

        assert!(!outcome.results[0].players.contains_key(&9));
        assert!(outcome.aggregates.contains_key(&9));
        assert!(outcome.flags.contains(&AuditFlag::UnrosteredPlayer { player_id: 9 }));
        assert!(outcome.flags.contains(&AuditFlag::DataQuality {
            player_id: 9,
            match_id: 100,
            flag: DataQualityFlag::ZeroBallsFaced,
        }));
    }

    #[test]
    fn test_multipliers_drift_for_next_round_only() {
        let engine = RoundEngine::new(RuleSet::standard().unwrap());
        let records = performances();
        let teams = vec![membership(1, &[1, 2, 3])];
        let input = RoundInput { round: 1, performances: &records, memberships: &teams };

        let outcome = engine.process(&input, &neutral(&[1, 2, 3])).unwrap();

        // this round was scored at the stored (neutral) multipliers
        assert!(outcome.results[0].players.values().all(|p| p.multiplier == 1.0));
        // best performer drifts down, weakest drifts up, all marked for round 1
        let best = outcome.multipliers[&1].value;
        let weakest = outcome.multipliers[&3].value;
        assert!(best < 1.0 && weakest > 1.0);
        assert!(outcome.multipliers.values().all(|m| m.last_updated_round == 1));
        assert!(outcome.multipliers.values().all(|m| (0.69..=5.0).contains(&m.value)));
    }

    #[test]
    fn test_prior_aggregates_carry_forward() {
        let engine = RoundEngine::new(RuleSet::standard().unwrap());
        let records = performances();
        let teams = vec![membership(1, &[1, 2, 3])];

        let round_one = engine
            .process(
                &RoundInput { round: 1, performances: &records, memberships: &teams },
                &neutral(&[1, 2, 3]),
            )
            .unwrap();
        let prior = PriorState {
            multipliers: round_one.multipliers.clone(),
            aggregates: round_one.aggregates.clone(),
        };
        let round_two = engine
            .process(&RoundInput { round: 2, performances: &records, memberships: &teams }, &prior)
            .unwrap();

        assert_eq!(round_two.aggregates[&1].totals.matches, 2);
        assert_eq!(round_two.aggregates[&1].through_round, 2);
        assert_eq!(
            round_two.aggregates[&1].totals.raw_points,
            round_one.aggregates[&1].totals.raw_points * 2.0
        );
        assert_eq!(round_two.results[0].players[&1].multiplier, round_one.multipliers[&1].value);
    }

    #[test]
    fn test_duplicate_team_rejected() {
        let engine = RoundEngine::new(RuleSet::standard().unwrap());
        let records = performances();
        let teams = vec![membership(1, &[1, 2, 3]), membership(1, &[1, 2, 3])];
        let input = RoundInput { round: 3, performances: &records, memberships: &teams };

        let err = engine.process(&input, &PriorState::default()).unwrap_err();
        assert!(matches!(err, ScoringError::DuplicateTeam { team_id: 1, round: 3 }));
    }
}
