//! Team score aggregation
//!
//! Team totals are never kept as running counters. A [`RoundLedger`] stores
//! one [`RoundResult`] per (team, round) and every cumulative figure is
//! re-derived from what is stored, so a retried round replaces its previous
//! result instead of adding to it.

use crate::calculator;
use crate::error::{Result, ScoringError};
use crate::models::*;
use crate::ruleset::RuleSet;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Check the roster rules the scoring depends on
pub fn validate_membership(membership: &TeamMembership) -> Result<()> {
    let team_id = membership.team_id;
    if membership.players.is_empty() {
        return Err(ScoringError::invalid_membership(team_id, "roster is empty"));
    }
    if membership.captain == membership.vice_captain {
        return Err(ScoringError::invalid_membership(
            team_id,
            format!("player {} is both captain and vice-captain", membership.captain),
        ));
    }
    for (label, player_id) in [
        ("captain", membership.captain),
        ("vice-captain", membership.vice_captain),
        ("wicketkeeper", membership.wicketkeeper),
    ] {
        if !membership.contains(player_id) {
            return Err(ScoringError::invalid_membership(
                team_id,
                format!("{label} {player_id} is not on the roster"),
            ));
        }
    }
    Ok(())
}

pub fn leadership_factor(role: Role, ruleset: &RuleSet) -> f64 {
    match role {
        Role::Captain => ruleset.leadership.captain,
        Role::ViceCaptain => ruleset.leadership.vice_captain,
        Role::Player => 1.0,
    }
}

/// Score one team for one round.
///
/// Each selected player's raw points come straight from the calculator (which
/// already doubles wicketkeeper catches from the record's own flag), are
/// multiplied by that player's multiplier, then by this team's leadership
/// factor for the player.
pub fn compute_round(
    membership: &TeamMembership,
    performances_by_player: &BTreeMap<PlayerId, Vec<PerformanceRecord>>,
    multipliers_by_player: &BTreeMap<PlayerId, PlayerMultiplier>,
    ruleset: &RuleSet,
    round: RoundNumber,
) -> Result<RoundResult> {
    if round == 0 {
        return Err(ScoringError::InvalidRound(round));
    }
    validate_membership(membership)?;

    let mut players = BTreeMap::new();
    for &player_id in &membership.players {
        let breakdowns: Vec<PointsBreakdown> = performances_by_player
            .get(&player_id)
            .map(|records| records.iter().map(|r| calculator::score(r, ruleset)).collect())
            .unwrap_or_default();
        let raw_points: f64 = breakdowns.iter().map(|b| b.total).sum();

        let multiplier = match multipliers_by_player.get(&player_id) {
            Some(m) => m.value,
            None => {
                warn!(
                    "No multiplier stored for player {} (team {}), using neutral",
                    player_id, membership.team_id
                );
                ruleset.multiplier.neutral
            }
        };

        let role = membership.role_of(player_id);
        let leadership_factor = leadership_factor(role, ruleset);
        let points = raw_points * multiplier * leadership_factor;

        players.insert(
            player_id,
            PlayerContribution {
                player_id,
                played: !breakdowns.is_empty(),
                breakdowns,
                raw_points,
                multiplier,
                role,
                leadership_factor,
                points,
            },
        );
    }

    let total = players.values().map(|p| p.points).sum();

    debug!("Team {} round {}: {:.2} points", membership.team_id, round, total);

    Ok(RoundResult {
        team_id: membership.team_id,
        round,
        ruleset_version: ruleset.version.clone(),
        total,
        players,
    })
}

/// Group records by player, counting each (player, match) once no matter how
/// many team or grade listings it was collected from.
pub fn dedupe_by_player<'a>(
    records: impl IntoIterator<Item = &'a PerformanceRecord>,
) -> BTreeMap<PlayerId, Vec<PerformanceRecord>> {
    let mut seen = BTreeSet::new();
    let mut by_player: BTreeMap<PlayerId, Vec<PerformanceRecord>> = BTreeMap::new();
    for record in records {
        if seen.insert((record.player_id, record.match_id)) {
            by_player.entry(record.player_id).or_default().push(record.clone());
        } else {
            debug!(
                "Skipping repeated record for player {} match {}",
                record.player_id, record.match_id
            );
        }
    }
    by_player
}

/// League-wide round lines, one per distinct player, including players who
/// are on no fantasy team.
pub fn league_round_lines<'a>(
    records: impl IntoIterator<Item = &'a PerformanceRecord>,
    round: RoundNumber,
    ruleset: &RuleSet,
) -> BTreeMap<PlayerId, PlayerRoundLine> {
    dedupe_by_player(records)
        .into_iter()
        .map(|(player_id, records)| {
            let mut line = StatLine::default();
            for record in &records {
                line.absorb(record, calculator::score(record, ruleset).total);
            }
            (player_id, PlayerRoundLine { player_id, round, line })
        })
        .collect()
}

/// Season totals from stored round lines
pub fn season_totals<'a>(
    lines: impl IntoIterator<Item = &'a PlayerRoundLine>,
) -> BTreeMap<PlayerId, SeasonAggregate> {
    let mut totals: BTreeMap<PlayerId, SeasonAggregate> = BTreeMap::new();
    for line in lines {
        let aggregate =
            totals.entry(line.player_id).or_insert_with(|| SeasonAggregate::new(line.player_id));
        aggregate.totals.merge(&line.line);
        aggregate.through_round = aggregate.through_round.max(line.round);
    }
    totals
}

/// League-wide leaders by raw season points
pub fn top_scorers(
    aggregates: &BTreeMap<PlayerId, SeasonAggregate>,
    limit: usize,
) -> Vec<&SeasonAggregate> {
    let mut ranked: Vec<&SeasonAggregate> = aggregates.values().collect();
    ranked.sort_by(|a, b| b.raw_score().total_cmp(&a.raw_score()).then(a.player_id.cmp(&b.player_id)));
    ranked.truncate(limit);
    ranked
}

/// Stored round results keyed by (team, round)
#[derive(Debug, Clone, Default)]
pub struct RoundLedger {
    results: BTreeMap<(TeamId, RoundNumber), RoundResult>,
}

impl RoundLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results(results: impl IntoIterator<Item = RoundResult>) -> Self {
        let mut ledger = Self::new();
        for result in results {
            ledger.upsert(result);
        }
        ledger
    }

    /// Store a result, replacing any earlier result for the same key
    pub fn upsert(&mut self, result: RoundResult) -> Option<RoundResult> {
        self.results.insert((result.team_id, result.round), result)
    }

    pub fn get(&self, team_id: TeamId, round: RoundNumber) -> Option<&RoundResult> {
        self.results.get(&(team_id, round))
    }

    /// Sum of the stored round totals for a team
    pub fn cumulative_total(&self, team_id: TeamId) -> f64 {
        self.rounds_for(team_id).map(|r| r.total).sum()
    }

    pub fn rounds_for(&self, team_id: TeamId) -> impl Iterator<Item = &RoundResult> {
        self.results.range((team_id, 0)..=(team_id, RoundNumber::MAX)).map(|(_, r)| r)
    }

    pub fn teams(&self) -> BTreeSet<TeamId> {
        self.results.keys().map(|(team_id, _)| *team_id).collect()
    }

    /// Teams ranked by cumulative total; ties go to the lower team id
    pub fn standings(&self) -> Vec<Standing> {
        let mut table: Vec<(TeamId, f64, usize)> = self
            .teams()
            .into_iter()
            .map(|team_id| {
                (team_id, self.cumulative_total(team_id), self.rounds_for(team_id).count())
            })
            .collect();
        table.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        table
            .into_iter()
            .enumerate()
            .map(|(index, (team_id, cumulative_total, rounds_counted))| Standing {
                rank: index + 1,
                team_id,
                cumulative_total,
                rounds_counted,
            })
            .collect()
    }
}
