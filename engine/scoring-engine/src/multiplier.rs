//! Player multiplier engine
//!
//! Multipliers are a handicap: the strongest performers in the cohort are
//! pulled towards `min`, the weakest are boosted towards `max`, and the
//! median player sits at `neutral`. Between rounds each stored multiplier
//! drifts a bounded step towards a freshly computed target.

use crate::models::{AuditFlag, PlayerId, PlayerMultiplier, RoundNumber, SeasonAggregate};
use crate::ruleset::RuleSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Min / median / max of a cohort's raw scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CohortStats {
    pub min: f64,
    pub median: f64,
    pub max: f64,
    pub size: usize,
}

impl CohortStats {
    /// Returns `None` for an empty cohort. The median of an even cohort is the
    /// mean of the two middle scores.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let mut sorted = scores.to_vec();
        sorted.sort_by(f64::total_cmp);

        let size = sorted.len();
        let mid = size / 2;
        let median =
            if size % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] };

        Some(Self { min: sorted[0], median, max: sorted[size - 1], size })
    }
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from * (1.0 - t) + to * t
}

/// Piecewise-linear multiplier anchored at the cohort median.
///
/// `max` at `min_score`, `neutral` at `median_score`, `min` at `max_score`.
/// A degenerate side (zero-width span) resolves to `neutral`.
pub fn initial_multiplier(
    player_score: f64,
    min_score: f64,
    median_score: f64,
    max_score: f64,
    ruleset: &RuleSet,
) -> f64 {
    let bounds = &ruleset.multiplier;

    let value = if player_score <= median_score {
        let span = median_score - min_score;
        if span > 0.0 {
            let t = ((player_score - min_score) / span).clamp(0.0, 1.0);
            lerp(bounds.max, bounds.neutral, t)
        } else {
            bounds.neutral
        }
    } else {
        let span = max_score - median_score;
        if span > 0.0 {
            let t = ((player_score - median_score) / span).clamp(0.0, 1.0);
            lerp(bounds.neutral, bounds.min, t)
        } else {
            bounds.neutral
        }
    };

    bounds.clamp(value)
}

/// Result of one drift step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftOutcome {
    pub value: f64,
    pub unclamped: f64,
    pub clamped: bool,
}

/// Exponential smoothing towards `target`, clamped to the rule set bounds
pub fn drift(old_multiplier: f64, target_multiplier: f64, drift_rate: f64, ruleset: &RuleSet) -> f64 {
    drift_step(old_multiplier, target_multiplier, drift_rate, ruleset).value
}

/// Like [`drift`], also reporting whether the bounds had to be enforced
pub fn drift_step(
    old_multiplier: f64,
    target_multiplier: f64,
    drift_rate: f64,
    ruleset: &RuleSet,
) -> DriftOutcome {
    let rate = drift_rate.clamp(0.0, 1.0);
    let low = old_multiplier.min(target_multiplier);
    let high = old_multiplier.max(target_multiplier);

    // rounding must not step outside [old, target]
    let unclamped = lerp(old_multiplier, target_multiplier, rate).clamp(low, high);
    let value = ruleset.multiplier.clamp(unclamped);

    DriftOutcome { value, unclamped, clamped: value != unclamped }
}

/// Target multiplier for every player with a season aggregate
pub fn compute_targets(
    aggregates: &BTreeMap<PlayerId, SeasonAggregate>,
    ruleset: &RuleSet,
) -> BTreeMap<PlayerId, f64> {
    let scores: Vec<f64> = aggregates.values().map(SeasonAggregate::raw_score).collect();
    let Some(cohort) = CohortStats::from_scores(&scores) else {
        return BTreeMap::new();
    };

    debug!(
        "Multiplier cohort: {} players, min {:.2}, median {:.2}, max {:.2}",
        cohort.size, cohort.min, cohort.median, cohort.max
    );

    aggregates
        .iter()
        .map(|(player_id, aggregate)| {
            let target = initial_multiplier(
                aggregate.raw_score(),
                cohort.min,
                cohort.median,
                cohort.max,
                ruleset,
            );
            (*player_id, target)
        })
        .collect()
}

/// Drift every targeted player once for `round`.
///
/// Players already updated for this round are left alone, players without a
/// stored multiplier start from `neutral`, and players without a target keep
/// their stored value.
pub fn advance_multipliers(
    current: &BTreeMap<PlayerId, PlayerMultiplier>,
    targets: &BTreeMap<PlayerId, f64>,
    round: RoundNumber,
    ruleset: &RuleSet,
) -> (BTreeMap<PlayerId, PlayerMultiplier>, Vec<AuditFlag>) {
    let mut updated = current.clone();
    let mut flags = Vec::new();

    for (player_id, target) in targets {
        let existing = current.get(player_id);
        if existing.is_some_and(|m| m.last_updated_round >= round) {
            debug!("Multiplier for player {} already updated for round {}", player_id, round);
            continue;
        }

        let old = existing.map_or(ruleset.multiplier.neutral, |m| m.value);
        let step = drift_step(old, *target, ruleset.multiplier.drift_rate, ruleset);
        if step.clamped {
            warn!(
                "Multiplier for player {} clamped from {:.4} to {:.4}",
                player_id, step.unclamped, step.value
            );
            flags.push(AuditFlag::MultiplierClamped {
                player_id: *player_id,
                unclamped: step.unclamped,
                clamped: step.value,
            });
        }

        updated.insert(
            *player_id,
            PlayerMultiplier { player_id: *player_id, value: step.value, last_updated_round: round },
        );
    }

    (updated, flags)
}

/// Season-start multipliers: percentile-derived from prior-season aggregates
/// where available, `neutral` for everyone else.
pub fn initial_multipliers(
    prior: &BTreeMap<PlayerId, SeasonAggregate>,
    players: impl IntoIterator<Item = PlayerId>,
    ruleset: &RuleSet,
) -> BTreeMap<PlayerId, PlayerMultiplier> {
    let targets = compute_targets(prior, ruleset);

    players
        .into_iter()
        .chain(prior.keys().copied())
        .map(|player_id| {
            let value = targets.get(&player_id).copied().unwrap_or(ruleset.multiplier.neutral);
            (player_id, PlayerMultiplier { player_id, value, last_updated_round: 0 })
        })
        .collect()
}
