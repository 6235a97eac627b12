use crate::models::*;
use crate::ruleset::{BattingRules, BowlingRules, DuckPolicy, FieldingRules, RuleSet};
use std::collections::BTreeMap;
use tracing::debug;

/// Score one match performance into raw fantasy points.
///
/// Zero denominators (no balls faced, no overs bowled, nothing conceded) fall
/// back to a neutral factor of 1.0 and are reported in `flags`; they never
/// fail the record.
pub fn score(record: &PerformanceRecord, ruleset: &RuleSet) -> PointsBreakdown {
    let mut flags = Vec::new();

    let batting = batting_points(record, &ruleset.batting, &mut flags);
    let bowling = bowling_points(record, &ruleset.bowling, &mut flags);
    let fielding = fielding_points(record, &ruleset.fielding);
    let total = batting.total + bowling.total + fielding.total;

    debug!(
        "Scored player {} match {}: batting {:.2}, bowling {:.2}, fielding {:.2}, total {:.2}",
        record.player_id, record.match_id, batting.total, bowling.total, fielding.total, total
    );

    PointsBreakdown {
        player_id: record.player_id,
        match_id: record.match_id,
        batting,
        bowling,
        fielding,
        total,
        flags,
    }
}

/// Score a batch, grouped by player in id order
pub fn score_many(
    records: &[PerformanceRecord],
    ruleset: &RuleSet,
) -> BTreeMap<PlayerId, Vec<PointsBreakdown>> {
    let mut scored: BTreeMap<PlayerId, Vec<PointsBreakdown>> = BTreeMap::new();
    for record in records {
        scored.entry(record.player_id).or_default().push(score(record, ruleset));
    }
    scored
}

pub fn batting_points(
    record: &PerformanceRecord,
    rules: &BattingRules,
    flags: &mut Vec<DataQualityFlag>,
) -> BattingPoints {
    let run_points = rules.run_tiers.marginal_points(record.runs);

    let strike_rate_factor = if record.balls_faced > 0 {
        let strike_rate = f64::from(record.runs) * 100.0 / f64::from(record.balls_faced);
        strike_rate / rules.reference_strike_rate
    } else {
        if record.runs > 0 {
            flags.push(DataQualityFlag::ZeroBallsFaced);
        }
        1.0
    };

    let milestone_bonus = rules.milestones.bonus_for(record.runs);
    let duck_points = if is_duck(record, rules.duck_policy) { rules.duck_points } else { 0.0 };

    BattingPoints {
        run_points,
        strike_rate_factor,
        milestone_bonus,
        duck_points,
        total: run_points * strike_rate_factor + milestone_bonus + duck_points,
    }
}

/// A duck needs at least one ball faced; not-out zeros depend on the policy
fn is_duck(record: &PerformanceRecord, policy: DuckPolicy) -> bool {
    if record.runs != 0 || record.balls_faced == 0 {
        return false;
    }
    match policy {
        DuckPolicy::DismissedOnly => record.is_out,
        DuckPolicy::IncludeNotOut => true,
    }
}

pub fn bowling_points(
    record: &PerformanceRecord,
    rules: &BowlingRules,
    flags: &mut Vec<DataQualityFlag>,
) -> BowlingPoints {
    let wicket_points = rules.wicket_tiers.marginal_points(record.wickets);

    let economy_factor = if record.overs_bowled.is_zero() {
        if record.wickets > 0 || record.runs_conceded > 0 || record.maidens > 0 {
            flags.push(DataQualityFlag::ZeroOversBowled);
        }
        1.0
    } else if record.runs_conceded == 0 {
        if wicket_points > 0.0 {
            flags.push(DataQualityFlag::ZeroRunsConceded);
        }
        1.0
    } else {
        let economy = f64::from(record.runs_conceded) / record.overs_bowled.as_overs();
        rules.reference_economy / economy
    };

    let maiden_points = f64::from(record.maidens) * rules.maiden_bonus;
    let haul_bonus =
        if record.wickets >= rules.five_wicket_threshold { rules.five_wicket_bonus } else { 0.0 };

    BowlingPoints {
        wicket_points,
        economy_factor,
        maiden_points,
        haul_bonus,
        total: wicket_points * economy_factor + maiden_points + haul_bonus,
    }
}

pub fn fielding_points(record: &PerformanceRecord, rules: &FieldingRules) -> FieldingPoints {
    let keeper_factor = if record.is_wicketkeeper { rules.wicketkeeper_catch_factor } else { 1.0 };

    let catch_points = f64::from(record.catches) * rules.catch * keeper_factor;
    let stumping_points = f64::from(record.stumpings) * rules.stumping;
    let run_out_points = f64::from(record.run_outs) * rules.run_out;

    FieldingPoints {
        catch_points,
        stumping_points,
        run_out_points,
        total: catch_points + stumping_points + run_out_points,
    }
}
