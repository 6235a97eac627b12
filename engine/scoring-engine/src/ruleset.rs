//! Versioned scoring rules
//!
//! Tier tables, bonuses, fielding values, multiplier bounds and leadership
//! factors all live in one immutable [`RuleSet`] value. Every calculation in
//! this crate takes a `&RuleSet` explicitly so that several versions can be
//! scored side by side.

use crate::error::{Result, ScoringError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A complete, versioned set of scoring rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Version label (e.g. "2024.1")
    pub version: String,

    /// Batting rules
    pub batting: BattingRules,

    /// Bowling rules
    pub bowling: BowlingRules,

    /// Fielding rules
    pub fielding: FieldingRules,

    /// Player multiplier bounds and drift
    pub multiplier: MultiplierRules,

    /// Captain / vice-captain factors
    pub leadership: LeadershipRules,
}

/// One bucket of a tier table. `to` is inclusive; `None` means open ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub from: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<u32>,
    pub rate: f64,
}

/// Ordered, contiguous tiers starting at unit 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierTable {
    tiers: Vec<Tier>,
}

impl TierTable {
    /// Create a tier table (validated later by [`RuleSet::validate`])
    pub fn new(tiers: Vec<Tier>) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Charge each unit at the rate of the tier it falls in.
    ///
    /// With tiers 1-30 @ 1.0 and 31-49 @ 1.5, the 31st unit costs 1.5 and the
    /// first thirty always cost 1.0 regardless of the final count.
    pub fn marginal_points(&self, count: u32) -> f64 {
        let mut points = 0.0;
        for tier in &self.tiers {
            if count < tier.from {
                break;
            }
            let upper = tier.to.map_or(count, |to| to.min(count));
            let units = upper - tier.from + 1;
            points += f64::from(units) * tier.rate;
        }
        points
    }

    fn validate(&self, name: &str) -> std::result::Result<(), String> {
        let first = self.tiers.first().ok_or_else(|| format!("{name} tier table is empty"))?;
        if first.from != 1 {
            return Err(format!("{name} tiers must start at 1, found {}", first.from));
        }

        let last_index = self.tiers.len() - 1;
        for (index, tier) in self.tiers.iter().enumerate() {
            if !tier.rate.is_finite() || tier.rate < 0.0 {
                return Err(format!("{name} tier starting at {} has invalid rate", tier.from));
            }
            match tier.to {
                Some(to) if to < tier.from => {
                    return Err(format!("{name} tier {}-{} is inverted", tier.from, to));
                }
                None if index != last_index => {
                    return Err(format!("only the last {name} tier may be open ended"));
                }
                _ => {}
            }
            if let Some(next) = self.tiers.get(index + 1) {
                let expected = tier.to.map(|to| to + 1);
                if expected != Some(next.from) {
                    return Err(format!(
                        "{name} tiers are not contiguous at {} (expected {:?})",
                        next.from, expected
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Whether a not-out batter on zero is charged the duck penalty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuckPolicy {
    /// Only a dismissed batter who faced a ball
    #[default]
    DismissedOnly,
    /// Any batter who faced a ball and finished on zero
    IncludeNotOut,
}

/// A run threshold and its one-off bonus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub runs: u32,
    pub bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestones {
    pub fifty: Milestone,
    pub century: Milestone,
}

impl Milestones {
    /// Bonus for the highest milestone reached (never both)
    pub fn bonus_for(&self, runs: u32) -> f64 {
        if runs >= self.century.runs {
            self.century.bonus
        } else if runs >= self.fifty.runs {
            self.fifty.bonus
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattingRules {
    /// Per-run rates
    pub run_tiers: TierTable,

    /// Strike rate treated as neutral (factor 1.0)
    pub reference_strike_rate: f64,

    pub milestones: Milestones,

    /// Points for a duck (zero or negative)
    pub duck_points: f64,

    #[serde(default)]
    pub duck_policy: DuckPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BowlingRules {
    /// Per-wicket rates
    pub wicket_tiers: TierTable,

    /// Economy rate treated as neutral (factor 1.0)
    pub reference_economy: f64,

    /// Flat bonus per maiden over
    pub maiden_bonus: f64,

    /// Wickets needed for the haul bonus
    pub five_wicket_threshold: u32,

    pub five_wicket_bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldingRules {
    pub catch: f64,
    pub stumping: f64,
    pub run_out: f64,

    /// Applied to catch points only, on records flagged as wicketkeeping
    pub wicketkeeper_catch_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierRules {
    pub min: f64,
    pub neutral: f64,
    pub max: f64,

    /// Share of the distance to target covered each round
    pub drift_rate: f64,
}

impl MultiplierRules {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadershipRules {
    pub captain: f64,
    pub vice_captain: f64,
}

/// The reference rule file, embedded at build time
pub const STANDARD_RULES: &str = include_str!("../../../rulesets/standard-2024.1.toml");

impl RuleSet {
    /// The built-in reference rules, parsed from [`STANDARD_RULES`]
    pub fn standard() -> Result<Self> {
        Self::from_toml_str(STANDARD_RULES)
    }

    /// Parse and validate a rule file
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let ruleset: RuleSet = toml::from_str(contents)?;
        ruleset.validate()?;
        Ok(ruleset)
    }

    /// Load and validate a rule file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let ruleset = Self::from_toml_str(&contents)?;
        info!("Loaded rule set {} from {:?}", ruleset.version, path.as_ref());
        Ok(ruleset)
    }

    /// Check internal consistency of every table and bound
    pub fn validate(&self) -> Result<()> {
        self.check().map_err(|reason| ScoringError::invalid_ruleset(&self.version, reason))
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.version.trim().is_empty() {
            return Err("version must not be empty".to_string());
        }

        self.batting.run_tiers.validate("batting")?;
        self.bowling.wicket_tiers.validate("bowling")?;

        positive("reference_strike_rate", self.batting.reference_strike_rate)?;
        positive("reference_economy", self.bowling.reference_economy)?;
        if !(self.batting.duck_points <= 0.0) || !self.batting.duck_points.is_finite() {
            return Err("duck_points must be finite and not positive".to_string());
        }

        let milestones = &self.batting.milestones;
        if milestones.century.runs <= milestones.fifty.runs {
            return Err("century threshold must exceed fifty threshold".to_string());
        }
        non_negative("milestones.fifty.bonus", milestones.fifty.bonus)?;
        non_negative("milestones.century.bonus", milestones.century.bonus)?;
        if milestones.century.bonus < milestones.fifty.bonus {
            return Err("milestone bonuses must be non-decreasing".to_string());
        }

        let bowling = &self.bowling;
        non_negative("bowling.maiden_bonus", bowling.maiden_bonus)?;
        non_negative("bowling.five_wicket_bonus", bowling.five_wicket_bonus)?;
        if bowling.five_wicket_threshold == 0 {
            return Err("five_wicket_threshold must be at least 1".to_string());
        }

        let fielding = &self.fielding;
        non_negative("fielding.catch", fielding.catch)?;
        non_negative("fielding.stumping", fielding.stumping)?;
        non_negative("fielding.run_out", fielding.run_out)?;
        if !(fielding.wicketkeeper_catch_factor >= 1.0)
            || !fielding.wicketkeeper_catch_factor.is_finite()
        {
            return Err(format!(
                "wicketkeeper_catch_factor must be at least 1 (got {})",
                fielding.wicketkeeper_catch_factor
            ));
        }

        let m = &self.multiplier;
        if !(m.min > 0.0 && m.min <= m.neutral && m.neutral <= m.max) || !m.max.is_finite() {
            return Err(format!(
                "multiplier bounds must satisfy 0 < min <= neutral <= max (got {}/{}/{})",
                m.min, m.neutral, m.max
            ));
        }
        if !(0.0..=1.0).contains(&m.drift_rate) {
            return Err(format!("drift_rate {} outside [0, 1]", m.drift_rate));
        }

        positive("leadership.captain", self.leadership.captain)?;
        positive("leadership.vice_captain", self.leadership.vice_captain)?;

        Ok(())
    }
}

fn positive(name: &str, value: f64) -> std::result::Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be finite and positive (got {value})"))
    }
}

fn non_negative(name: &str, value: f64) -> std::result::Result<(), String> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(format!("{name} must be finite and non-negative (got {value})"))
    }
}

/// Several rule set versions held side by side
#[derive(Debug, Clone, Default)]
pub struct RuleSetRegistry {
    rulesets: Vec<RuleSet>,
}

impl RuleSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validated rule set; versions must be unique
    pub fn insert(&mut self, ruleset: RuleSet) -> Result<()> {
        ruleset.validate()?;
        if self.get(&ruleset.version).is_some() {
            return Err(ScoringError::DuplicateRuleSet(ruleset.version));
        }
        self.rulesets.push(ruleset);
        Ok(())
    }

    pub fn get(&self, version: &str) -> Option<&RuleSet> {
        self.rulesets.iter().find(|r| r.version == version)
    }

    /// Look up a version, failing if it is unknown
    pub fn require(&self, version: &str) -> Result<&RuleSet> {
        self.get(version).ok_or_else(|| ScoringError::RuleSetNotFound(version.to_string()))
    }

    /// Most recently registered version
    pub fn latest(&self) -> Option<&RuleSet> {
        self.rulesets.last()
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.rulesets.iter().map(|r| r.version.as_str())
    }
}
