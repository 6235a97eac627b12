//! Error types for the scoring engine

use crate::models::{RoundNumber, TeamId};
use thiserror::Error;

/// Result type alias for scoring operations
pub type Result<T> = std::result::Result<T, ScoringError>;

/// Errors that can occur while scoring a round
#[derive(Error, Debug)]
pub enum ScoringError {
    /// A rule set failed validation
    #[error("Invalid rule set {version}: {reason}")]
    InvalidRuleSet { version: String, reason: String },

    #[error("Rule set {0} is already registered")]
    DuplicateRuleSet(String),

    #[error("Rule set {0} not found")]
    RuleSetNotFound(String),

    /// Rule file could not be parsed
    #[error("Rule file error: {0}")]
    RuleFile(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Roster snapshot violates the captain / vice-captain / wicketkeeper rules
    #[error("Invalid membership for team {team_id}: {reason}")]
    InvalidMembership { team_id: TeamId, reason: String },

    #[error("Team {team_id} appears more than once in round {round}")]
    DuplicateTeam { team_id: TeamId, round: RoundNumber },

    #[error("Invalid round number {0}: rounds start at 1")]
    InvalidRound(RoundNumber),
}

impl ScoringError {
    /// Create a new rule set validation error
    pub fn invalid_ruleset(version: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRuleSet { version: version.into(), reason: reason.into() }
    }

    /// Create a new membership validation error
    pub fn invalid_membership(team_id: TeamId, reason: impl Into<String>) -> Self {
        Self::InvalidMembership { team_id, reason: reason.into() }
    }
}
