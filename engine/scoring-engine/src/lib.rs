//! Fantasy Scoring & Multiplier Engine
//!
//! Turns raw cricket performances into fantasy points, keeps each player's
//! handicap multiplier drifting across a season, and aggregates both into
//! per-round team results whose cumulative totals are always re-derived from
//! what is stored.
//!
//! ## Architecture
//!
//! - **calculator**: one performance + rule set -> [`PointsBreakdown`]
//! - **multiplier**: cohort-anchored initial multipliers and bounded drift
//! - **aggregator**: team rounds, league-wide dedup, [`RoundLedger`]
//! - **engine**: the pure per-round pipeline ([`RoundEngine`])
//! - **ingestion**: raw rows -> validated [`PerformanceRecord`]s
//! - **ruleset**: versioned, immutable [`RuleSet`] values

pub mod aggregator;
pub mod calculator;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod models;
pub mod multiplier;
pub mod ruleset;

pub use aggregator::{compute_round, RoundLedger};
pub use calculator::score;
pub use engine::{PriorState, RoundEngine, RoundInput, RoundOutcome};
pub use error::{Result, ScoringError};
pub use ingestion::{ingest_batch, IngestedBatch, IngestionError, RawPerformance};
pub use models::*;
pub use multiplier::{drift, initial_multiplier};
pub use ruleset::{DuckPolicy, RuleSet, RuleSetRegistry};
