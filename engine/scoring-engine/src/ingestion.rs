//! Ingestion boundary
//!
//! The external pipeline hands over loosely-shaped [`RawPerformance`] rows.
//! They are checked once here and either become strongly-typed
//! [`PerformanceRecord`]s or are quarantined with a reason. Scoring never
//! re-checks field presence or shape.

use crate::models::{MatchId, Overs, PerformanceRecord, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{info, warn};

const MAX_WICKETS: u32 = 10;

/// A performance row as produced by the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPerformance {
    pub player_id: PlayerId,
    pub match_id: MatchId,
    #[serde(default)]
    pub runs: i64,
    #[serde(default)]
    pub balls_faced: i64,
    #[serde(default)]
    pub is_out: bool,
    #[serde(default)]
    pub wickets: i64,
    /// Cricket notation: 3.4 is three overs and four balls
    #[serde(default)]
    pub overs_bowled: f64,
    #[serde(default)]
    pub runs_conceded: i64,
    #[serde(default)]
    pub maidens: i64,
    #[serde(default)]
    pub catches: i64,
    #[serde(default)]
    pub stumpings: i64,
    #[serde(default)]
    pub run_outs: i64,
    #[serde(default)]
    pub is_wicketkeeper: bool,
}

/// Why a raw row was quarantined
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IngestionError {
    #[error("{field} must be a non-negative count, got {value}")]
    InvalidCount { field: String, value: i64 },

    #[error("illegal overs value {0}: expected whole overs and a ball digit 0-5")]
    IllegalOvers(f64),

    #[error("{0} wickets exceeds the maximum of 10")]
    TooManyWickets(u32),

    #[error("{maidens} maidens exceeds {overs} completed overs")]
    TooManyMaidens { maidens: u32, overs: u32 },

    #[error("duplicate record for player {player_id} in match {match_id}")]
    Duplicate { player_id: PlayerId, match_id: MatchId },
}

/// A raw row that failed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantinedRecord {
    pub raw: RawPerformance,
    pub reason: IngestionError,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestedBatch {
    pub records: Vec<PerformanceRecord>,
    pub quarantined: Vec<QuarantinedRecord>,
}

fn count(field: &str, value: i64) -> Result<u32, IngestionError> {
    u32::try_from(value)
        .map_err(|_| IngestionError::InvalidCount { field: field.to_string(), value })
}

/// Parse cricket overs notation into legal balls
pub fn parse_overs(overs: f64) -> Result<Overs, IngestionError> {
    if !overs.is_finite() || overs < 0.0 {
        return Err(IngestionError::IllegalOvers(overs));
    }

    let tenths = (overs * 10.0).round();
    if (overs * 10.0 - tenths).abs() > 1e-6 || tenths > f64::from(u32::MAX) {
        return Err(IngestionError::IllegalOvers(overs));
    }

    let tenths = tenths as u32;
    let (whole, balls) = (tenths / 10, tenths % 10);
    if balls >= Overs::BALLS_PER_OVER {
        return Err(IngestionError::IllegalOvers(overs));
    }
    Ok(Overs::new(whole, balls))
}

/// Validate one raw row
pub fn validate(raw: &RawPerformance) -> Result<PerformanceRecord, IngestionError> {
    let wickets = count("wickets", raw.wickets)?;
    if wickets > MAX_WICKETS {
        return Err(IngestionError::TooManyWickets(wickets));
    }

    let overs_bowled = parse_overs(raw.overs_bowled)?;
    let maidens = count("maidens", raw.maidens)?;
    let completed_overs = overs_bowled.balls() / Overs::BALLS_PER_OVER;
    if maidens > completed_overs {
        return Err(IngestionError::TooManyMaidens { maidens, overs: completed_overs });
    }

    Ok(PerformanceRecord {
        player_id: raw.player_id,
        match_id: raw.match_id,
        runs: count("runs", raw.runs)?,
        balls_faced: count("balls_faced", raw.balls_faced)?,
        is_out: raw.is_out,
        wickets,
        overs_bowled,
        runs_conceded: count("runs_conceded", raw.runs_conceded)?,
        maidens,
        catches: count("catches", raw.catches)?,
        stumpings: count("stumpings", raw.stumpings)?,
        run_outs: count("run_outs", raw.run_outs)?,
        is_wicketkeeper: raw.is_wicketkeeper,
    })
}

/// Validate a batch. Bad rows are quarantined, never fatal. The first row for
/// a (player, match) pair wins; later copies are quarantined as duplicates.
pub fn ingest_batch(raws: impl IntoIterator<Item = RawPerformance>) -> IngestedBatch {
    let mut batch = IngestedBatch::default();
    let mut seen = BTreeSet::new();

    for raw in raws {
        let outcome = if seen.contains(&(raw.player_id, raw.match_id)) {
            Err(IngestionError::Duplicate { player_id: raw.player_id, match_id: raw.match_id })
        } else {
            validate(&raw)
        };

        match outcome {
            Ok(record) => {
                seen.insert((record.player_id, record.match_id));
                batch.records.push(record);
            }
            Err(reason) => {
                warn!(
                    "Quarantined record for player {} match {}: {}",
                    raw.player_id, raw.match_id, reason
                );
                batch.quarantined.push(QuarantinedRecord { raw, reason });
            }
        }
    }

    info!(
        "Ingested {} records ({} quarantined)",
        batch.records.len(),
        batch.quarantined.len()
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(player_id: PlayerId, match_id: MatchId) -> RawPerformance {
        RawPerformance {
            player_id,
            match_id,
            runs: 0,
            balls_faced: 0,
            is_out: false,
            wickets: 0,
            overs_bowled: 0.0,
            runs_conceded: 0,
            maidens: 0,
            catches: 0,
            stumpings: 0,
            run_outs: 0,
            is_wicketkeeper: false,
        }
    }

    #[test]
    fn test_parse_overs_notation() {
        assert_eq!(parse_overs(0.0).unwrap().balls(), 0);
        assert_eq!(parse_overs(3.4).unwrap().balls(), 22);
        assert_eq!(parse_overs(10.0).unwrap().balls(), 60);
        assert!(parse_overs(3.6).is_err());
        assert!(parse_overs(3.45).is_err());
        assert!(parse_overs(-1.0).is_err());
        assert!(parse_overs(f64::NAN).is_err());
    }

    #[test]
    fn test_valid_row_becomes_record() {
        let row = RawPerformance {
            runs: 44,
            balls_faced: 31,
            is_out: true,
            wickets: 2,
            overs_bowled: 4.0,
            runs_conceded: 27,
            maidens: 1,
            catches: 1,
            ..raw(5, 9)
        };

        let record = validate(&row).unwrap();

        assert_eq!(record.runs, 44);
        assert_eq!(record.overs_bowled, Overs::new(4, 0));
        assert_eq!(record.maidens, 1);
    }

    #[test]
    fn test_negative_counts_rejected() {
        let row = RawPerformance { runs: -4, ..raw(1, 1) };
        assert_eq!(
            validate(&row).unwrap_err(),
            IngestionError::InvalidCount { field: "runs".to_string(), value: -4 }
        );
    }

    #[test]
    fn test_impossible_bowling_rejected() {
        let too_many_wickets = RawPerformance { wickets: 11, overs_bowled: 10.0, ..raw(1, 1) };
        assert_eq!(validate(&too_many_wickets).unwrap_err(), IngestionError::TooManyWickets(11));

        let too_many_maidens = RawPerformance { maidens: 3, overs_bowled: 2.5, ..raw(1, 1) };
        assert!(matches!(
            validate(&too_many_maidens).unwrap_err(),
            IngestionError::TooManyMaidens { maidens: 3, overs: 2 }
        ));
    }

    #[test]
    fn test_zero_overs_with_runs_passes_ingestion() {
        // wides only: the calculator handles the zero denominator
        let row = RawPerformance { runs_conceded: 5, ..raw(1, 1) };
        assert!(validate(&row).is_ok());
    }

    #[test]
    fn test_batch_quarantines_bad_rows_without_aborting() {
        let rows = vec![
            RawPerformance { runs: 12, balls_faced: 9, ..raw(1, 1) },
            RawPerformance { overs_bowled: 1.7, ..raw(2, 1) },
            RawPerformance { runs: 99, balls_faced: 60, ..raw(1, 1) },
            RawPerformance { catches: 2, ..raw(3, 1) },
        ];

        let batch = ingest_batch(rows);

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].runs, 12);
        assert_eq!(batch.quarantined.len(), 2);
        assert!(matches!(batch.quarantined[0].reason, IngestionError::IllegalOvers(_)));
        assert!(matches!(
            batch.quarantined[1].reason,
            IngestionError::Duplicate { player_id: 1, match_id: 1 }
        ));
    }
}
