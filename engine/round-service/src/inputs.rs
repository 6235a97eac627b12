//! JSON input files for the CLI

use anyhow::{Context, Result};
use scoring_engine::{
    ingest_batch, IngestedBatch, PlayerId, RawPerformance, SeasonAggregate, TeamMembership,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {:?}", path))
}

/// Raw performance rows, validated; bad rows come back quarantined
pub fn load_performances(path: &Path) -> Result<IngestedBatch> {
    let raws: Vec<RawPerformance> = read_json(path)?;
    Ok(ingest_batch(raws))
}

pub fn load_memberships(path: &Path) -> Result<Vec<TeamMembership>> {
    read_json(path)
}

/// Prior-season aggregates used to seed multipliers
pub fn load_aggregates(path: &Path) -> Result<BTreeMap<PlayerId, SeasonAggregate>> {
    let aggregates: Vec<SeasonAggregate> = read_json(path)?;
    Ok(aggregates.into_iter().map(|a| (a.player_id, a)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_performances_are_ingested() {
        let file = json_file(
            r#"[
                {"player_id": 1, "match_id": 10, "runs": 42, "balls_faced": 30, "is_out": true},
                {"player_id": 2, "match_id": 10, "wickets": 2, "overs_bowled": 3.4, "runs_conceded": 21},
                {"player_id": 3, "match_id": 10, "overs_bowled": 2.7}
            ]"#,
        );

        let batch = load_performances(file.path()).unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[1].overs_bowled.balls(), 22);
        assert_eq!(batch.quarantined.len(), 1);
        assert_eq!(batch.quarantined[0].raw.player_id, 3);
    }

    #[test]
    fn test_memberships_parse() {
        let file = json_file(
            r#"[{"team_id": 5, "players": [1, 2, 3], "captain": 1, "vice_captain": 2, "wicketkeeper": 3}]"#,
        );

        let teams = load_memberships(file.path()).unwrap();

        assert_eq!(teams[0].team_id, 5);
        assert!(teams[0].contains(3));
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let file = json_file("{not json");
        let err = load_memberships(file.path()).unwrap_err();
        assert!(format!("{err}").contains("Failed to parse"));
    }
}
