//! Local file-based round store

use crate::backend::LocalStore;
use crate::config::PersistenceConfig;
use crate::error::Result;

/// Create a new local store with default configuration
pub fn create_local_store(data_dir: impl Into<std::path::PathBuf>) -> Result<LocalStore> {
    LocalStore::with_default_config(data_dir)
}

/// Create a new local store with custom configuration
pub fn create_local_store_with_config(config: PersistenceConfig) -> Result<LocalStore> {
    LocalStore::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScoreStore;
    use crate::ledger::{
        read_round_file, round_file_name, write_document, CommitMetadata, RoundCommit,
        StoredRound,
    };
    use scoring_engine::{PlayerMultiplier, PlayerRoundLine, RoundResult, StatLine};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn commit(round: u32, team_total: f64) -> RoundCommit {
        RoundCommit {
            round,
            ruleset_version: "2024.1".to_string(),
            results: vec![RoundResult {
                team_id: 1,
                round,
                ruleset_version: "2024.1".to_string(),
                total: team_total,
                players: BTreeMap::new(),
            }],
            player_lines: vec![PlayerRoundLine {
                player_id: 4,
                round,
                line: StatLine { matches: 1, wickets: 2, raw_points: 40.0, ..Default::default() },
            }],
            multipliers: BTreeMap::from([(
                4,
                PlayerMultiplier { player_id: 4, value: 0.93, last_updated_round: round },
            )]),
            flags: Vec::new(),
        }
    }

    async fn open(dir: &TempDir, compress: bool) -> LocalStore {
        let config = PersistenceConfig::new(dir.path()).with_compression(compress);
        let mut store = create_local_store_with_config(config).unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_local_store_creation() {
        let temp_dir = TempDir::new().unwrap();

        let store = create_local_store(temp_dir.path()).unwrap();
        assert_eq!(store.data_dir(), &temp_dir.path().to_path_buf());
    }

    #[tokio::test]
    async fn test_initialization_creates_rounds_dir() {
        let temp_dir = TempDir::new().unwrap();

        let store = open(&temp_dir, false).await;

        assert!(store.data_dir().join("rounds").exists());
        assert!(store.committed_rounds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rounds_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = open(&temp_dir, true).await;
            store.commit_round(commit(1, 120.0)).await.unwrap();
            store.commit_round(commit(2, 80.5)).await.unwrap();
        }

        let store = open(&temp_dir, true).await;

        assert_eq!(store.committed_rounds().await.unwrap(), vec![1, 2]);
        assert_eq!(store.load_round(2).await.unwrap(), Some(commit(2, 80.5)));
        assert_eq!(store.cumulative_total(1).await.unwrap(), 200.5);
        assert_eq!(store.season_aggregates(2).await.unwrap()[&4].totals.wickets, 4);
    }

    #[tokio::test]
    async fn test_recommit_replaces_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, false).await;

        let first = store.commit_round(commit(1, 120.0)).await.unwrap();
        let second = store.commit_round(commit(1, 120.0)).await.unwrap();

        assert!(!first.replaced);
        assert!(second.replaced);
        assert_ne!(first.id, second.id);
        assert_eq!(store.cumulative_total(1).await.unwrap(), 120.0);
    }

    #[tokio::test]
    async fn test_switching_compression_leaves_one_copy() {
        let temp_dir = TempDir::new().unwrap();
        open(&temp_dir, false).await.commit_round(commit(1, 10.0)).await.unwrap();

        let store = open(&temp_dir, true).await;
        store.commit_round(commit(1, 12.0)).await.unwrap();

        let rounds_dir = temp_dir.path().join("rounds");
        assert!(!rounds_dir.join(round_file_name(1, false)).exists());
        assert!(rounds_dir.join(round_file_name(1, true)).exists());
        assert_eq!(store.cumulative_total(1).await.unwrap(), 12.0);
    }

    #[tokio::test]
    async fn test_leftover_copy_in_other_encoding_does_not_shadow_newer_commit() {
        let temp_dir = TempDir::new().unwrap();
        open(&temp_dir, true).await.commit_round(commit(1, 10.0)).await.unwrap();

        // the replacing commit was renamed into place but the old gzip copy
        // was never removed
        let rounds_dir = temp_dir.path().join("rounds");
        let stale = read_round_file(&rounds_dir.join(round_file_name(1, true)), 1).unwrap();
        let mut metadata = CommitMetadata::new(false);
        metadata.committed_at = stale.metadata.committed_at + chrono::Duration::seconds(1);
        let newer = StoredRound { metadata, commit: commit(1, 99.0) };
        write_document(&rounds_dir.join(round_file_name(1, false)), &newer, false).unwrap();

        for compress in [false, true] {
            let store = open(&temp_dir, compress).await;
            assert_eq!(store.committed_rounds().await.unwrap(), vec![1]);
            assert_eq!(store.cumulative_total(1).await.unwrap(), 99.0);
        }

        // the next commit of the round clears the leftover
        let store = open(&temp_dir, false).await;
        assert!(store.commit_round(commit(1, 99.0)).await.unwrap().replaced);
        assert!(!rounds_dir.join(round_file_name(1, true)).exists());
        assert_eq!(store.cumulative_total(1).await.unwrap(), 99.0);
    }

    #[tokio::test]
    async fn test_interrupted_write_is_invisible() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, false).await;
        store.commit_round(commit(1, 50.0)).await.unwrap();

        // a crash mid-write leaves only the temp file behind
        let rounds_dir = temp_dir.path().join("rounds");
        std::fs::write(rounds_dir.join("round_000002.json.tmp"), b"{\"meta").unwrap();

        assert_eq!(store.committed_rounds().await.unwrap(), vec![1]);
        assert_eq!(store.load_round(2).await.unwrap(), None);
        assert_eq!(store.cumulative_total(1).await.unwrap(), 50.0);
    }

    #[tokio::test]
    async fn test_baseline_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = open(&temp_dir, false).await;
        assert_eq!(store.load_baseline().await.unwrap(), None);

        let baseline = BTreeMap::from([(
            4,
            PlayerMultiplier { player_id: 4, value: 3.2, last_updated_round: 0 },
        )]);
        store.store_baseline(&baseline).await.unwrap();

        assert_eq!(store.current_multipliers().await.unwrap(), baseline);
    }
}
