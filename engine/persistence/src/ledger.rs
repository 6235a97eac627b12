//! Round commits and their on-disk encoding
//!
//! A round is written as a single document holding every team result, the
//! league-wide player lines and the post-drift multipliers. Files are
//! written next to their final name and renamed into place, so a reader
//! sees either the previous commit or the new one, never a mix.

use crate::error::{PersistenceError, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use scoring_engine::{
    AuditFlag, PlayerId, PlayerMultiplier, PlayerRoundLine, RoundNumber, RoundOutcome,
    RoundResult,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Format version written into every stored round
pub const FORMAT_VERSION: &str = "1";

const ROUND_PREFIX: &str = "round_";
const JSON_EXT: &str = ".json";
const GZIP_EXT: &str = ".json.gz";

/// Everything one round writes, stored as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundCommit {
    pub round: RoundNumber,
    pub ruleset_version: String,
    pub results: Vec<RoundResult>,
    pub player_lines: Vec<PlayerRoundLine>,
    /// Multipliers after this round's drift, used to score the next round
    pub multipliers: BTreeMap<PlayerId, PlayerMultiplier>,
    pub flags: Vec<AuditFlag>,
}

impl From<RoundOutcome> for RoundCommit {
    fn from(outcome: RoundOutcome) -> Self {
        // season aggregates are re-derived from stored player lines
        Self {
            round: outcome.round,
            ruleset_version: outcome.ruleset_version,
            results: outcome.results,
            player_lines: outcome.player_lines,
            multipliers: outcome.multipliers,
            flags: outcome.flags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitMetadata {
    pub id: Uuid,
    pub committed_at: DateTime<Utc>,
    pub format_version: String,
    pub compression: Option<String>,
}

impl CommitMetadata {
    pub fn new(compressed: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            committed_at: Utc::now(),
            format_version: FORMAT_VERSION.to_string(),
            compression: compressed.then(|| "gzip".to_string()),
        }
    }
}

/// A round commit as it sits on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRound {
    pub metadata: CommitMetadata,
    pub commit: RoundCommit,
}

/// What a commit did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    pub id: Uuid,
    pub round: RoundNumber,
    /// An earlier commit for the same round was replaced
    pub replaced: bool,
}

pub fn round_file_name(round: RoundNumber, compressed: bool) -> String {
    let ext = if compressed { GZIP_EXT } else { JSON_EXT };
    format!("{ROUND_PREFIX}{round:06}{ext}")
}

/// Round number for a finished round file; temp files and strays give `None`
pub fn parse_round_file_name(name: &str) -> Option<RoundNumber> {
    let stem = name.strip_prefix(ROUND_PREFIX)?;
    let digits = stem.strip_suffix(GZIP_EXT).or_else(|| stem.strip_suffix(JSON_EXT))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn is_gzip(path: &Path) -> bool {
    path.to_str().is_some_and(|p| p.ends_with(".gz"))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write a document to `path` via a temp file and rename.
/// Gzip is used when the path ends in `.gz`.
pub fn write_document<T: Serialize>(path: &Path, value: &T, fsync: bool) -> Result<u64> {
    let tmp = temp_path(path);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .map_err(PersistenceError::Io)?;

    let file = if is_gzip(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, value).map_err(PersistenceError::Serialization)?;
        encoder.finish()?.into_inner().map_err(|e| PersistenceError::Io(e.into_error()))?
    } else {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value).map_err(PersistenceError::Serialization)?;
        writer.into_inner().map_err(|e| PersistenceError::Io(e.into_error()))?
    };

    if fsync {
        file.sync_all()?;
    }
    let size = file.metadata()?.len();
    drop(file);

    std::fs::rename(&tmp, path)?;
    Ok(size)
}

pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(PersistenceError::Io)?;
    let reader: Box<dyn Read> = if is_gzip(path) {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    serde_json::from_reader(reader).map_err(|e| {
        PersistenceError::corruption(format!("cannot decode {}: {}", path.display(), e))
    })
}

/// Read a round file and check it holds the round its name claims
pub fn read_round_file(path: &Path, expected: RoundNumber) -> Result<StoredRound> {
    let stored: StoredRound = read_document(path)?;
    if stored.commit.round != expected {
        return Err(PersistenceError::corruption(format!(
            "{} holds round {}, expected {}",
            path.display(),
            stored.commit.round,
            expected
        )));
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit(round: RoundNumber) -> RoundCommit {
        RoundCommit {
            round,
            ruleset_version: "2024.1".to_string(),
            results: Vec::new(),
            player_lines: Vec::new(),
            multipliers: BTreeMap::from([(
                7,
                PlayerMultiplier { player_id: 7, value: 1.12, last_updated_round: round },
            )]),
            flags: vec![AuditFlag::UnrosteredPlayer { player_id: 9 }],
        }
    }

    #[test]
    fn test_round_file_names() {
        assert_eq!(round_file_name(3, false), "round_000003.json");
        assert_eq!(round_file_name(3, true), "round_000003.json.gz");
        assert_eq!(parse_round_file_name("round_000003.json"), Some(3));
        assert_eq!(parse_round_file_name("round_000012.json.gz"), Some(12));
        assert_eq!(parse_round_file_name("round_000003.json.tmp"), None);
        assert_eq!(parse_round_file_name("baseline.json"), None);
        assert_eq!(parse_round_file_name("round_.json"), None);
    }

    #[test]
    fn test_compressed_document_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(round_file_name(4, true));
        let stored = StoredRound { metadata: CommitMetadata::new(true), commit: commit(4) };

        write_document(&path, &stored, false).unwrap();
        let loaded = read_round_file(&path, 4).unwrap();

        assert_eq!(loaded.commit, stored.commit);
        assert_eq!(loaded.metadata.compression.as_deref(), Some("gzip"));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_round_mismatch_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(round_file_name(5, false));
        let stored = StoredRound { metadata: CommitMetadata::new(false), commit: commit(2) };
        write_document(&path, &stored, false).unwrap();

        let err = read_round_file(&path, 5).unwrap_err();
        assert!(matches!(err, PersistenceError::Corruption(_)));
    }

    #[test]
    fn test_truncated_file_is_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(round_file_name(1, false));
        std::fs::write(&path, b"{\"metadata\":").unwrap();

        assert!(matches!(read_round_file(&path, 1), Err(PersistenceError::Corruption(_))));
    }
}
