//! Score store trait and implementations

use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, Result};
use crate::ledger::{
    parse_round_file_name, read_document, read_round_file, round_file_name, write_document,
    CommitMetadata, CommitReceipt, RoundCommit, StoredRound,
};
use scoring_engine::aggregator::season_totals;
use scoring_engine::{
    PlayerId, PlayerMultiplier, RoundLedger, RoundNumber, RoundResult, SeasonAggregate, TeamId,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type Multipliers = BTreeMap<PlayerId, PlayerMultiplier>;

/// Durable home of committed rounds.
///
/// Only the round commit and the season baseline are stored; cumulative
/// totals, standings and season aggregates are always derived from them, so
/// re-committing a round can never double count.
#[async_trait::async_trait]
pub trait ScoreStore: Send + Sync {
    /// Initialize the store
    async fn initialize(&mut self) -> Result<()>;

    /// Store a round, replacing any earlier commit for the same round
    async fn commit_round(&self, commit: RoundCommit) -> Result<CommitReceipt>;

    async fn load_round(&self, round: RoundNumber) -> Result<Option<RoundCommit>>;

    /// Committed round numbers, ascending
    async fn committed_rounds(&self) -> Result<Vec<RoundNumber>>;

    /// Season-start multipliers
    async fn store_baseline(&self, multipliers: &Multipliers) -> Result<()>;

    async fn load_baseline(&self) -> Result<Option<Multipliers>>;

    fn config(&self) -> &PersistenceConfig;

    /// All stored team results
    async fn ledger(&self) -> Result<RoundLedger> {
        let mut ledger = RoundLedger::new();
        for round in self.committed_rounds().await? {
            let commit = self.require_round(round).await?;
            for result in commit.results {
                ledger.upsert(result);
            }
        }
        Ok(ledger)
    }

    async fn round_results(&self, team_id: TeamId) -> Result<Vec<RoundResult>> {
        Ok(self.ledger().await?.rounds_for(team_id).cloned().collect())
    }

    /// Sum of the team's stored round totals
    async fn cumulative_total(&self, team_id: TeamId) -> Result<f64> {
        Ok(self.ledger().await?.cumulative_total(team_id))
    }

    /// Season totals summed from the player lines of rounds `1..=through_round`
    async fn season_aggregates(
        &self,
        through_round: RoundNumber,
    ) -> Result<BTreeMap<PlayerId, SeasonAggregate>> {
        let mut lines = Vec::new();
        for round in self.committed_rounds().await?.into_iter().filter(|r| *r <= through_round) {
            lines.extend(self.require_round(round).await?.player_lines);
        }
        Ok(season_totals(&lines))
    }

    /// Multipliers as they stood after `round`; round 0 is the baseline
    async fn multipliers_after(&self, round: RoundNumber) -> Result<Multipliers> {
        if round == 0 {
            return Ok(self.load_baseline().await?.unwrap_or_default());
        }
        Ok(self.require_round(round).await?.multipliers)
    }

    /// Multipliers after the latest committed round, else the baseline
    async fn current_multipliers(&self) -> Result<Multipliers> {
        let latest = self.committed_rounds().await?.last().copied().unwrap_or(0);
        self.multipliers_after(latest).await
    }

    async fn require_round(&self, round: RoundNumber) -> Result<RoundCommit> {
        self.load_round(round).await?.ok_or(PersistenceError::RoundNotFound(round))
    }
}

/// Local file-based store: one JSON document per round
pub struct LocalStore {
    config: PersistenceConfig,
    write_lock: Mutex<()>,
    initialized: bool,
}

impl LocalStore {
    pub fn new(config: PersistenceConfig) -> Result<Self> {
        config.validate().map_err(PersistenceError::config)?;
        Ok(Self { config, write_lock: Mutex::new(()), initialized: false })
    }

    pub fn with_default_config(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(PersistenceConfig::new(data_dir))
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.config.data_dir
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(PersistenceError::not_initialized())
        }
    }

    /// Finished files for a round, in either encoding. Both exist only if a
    /// commit died before removing the copy it replaced.
    fn round_paths(&self, round: RoundNumber) -> Vec<PathBuf> {
        let dir = self.config.rounds_dir();
        [true, false]
            .into_iter()
            .map(|compressed| dir.join(round_file_name(round, compressed)))
            .filter(|path| path.exists())
            .collect()
    }
}

#[async_trait::async_trait]
impl ScoreStore for LocalStore {
    async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        std::fs::create_dir_all(self.config.rounds_dir()).map_err(PersistenceError::Io)?;
        self.initialized = true;

        info!("Local score store initialized at: {:?}", self.config.data_dir);
        Ok(())
    }

    async fn commit_round(&self, commit: RoundCommit) -> Result<CommitReceipt> {
        self.ensure_initialized()?;
        let _guard = self.write_lock.lock().await;

        let round = commit.round;
        let compressed = self.config.compress;
        let path = self.config.rounds_dir().join(round_file_name(round, compressed));
        let existing = self.round_paths(round);

        let stored = StoredRound { metadata: CommitMetadata::new(compressed), commit };
        let size = write_document(&path, &stored, self.config.fsync_on_commit)?;

        // a round written earlier in the other encoding must not shadow this one
        for stale in existing.iter().filter(|p| **p != path) {
            std::fs::remove_file(stale)?;
        }

        let replaced = !existing.is_empty();
        if replaced {
            info!("Replaced round {} commit ({} bytes)", round, size);
        } else {
            info!("Committed round {} ({} bytes)", round, size);
        }

        Ok(CommitReceipt { id: stored.metadata.id, round, replaced })
    }

    async fn load_round(&self, round: RoundNumber) -> Result<Option<RoundCommit>> {
        self.ensure_initialized()?;

        let mut copies = Vec::new();
        for path in self.round_paths(round) {
            debug!("Loading round {} from {:?}", round, path);
            copies.push(read_round_file(&path, round)?);
        }

        // a crash between rename and cleanup leaves both encodings behind
        if copies.len() > 1 {
            warn!("Round {} is stored in both encodings; using the newest commit", round);
        }
        Ok(copies.into_iter().max_by_key(|stored| stored.metadata.committed_at).map(|s| s.commit))
    }

    async fn committed_rounds(&self) -> Result<Vec<RoundNumber>> {
        self.ensure_initialized()?;

        let mut rounds = Vec::new();
        for entry in std::fs::read_dir(self.config.rounds_dir())? {
            let entry = entry?;
            match entry.file_name().to_str().and_then(parse_round_file_name) {
                Some(round) => rounds.push(round),
                None => warn!("Ignoring unexpected file in rounds dir: {:?}", entry.path()),
            }
        }

        rounds.sort_unstable();
        rounds.dedup();
        Ok(rounds)
    }

    async fn store_baseline(&self, multipliers: &Multipliers) -> Result<()> {
        self.ensure_initialized()?;
        let _guard = self.write_lock.lock().await;

        write_document(&self.config.baseline_path(), multipliers, self.config.fsync_on_commit)?;
        info!("Stored season baseline for {} players", multipliers.len());
        Ok(())
    }

    async fn load_baseline(&self) -> Result<Option<Multipliers>> {
        self.ensure_initialized()?;

        let path = self.config.baseline_path();
        if !path.exists() {
            return Ok(None);
        }
        read_document(&path).map(Some)
    }

    fn config(&self) -> &PersistenceConfig {
        &self.config
    }
}

/// In-memory store (for testing)
pub struct InMemoryStore {
    config: PersistenceConfig,
    rounds: Arc<Mutex<BTreeMap<RoundNumber, RoundCommit>>>,
    baseline: Arc<Mutex<Option<Multipliers>>>,
    initialized: bool,
}

impl InMemoryStore {
    pub fn new(config: PersistenceConfig) -> Self {
        Self {
            config,
            rounds: Arc::new(Mutex::new(BTreeMap::new())),
            baseline: Arc::new(Mutex::new(None)),
            initialized: false,
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(PersistenceConfig::default())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(PersistenceError::not_initialized())
        }
    }
}

#[async_trait::async_trait]
impl ScoreStore for InMemoryStore {
    async fn initialize(&mut self) -> Result<()> {
        if !self.initialized {
            self.initialized = true;
            info!("In-memory score store initialized");
        }
        Ok(())
    }

    async fn commit_round(&self, commit: RoundCommit) -> Result<CommitReceipt> {
        self.ensure_initialized()?;

        let round = commit.round;
        let replaced = self.rounds.lock().await.insert(round, commit).is_some();
        Ok(CommitReceipt { id: Uuid::new_v4(), round, replaced })
    }

    async fn load_round(&self, round: RoundNumber) -> Result<Option<RoundCommit>> {
        self.ensure_initialized()?;
        Ok(self.rounds.lock().await.get(&round).cloned())
    }

    async fn committed_rounds(&self) -> Result<Vec<RoundNumber>> {
        self.ensure_initialized()?;
        Ok(self.rounds.lock().await.keys().copied().collect())
    }

    async fn store_baseline(&self, multipliers: &Multipliers) -> Result<()> {
        self.ensure_initialized()?;
        *self.baseline.lock().await = Some(multipliers.clone());
        Ok(())
    }

    async fn load_baseline(&self) -> Result<Option<Multipliers>> {
        self.ensure_initialized()?;
        Ok(self.baseline.lock().await.clone())
    }

    fn config(&self) -> &PersistenceConfig {
        &self.config
    }
}
