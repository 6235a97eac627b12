//! # Persistence Layer
//!
//! Durable storage for committed scoring rounds.
//!
//! Each round is stored as one [`RoundCommit`]: team results, league-wide
//! player lines and the multipliers that drifted out of the round. Nothing
//! cumulative is stored; totals, standings and season aggregates are
//! re-derived from the commits, so retrying a round replaces its commit
//! instead of adding to it.
//!
//! ## Architecture
//!
//! - **ScoreStore**: Abstract trait for round storage
//! - **LocalStore**: One (optionally gzipped) JSON file per round
//! - **InMemoryStore**: For tests
//!
//! ## Usage
//!
//! ```rust
//! use persistence::{create_local_store, ScoreStore};
//! use tempfile::TempDir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = TempDir::new()?;
//!     let mut store = create_local_store(temp_dir.path())?;
//!     store.initialize().await?;
//!
//!     assert!(store.committed_rounds().await?.is_empty());
//!     assert_eq!(store.cumulative_total(1).await?, 0.0);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod ledger;
pub mod local;

pub use backend::{InMemoryStore, LocalStore, Multipliers, ScoreStore};
pub use config::PersistenceConfig;
pub use error::{PersistenceError, Result};
pub use ledger::{CommitReceipt, RoundCommit, StoredRound};
pub use local::{create_local_store, create_local_store_with_config};
