//! Fantasy Scoring Round Service
//!
//! Command-line entry point: seed a season, run rounds, and inspect the
//! stored results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use persistence::{create_local_store_with_config, LocalStore, ScoreStore};
use round_service::{
    initialize_logging, inputs, load_configuration, RoundService, ServiceConfig,
};
use scoring_engine::{calculator, PointsBreakdown, RoundNumber, RuleSet, TeamId};

#[derive(Parser)]
#[command(name = "round-service")]
#[command(about = "Fantasy cricket scoring: run rounds and inspect standings")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store season-start multipliers
    InitSeason {
        /// Prior-season aggregates (JSON array)
        #[arg(long)]
        prior: Option<PathBuf>,

        /// Team memberships whose players should get a baseline (JSON array)
        #[arg(long)]
        rosters: Option<PathBuf>,
    },

    /// Score a round and commit it; re-running a round replaces its commit
    RunRound {
        #[arg(short, long)]
        round: RoundNumber,

        /// Raw performance rows (JSON array)
        #[arg(long)]
        performances: PathBuf,

        /// Team memberships for the round (JSON array)
        #[arg(long)]
        rosters: PathBuf,
    },

    /// Teams ranked by cumulative total
    Standings,

    /// One team's stored rounds
    Team { team_id: TeamId },

    /// League-wide leaders by raw points
    TopScorers {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Score a performance file without storing anything
    Score {
        performances: PathBuf,

        /// Rule set file (defaults to the configured rule set)
        #[arg(long)]
        ruleset: Option<PathBuf>,

        /// Second rule set to compare against
        #[arg(long)]
        compare: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ScoreRow {
    breakdown: PointsBreakdown,
    #[serde(skip_serializing_if = "Option::is_none")]
    compared: Option<PointsBreakdown>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = load_configuration(cli.config.as_deref())?;
    initialize_logging(&config.logging)?;
    info!("Starting round service v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::InitSeason { prior, rosters } => {
            let service = open_service(&config).await?;
            init_season(&service, prior.as_deref(), rosters.as_deref(), cli.json).await?
        }
        Commands::RunRound { round, performances, rosters } => {
            let service = open_service(&config).await?;
            run_round(&service, round, &performances, &rosters, cli.json).await?
        }
        Commands::Standings => {
            let service = open_service(&config).await?;
            let standings = service.standings().await?;
            if cli.json {
                print_json(&standings)?;
            } else {
                println!("{:>4}  {:>6}  {:>12}  {:>6}", "Rank", "Team", "Total", "Rounds");
                for s in &standings {
                    println!(
                        "{:>4}  {:>6}  {:>12.2}  {:>6}",
                        s.rank, s.team_id, s.cumulative_total, s.rounds_counted
                    );
                }
            }
        }
        Commands::Team { team_id } => {
            let service = open_service(&config).await?;
            let history = service.team_history(team_id).await?;
            if cli.json {
                print_json(&history)?;
            } else {
                println!("Team {} ({} rounds)", history.team_id, history.rounds.len());
                for result in &history.rounds {
                    println!(
                        "  round {:>3}  {:>10.2}  ({})",
                        result.round, result.total, result.ruleset_version
                    );
                }
                println!("  cumulative  {:>10.2}", history.cumulative_total);
            }
        }
        Commands::TopScorers { limit } => {
            let service = open_service(&config).await?;
            let leaders = service.top_scorers(limit).await?;
            if cli.json {
                print_json(&leaders)?;
            } else {
                println!("{:>6}  {:>8}  {:>10}", "Player", "Matches", "Points");
                for leader in &leaders {
                    println!(
                        "{:>6}  {:>8}  {:>10.2}",
                        leader.player_id,
                        leader.totals.matches,
                        leader.raw_score()
                    );
                }
            }
        }
        Commands::Score { performances, ruleset, compare } => {
            score(&config, &performances, ruleset.as_deref(), compare.as_deref(), cli.json)?
        }
    }

    Ok(())
}

/// Rule set plus an initialized local store
async fn open_service(config: &ServiceConfig) -> Result<RoundService<LocalStore>> {
    let ruleset = config.load_ruleset()?;
    info!("Using rule set {}", ruleset.version);

    let mut store = create_local_store_with_config(config.persistence())
        .context("Failed to create score store")?;
    store.initialize().await.context("Failed to initialize score store")?;
    Ok(RoundService::new(store, ruleset))
}

async fn init_season(
    service: &RoundService<LocalStore>,
    prior: Option<&Path>,
    rosters: Option<&Path>,
    json: bool,
) -> Result<()> {
    let prior = match prior {
        Some(path) => inputs::load_aggregates(path)?,
        None => BTreeMap::new(),
    };
    let players: Vec<_> = match rosters {
        Some(path) => inputs::load_memberships(path)?
            .into_iter()
            .flat_map(|m| m.players.into_iter())
            .collect(),
        None => Vec::new(),
    };

    let baseline = service.initialize_season(&prior, players).await?;
    if json {
        print_json(&baseline)?;
    } else {
        println!("Stored baseline multipliers for {} players", baseline.len());
    }
    Ok(())
}

async fn run_round(
    service: &RoundService<LocalStore>,
    round: RoundNumber,
    performances: &Path,
    rosters: &Path,
    json: bool,
) -> Result<()> {
    let batch = inputs::load_performances(performances)?;
    if !batch.quarantined.is_empty() {
        warn!("{} performance rows quarantined and not scored", batch.quarantined.len());
    }
    let memberships = inputs::load_memberships(rosters)?;

    let run = service
        .run_round(round, &batch.records, &memberships)
        .await
        .with_context(|| format!("Round {} was not committed", round))?;

    if json {
        print_json(&run.commit)?;
    } else {
        let verb = if run.receipt.replaced { "Replaced" } else { "Committed" };
        println!("{} round {} ({})", verb, run.commit.round, run.commit.ruleset_version);
        for result in &run.commit.results {
            println!("  team {:>6}  {:>10.2}", result.team_id, result.total);
        }
        if !run.commit.flags.is_empty() {
            println!("  {} audit flags", run.commit.flags.len());
        }
    }
    Ok(())
}

fn score(
    config: &ServiceConfig,
    performances: &Path,
    ruleset: Option<&Path>,
    compare: Option<&Path>,
    json: bool,
) -> Result<()> {
    let primary = match ruleset {
        Some(path) => RuleSet::load(path)?,
        None => config.load_ruleset()?,
    };
    let other = compare.map(RuleSet::load).transpose()?;
    let batch = inputs::load_performances(performances)?;

    let rows: Vec<ScoreRow> = batch
        .records
        .iter()
        .map(|record| ScoreRow {
            breakdown: calculator::score(record, &primary),
            compared: other.as_ref().map(|rules| calculator::score(record, rules)),
        })
        .collect();

    if json {
        return print_json(&rows);
    }

    match &other {
        Some(rules) => println!(
            "{:>6}  {:>6}  {:>10}  {:>10}  {:>8}",
            "Player", "Match", primary.version, rules.version, "Diff"
        ),
        None => println!(
            "{:>6}  {:>6}  {:>8}  {:>8}  {:>8}  {:>10}",
            "Player", "Match", "Bat", "Bowl", "Field", "Total"
        ),
    }
    for row in &rows {
        let b = &row.breakdown;
        match &row.compared {
            Some(c) => println!(
                "{:>6}  {:>6}  {:>10.2}  {:>10.2}  {:>+8.2}",
                b.player_id,
                b.match_id,
                b.total,
                c.total,
                c.total - b.total
            ),
            None => println!(
                "{:>6}  {:>6}  {:>8.2}  {:>8.2}  {:>8.2}  {:>10.2}",
                b.player_id, b.match_id, b.batting.total, b.bowling.total, b.fielding.total, b.total
            ),
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
