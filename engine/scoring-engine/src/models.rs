use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type PlayerId = u32;
pub type TeamId = u32;
pub type MatchId = u32;
pub type RoundNumber = u32;

/// Overs bowled, stored as legal balls so 3.4 overs is 22 balls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Overs {
    balls: u32,
}

impl Overs {
    pub const BALLS_PER_OVER: u32 = 6;

    pub fn from_balls(balls: u32) -> Self {
        Self { balls }
    }

    /// Whole overs plus extra balls (`Overs::new(3, 4)` is 3.4 overs)
    pub fn new(overs: u32, balls: u32) -> Self {
        Self { balls: overs * Self::BALLS_PER_OVER + balls }
    }

    pub fn balls(&self) -> u32 {
        self.balls
    }

    pub fn is_zero(&self) -> bool {
        self.balls == 0
    }

    /// Overs as a true fraction, for economy rate
    pub fn as_overs(&self) -> f64 {
        f64::from(self.balls) / f64::from(Self::BALLS_PER_OVER)
    }
}

impl fmt::Display for Overs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.balls / Self::BALLS_PER_OVER, self.balls % Self::BALLS_PER_OVER)
    }
}

/// One player's performance in one match, validated at ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub player_id: PlayerId,
    pub match_id: MatchId,

    pub runs: u32,
    pub balls_faced: u32,
    pub is_out: bool,

    pub wickets: u32,
    pub overs_bowled: Overs,
    pub runs_conceded: u32,
    pub maidens: u32,

    pub catches: u32,
    pub stumpings: u32,
    pub run_outs: u32,

    /// Player kept wicket in this match
    pub is_wicketkeeper: bool,
}

impl PerformanceRecord {
    /// An empty performance (did not bat, bowl or field)
    pub fn new(player_id: PlayerId, match_id: MatchId) -> Self {
        Self {
            player_id,
            match_id,
            runs: 0,
            balls_faced: 0,
            is_out: false,
            wickets: 0,
            overs_bowled: Overs::default(),
            runs_conceded: 0,
            maidens: 0,
            catches: 0,
            stumpings: 0,
            run_outs: 0,
            is_wicketkeeper: false,
        }
    }

    pub fn with_batting(mut self, runs: u32, balls_faced: u32, is_out: bool) -> Self {
        self.runs = runs;
        self.balls_faced = balls_faced;
        self.is_out = is_out;
        self
    }

    pub fn with_bowling(mut self, wickets: u32, overs: Overs, runs_conceded: u32, maidens: u32) -> Self {
        self.wickets = wickets;
        self.overs_bowled = overs;
        self.runs_conceded = runs_conceded;
        self.maidens = maidens;
        self
    }

    pub fn with_fielding(mut self, catches: u32, stumpings: u32, run_outs: u32) -> Self {
        self.catches = catches;
        self.stumpings = stumpings;
        self.run_outs = run_outs;
        self
    }

    pub fn as_wicketkeeper(mut self) -> Self {
        self.is_wicketkeeper = true;
        self
    }
}

/// Non-fatal anomalies found while scoring a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQualityFlag {
    /// Runs recorded without any balls faced; strike rate treated as neutral
    ZeroBallsFaced,
    /// Bowling figures recorded without any legal balls; economy treated as neutral
    ZeroOversBowled,
    /// Wickets taken without conceding; economy treated as neutral
    ZeroRunsConceded,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BattingPoints {
    pub run_points: f64,
    pub strike_rate_factor: f64,
    pub milestone_bonus: f64,
    pub duck_points: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BowlingPoints {
    pub wicket_points: f64,
    pub economy_factor: f64,
    pub maiden_points: f64,
    pub haul_bonus: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldingPoints {
    pub catch_points: f64,
    pub stumping_points: f64,
    pub run_out_points: f64,
    pub total: f64,
}

/// Raw (pre-multiplier) fantasy points for one record, with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsBreakdown {
    pub player_id: PlayerId,
    pub match_id: MatchId,
    pub batting: BattingPoints,
    pub bowling: BowlingPoints,
    pub fielding: FieldingPoints,
    pub total: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<DataQualityFlag>,
}

/// Per-player handicap. Round 0 marks the season baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMultiplier {
    pub player_id: PlayerId,
    pub value: f64,
    pub last_updated_round: RoundNumber,
}

/// Raw stat totals over some span of matches
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatLine {
    pub matches: u32,
    pub runs: u32,
    pub balls_faced: u32,
    pub dismissals: u32,
    pub wickets: u32,
    pub balls_bowled: u32,
    pub runs_conceded: u32,
    pub maidens: u32,
    pub catches: u32,
    pub stumpings: u32,
    pub run_outs: u32,

    /// Raw fantasy points, before any multiplier
    pub raw_points: f64,
}

impl StatLine {
    /// Fold one scored record into the totals. Counters saturate rather
    /// than wrap.
    pub fn absorb(&mut self, record: &PerformanceRecord, raw_points: f64) {
        self.matches = self.matches.saturating_add(1);
        self.runs = self.runs.saturating_add(record.runs);
        self.balls_faced = self.balls_faced.saturating_add(record.balls_faced);
        self.dismissals = self.dismissals.saturating_add(u32::from(record.is_out));
        self.wickets = self.wickets.saturating_add(record.wickets);
        self.balls_bowled = self.balls_bowled.saturating_add(record.overs_bowled.balls());
        self.runs_conceded = self.runs_conceded.saturating_add(record.runs_conceded);
        self.maidens = self.maidens.saturating_add(record.maidens);
        self.catches = self.catches.saturating_add(record.catches);
        self.stumpings = self.stumpings.saturating_add(record.stumpings);
        self.run_outs = self.run_outs.saturating_add(record.run_outs);
        self.raw_points += raw_points;
    }

    pub fn merge(&mut self, other: &StatLine) {
        self.matches = self.matches.saturating_add(other.matches);
        self.runs = self.runs.saturating_add(other.runs);
        self.balls_faced = self.balls_faced.saturating_add(other.balls_faced);
        self.dismissals = self.dismissals.saturating_add(other.dismissals);
        self.wickets = self.wickets.saturating_add(other.wickets);
        self.balls_bowled = self.balls_bowled.saturating_add(other.balls_bowled);
        self.runs_conceded = self.runs_conceded.saturating_add(other.runs_conceded);
        self.maidens = self.maidens.saturating_add(other.maidens);
        self.catches = self.catches.saturating_add(other.catches);
        self.stumpings = self.stumpings.saturating_add(other.stumpings);
        self.run_outs = self.run_outs.saturating_add(other.run_outs);
        self.raw_points += other.raw_points;
    }
}

/// One player's league-wide stats for a single round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRoundLine {
    pub player_id: PlayerId,
    pub round: RoundNumber,
    pub line: StatLine,
}

/// Season-to-date totals for one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonAggregate {
    pub player_id: PlayerId,
    /// Latest round that contributed to the totals
    pub through_round: RoundNumber,
    pub totals: StatLine,
}

impl SeasonAggregate {
    pub fn new(player_id: PlayerId) -> Self {
        Self { player_id, through_round: 0, totals: StatLine::default() }
    }

    /// Score used to place the player in the multiplier cohort
    pub fn raw_score(&self) -> f64 {
        self.totals.raw_points
    }
}

/// Team-scoped leadership designation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Captain,
    ViceCaptain,
    Player,
}

/// Roster snapshot for one fantasy team, owned by the roster service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMembership {
    pub team_id: TeamId,
    pub players: BTreeSet<PlayerId>,
    pub captain: PlayerId,
    pub vice_captain: PlayerId,
    pub wicketkeeper: PlayerId,
}

impl TeamMembership {
    pub fn role_of(&self, player_id: PlayerId) -> Role {
        if player_id == self.captain {
            Role::Captain
        } else if player_id == self.vice_captain {
            Role::ViceCaptain
        } else {
            Role::Player
        }
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.players.contains(&player_id)
    }
}

/// What one selected player contributed to a team's round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerContribution {
    pub player_id: PlayerId,

    /// False when the player had no performance this round
    pub played: bool,

    pub breakdowns: Vec<PointsBreakdown>,
    pub raw_points: f64,
    pub multiplier: f64,
    pub role: Role,
    pub leadership_factor: f64,

    /// raw_points x multiplier x leadership_factor
    pub points: f64,
}

/// Stored per (team, round); recomputation replaces, never adds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub team_id: TeamId,
    pub round: RoundNumber,
    pub ruleset_version: String,
    pub total: f64,
    pub players: BTreeMap<PlayerId, PlayerContribution>,
}

/// Anomalies worth investigating that never halt a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditFlag {
    DataQuality { player_id: PlayerId, match_id: MatchId, flag: DataQualityFlag },
    MultiplierClamped { player_id: PlayerId, unclamped: f64, clamped: f64 },
    /// Rostered player had no stored multiplier; neutral was used
    MissingMultiplier { player_id: PlayerId },
    /// Performance for a player on no roster; counted league-wide only
    UnrosteredPlayer { player_id: PlayerId },
}

/// A team's position in the league table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: usize,
    pub team_id: TeamId,
    pub cumulative_total: f64,
    pub rounds_counted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overs_display_and_fraction() {
        let overs = Overs::new(3, 4);
        assert_eq!(overs.balls(), 22);
        assert_eq!(overs.to_string(), "3.4");
        assert!((overs.as_overs() - 22.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_role_lookup_is_team_scoped() {
        let team = TeamMembership {
            team_id: 1,
            players: [10, 11, 12].into_iter().collect(),
            captain: 10,
            vice_captain: 11,
            wicketkeeper: 12,
        };
        assert_eq!(team.role_of(10), Role::Captain);
        assert_eq!(team.role_of(11), Role::ViceCaptain);
        assert_eq!(team.role_of(12), Role::Player);
    }

    #[test]
    fn test_stat_line_merge_matches_absorb() {
        let record = PerformanceRecord::new(7, 1)
            .with_batting(42, 30, true)
            .with_bowling(2, Overs::new(4, 0), 28, 1)
            .with_fielding(1, 0, 1);

        let mut absorbed = StatLine::default();
        absorbed.absorb(&record, 80.0);
        absorbed.absorb(&record, 80.0);

        let mut single = StatLine::default();
        single.absorb(&record, 80.0);
        let mut merged = single.clone();
        merged.merge(&single);

        assert_eq!(absorbed, merged);
        assert_eq!(merged.balls_bowled, 48);
        assert_eq!(merged.dismissals, 2);
    }

    #[test]
    fn test_stat_line_counters_saturate() {
        let record = PerformanceRecord::new(7, 1).with_batting(u32::MAX, u32::MAX, false);

        let mut line = StatLine::default();
        line.absorb(&record, 1.0);
        line.absorb(&record, 1.0);
        assert_eq!(line.runs, u32::MAX);
        assert_eq!(line.balls_faced, u32::MAX);

        let mut merged = line.clone();
        merged.merge(&line);
        assert_eq!(merged.runs, u32::MAX);
        assert_eq!(merged.matches, 4);
        assert_eq!(merged.raw_points, 4.0);
    }
}
