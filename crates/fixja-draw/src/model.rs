// Competition value records consumed and produced by the draw engine.
//
// These stand in for the persistence layer's entities. The engine only ever
// reads them; generated matches are returned as new `MatchDraft` values.

use std::fmt;

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(TeamId);
id_type!(StageId);
id_type!(StageGroupId);
id_type!(UndecidedTeamId);

// ---------------------------------------------------------------------------
// Season
// ---------------------------------------------------------------------------

/// How the dates of successive rounds are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonMode {
    /// One round per week.
    Weekly,
    /// Tournament play: several rounds per day.
    Daily,
    /// No date generation; every match is left undated.
    Unscheduled,
}

impl SeasonMode {
    pub fn from_str_mode(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "weekly" => Some(SeasonMode::Weekly),
            "daily" | "tournament" => Some(SeasonMode::Daily),
            "unscheduled" | "none" => Some(SeasonMode::Unscheduled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Season {
    pub title: String,
    pub mode: SeasonMode,
    pub start_date: NaiveDate,
    pub timezone: FixedOffset,
    pub exclusions: Vec<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Entrants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub title: String,
    /// 1-based position within the division.
    pub order: u32,
}

/// A placeholder entrant whose identity depends on an earlier stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndecidedTeam {
    pub id: UndecidedTeamId,
    /// Formula such as `G1P2`; may be empty when only a label is given.
    pub formula: String,
    pub label: String,
    pub stage_group: Option<StageGroupId>,
}

/// Whatever can be placed in a draw slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entrant {
    Team(TeamId),
    Undecided(UndecidedTeamId),
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

/// A pool within a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageGroup {
    pub id: StageGroupId,
    pub title: String,
    pub order: u32,
    pub teams: Vec<TeamId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub id: StageId,
    pub title: String,
    pub order: u32,
    /// Explicit predecessor. When unset the previous stage by order is used.
    pub follows: Option<StageId>,
    pub keep_ladder: bool,
    pub pools: Vec<StageGroup>,
    /// Ordered by pool, then formula.
    pub undecided_teams: Vec<UndecidedTeam>,
    /// Highest round number generated for this stage so far.
    pub last_round: Option<u32>,
}

impl Stage {
    pub fn new(id: StageId, title: impl Into<String>, order: u32) -> Self {
        Stage {
            id,
            title: title.into(),
            order,
            follows: None,
            keep_ladder: true,
            pools: Vec::new(),
            undecided_teams: Vec::new(),
            last_round: None,
        }
    }

    pub fn pool(&self, id: StageGroupId) -> Option<&StageGroup> {
        self.pools.iter().find(|p| p.id == id)
    }

    /// The stage this one continues from: the explicit `follows` stage, or
    /// the closest earlier stage by order.
    pub fn comes_after<'a>(&self, division: &'a Division) -> Option<&'a Stage> {
        if let Some(follows) = self.follows {
            return division.stage(follows);
        }
        division
            .stages
            .iter()
            .filter(|s| s.order < self.order)
            .max_by_key(|s| s.order)
    }

    pub fn undecided_for_pool(&self, pool: StageGroupId) -> impl Iterator<Item = &UndecidedTeam> {
        self.undecided_teams
            .iter()
            .filter(move |u| u.stage_group == Some(pool))
    }

    /// Record that rounds up to `round` now exist for this stage.
    pub fn note_round(&mut self, round: u32) {
        self.last_round = Some(self.last_round.map_or(round, |r| r.max(round)));
    }
}

#[derive(Debug, Clone)]
pub struct Division {
    pub title: String,
    /// Matches per day in tournament mode. `None` falls back to 1.
    pub games_per_day: Option<u32>,
    pub exclusions: Vec<NaiveDate>,
    pub teams: Vec<Team>,
    /// Ordered by `order`.
    pub stages: Vec<Stage>,
    pub points_formula: String,
    pub bonus_points_formula: Option<String>,
    /// Whether forfeited matches count towards `played` on the ladder.
    pub include_forfeits_in_played: bool,
}

impl Division {
    pub fn new(title: impl Into<String>) -> Self {
        Division {
            title: title.into(),
            games_per_day: None,
            exclusions: Vec::new(),
            teams: Vec::new(),
            stages: Vec::new(),
            points_formula: String::new(),
            bonus_points_formula: None,
            include_forfeits_in_played: false,
        }
    }

    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn stage_mut(&mut self, id: StageId) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.id == id)
    }

    pub fn team(&self, id: TeamId) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn undecided_team(&self, id: UndecidedTeamId) -> Option<(&Stage, &UndecidedTeam)> {
        self.stages.iter().find_map(|s| {
            s.undecided_teams
                .iter()
                .find(|u| u.id == id)
                .map(|u| (s, u))
        })
    }

    pub fn pool(&self, id: StageGroupId) -> Option<(&Stage, &StageGroup)> {
        self.stages
            .iter()
            .find_map(|s| s.pool(id).map(|p| (s, p)))
    }
}
