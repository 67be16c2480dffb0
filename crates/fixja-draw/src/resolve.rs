// Stage and pool position references (`P2`, `G1P1`, `S1G2P3`).
//
// `stage_group_position` is strict and reports exactly what is wrong with a
// reference. The `*_title` helpers are for display: any failure falls back
// to the raw formula text.

use std::fmt;

use ordinal::Ordinal;
use tracing::debug;

use crate::error::DrawError;
use crate::format::TeamToken;
use crate::generator::{MatchCollection, MatchDraft, MatchSide};
use crate::model::{Division, Stage, StageGroup, UndecidedTeam};

/// A finishing position within a stage, or within one of its pools.
#[derive(Debug, Clone, Copy)]
pub struct Position<'a> {
    pub stage: &'a Stage,
    pub group: Option<&'a StageGroup>,
    pub position: usize,
}

impl fmt::Display for Position<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let place = self.group.map_or(&self.stage.title, |g| &g.title);
        write!(f, "{} {}", Ordinal(self.position), place)
    }
}

/// Resolve `formula` relative to `stage`.
///
/// `S<n>` picks the n-th stage of the division; without it the stage that
/// `stage` comes after is used. `G<n>` then picks the n-th pool of that
/// stage.
pub fn stage_group_position<'a>(
    division: &'a Division,
    stage: &Stage,
    formula: &str,
) -> Result<Position<'a>, DrawError> {
    let Some(TeamToken::Position {
        stage: stage_index,
        group: group_index,
        position,
    }) = TeamToken::parse(formula)
    else {
        return Err(DrawError::InvalidFormula(formula.to_string()));
    };
    debug!(?stage_index, ?group_index, position, "stage_group_position");

    let target = match stage_index {
        Some(index) => index
            .checked_sub(1)
            .and_then(|i| division.stages.get(i))
            .ok_or(DrawError::InvalidStage {
                index,
                stage_count: division.stages.len(),
            })?,
        None => stage
            .comes_after(division)
            .ok_or_else(|| DrawError::NoPrecedingStage(stage.title.clone()))?,
    };

    let group = match group_index {
        Some(index) => Some(
            index
                .checked_sub(1)
                .and_then(|i| target.pools.get(i))
                .ok_or_else(|| DrawError::InvalidGroup {
                    index,
                    stage: target.title.clone(),
                    pool_count: target.pools.len(),
                })?,
        ),
        None => None,
    };

    Ok(Position {
        stage: target,
        group,
        position,
    })
}

/// Human readable form of `formula`, or the formula itself when it does not
/// resolve.
pub fn describe_formula(division: &Division, stage: &Stage, formula: &str) -> String {
    match stage_group_position(division, stage, formula) {
        Ok(position) => position.to_string(),
        Err(err) => {
            debug!(formula, %err, "displaying raw formula");
            formula.to_string()
        }
    }
}

/// Display title of a placeholder entrant belonging to `stage`.
pub fn undecided_title(division: &Division, stage: &Stage, team: &UndecidedTeam) -> String {
    if team.formula.is_empty() {
        return team.label.clone();
    }
    describe_formula(division, stage, &team.formula)
}

fn side_title(
    division: &Division,
    matches: &MatchCollection,
    draft: &MatchDraft,
    side: &MatchSide,
) -> String {
    match side {
        MatchSide::Bye => "Bye".to_string(),
        MatchSide::Team(id) => division
            .team(*id)
            .map_or_else(|| format!("Team #{id}"), |t| t.title.clone()),
        MatchSide::Undecided(id) => division
            .undecided_team(*id)
            .map_or_else(|| format!("Undecided #{id}"), |(s, u)| undecided_title(division, s, u)),
        MatchSide::Unresolved(formula) => match division.stage(draft.stage) {
            Some(stage) => describe_formula(division, stage, formula),
            None => formula.clone(),
        },
        MatchSide::PendingWinLoss { result, target } => {
            let name = matches
                .find(target)
                .and_then(|m| m.label.clone())
                .unwrap_or_else(|| format!("Match {}", target.match_id));
            format!("{} {}", result.label(), name)
        }
    }
}

impl MatchDraft {
    pub fn home_title(&self, division: &Division, matches: &MatchCollection) -> String {
        side_title(division, matches, self, &self.home)
    }

    pub fn away_title(&self, division: &Division, matches: &MatchCollection) -> String {
        side_title(division, matches, self, &self.away)
    }

    pub fn title(&self, division: &Division, matches: &MatchCollection) -> String {
        format!(
            "{} vs {}",
            self.home_title(division, matches),
            self.away_title(division, matches)
        )
    }
}
