// Build a complete division (teams, stages, pools and their matches) from a
// `DivisionStructure`.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::dates::{following_start, no_dates};
use crate::error::DrawError;
use crate::generator::{DrawGenerator, DrawTarget, MatchCollection};
use crate::model::{
    Division, Entrant, Season, Stage, StageGroup, StageGroupId, StageId, Team, TeamId,
};
use crate::schema::DivisionStructure;

#[derive(Debug, Clone)]
pub struct BuiltDivision {
    pub division: Division,
    /// Every generated match, stage by stage.
    pub matches: MatchCollection,
}

/// Dating and extent of a scheduled build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// First playing date. Defaults to the season start.
    pub start: Option<NaiveDate>,
    /// Rounds generated from each draw format; the format's own round count
    /// when `None`. Longer runs cycle the format.
    pub rounds: Option<usize>,
    /// Added to the round numbers of the first stage. Later stages carry on
    /// from the stage before.
    pub offset: u32,
}

/// Per-stage generation settings derived from a `Schedule`.
#[derive(Debug, Clone, Copy)]
struct Dating {
    start: NaiveDate,
    rounds: Option<usize>,
    offset: u32,
}

/// Create the division described by `structure` and generate its matches
/// without dates.
///
/// Ids are assigned sequentially from 1. Pool teams are addressed by their
/// position in the pool, and stage-level formats by position in the
/// division. References to missing draw formats or teams are skipped with a
/// warning.
pub fn build(season: &Season, structure: &DivisionStructure) -> Result<BuiltDivision, DrawError> {
    build_with(season, Division::new(structure.title.clone()), structure, None)
}

/// Like [`build`], starting from `division` so its scheduling settings
/// (games per day, exclusions, points formulas) are in place before any
/// match is generated. Its teams and stages are replaced.
///
/// With a `schedule`, rounds are dated by the season's strategy: the first
/// stage from `schedule.start`, each later stage from the first date
/// available after the previous stage's last match.
pub fn build_with(
    season: &Season,
    mut division: Division,
    structure: &DivisionStructure,
    schedule: Option<&Schedule>,
) -> Result<BuiltDivision, DrawError> {
    structure.validate()?;
    info!("Building division '{}' for season '{}'", structure.title, season.title);

    division.title = structure.title.clone();
    division.stages.clear();
    division.teams = structure
        .teams
        .iter()
        .enumerate()
        .map(|(i, title)| Team {
            id: TeamId(i as u32 + 1),
            title: title.clone(),
            order: i as u32 + 1,
        })
        .collect();
    let division_teams: Vec<Entrant> = division.teams.iter().map(|t| Entrant::Team(t.id)).collect();

    let mut matches = MatchCollection::new();
    let mut next_pool_id = 1;
    let mut dating = schedule.map(|schedule| Dating {
        start: schedule.start.unwrap_or(season.start_date),
        rounds: schedule.rounds,
        offset: schedule.offset,
    });

    for (index, fixture) in structure.stages.iter().enumerate() {
        let order = index as u32 + 1;
        let mut stage = Stage::new(StageId(order), fixture.title.clone(), order);
        debug!("Created stage: {}", stage.title);

        for (pool_index, pool_fixture) in fixture.pools().iter().enumerate() {
            let mut teams = Vec::new();
            for &team_index in pool_fixture.teams.iter().flatten() {
                match division.teams.get(team_index) {
                    Some(team) => teams.push(team.id),
                    None => warn!(
                        "Pool '{}' refers to team {} of {}; skipped",
                        pool_fixture.title,
                        team_index,
                        division.teams.len()
                    ),
                }
            }
            stage.pools.push(StageGroup {
                id: StageGroupId(next_pool_id),
                title: pool_fixture.title.clone(),
                order: pool_index as u32 + 1,
                teams,
            });
            next_pool_id += 1;
        }
        division.stages.push(stage);

        let stage_matches =
            generate_stage(season, &division, structure, index, &division_teams, dating)?;
        if let Some(last) = stage_matches.iter().map(|m| m.round).max() {
            if let Some(stage) = division.stage_mut(StageId(order)) {
                stage.note_round(last);
            }
        }
        if let Some(dating) = dating.as_mut() {
            dating.offset = 0;
            if let Some(last) = stage_matches.iter().filter_map(|m| m.date).max() {
                dating.start = following_start(season.mode, last.date_naive());
                debug!("Next stage starts on {}", dating.start);
            }
        }
        matches.extend_from(stage_matches);
    }

    info!(
        "Successfully built division '{}' with {} matches",
        division.title,
        matches.len()
    );
    Ok(BuiltDivision { division, matches })
}

fn generate_stage(
    season: &Season,
    division: &Division,
    structure: &DivisionStructure,
    index: usize,
    division_teams: &[Entrant],
    dating: Option<Dating>,
) -> Result<MatchCollection, DrawError> {
    let fixture = &structure.stages[index];
    let mut matches = MatchCollection::new();
    let Some(stage) = division.stages.get(index) else {
        return Ok(matches);
    };

    if fixture.pools().is_empty() {
        if let Some(text) = lookup(structure, fixture.draw_format_ref.as_deref()) {
            let target = DrawTarget::for_stage(season, division, stage);
            matches.extend_from(generate(target, text, Some(division_teams.to_vec()), dating)?);
        }
        return Ok(matches);
    }

    for pool in &stage.pools {
        let reference = fixture
            .pools()
            .get(pool.order as usize - 1)
            .and_then(|p| p.draw_format_ref.as_deref());
        if let Some(text) = lookup(structure, reference) {
            let target = DrawTarget::for_pool(season, division, stage, pool);
            let teams = (!pool.teams.is_empty())
                .then(|| pool.teams.iter().copied().map(Entrant::Team).collect());
            matches.extend_from(generate(target, text, teams, dating)?);
        }
    }
    Ok(matches)
}

fn lookup<'a>(structure: &'a DivisionStructure, reference: Option<&str>) -> Option<&'a str> {
    let reference = reference?;
    let text = structure.draw_format(Some(reference));
    if text.is_none() {
        warn!("Draw format '{}' is not defined; skipped", reference);
    }
    text
}

fn generate(
    target: DrawTarget<'_>,
    text: &str,
    teams: Option<Vec<Entrant>>,
    dating: Option<Dating>,
) -> Result<MatchCollection, DrawError> {
    let mut generator = DrawGenerator::new(target, dating.map(|d| d.start));
    if let Some(teams) = teams {
        generator.set_teams(teams);
    }
    generator.parse(text);

    let matches = match dating {
        Some(dating) => generator.generate(dating.rounds, dating.offset, None)?,
        None => generator.generate(None, 0, Some(no_dates()))?,
    };
    if matches.is_empty() {
        warn!("No matches generated for {}", target.stage.title);
    }
    debug!("DrawGenerator produced {} matches", matches.len());
    Ok(matches)
}
