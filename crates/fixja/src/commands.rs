// Command implementations behind the CLI. Each returns the text to print so
// the binary stays a thin dispatcher.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use fixja_draw::algorithms::{round_robin_format, seeded_tournament, single_elimination_final_format};
use fixja_draw::builder::{build_with, Schedule};
use fixja_draw::format::DrawFormat;
use fixja_draw::model::Division;
use fixja_draw::points::{MatchResult, PointsTable, Side};
use fixja_draw::schema::DivisionStructure;

use crate::config::Config;
use crate::db::Database;
use crate::export::export_to_file;
use crate::teams::load_team_list;

// ---------------------------------------------------------------------------
// Draw formats
// ---------------------------------------------------------------------------

/// Seed the teams in `teams_csv` into pools and print the tournament plan
/// as JSON. Per-day limits default to the `[tournament]` config section.
pub fn plan(
    config: &Config,
    teams_csv: &Path,
    days: u32,
    max_per_day: Option<u32>,
    min_per_day: Option<u32>,
) -> Result<String> {
    let teams = load_team_list(teams_csv)?;
    let max_per_day = max_per_day.unwrap_or(config.tournament.max_per_day);
    let min_per_day = min_per_day.unwrap_or(config.tournament.min_per_day);

    let plan = seeded_tournament(&teams, days, max_per_day, min_per_day).with_context(|| {
        format!(
            "cannot fit {} teams into {days} days at {min_per_day}-{max_per_day} matches per day",
            teams.len()
        )
    })?;
    info!(
        "Planned {} teams into {} pools over {} days",
        teams.len(),
        plan.pools.len(),
        days
    );
    serde_json::to_string_pretty(&plan).context("failed to serialize tournament plan")
}

pub fn round_robin(teams: u32, rounds: Option<usize>) -> String {
    round_robin_format(teams, rounds)
}

pub fn finals(pools: u32, bronze: Option<&str>) -> Result<String> {
    let rounds = single_elimination_final_format(pools, bronze)?;
    Ok(DrawFormat::from(rounds).to_string())
}

/// Check a draw format file and summarise it.
pub fn validate(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    DrawFormat::validate(&text).with_context(|| format!("{} is not a valid draw format", path.display()))?;

    let format = DrawFormat::parse(&text);
    Ok(format!(
        "{}: {} rounds, {} matches",
        path.display(),
        format.rounds.len(),
        format.match_count()
    ))
}

// ---------------------------------------------------------------------------
// Divisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOptions {
    pub save: bool,
    pub export: bool,
    /// Date the draw with the season's strategy. `None` leaves it undated.
    pub schedule: Option<Schedule>,
}

/// Build the division described by a JSON structure file, then store it and
/// export its draw as configured. The `[division]` defaults are applied
/// before any match is generated.
pub fn build_division(
    config: &Config,
    base_dir: &Path,
    structure_path: &Path,
    options: &BuildOptions,
) -> Result<String> {
    let text = std::fs::read_to_string(structure_path)
        .with_context(|| format!("failed to read {}", structure_path.display()))?;
    let structure = DivisionStructure::from_json(&text)
        .with_context(|| format!("invalid division structure in {}", structure_path.display()))?;

    let season = config.season()?;
    let mut division = Division::new(structure.title.clone());
    config.apply_division_defaults(&mut division);
    let built = build_with(&season, division, &structure, options.schedule.as_ref())?;

    let mut report = format!(
        "Built '{}': {} teams, {} stages, {} matches",
        built.division.title,
        built.division.teams.len(),
        built.division.stages.len(),
        built.matches.len()
    );

    if options.save {
        let db = open_database(config, base_dir)?;
        let keys = db.save_build(&season.title, &built)?;
        info!("Saved division '{}' as #{}", built.division.title, keys.division);
        report.push_str(&format!("\nSaved as division #{}", keys.division));
    }

    if options.export {
        let dir = resolve_path(base_dir, &config.export_dir);
        let path = export_to_file(&dir, &built.division, &built.matches)?;
        report.push_str(&format!("\nExported to {}", path.display()));
    }

    Ok(report)
}

pub fn list_divisions(db: &Database) -> Result<String> {
    let mut out = String::new();
    for (id, season, title) in db.divisions()? {
        out.push_str(&format!("#{id}  {season}  {title}\n"));
    }
    Ok(out)
}

/// One line per stored match of `division`.
pub fn list_matches(db: &Database, division: i64) -> Result<String> {
    let matches = db.load_matches(division)?;
    if matches.is_empty() {
        anyhow::bail!("no matches stored for division #{division}");
    }

    let mut out = String::new();
    for m in matches {
        let home = m.home_team.or(m.home_eval).unwrap_or_else(|| "Bye".into());
        let away = m.away_team.or(m.away_eval).unwrap_or_else(|| "Bye".into());
        let place = match &m.pool {
            Some(pool) => format!("{} / {}", m.stage, pool),
            None => m.stage.clone(),
        };
        out.push_str(&format!(
            "R{:<3} {:>3}  {place}  {home} vs {away}",
            m.round, m.match_id
        ));
        if let Some(label) = m.label {
            out.push_str(&format!("  ({label})"));
        }
        out.push('\n');
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Points
// ---------------------------------------------------------------------------

/// Score a single result with the configured points formulas and print
/// both ladder entries as JSON.
pub fn points(config: &Config, result: &MatchResult) -> Result<String> {
    let table = PointsTable::new(
        &config.division.points_formula,
        Some(config.division.bonus_points_formula.as_str()),
        config.division.include_forfeits_in_played,
    )
    .context("invalid points formula")?;

    let entries = json!({
        "home": table.entry(result, Side::Home),
        "away": table.entry(result, Side::Away),
    });
    serde_json::to_string_pretty(&entries).context("failed to serialize ladder entries")
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Open the configured database, relative to `base_dir`.
pub fn open_database(config: &Config, base_dir: &Path) -> Result<Database> {
    let path = resolve_path(base_dir, &config.db_path);
    Database::open(&path.to_string_lossy())
        .with_context(|| format!("failed to open database {}", path.display()))
}

/// `path` itself when absolute, otherwise joined onto `base_dir`.
pub fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
