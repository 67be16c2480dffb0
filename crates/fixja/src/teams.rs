// Seeded team lists read from CSV.
//
// The first column (`team`) holds the team name; rows are in seed order.
// A `seed` column, when present, reorders the list.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum TeamListError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("team list {0} is empty")]
    Empty(String),
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    #[serde(alias = "Team", alias = "name", alias = "Name")]
    team: String,
    #[serde(default, alias = "Seed")]
    seed: Option<u32>,
}

fn read_team_list<R: Read>(rdr: R) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut teams = Vec::new();
    for (row, result) in reader.deserialize::<RawTeam>().enumerate() {
        match result {
            Ok(raw) => {
                let name = raw.team.trim();
                if name.is_empty() {
                    warn!("skipping team row {}: empty name", row + 1);
                    continue;
                }
                teams.push((raw.seed.unwrap_or(u32::MAX), row, name.to_string()));
            }
            Err(e) => {
                warn!("skipping malformed team row: {}", e);
            }
        }
    }
    // Unseeded rows keep file order after the seeded ones.
    teams.sort_by_key(|&(seed, row, _)| (seed, row));
    Ok(teams.into_iter().map(|(_, _, name)| name).collect())
}

/// Load a seeded team list from a CSV file.
pub fn load_team_list(path: &Path) -> Result<Vec<String>, TeamListError> {
    let display = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|e| TeamListError::Io {
        path: display.clone(),
        source: e,
    })?;
    let teams = read_team_list(file).map_err(|e| TeamListError::Csv {
        path: display.clone(),
        source: e,
    })?;
    if teams.is_empty() {
        return Err(TeamListError::Empty(display));
    }
    Ok(teams)
}
