// Configuration loading and parsing (season.toml, settings.toml).

use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveDate};
use fixja_draw::model::{Division, Season, SeasonMode};
use fixja_draw::points::PointsTable;
use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub season: SeasonConfig,
    pub division: DivisionDefaults,
    pub tournament: TournamentConfig,
    pub db_path: String,
    pub logging: LoggingConfig,
    pub export_dir: String,
}

impl Config {
    /// The configured season. Only fails on a config that skipped `validate`.
    pub fn season(&self) -> Result<Season, ConfigError> {
        let mode = SeasonMode::from_str_mode(&self.season.mode).ok_or_else(|| {
            invalid(
                "season.mode",
                format!(
                    "expected weekly, daily or unscheduled, got {:?}",
                    self.season.mode
                ),
            )
        })?;
        let timezone: FixedOffset = self.season.utc_offset.parse().map_err(|_| {
            invalid(
                "season.utc_offset",
                format!("expected an offset like +10:00, got {:?}", self.season.utc_offset),
            )
        })?;
        Ok(Season {
            title: self.season.title.clone(),
            mode,
            start_date: self.season.start_date,
            timezone,
            exclusions: self.season.exclusions.clone(),
        })
    }

    /// Apply the configured division defaults to `division`.
    pub fn apply_division_defaults(&self, division: &mut Division) {
        let defaults = &self.division;
        division.games_per_day = defaults.games_per_day;
        division.exclusions = defaults.exclusions.clone();
        division.points_formula = defaults.points_formula.clone();
        division.bonus_points_formula = Some(defaults.bonus_points_formula.clone())
            .filter(|f| !f.trim().is_empty());
        division.include_forfeits_in_played = defaults.include_forfeits_in_played;
    }
}

// ---------------------------------------------------------------------------
// season.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct SeasonFile {
    season: SeasonConfig,
    division: DivisionDefaults,
    tournament: TournamentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonConfig {
    pub title: String,
    pub mode: String,
    pub start_date: NaiveDate,
    pub utc_offset: String,
    #[serde(default)]
    pub exclusions: Vec<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DivisionDefaults {
    pub games_per_day: Option<u32>,
    pub points_formula: String,
    #[serde(default)]
    pub bonus_points_formula: String,
    #[serde(default)]
    pub include_forfeits_in_played: bool,
    #[serde(default)]
    pub exclusions: Vec<NaiveDate>,
}

/// Defaults for tournament planning.
#[derive(Debug, Clone, Deserialize)]
pub struct TournamentConfig {
    pub max_per_day: u32,
    pub min_per_day: u32,
}

// ---------------------------------------------------------------------------
// settings.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    database: DatabaseSection,
    logging: LoggingConfig,
    export: ExportSection,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ExportSection {
    directory: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    /// Empty means stderr.
    #[serde(default)]
    pub file: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/season.toml` and
/// `config/settings.toml`, relative to the given `base_dir`.
///
/// This does not copy defaults; `load_config` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let season_path = config_dir.join("season.toml");
    let season_file: SeasonFile = parse_file(&season_path)?;

    let settings_path = config_dir.join("settings.toml");
    let settings_file: SettingsFile = parse_file(&settings_path)?;

    let config = Config {
        season: season_file.season,
        division: season_file.division,
        tournament: season_file.tournament,
        db_path: settings_file.database.path,
        logging: settings_file.logging,
        export_dir: settings_file.export.directory,
    };

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "toml") {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        let target = config_dir.join(file_name);
        if target.exists() {
            continue;
        }
        std::fs::copy(&path, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to copy {} to {}: {e}", path.display(), target.display()),
        })?;
        copied.push(target);
    }

    Ok(copied)
}

/// Copy any missing defaults into `base_dir/config`, then load from there.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.season.title.trim().is_empty() {
        return Err(invalid("season.title", "must not be empty"));
    }

    // Mode and offset are checked by the conversion itself.
    config.season()?;

    if config.division.games_per_day == Some(0) {
        return Err(invalid("division.games_per_day", "must be greater than 0"));
    }

    let bonus = Some(config.division.bonus_points_formula.as_str());
    if let Err(e) = PointsTable::new(&config.division.points_formula, None, false) {
        return Err(invalid("division.points_formula", e.to_string()));
    }
    if let Err(e) = PointsTable::new("", bonus, false) {
        return Err(invalid("division.bonus_points_formula", e.to_string()));
    }

    let tournament = &config.tournament;
    if tournament.max_per_day == 0 {
        return Err(invalid("tournament.max_per_day", "must be greater than 0"));
    }
    if tournament.min_per_day > tournament.max_per_day {
        return Err(invalid(
            "tournament.min_per_day",
            format!(
                "must not exceed max_per_day ({}), got {}",
                tournament.max_per_day, tournament.min_per_day
            ),
        ));
    }

    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn crate_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    }

    /// A fresh base directory holding copies of the default config files,
    /// with `edit` applied to season.toml.
    fn base_with_season(name: &str, edit: impl Fn(String) -> String) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let config_dir = tmp.join("config");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&config_dir).unwrap();

        let root = crate_root();
        let season = fs::read_to_string(root.join("defaults/season.toml")).unwrap();
        fs::write(config_dir.join("season.toml"), edit(season)).unwrap();
        fs::copy(
            root.join("defaults/settings.toml"),
            config_dir.join("settings.toml"),
        )
        .unwrap();
        tmp
    }

    fn expect_field(err: ConfigError, expected: &str) {
        match &err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, expected),
            other => panic!("expected ValidationError, got: {other}"),
        }
    }

    #[test]
    fn load_default_config() {
        let tmp = base_with_season("fixja_config_defaults", |s| s);
        let config = load_config_from(&tmp).expect("should load default config");

        assert_eq!(config.season.title, "2024/25 Summer");
        assert_eq!(config.division.games_per_day, Some(3));
        assert_eq!(config.tournament.max_per_day, 3);
        assert_eq!(config.db_path, "fixja.db");
        assert_eq!(config.logging.filter, "fixja=info,fixja_draw=info,warn");
        assert!(config.logging.file.is_empty());
        assert_eq!(config.export_dir, "exports");

        let season = config.season().unwrap();
        assert_eq!(season.mode, SeasonMode::Weekly);
        assert_eq!(season.timezone.local_minus_utc(), 10 * 3600);
        assert_eq!(season.exclusions.len(), 2);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_defaults() {
        let tmp = std::env::temp_dir().join("fixja_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        let root = crate_root();
        for file in ["season.toml", "settings.toml"] {
            fs::copy(root.join("defaults").join(file), tmp.join("defaults").join(file)).unwrap();
        }
        fs::write(tmp.join("defaults/README"), "not a config file").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied.len(), 2);
        assert!(!tmp.join("config/README").exists());

        // Existing files are left alone.
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        load_config(&tmp).expect("should load copied config");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_defaults_and_config_is_an_error() {
        let tmp = std::env::temp_dir().join("fixja_config_nothing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        assert!(matches!(
            ensure_config_files(&tmp),
            Err(ConfigError::DefaultsCopyError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unknown_mode() {
        let tmp = base_with_season("fixja_config_bad_mode", |s| {
            s.replace("mode = \"weekly\"", "mode = \"monthly\"")
        });
        expect_field(load_config_from(&tmp).unwrap_err(), "season.mode");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_bad_offset() {
        let tmp = base_with_season("fixja_config_bad_offset", |s| {
            s.replace("utc_offset = \"+10:00\"", "utc_offset = \"AEST\"")
        });
        expect_field(load_config_from(&tmp).unwrap_err(), "season.utc_offset");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_games_per_day() {
        let tmp = base_with_season("fixja_config_zero_games", |s| {
            s.replace("games_per_day = 3", "games_per_day = 0")
        });
        expect_field(load_config_from(&tmp).unwrap_err(), "division.games_per_day");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_unparseable_points_formula() {
        let tmp = base_with_season("fixja_config_bad_points", |s| {
            s.replace("\"3*win + 2*draw + 1*loss\"", "\"3*win +\"")
        });
        expect_field(load_config_from(&tmp).unwrap_err(), "division.points_formula");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_min_above_max_per_day() {
        let tmp = base_with_season("fixja_config_min_max", |s| {
            s.replace("min_per_day = 1", "min_per_day = 5")
        });
        expect_field(load_config_from(&tmp).unwrap_err(), "tournament.min_per_day");
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let tmp = base_with_season("fixja_config_malformed", |s| s.replace("[season]", "[season"));
        assert!(matches!(
            load_config_from(&tmp).unwrap_err(),
            ConfigError::ParseError { .. }
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn file_not_found_for_missing_settings() {
        let tmp = base_with_season("fixja_config_no_settings", |s| s);
        fs::remove_file(tmp.join("config/settings.toml")).unwrap();
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("settings.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn division_defaults_apply() {
        let tmp = base_with_season("fixja_config_division", |s| s);
        let config = load_config_from(&tmp).unwrap();
        let mut division = Division::new("Open");
        config.apply_division_defaults(&mut division);
        assert_eq!(division.games_per_day, Some(3));
        assert_eq!(division.points_formula, "3*win + 2*draw + 1*loss");
        assert_eq!(division.bonus_points_formula, None);
        let _ = fs::remove_dir_all(&tmp);
    }
}
