// SQLite persistence for built divisions and their matches.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use fixja_draw::builder::BuiltDivision;
use fixja_draw::generator::{MatchDraft, MatchSide, MatchSink, RelatedKeys};
use fixja_draw::model::{StageGroupId, StageId, TeamId, UndecidedTeamId};

/// SQLite-backed store for divisions, their stages, pools, teams and
/// generated matches.
pub struct Database {
    conn: Mutex<Connection>,
}

/// Row ids assigned to everything saved by `Database::save_build`.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    pub division: i64,
    pub teams: HashMap<TeamId, i64>,
    pub stages: HashMap<StageId, i64>,
    pub pools: HashMap<StageGroupId, i64>,
    pub undecided: HashMap<UndecidedTeamId, i64>,
    /// In the order the matches were saved.
    pub matches: Vec<i64>,
}

/// A match as stored, with team and pool titles joined in.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMatch {
    pub id: i64,
    pub stage: String,
    pub pool: Option<String>,
    pub round: u32,
    pub match_id: u32,
    pub date: Option<String>,
    pub label: Option<String>,
    pub is_bye: bool,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub home_eval: Option<String>,
    pub away_eval: Option<String>,
    pub home_eval_related: Option<i64>,
    pub away_eval_related: Option<i64>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS divisions (
                id                   INTEGER PRIMARY KEY AUTOINCREMENT,
                season               TEXT NOT NULL,
                title                TEXT NOT NULL,
                games_per_day        INTEGER,
                points_formula       TEXT NOT NULL DEFAULT '',
                bonus_points_formula TEXT,
                created              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS teams (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                division_id INTEGER NOT NULL REFERENCES divisions(id),
                title       TEXT NOT NULL,
                ordering    INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS stages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                division_id INTEGER NOT NULL REFERENCES divisions(id),
                title       TEXT NOT NULL,
                ordering    INTEGER NOT NULL,
                follows     INTEGER REFERENCES stages(id),
                keep_ladder INTEGER NOT NULL DEFAULT 1,
                last_round  INTEGER
            );

            CREATE TABLE IF NOT EXISTS pools (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                stage_id INTEGER NOT NULL REFERENCES stages(id),
                title    TEXT NOT NULL,
                ordering INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pool_teams (
                pool_id INTEGER NOT NULL REFERENCES pools(id),
                team_id INTEGER NOT NULL REFERENCES teams(id),
                PRIMARY KEY (pool_id, team_id)
            );

            CREATE TABLE IF NOT EXISTS undecided_teams (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                stage_id INTEGER NOT NULL REFERENCES stages(id),
                pool_id  INTEGER REFERENCES pools(id),
                formula  TEXT NOT NULL,
                label    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS matches (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                stage_id            INTEGER NOT NULL REFERENCES stages(id),
                pool_id             INTEGER REFERENCES pools(id),
                round               INTEGER NOT NULL,
                match_id            INTEGER NOT NULL,
                date                TEXT,
                label               TEXT,
                is_bye              INTEGER NOT NULL,
                include_in_ladder   INTEGER NOT NULL,
                home_team_id        INTEGER REFERENCES teams(id),
                away_team_id        INTEGER REFERENCES teams(id),
                home_undecided_id   INTEGER REFERENCES undecided_teams(id),
                away_undecided_id   INTEGER REFERENCES undecided_teams(id),
                home_eval           TEXT,
                away_eval           TEXT,
                home_eval_related   INTEGER REFERENCES matches(id),
                away_eval_related   INTEGER REFERENCES matches(id)
            );

            CREATE INDEX IF NOT EXISTS idx_matches_stage_id ON matches(stage_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection lock.
    ///
    /// Panics if the mutex is poisoned. This should never happen in normal
    /// operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Persist a built division and every generated match in a single
    /// transaction. Win/loss references are linked to the row of the match
    /// they refer to.
    pub fn save_build(&self, season: &str, built: &BuiltDivision) -> Result<KeyMap> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin save transaction")?;
        let division = &built.division;

        let mut keys = KeyMap {
            division: tx
                .query_row(
                    "INSERT INTO divisions (season, title, games_per_day, points_formula, bonus_points_formula)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     RETURNING id",
                    params![
                        season,
                        division.title,
                        division.games_per_day,
                        division.points_formula,
                        division.bonus_points_formula,
                    ],
                    |row| row.get(0),
                )
                .context("failed to insert division")?,
            ..KeyMap::default()
        };

        for team in &division.teams {
            let id: i64 = tx
                .query_row(
                    "INSERT INTO teams (division_id, title, ordering) VALUES (?1, ?2, ?3) RETURNING id",
                    params![keys.division, team.title, team.order],
                    |row| row.get(0),
                )
                .context("failed to insert team")?;
            keys.teams.insert(team.id, id);
        }

        for stage in &division.stages {
            let follows = stage.follows.and_then(|s| keys.stages.get(&s).copied());
            let stage_key: i64 = tx
                .query_row(
                    "INSERT INTO stages (division_id, title, ordering, follows, keep_ladder, last_round)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     RETURNING id",
                    params![
                        keys.division,
                        stage.title,
                        stage.order,
                        follows,
                        stage.keep_ladder,
                        stage.last_round,
                    ],
                    |row| row.get(0),
                )
                .context("failed to insert stage")?;
            keys.stages.insert(stage.id, stage_key);

            for pool in &stage.pools {
                let pool_key: i64 = tx
                    .query_row(
                        "INSERT INTO pools (stage_id, title, ordering) VALUES (?1, ?2, ?3) RETURNING id",
                        params![stage_key, pool.title, pool.order],
                        |row| row.get(0),
                    )
                    .context("failed to insert pool")?;
                keys.pools.insert(pool.id, pool_key);

                for team in &pool.teams {
                    let team_key = keys
                        .teams
                        .get(team)
                        .with_context(|| format!("pool {} refers to unknown team {team}", pool.title))?;
                    tx.execute(
                        "INSERT INTO pool_teams (pool_id, team_id) VALUES (?1, ?2)",
                        params![pool_key, team_key],
                    )
                    .context("failed to insert pool team")?;
                }
            }

            for undecided in &stage.undecided_teams {
                let pool_key = undecided.stage_group.and_then(|p| keys.pools.get(&p).copied());
                let id: i64 = tx
                    .query_row(
                        "INSERT INTO undecided_teams (stage_id, pool_id, formula, label)
                         VALUES (?1, ?2, ?3, ?4)
                         RETURNING id",
                        params![stage_key, pool_key, undecided.formula, undecided.label],
                        |row| row.get(0),
                    )
                    .context("failed to insert undecided team")?;
                keys.undecided.insert(undecided.id, id);
            }
        }

        let mut writer = MatchWriter {
            conn: &tx,
            keys: &keys,
        };
        let matches = built.matches.save(&mut writer)?;
        keys.matches = matches;

        tx.commit().context("failed to commit division")?;
        Ok(keys)
    }

    /// Stored matches of a division, ordered by stage, pool, round and
    /// match id.
    pub fn load_matches(&self, division: i64) -> Result<Vec<StoredMatch>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT m.id, s.title, p.title, m.round, m.match_id, m.date, m.label, m.is_bye,
                        home.title, away.title, m.home_eval, m.away_eval,
                        m.home_eval_related, m.away_eval_related
                 FROM matches m
                 JOIN stages s ON s.id = m.stage_id
                 LEFT JOIN pools p ON p.id = m.pool_id
                 LEFT JOIN teams home ON home.id = m.home_team_id
                 LEFT JOIN teams away ON away.id = m.away_team_id
                 WHERE s.division_id = ?1
                 ORDER BY s.ordering, p.ordering, m.round, m.match_id",
            )
            .context("failed to prepare load_matches query")?;

        let matches = stmt
            .query_map(params![division], |row| {
                Ok(StoredMatch {
                    id: row.get(0)?,
                    stage: row.get(1)?,
                    pool: row.get(2)?,
                    round: row.get(3)?,
                    match_id: row.get(4)?,
                    date: row.get(5)?,
                    label: row.get(6)?,
                    is_bye: row.get(7)?,
                    home_team: row.get(8)?,
                    away_team: row.get(9)?,
                    home_eval: row.get(10)?,
                    away_eval: row.get(11)?,
                    home_eval_related: row.get(12)?,
                    away_eval_related: row.get(13)?,
                })
            })
            .context("failed to query matches")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map match rows")?;

        Ok(matches)
    }

    /// Ids and titles of every stored division, oldest first.
    pub fn divisions(&self) -> Result<Vec<(i64, String, String)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, season, title FROM divisions ORDER BY id")
            .context("failed to prepare divisions query")?;
        let divisions = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .context("failed to query divisions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map division rows")?;
        Ok(divisions)
    }
}

// ---------------------------------------------------------------------------
// Match sink
// ---------------------------------------------------------------------------

/// Writes match drafts inside an open transaction.
struct MatchWriter<'a> {
    conn: &'a Connection,
    keys: &'a KeyMap,
}

impl MatchWriter<'_> {
    fn team(&self, side: &MatchSide) -> Option<i64> {
        match side {
            MatchSide::Team(id) => self.keys.teams.get(id).copied(),
            _ => None,
        }
    }

    fn undecided(&self, side: &MatchSide) -> Option<i64> {
        match side {
            MatchSide::Undecided(id) => self.keys.undecided.get(id).copied(),
            _ => None,
        }
    }
}

impl MatchSink for MatchWriter<'_> {
    type Key = i64;
    type Error = anyhow::Error;

    fn save(&mut self, draft: &MatchDraft, related: RelatedKeys<i64>) -> Result<i64> {
        let stage = self
            .keys
            .stages
            .get(&draft.stage)
            .with_context(|| format!("match {} refers to unsaved stage {}", draft.match_id, draft.stage))?;
        let pool = draft.stage_group.and_then(|p| self.keys.pools.get(&p).copied());

        self.conn
            .query_row(
                "INSERT INTO matches
                    (stage_id, pool_id, round, match_id, date, label, is_bye, include_in_ladder,
                     home_team_id, away_team_id, home_undecided_id, away_undecided_id,
                     home_eval, away_eval, home_eval_related, away_eval_related)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                 RETURNING id",
                params![
                    stage,
                    pool,
                    draft.round,
                    draft.match_id,
                    draft.date.map(|d| d.to_rfc3339()),
                    draft.label,
                    draft.is_bye,
                    draft.include_in_ladder,
                    self.team(&draft.home),
                    self.team(&draft.away),
                    self.undecided(&draft.home),
                    self.undecided(&draft.away),
                    draft.home.eval(),
                    draft.away.eval(),
                    related.home,
                    related.away,
                ],
                |row| row.get(0),
            )
            .context("failed to insert match")
    }
}
