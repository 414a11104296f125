use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

/// One stored game, home/away oriented. A missing score on either side
/// means the game has not been played yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRow {
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    #[serde(default)]
    pub league_name: String,
}

impl GameRow {
    pub fn is_played(&self) -> bool {
        self.home_score.is_some() && self.away_score.is_some()
    }

    /// Stable id derived from league, date and normalized team names, so
    /// re-loading the same snapshot updates rows instead of duplicating them.
    pub fn game_id(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            slug(&self.league_name),
            self.date,
            slug(&self.home_team),
            slug(&self.away_team),
        )
    }
}

/// An unplayed fixture from our team's point of view.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureRow {
    pub opponent: String,
    pub league_name: String,
    pub date: String,
}

/// Read interface the analyzer consumes. Kept narrow on purpose: the engine
/// never writes, and anything beyond these three queries belongs to callers.
pub trait GameStore {
    /// Unique names of teams `team` has played (played games only).
    fn opponents_for_team(
        &self,
        team: &str,
        league: Option<&str>,
        after: Option<NaiveDate>,
    ) -> Result<Vec<String>>;

    /// Played games between two teams, newest first.
    fn head_to_head_games(
        &self,
        team_a: &str,
        team_b: &str,
        league: Option<&str>,
        after: Option<NaiveDate>,
    ) -> Result<Vec<GameRow>>;

    /// Unplayed fixtures involving `team`, date ascending.
    fn unplayed_fixtures_for_team(
        &self,
        team: &str,
        league: Option<&str>,
    ) -> Result<Vec<FixtureRow>>;
}

/// SQLite-backed game store. Team and league filters are case-insensitive
/// substring matches against the stored names: the upstream data source is
/// inconsistent about naming ("FC United" vs "FC United B"), so exact
/// matching would silently drop games. Dates are ISO text and compared
/// lexically, which is equivalent for YYYY-MM-DD.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const GAME_COLUMNS: &str =
    "date, home_team, away_team, home_score, away_score, league_name";

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("game store connection poisoned"))
    }

    /// Insert or update games keyed on their derived id.
    /// Returns (added, updated).
    pub fn upsert_games(&self, games: &[GameRow]) -> Result<(usize, usize)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().context("begin upsert transaction")?;

        let mut added = 0usize;
        let mut updated = 0usize;
        let mut seen = BTreeSet::new();

        for game in games {
            let id = game.game_id();
            if !seen.insert(id.clone()) {
                continue;
            }
            let exists = tx
                .query_row(
                    "SELECT 1 FROM games WHERE game_id = ?1",
                    params![id],
                    |_| Ok(()),
                )
                .optional()
                .context("check existing game")?
                .is_some();

            tx.execute(
                r#"
                INSERT INTO games (
                    game_id, date, home_team, away_team,
                    home_score, away_score, league_name, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(game_id) DO UPDATE SET
                    date = excluded.date,
                    home_team = excluded.home_team,
                    away_team = excluded.away_team,
                    home_score = excluded.home_score,
                    away_score = excluded.away_score,
                    league_name = excluded.league_name,
                    updated_at = excluded.updated_at
                "#,
                params![
                    id,
                    game.date,
                    game.home_team,
                    game.away_team,
                    game.home_score,
                    game.away_score,
                    game.league_name,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("upsert game")?;

            if exists {
                updated += 1;
            } else {
                added += 1;
            }
        }

        tx.commit().context("commit upsert transaction")?;
        Ok((added, updated))
    }

    /// Games involving `team`: played ones newest first, or unplayed ones
    /// date ascending.
    fn team_games(
        &self,
        team: &str,
        league: Option<&str>,
        after: Option<NaiveDate>,
        played: bool,
    ) -> Result<Vec<GameRow>> {
        let conn = self.conn()?;
        let played_clause = if played {
            "home_score IS NOT NULL AND away_score IS NOT NULL"
        } else {
            "(home_score IS NULL OR away_score IS NULL)"
        };
        let order = if played { "DESC" } else { "ASC" };
        let sql = format!(
            r#"
            SELECT {GAME_COLUMNS} FROM games
            WHERE (instr(lower(home_team), ?1) > 0 OR instr(lower(away_team), ?1) > 0)
              AND {played_clause}
              AND (?2 = '' OR instr(lower(league_name), ?2) > 0)
              AND (?3 = '' OR date >= ?3)
            ORDER BY date {order}
            "#,
        );
        let mut stmt = conn.prepare(&sql).context("prepare team games query")?;
        let rows = stmt
            .query_map(
                params![
                    team.to_lowercase(),
                    league.map(str::to_lowercase).unwrap_or_default(),
                    after.map(iso_date).unwrap_or_default(),
                ],
                decode_game_row,
            )
            .context("query team games")?;

        collect_rows(rows)
    }
}

impl GameStore for SqliteStore {
    fn opponents_for_team(
        &self,
        team: &str,
        league: Option<&str>,
        after: Option<NaiveDate>,
    ) -> Result<Vec<String>> {
        let games = self.team_games(team, league, after, true)?;
        let team_lower = team.to_lowercase();

        let mut opponents = BTreeSet::new();
        for game in games {
            if game.home_team.to_lowercase().contains(&team_lower) {
                opponents.insert(game.away_team);
            } else {
                opponents.insert(game.home_team);
            }
        }
        Ok(opponents.into_iter().collect())
    }

    fn head_to_head_games(
        &self,
        team_a: &str,
        team_b: &str,
        league: Option<&str>,
        after: Option<NaiveDate>,
    ) -> Result<Vec<GameRow>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {GAME_COLUMNS} FROM games
            WHERE ((instr(lower(home_team), ?1) > 0 AND instr(lower(away_team), ?2) > 0)
                OR (instr(lower(home_team), ?2) > 0 AND instr(lower(away_team), ?1) > 0))
              AND home_score IS NOT NULL AND away_score IS NOT NULL
              AND (?3 = '' OR instr(lower(league_name), ?3) > 0)
              AND (?4 = '' OR date >= ?4)
            ORDER BY date DESC
            "#,
        );
        let mut stmt = conn.prepare(&sql).context("prepare head-to-head query")?;
        let rows = stmt
            .query_map(
                params![
                    team_a.to_lowercase(),
                    team_b.to_lowercase(),
                    league.map(str::to_lowercase).unwrap_or_default(),
                    after.map(iso_date).unwrap_or_default(),
                ],
                decode_game_row,
            )
            .context("query head-to-head games")?;

        collect_rows(rows)
    }

    fn unplayed_fixtures_for_team(
        &self,
        team: &str,
        league: Option<&str>,
    ) -> Result<Vec<FixtureRow>> {
        let games = self.team_games(team, league, None, false)?;
        let team_lower = team.to_lowercase();

        let mut out = Vec::with_capacity(games.len());
        for game in games {
            let opponent = if game.home_team.to_lowercase().contains(&team_lower) {
                game.away_team
            } else {
                game.home_team
            };
            out.push(FixtureRow {
                opponent,
                league_name: game.league_name,
                date: game.date,
            });
        }
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS games (
            game_id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            league_name TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_games_date ON games(date);
        CREATE INDEX IF NOT EXISTS idx_games_league ON games(league_name);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

fn decode_game_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GameRow> {
    Ok(GameRow {
        date: row.get(0)?,
        home_team: row.get(1)?,
        away_team: row.get(2)?,
        home_score: row.get(3)?,
        away_score: row.get(4)?,
        league_name: row.get(5)?,
    })
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<GameRow>>,
) -> Result<Vec<GameRow>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode game row")?);
    }
    Ok(out)
}

fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn slug(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Default on-disk location, XDG cache first with a ~/.cache fallback.
pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join("matchlens").join("games.sqlite"));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".cache")
            .join("matchlens")
            .join("games.sqlite"),
    )
}
