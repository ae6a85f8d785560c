use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use time_humanize::{Accuracy, HumanTime, Tense};

use crate::app_dirs::AppDirs;
use crate::controller::GameReport;
use crate::games::GameKind;
use crate::Result;

/// One finished session, as stored in the results database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResult {
    pub game: GameKind,
    pub score: u32,
    pub level_reached: u32,
    pub levels_completed: u32,
    pub trials: u32,
    /// The game's own metrics object.
    pub metrics: serde_json::Value,
    pub finished_at: DateTime<Local>,
}

impl SessionResult {
    pub fn from_report<M: Serialize>(report: &GameReport<M>) -> Self {
        Self {
            game: report.game,
            score: report.score,
            level_reached: report.level_reached,
            levels_completed: report.levels_completed,
            trials: report.trials as u32,
            metrics: serde_json::to_value(&report.metrics).unwrap_or_default(),
            finished_at: Local::now(),
        }
    }

    /// "3 minutes ago" style age relative to `now`.
    pub fn age(&self, now: DateTime<Local>) -> String {
        let elapsed = (now - self.finished_at).to_std().unwrap_or_default();
        HumanTime::from(elapsed).to_text_en(Accuracy::Rough, Tense::Past)
    }
}

/// Flat CSV row; metrics stay a JSON string.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    game: String,
    score: u32,
    level_reached: u32,
    levels_completed: u32,
    trials: u32,
    finished_at: String,
    metrics: &'a str,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS session_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        game TEXT NOT NULL,
        score INTEGER NOT NULL,
        level_reached INTEGER NOT NULL,
        levels_completed INTEGER NOT NULL,
        trials INTEGER NOT NULL,
        metrics TEXT NOT NULL,
        finished_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_session_results_game ON session_results(game);
    CREATE INDEX IF NOT EXISTS idx_session_results_finished ON session_results(finished_at);
"#;

const COLUMNS: &str =
    "game, score, level_reached, levels_completed, trials, metrics, finished_at";

/// Database of finished sessions
#[derive(Debug)]
pub struct StatsDb {
    conn: Connection,
}

impl StatsDb {
    /// Open the database under $HOME/.local/state/brisk, creating it if needed
    pub fn new() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("brisk_stats.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(StatsDb { conn })
    }

    pub fn record(&self, result: &SessionResult) -> Result<i64> {
        self.conn.execute(
            &format!("INSERT INTO session_results ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                result.game.to_string(),
                result.score,
                result.level_reached,
                result.levels_completed,
                result.trials,
                serde_json::to_string(&result.metrics)?,
                result.finished_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent results first, optionally for one game only.
    pub fn recent(&self, limit: usize, game: Option<GameKind>) -> Result<Vec<SessionResult>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COLUMNS} FROM session_results
             WHERE ?1 IS NULL OR game = ?1
             ORDER BY finished_at DESC, id DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(
            params![game.map(|g| g.to_string()), limit as i64],
            result_from_row,
        )?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn all(&self) -> Result<Vec<SessionResult>> {
        self.recent(i64::MAX as usize, None)
    }

    pub fn best_score(&self, game: GameKind) -> Result<Option<u32>> {
        let best = self
            .conn
            .query_row(
                "SELECT MAX(score) FROM session_results WHERE game = ?1",
                [game.to_string()],
                |row| row.get::<_, Option<u32>>(0),
            )
            .optional()?;
        Ok(best.flatten())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM session_results", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Clear all results (for testing or reset purposes)
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM session_results", [])?;
        Ok(())
    }

    /// Write every stored result as CSV, oldest first. Returns the row count.
    pub fn export_csv<W: Write>(&self, out: W) -> Result<usize> {
        let mut results = self.all()?;
        results.reverse();

        let mut writer = csv::Writer::from_writer(out);
        for result in &results {
            let metrics = serde_json::to_string(&result.metrics)?;
            writer.serialize(CsvRow {
                game: result.game.to_string(),
                score: result.score,
                level_reached: result.level_reached,
                levels_completed: result.levels_completed,
                trials: result.trials,
                finished_at: result.finished_at.to_rfc3339(),
                metrics: &metrics,
            })?;
        }
        writer.flush()?;
        Ok(results.len())
    }
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<SessionResult> {
    let game: String = row.get(0)?;
    let game = GameKind::parse(&game).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(0, "game".to_string(), rusqlite::types::Type::Text)
    })?;
    let metrics: String = row.get(5)?;
    let finished_at: String = row.get(6)?;
    let finished_at = DateTime::parse_from_rfc3339(&finished_at)
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                6,
                "finished_at".to_string(),
                rusqlite::types::Type::Text,
            )
        })?
        .with_timezone(&Local);

    Ok(SessionResult {
        game,
        score: row.get(1)?,
        level_reached: row.get(2)?,
        levels_completed: row.get(3)?,
        trials: row.get(4)?,
        metrics: serde_json::from_str(&metrics).unwrap_or_default(),
        finished_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn result(game: GameKind, score: u32, minutes_ago: i64) -> SessionResult {
        SessionResult {
            game,
            score,
            level_reached: 2,
            levels_completed: 1,
            trials: 12,
            metrics: json!({ "score": score, "tasa_aciertos": 75.0 }),
            finished_at: Local::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn record_and_read_back() {
        let db = StatsDb::in_memory().unwrap();
        let stored = result(GameKind::Flanker, 70, 5);
        db.record(&stored).unwrap();

        let recent = db.recent(10, None).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].game, GameKind::Flanker);
        assert_eq!(recent[0].score, 70);
        assert_eq!(recent[0].metrics["tasa_aciertos"], 75.0);
        assert_eq!(
            recent[0].finished_at.timestamp(),
            stored.finished_at.timestamp()
        );
    }

    #[test]
    fn recent_is_newest_first_and_filtered() {
        let db = StatsDb::in_memory().unwrap();
        db.record(&result(GameKind::Flanker, 10, 30)).unwrap();
        db.record(&result(GameKind::ColorMatch, 20, 20)).unwrap();
        db.record(&result(GameKind::Flanker, 30, 10)).unwrap();

        let all = db.recent(10, None).unwrap();
        let scores: Vec<u32> = all.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![30, 20, 10]);

        let flanker = db.recent(10, Some(GameKind::Flanker)).unwrap();
        assert_eq!(flanker.len(), 2);
        assert!(flanker.iter().all(|r| r.game == GameKind::Flanker));

        assert_eq!(db.recent(1, None).unwrap().len(), 1);
    }

    #[test]
    fn best_score_per_game() {
        let db = StatsDb::in_memory().unwrap();
        assert_eq!(db.best_score(GameKind::RuleSwitch).unwrap(), None);
        db.record(&result(GameKind::RuleSwitch, 40, 3)).unwrap();
        db.record(&result(GameKind::RuleSwitch, 90, 2)).unwrap();
        db.record(&result(GameKind::Flanker, 500, 1)).unwrap();
        assert_eq!(db.best_score(GameKind::RuleSwitch).unwrap(), Some(90));
    }

    #[test]
    fn clear_removes_everything() {
        let db = StatsDb::in_memory().unwrap();
        db.record(&result(GameKind::SpatialCue, 10, 1)).unwrap();
        assert_eq!(db.count().unwrap(), 1);
        db.clear().unwrap();
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn export_writes_header_and_rows_oldest_first() {
        let db = StatsDb::in_memory().unwrap();
        db.record(&result(GameKind::PatternRecall, 60, 2)).unwrap();
        db.record(&result(GameKind::SequenceRecall, 30, 9)).unwrap();

        let mut out = Vec::new();
        assert_eq!(db.export_csv(&mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "game,score,level_reached,levels_completed,trials,finished_at,metrics"
        );
        assert!(lines[1].starts_with("sequence-recall,30,"));
        assert!(lines[2].starts_with("pattern-recall,60,"));
    }

    #[test]
    fn opens_on_disk_and_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("stats.db");
        {
            let db = StatsDb::open(&path).unwrap();
            db.record(&result(GameKind::ColorMatch, 10, 0)).unwrap();
        }
        let db = StatsDb::open(&path).unwrap();
        assert_eq!(db.count().unwrap(), 1);
    }

    #[test]
    fn age_is_humanized() {
        let r = result(GameKind::Flanker, 10, 0);
        let age = r.age(r.finished_at + Duration::hours(3));
        assert!(age.contains("hours"), "{age}");
    }
}
