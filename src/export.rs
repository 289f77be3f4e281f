//! SQLite output: report tables and on-disk cache persistence.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::analytics::Report;
use crate::cache::{CacheKey, ResultCache};
use crate::models::{EntityCount, EntityStats};
use crate::progress::create_progress_bar;

const WRITE_BATCH_SIZE: usize = 10_000;

// ============================================================================
// Report
// ============================================================================

const REPORT_SCHEMA: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA temp_store = MEMORY;

    CREATE TABLE IF NOT EXISTS reports (
        id INTEGER PRIMARY KEY,
        owner TEXT NOT NULL,
        revision TEXT NOT NULL,
        scope TEXT NOT NULL,
        albums_normalized INTEGER NOT NULL,
        granularity TEXT NOT NULL,
        filter_json TEXT NOT NULL,
        summary_json TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS entity_rankings (
        report_id INTEGER NOT NULL REFERENCES reports(id),
        ranking TEXT NOT NULL,
        rank INTEGER NOT NULL,
        key TEXT NOT NULL,
        plays INTEGER NOT NULL,
        total_ms_played INTEGER NOT NULL,
        skips INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS pattern_rankings (
        report_id INTEGER NOT NULL REFERENCES reports(id),
        ranking TEXT NOT NULL,
        rank INTEGER NOT NULL,
        key TEXT NOT NULL,
        count INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS daily_plays (
        report_id INTEGER NOT NULL REFERENCES reports(id),
        date TEXT NOT NULL,
        plays INTEGER NOT NULL
    );
";

/// Write `report` as a new set of rows. Returns the report id.
pub fn write_report(conn: &mut Connection, report: &Report) -> Result<i64> {
    conn.execute_batch(REPORT_SCHEMA)
        .context("Failed to create report tables")?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO reports (owner, revision, scope, albums_normalized, granularity, filter_json, summary_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            report.owner,
            format!("{:016x}", report.revision),
            report.scope.label(),
            report.albums_normalized,
            report.granularity.as_str(),
            serde_json::to_string(&report.filter)?,
            serde_json::to_string(&report.summary)?,
        ],
    )?;
    let report_id = tx.last_insert_rowid();

    let rankings = &report.rankings;
    let entity_tables: [(&str, &[EntityStats]); 6] = [
        ("tracks", rankings.tracks.as_slice()),
        ("artists", rankings.artists.as_slice()),
        ("albums", rankings.albums.as_slice()),
        ("really_played_tracks", rankings.really_played_tracks.as_slice()),
        ("really_played_artists", rankings.really_played_artists.as_slice()),
        ("really_played_albums", rankings.really_played_albums.as_slice()),
    ];
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO entity_rankings (report_id, ranking, rank, key, plays, total_ms_played, skips)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for (ranking, rows) in entity_tables {
            for (rank, row) in rows.iter().enumerate() {
                stmt.execute(params![
                    report_id,
                    ranking,
                    rank as i64 + 1,
                    row.key,
                    row.plays as i64,
                    row.total_ms_played,
                    row.skips as i64,
                ])?;
            }
        }
    }

    let patterns = &report.patterns;
    let pattern_tables: [(&str, &[EntityCount]); 4] = [
        ("streaks", patterns.streaks.as_slice()),
        ("distinct_days", patterns.distinct_days.as_slice()),
        ("spirals", patterns.spirals.as_slice()),
        ("repeat_sessions", patterns.repeat_sessions.as_slice()),
    ];
    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO pattern_rankings (report_id, ranking, rank, key, count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (ranking, rows) in pattern_tables {
            for (rank, row) in rows.iter().enumerate() {
                stmt.execute(params![report_id, ranking, rank as i64 + 1, row.key, row.count as i64])?;
            }
        }
    }
    tx.commit()?;

    let pb = create_progress_bar(patterns.daily.len() as u64, "Writing daily plays");
    for chunk in patterns.daily.chunks(WRITE_BATCH_SIZE) {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO daily_plays (report_id, date, plays) VALUES (?1, ?2, ?3)",
            )?;
            for day in chunk {
                stmt.execute(params![report_id, day.date.to_string(), day.plays as i64])?;
                pb.inc(1);
            }
        }
        tx.commit()?;
    }
    pb.finish_with_message(format!("Wrote {} daily rows", patterns.daily.len()));

    info!(report_id, owner = %report.owner, "Report written to SQLite");
    Ok(report_id)
}

// ============================================================================
// Cache persistence
// ============================================================================

const CACHE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS result_cache (
        owner TEXT NOT NULL,
        revision TEXT NOT NULL,
        engine TEXT NOT NULL,
        params TEXT NOT NULL,
        payload BLOB NOT NULL,
        PRIMARY KEY (owner, revision, engine, params)
    );
";

fn revision_hex(revision: u64) -> String {
    format!("{revision:016x}")
}

/// Persist every completed cache entry, replacing stored ones.
pub fn save_cache(conn: &mut Connection, cache: &ResultCache) -> Result<usize> {
    conn.execute_batch(CACHE_SCHEMA)
        .context("Failed to create cache table")?;
    let entries = cache.entries();

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO result_cache (owner, revision, engine, params, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (key, payload) in &entries {
            stmt.execute(params![
                key.owner,
                revision_hex(key.revision),
                key.engine,
                key.params,
                &payload[..],
            ])?;
        }
    }
    tx.commit()?;

    info!(entries = entries.len(), "Saved result cache");
    Ok(entries.len())
}

/// Load stored entries of `owner` at `revision` into `cache`. Entries of
/// older revisions are deleted. Returns how many entries were loaded.
pub fn load_cache(conn: &Connection, cache: &ResultCache, owner: &str, revision: u64) -> Result<usize> {
    conn.execute_batch(CACHE_SCHEMA)
        .context("Failed to create cache table")?;

    let stale = conn.execute(
        "DELETE FROM result_cache WHERE owner = ?1 AND revision != ?2",
        params![owner, revision_hex(revision)],
    )?;

    let mut stmt = conn.prepare(
        "SELECT engine, params, payload FROM result_cache WHERE owner = ?1 AND revision = ?2",
    )?;
    let mut rows = stmt.query(params![owner, revision_hex(revision)])?;
    let mut loaded = 0;
    while let Some(row) = rows.next()? {
        let engine: String = row.get(0)?;
        let params: String = row.get(1)?;
        let payload: Vec<u8> = row.get(2)?;
        if cache.preload(CacheKey::new(owner, revision, &engine, params), payload) {
            loaded += 1;
        }
    }

    info!(owner, loaded, stale, "Loaded result cache");
    Ok(loaded)
}

/// Number of stored reports, if the table exists.
pub fn report_count(conn: &Connection) -> Result<Option<i64>> {
    let exists = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'reports'",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    if exists.is_none() {
        return Ok(None);
    }
    let count = conn.query_row("SELECT COUNT(*) FROM reports", [], |row| row.get(0))?;
    Ok(Some(count))
}
