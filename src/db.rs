//! SQLite storage for the catalog, configuration, playlists and schedule.
//!
//! [`Store`] implements every collaborator trait from [`crate::repository`].
//! Rows are validated into typed records here, so the generator never sees a
//! half-filled block or rules row.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use std::path::Path;

use crate::repository::{
    CandidateQuery, CommitOutcome, PlayBlockConfig, PlaylistStore, RotationRulesSource, ScheduleStore,
    TrackRepository,
};
use crate::track::{
    DayStatus, GeneratedItem, PlayBlock, PlayRecord, Range, RotationRules, ScheduleDay, Track, TrackImport,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tracks (
        id           INTEGER PRIMARY KEY,
        title        TEXT    NOT NULL,
        artist       TEXT    NOT NULL,
        uri          TEXT    NOT NULL UNIQUE,
        duration_sec INTEGER NOT NULL,
        bpm          REAL,
        energy       REAL,
        instrumental INTEGER,
        explicit     INTEGER NOT NULL DEFAULT 0,
        source       TEXT    NOT NULL,
        added_at     TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks(artist);

    CREATE TABLE IF NOT EXISTS play_blocks (
        id                  INTEGER PRIMARY KEY,
        name                TEXT    NOT NULL UNIQUE,
        target_min          INTEGER NOT NULL,
        bpm_min             REAL    NOT NULL,
        bpm_max             REAL    NOT NULL,
        energy_min          REAL    NOT NULL,
        energy_max          REAL    NOT NULL,
        prefer_instrumental INTEGER NOT NULL DEFAULT 0,
        color               TEXT    NOT NULL DEFAULT '#888888'
    );

    CREATE TABLE IF NOT EXISTS rotation_rules (
        id                  INTEGER PRIMARY KEY,
        track_cooldown_days INTEGER NOT NULL,
        artist_cooldown_min INTEGER NOT NULL,
        exclude_explicit    INTEGER NOT NULL,
        normalize_loudness  INTEGER NOT NULL,
        updated_at          TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS generated_items (
        id           INTEGER PRIMARY KEY,
        track_id     INTEGER NOT NULL REFERENCES tracks(id) ON DELETE RESTRICT,
        artist       TEXT    NOT NULL,
        date_iso     TEXT    NOT NULL,
        block_id     INTEGER NOT NULL REFERENCES play_blocks(id),
        position     INTEGER NOT NULL,
        generated_at TEXT    NOT NULL,
        UNIQUE (date_iso, block_id, position),
        UNIQUE (date_iso, block_id, track_id)
    );
    CREATE INDEX IF NOT EXISTS idx_generated_date ON generated_items(date_iso);

    CREATE TABLE IF NOT EXISTS schedule_days (
        date_iso   TEXT PRIMARY KEY,
        status     TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
";

/// Service windows created on first initialization.
fn default_blocks() -> Vec<PlayBlock> {
    vec![
        PlayBlock {
            id: 0,
            name: "Lunch".into(),
            target_minutes: 120,
            tempo_range: Range::new(80.0, 110.0),
            energy_range: Range::new(0.3, 0.6),
            prefer_instrumental: false,
            color: "#f5a623".into(),
        },
        PlayBlock {
            id: 0,
            name: "Dinner".into(),
            target_minutes: 180,
            tempo_range: Range::new(70.0, 100.0),
            energy_range: Range::new(0.2, 0.5),
            prefer_instrumental: false,
            color: "#7b61ff".into(),
        },
        PlayBlock {
            id: 0,
            name: "Late".into(),
            target_minutes: 120,
            tempo_range: Range::new(90.0, 125.0),
            energy_range: Range::new(0.4, 0.8),
            prefer_instrumental: false,
            color: "#1f2a44".into(),
        },
    ]
}

/// Result of a catalog import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped_invalid: usize,
    pub duplicates: usize,
}

/// Optional filters for listing the catalog.
#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    /// Case-insensitive substring.
    pub artist: Option<String>,
    pub bpm: Option<Range>,
    pub energy: Option<Range>,
    pub limit: usize,
    pub offset: usize,
}

/// One row of a persisted playlist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistEntry {
    pub position: u32,
    pub track: Track,
}

/// A persisted (date, block) playlist, in position order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistView {
    pub date: NaiveDate,
    pub block: PlayBlock,
    pub entries: Vec<PlaylistEntry>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl PlaylistView {
    #[must_use]
    pub fn total_duration_sec(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.track.duration_sec)).sum()
    }
}

/// Aggregate row for history listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistSummary {
    pub date: NaiveDate,
    pub block_id: i64,
    pub block_name: String,
    pub track_count: usize,
    pub total_duration_sec: u64,
    pub generated_at: DateTime<Utc>,
}

/// Handle on the SQLite database.
pub struct Store {
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.conn.path()).finish()
    }
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get("id")?,
        title: row.get("title")?,
        artist: row.get("artist")?,
        uri: row.get("uri")?,
        duration_sec: row.get("duration_sec")?,
        tempo_bpm: row.get("bpm")?,
        energy: row.get("energy")?,
        is_instrumental: row.get("instrumental")?,
        is_explicit: row.get("explicit")?,
        source: row.get("source")?,
    })
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<PlayBlock> {
    Ok(PlayBlock {
        id: row.get("id")?,
        name: row.get("name")?,
        target_minutes: row.get("target_min")?,
        tempo_range: Range::new(row.get("bpm_min")?, row.get("bpm_max")?),
        energy_range: Range::new(row.get("energy_min")?, row.get("energy_max")?),
        prefer_instrumental: row.get("prefer_instrumental")?,
        color: row.get("color")?,
    })
}

const TRACK_COLUMNS: &str = "id, title, artist, uri, duration_sec, bpm, energy, instrumental, explicit, source";
const BLOCK_COLUMNS: &str = "id, name, target_min, bpm_min, bpm_max, energy_min, energy_max, prefer_instrumental, color";

impl Store {
    /// Opens (creating if needed) the database at `path` and ensures the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("SQLite connection refused. DB location: {}", path.display()))?;
        let store = Self { conn };
        store.prepare()?;
        Ok(store)
    }

    /// Private in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self { conn };
        store.prepare()?;
        Ok(store)
    }

    fn prepare(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .context("Failed to configure SQLite connection")?;
        self.conn
            .execute_batch(SCHEMA)
            .context("Invalid SQL command when creating tables")?;
        Ok(())
    }

    /// Seeds default blocks and rules when absent. With `reset`, wipes playlists,
    /// schedule and configuration first (the catalog is kept).
    pub fn init(&self, reset: bool) -> Result<()> {
        if reset {
            warn!("Resetting playlists, schedule and configuration");
            self.conn
                .execute_batch(
                    "DELETE FROM generated_items; DELETE FROM schedule_days;
                     DELETE FROM play_blocks; DELETE FROM rotation_rules;",
                )
                .context("Failed to reset database")?;
        }

        let blocks: i64 = self.conn.query_row("SELECT COUNT(*) FROM play_blocks", [], |row| row.get(0))?;
        if blocks == 0 {
            for block in default_blocks() {
                self.upsert_block(&block)?;
            }
            info!("Seeded default play blocks");
        }
        if RotationRulesSource::current(self)?.is_none() {
            self.set_rules(&RotationRules::default())?;
            info!("Seeded default rotation rules");
        }
        Ok(())
    }

    /// Imports catalog rows. Invalid rows and duplicate URIs are skipped and counted.
    pub fn import_tracks(&mut self, tracks: &[TrackImport]) -> Result<ImportReport> {
        let tx = self.conn.transaction()?;
        let mut report = ImportReport::default();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tracks (title, artist, uri, duration_sec, bpm, energy, instrumental, explicit, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (uri) DO NOTHING",
            )?;

            for track in tracks {
                if let Err(err) = track.validate() {
                    warn!("Skipping invalid track: {err}");
                    report.skipped_invalid += 1;
                    continue;
                }
                let inserted = stmt
                    .execute(params![
                        track.title.trim(),
                        track.artist.trim(),
                        track.uri.trim(),
                        track.duration_sec,
                        track.tempo_bpm,
                        track.energy,
                        track.is_instrumental,
                        track.is_explicit,
                        track.source,
                    ])
                    .with_context(|| format!("Invalid SQL statement when inserting track: {track:?}"))?;
                if inserted == 0 {
                    debug!("Track already exists: {}", track.uri);
                    report.duplicates += 1;
                } else {
                    report.imported += 1;
                }
            }
        }
        tx.commit().context("Committing SQL transaction failed.")?;
        info!(
            "Imported {} tracks ({} invalid, {} duplicates)",
            report.imported, report.skipped_invalid, report.duplicates
        );
        Ok(report)
    }

    pub fn track(&self, id: i64) -> Result<Option<Track>> {
        self.conn
            .query_row(&format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?1"), [id], track_from_row)
            .optional()
            .with_context(|| format!("Failed to query track {id}"))
    }

    /// Administrative edit. Returns `false` if no track has this id.
    pub fn update_track(&self, id: i64, track: &TrackImport) -> Result<bool> {
        track.validate()?;
        let changed = self
            .conn
            .execute(
                "UPDATE tracks SET title = ?1, artist = ?2, uri = ?3, duration_sec = ?4, bpm = ?5,
                        energy = ?6, instrumental = ?7, explicit = ?8, source = ?9
                 WHERE id = ?10",
                params![
                    track.title,
                    track.artist,
                    track.uri,
                    track.duration_sec,
                    track.tempo_bpm,
                    track.energy,
                    track.is_instrumental,
                    track.is_explicit,
                    track.source,
                    id,
                ],
            )
            .with_context(|| format!("Failed to update track {id}"))?;
        Ok(changed > 0)
    }

    /// Removes a track that has never been placed. Returns `false` if it did not exist.
    pub fn delete_track(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM tracks WHERE id = ?1", [id])
            .with_context(|| format!("Failed to delete track {id}; it may still be part of a playlist"))?;
        Ok(removed > 0)
    }

    pub fn list_tracks(&self, filter: &TrackFilter) -> Result<Vec<Track>> {
        let artist = filter.artist.as_ref().map(|a| format!("%{}%", a.to_lowercase()));
        let limit = if filter.limit == 0 { -1 } else { i64::try_from(filter.limit).unwrap_or(i64::MAX) };
        let offset = i64::try_from(filter.offset).unwrap_or(0);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks
             WHERE (?1 IS NULL OR LOWER(artist) LIKE ?1)
               AND (?2 IS NULL OR bpm >= ?2) AND (?3 IS NULL OR bpm <= ?3)
               AND (?4 IS NULL OR energy >= ?4) AND (?5 IS NULL OR energy <= ?5)
             ORDER BY artist, title
             LIMIT ?6 OFFSET ?7"
        ))?;
        let rows = stmt.query_map(
            params![
                artist,
                filter.bpm.map(|r| r.min),
                filter.bpm.map(|r| r.max),
                filter.energy.map(|r| r.min),
                filter.energy.map(|r| r.max),
                limit,
                offset,
            ],
            track_from_row,
        )?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("Cannot query tracks.")
    }

    pub fn track_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Inserts or updates a block by name. Returns its id.
    pub fn upsert_block(&self, block: &PlayBlock) -> Result<i64> {
        block.validate()?;
        self.conn
            .query_row(
                "INSERT INTO play_blocks (name, target_min, bpm_min, bpm_max, energy_min, energy_max, prefer_instrumental, color)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (name) DO UPDATE SET
                    target_min = excluded.target_min, bpm_min = excluded.bpm_min, bpm_max = excluded.bpm_max,
                    energy_min = excluded.energy_min, energy_max = excluded.energy_max,
                    prefer_instrumental = excluded.prefer_instrumental, color = excluded.color
                 RETURNING id",
                params![
                    block.name,
                    block.target_minutes,
                    block.tempo_range.min,
                    block.tempo_range.max,
                    block.energy_range.min,
                    block.energy_range.max,
                    block.prefer_instrumental,
                    block.color,
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to save play block `{}`", block.name))
    }

    /// Stores a new current rules row. Older rows are kept as an audit trail.
    pub fn set_rules(&self, rules: &RotationRules) -> Result<()> {
        rules.validate()?;
        self.conn
            .execute(
                "INSERT INTO rotation_rules (track_cooldown_days, artist_cooldown_min, exclude_explicit, normalize_loudness)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    rules.track_cooldown_days,
                    rules.artist_cooldown_minutes,
                    rules.exclude_explicit,
                    rules.normalize_loudness,
                ],
            )
            .context("Failed to save rotation rules")?;
        Ok(())
    }

    /// A persisted playlist joined with its tracks, or `None` if nothing was generated.
    pub fn playlist(&self, date: NaiveDate, block_name: &str) -> Result<Option<PlaylistView>> {
        let Some(block) = PlayBlockConfig::get(self, block_name)? else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT gi.position, gi.generated_at, t.id, t.title, t.artist, t.uri, t.duration_sec,
                    t.bpm, t.energy, t.instrumental, t.explicit, t.source
             FROM generated_items gi JOIN tracks t ON gi.track_id = t.id
             WHERE gi.date_iso = ?1 AND gi.block_id = ?2
             ORDER BY gi.position",
        )?;
        let rows = stmt.query_map(params![date, block.id], |row| {
            Ok((
                PlaylistEntry { position: row.get("position")?, track: track_from_row(row)? },
                row.get::<_, DateTime<Utc>>("generated_at")?,
            ))
        })?;

        let mut entries = Vec::new();
        let mut generated_at = None;
        for row in rows {
            let (entry, at) = row.context("Queried playlist row unwrap failed.")?;
            generated_at = Some(generated_at.map_or(at, |earliest: DateTime<Utc>| earliest.min(at)));
            entries.push(entry);
        }
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(PlaylistView { date, block, entries, generated_at }))
    }

    /// Generated playlists between two dates (inclusive), newest first.
    pub fn playlist_history(&self, from: NaiveDate, to: NaiveDate, limit: usize) -> Result<Vec<PlaylistSummary>> {
        let limit = if limit == 0 { -1 } else { i64::try_from(limit).unwrap_or(i64::MAX) };
        let mut stmt = self.conn.prepare(
            "SELECT gi.date_iso, pb.id, pb.name, COUNT(gi.id), SUM(t.duration_sec), MIN(gi.generated_at)
             FROM generated_items gi
             JOIN tracks t ON gi.track_id = t.id
             JOIN play_blocks pb ON gi.block_id = pb.id
             WHERE gi.date_iso >= ?1 AND gi.date_iso <= ?2
             GROUP BY gi.date_iso, pb.id, pb.name
             ORDER BY gi.date_iso DESC, pb.id
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![from, to, limit], |row| {
            Ok(PlaylistSummary {
                date: row.get(0)?,
                block_id: row.get(1)?,
                block_name: row.get(2)?,
                track_count: row.get::<_, i64>(3)?.try_into().unwrap_or(0),
                total_duration_sec: row.get::<_, i64>(4)?.try_into().unwrap_or(0),
                generated_at: row.get(5)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("Cannot query playlist history.")
    }

    fn insert_item(conn: &Connection, item: &GeneratedItem) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO generated_items (track_id, artist, date_iso, block_id, position, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![item.track_id, item.artist, item.date, item.block_id, item.position, item.generated_at],
        )
    }
}

impl TrackRepository for Store {
    fn query_candidates(&self, _date: NaiveDate, query: &CandidateQuery) -> Result<Vec<Track>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM tracks
             WHERE (NOT ?1 OR explicit = 0)
               AND (NOT ?2 OR instrumental = 1 OR instrumental IS NULL)
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![query.exclude_explicit, query.instrumental_only], track_from_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("Cannot query candidate tracks.")
    }

    fn play_history_after(&self, after: NaiveDate) -> Result<Vec<PlayRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT track_id, artist, date_iso FROM generated_items WHERE date_iso > ?1")?;
        let rows = stmt.query_map([after], |row| {
            Ok(PlayRecord { track_id: row.get(0)?, artist: row.get(1)?, date: row.get(2)? })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().context("Cannot query play history.")
    }

    fn record_placement(&self, item: &GeneratedItem) -> Result<()> {
        Self::insert_item(&self.conn, item)
            .with_context(|| format!("Failed to record placement of track {} on {}", item.track_id, item.date))?;
        Ok(())
    }
}

impl PlayBlockConfig for Store {
    fn get(&self, name: &str) -> Result<Option<PlayBlock>> {
        let block = self
            .conn
            .query_row(&format!("SELECT {BLOCK_COLUMNS} FROM play_blocks WHERE name = ?1"), [name], block_from_row)
            .optional()
            .with_context(|| format!("Failed to query play block `{name}`"))?;
        if let Some(block) = &block {
            block.validate()?;
        }
        Ok(block)
    }

    fn all(&self) -> Result<Vec<PlayBlock>> {
        let mut stmt = self.conn.prepare(&format!("SELECT {BLOCK_COLUMNS} FROM play_blocks ORDER BY id"))?;
        let blocks = stmt
            .query_map([], block_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Cannot query play blocks.")?;
        for block in &blocks {
            block.validate()?;
        }
        Ok(blocks)
    }
}

impl RotationRulesSource for Store {
    fn current(&self) -> Result<Option<RotationRules>> {
        let rules = self
            .conn
            .query_row(
                "SELECT track_cooldown_days, artist_cooldown_min, exclude_explicit, normalize_loudness
                 FROM rotation_rules ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RotationRules {
                        track_cooldown_days: row.get(0)?,
                        artist_cooldown_minutes: row.get(1)?,
                        exclude_explicit: row.get(2)?,
                        normalize_loudness: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("Failed to query rotation rules")?;
        if let Some(rules) = &rules {
            rules.validate()?;
        }
        Ok(rules)
    }
}

impl PlaylistStore for Store {
    fn count_items(&self, date: NaiveDate, block_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM generated_items WHERE date_iso = ?1 AND block_id = ?2",
            params![date, block_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn clear_items(&self, date: NaiveDate, block_id: i64) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM generated_items WHERE date_iso = ?1 AND block_id = ?2",
                params![date, block_id],
            )
            .with_context(|| format!("Failed to clear playlist {date} / block {block_id}"))
    }

    fn commit_playlist(&self, date: NaiveDate, block_id: i64, items: &[GeneratedItem]) -> Result<CommitOutcome> {
        // IMMEDIATE takes the write lock up front, so the emptiness check and the
        // inserts cannot interleave with another writer.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .context("Failed to begin playlist transaction")?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM generated_items WHERE date_iso = ?1 AND block_id = ?2",
            params![date, block_id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            tx.rollback()?;
            return Ok(CommitOutcome::Conflict);
        }

        for item in items {
            if item.date != date || item.block_id != block_id {
                bail!("Item for {} / block {} does not belong to this playlist", item.date, item.block_id);
            }
            Self::insert_item(&tx, item).with_context(|| {
                format!("Failed to insert position {} (track {})", item.position, item.track_id)
            })?;
        }
        tx.commit().context("Committing playlist transaction failed.")?;
        Ok(CommitOutcome::Inserted(items.len()))
    }
}

impl ScheduleStore for Store {
    fn set_day_status(&self, date: NaiveDate, status: DayStatus) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO schedule_days (date_iso, status) VALUES (?1, ?2)
                 ON CONFLICT (date_iso) DO UPDATE SET status = excluded.status, updated_at = CURRENT_TIMESTAMP",
                params![date, status.as_str()],
            )
            .with_context(|| format!("Failed to set status of {date} to {status}"))?;
        Ok(())
    }

    fn day(&self, date: NaiveDate) -> Result<Option<ScheduleDay>> {
        let status: Option<String> = self
            .conn
            .query_row("SELECT status FROM schedule_days WHERE date_iso = ?1", [date], |row| row.get(0))
            .optional()?;
        match status {
            Some(status) => Ok(Some(ScheduleDay { date, status: status.parse()? })),
            None => Ok(None),
        }
    }

    fn days_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<ScheduleDay>> {
        let mut stmt = self.conn.prepare(
            "SELECT date_iso, status FROM schedule_days WHERE date_iso >= ?1 AND date_iso <= ?2 ORDER BY date_iso",
        )?;
        let rows = stmt.query_map(params![from, to], |row| {
            Ok((row.get::<_, NaiveDate>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut days = Vec::new();
        for row in rows {
            let (date, status) = row?;
            days.push(ScheduleDay { date, status: status.parse()? });
        }
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn import(uri: &str, artist: &str) -> TrackImport {
        TrackImport {
            title: format!("Song {uri}"),
            artist: artist.into(),
            uri: uri.into(),
            duration_sec: 210,
            tempo_bpm: Some(96.0),
            energy: Some(0.45),
            is_instrumental: None,
            is_explicit: false,
            source: "csv".into(),
        }
    }

    fn store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.init(false).unwrap();
        store
    }

    #[test]
    fn test_init_seeds_defaults_once() {
        let store = store();
        store.init(false).unwrap();

        let names: Vec<String> = store.all().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["Lunch", "Dinner", "Late"]);
        assert_eq!(RotationRulesSource::current(&store).unwrap(), Some(RotationRules::default()));
    }

    #[test]
    fn test_import_counts_duplicates_and_invalid_rows() {
        let mut store = store();
        let bad = TrackImport { duration_sec: 0, ..import("spotify:track:x", "X") };
        let report = store
            .import_tracks(&[import("spotify:track:1", "A"), import("spotify:track:1", "A"), bad])
            .unwrap();

        assert_eq!(report, ImportReport { imported: 1, skipped_invalid: 1, duplicates: 1 });
        assert_eq!(store.track_count().unwrap(), 1);
    }

    #[test]
    fn test_unknown_attributes_survive_storage() {
        let mut store = store();
        let unknown = TrackImport { tempo_bpm: None, energy: None, ..import("spotify:track:9", "Z") };
        store.import_tracks(&[unknown]).unwrap();

        let track = store.list_tracks(&TrackFilter::default()).unwrap().remove(0);
        assert_eq!(track.tempo_bpm, None);
        assert_eq!(track.energy, None);
        assert_eq!(track.is_instrumental, None);
    }

    #[test]
    fn test_candidate_query_pushes_filters_down() {
        let mut store = store();
        store
            .import_tracks(&[
                TrackImport { is_explicit: true, ..import("u:1", "A") },
                TrackImport { is_instrumental: Some(false), ..import("u:2", "B") },
                TrackImport { is_instrumental: Some(true), ..import("u:3", "C") },
                import("u:4", "D"),
            ])
            .unwrap();

        let day = date("2025-08-13");
        let all = store.query_candidates(day, &CandidateQuery::default()).unwrap();
        assert_eq!(all.len(), 4);

        let clean = store
            .query_candidates(day, &CandidateQuery { exclude_explicit: true, instrumental_only: true })
            .unwrap();
        let uris: Vec<&str> = clean.iter().map(|t| t.uri.as_str()).collect();
        assert_eq!(uris, vec!["u:3", "u:4"]);
    }

    #[test]
    fn test_commit_refuses_when_rows_exist() {
        let mut store = store();
        store.import_tracks(&[import("u:1", "A"), import("u:2", "B")]).unwrap();
        let lunch = PlayBlockConfig::get(&store, "Lunch").unwrap().unwrap();
        let day = date("2025-08-13");
        let item = |track_id, position| GeneratedItem {
            track_id,
            artist: "A".into(),
            date: day,
            block_id: lunch.id,
            position,
            generated_at: Utc::now(),
        };

        assert_eq!(store.commit_playlist(day, lunch.id, &[item(1, 1), item(2, 2)]).unwrap(), CommitOutcome::Inserted(2));
        assert_eq!(store.commit_playlist(day, lunch.id, &[item(1, 1)]).unwrap(), CommitOutcome::Conflict);
        assert_eq!(store.count_items(day, lunch.id).unwrap(), 2);

        assert_eq!(store.clear_items(day, lunch.id).unwrap(), 2);
        assert_eq!(store.count_items(day, lunch.id).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_track_in_one_playlist_is_rejected() {
        let mut store = store();
        store.import_tracks(&[import("u:1", "A")]).unwrap();
        let lunch = PlayBlockConfig::get(&store, "Lunch").unwrap().unwrap();
        let day = date("2025-08-13");
        let item = |position| GeneratedItem {
            track_id: 1,
            artist: "A".into(),
            date: day,
            block_id: lunch.id,
            position,
            generated_at: Utc::now(),
        };

        assert!(store.commit_playlist(day, lunch.id, &[item(1), item(2)]).is_err());
        // The failed transaction left nothing behind.
        assert_eq!(store.count_items(day, lunch.id).unwrap(), 0);
    }

    #[test]
    fn test_recorded_placement_shows_in_history() {
        let mut store = store();
        store.import_tracks(&[import("u:1", "A"), import("u:2", "B")]).unwrap();
        let late = PlayBlockConfig::get(&store, "Late").unwrap().unwrap();
        let item = |track_id, artist: &str, day| GeneratedItem {
            track_id,
            artist: artist.into(),
            date: date(day),
            block_id: late.id,
            position: 1,
            generated_at: Utc::now(),
        };

        store.record_placement(&item(1, "A", "2025-08-10")).unwrap();
        store.record_placement(&item(2, "B", "2025-08-12")).unwrap();
        // Same (date, block, position) twice.
        assert!(store.record_placement(&item(2, "B", "2025-08-10")).is_err());

        let history = store.play_history_after(date("2025-08-10")).unwrap();
        assert_eq!(history, vec![PlayRecord { track_id: 2, artist: "B".into(), date: date("2025-08-12") }]);
        assert_eq!(store.play_history_after(date("2025-08-09")).unwrap().len(), 2);
    }

    #[test]
    fn test_schedule_status_upserts() {
        let store = store();
        let day = date("2025-08-13");
        assert!(store.day(day).unwrap().is_none());

        store.set_day_status(day, DayStatus::Generating).unwrap();
        store.set_day_status(day, DayStatus::Completed).unwrap();
        assert_eq!(store.day(day).unwrap().unwrap().status, DayStatus::Completed);

        let days = store.days_between(date("2025-08-01"), date("2025-08-31")).unwrap();
        assert_eq!(days.len(), 1);
    }

    #[test]
    fn test_block_upsert_updates_by_name() {
        let store = store();
        let mut lunch = PlayBlockConfig::get(&store, "Lunch").unwrap().unwrap();
        lunch.target_minutes = 90;
        let id = store.upsert_block(&lunch).unwrap();

        assert_eq!(id, lunch.id);
        assert_eq!(PlayBlockConfig::get(&store, "Lunch").unwrap().unwrap().target_minutes, 90);
        assert!(PlayBlockConfig::get(&store, "Brunch").unwrap().is_none());
    }

    #[test]
    fn test_block_upsert_rejects_oversized_target() {
        let store = store();
        let mut lunch = PlayBlockConfig::get(&store, "Lunch").unwrap().unwrap();
        lunch.target_minutes = 80_000_000;

        assert!(store.upsert_block(&lunch).is_err());
        assert_eq!(PlayBlockConfig::get(&store, "Lunch").unwrap().unwrap().target_minutes, 120);
    }
}
