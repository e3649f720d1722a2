//! Collaborator interfaces the generator talks to.
//!
//! The SQLite store in [`crate::db`] implements all of them; the split keeps
//! the algorithm independent of how rows are actually stored.

use anyhow::Result;
use chrono::NaiveDate;

use crate::track::{DayStatus, GeneratedItem, PlayBlock, PlayRecord, RotationRules, ScheduleDay, Track};

/// Filters pushed down to the catalog query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateQuery {
    pub exclude_explicit: bool,
    /// Keep only instrumental tracks or tracks with unknown instrumental flag.
    pub instrumental_only: bool,
}

/// Outcome of an atomic playlist commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Inserted(usize),
    /// Rows for this (date, block) appeared before the commit could claim it.
    Conflict,
}

pub trait TrackRepository {
    /// Catalog tracks matching the pushed-down filters.
    fn query_candidates(&self, date: NaiveDate, query: &CandidateQuery) -> Result<Vec<Track>>;

    /// Every placement dated strictly after `after`, in any block.
    fn play_history_after(&self, after: NaiveDate) -> Result<Vec<PlayRecord>>;

    /// Stores a single placement.
    fn record_placement(&self, item: &GeneratedItem) -> Result<()>;
}

pub trait PlayBlockConfig {
    fn get(&self, name: &str) -> Result<Option<PlayBlock>>;

    /// All configured blocks in id order.
    fn all(&self) -> Result<Vec<PlayBlock>>;
}

pub trait RotationRulesSource {
    fn current(&self) -> Result<Option<RotationRules>>;
}

pub trait PlaylistStore {
    fn count_items(&self, date: NaiveDate, block_id: i64) -> Result<usize>;

    /// Removes every item of one playlist. Returns how many were removed.
    fn clear_items(&self, date: NaiveDate, block_id: i64) -> Result<usize>;

    /// Inserts a whole playlist in one transaction, refusing if any row for
    /// `(date, block_id)` already exists at commit time.
    fn commit_playlist(&self, date: NaiveDate, block_id: i64, items: &[GeneratedItem]) -> Result<CommitOutcome>;
}

pub trait ScheduleStore {
    fn set_day_status(&self, date: NaiveDate, status: DayStatus) -> Result<()>;

    fn day(&self, date: NaiveDate) -> Result<Option<ScheduleDay>>;

    fn days_between(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<ScheduleDay>>;
}

/// Everything the block generator and scheduler need from one store.
pub trait GeneratorStore: TrackRepository + PlayBlockConfig + RotationRulesSource + PlaylistStore + ScheduleStore {}

impl<T> GeneratorStore for T where T: TrackRepository + PlayBlockConfig + RotationRulesSource + PlaylistStore + ScheduleStore {}
