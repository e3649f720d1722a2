//! Daily and weekly generation runs, plus the schedule overview.

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use log::{info, warn};
use serde::Serialize;

use crate::db::Store;
use crate::error::{GenerationError, ShortfallStats};
use crate::generator::{BlockGenerator, GenerateOptions, GeneratedPlaylist};
use crate::repository::{GeneratorStore, PlayBlockConfig, ScheduleStore};
use crate::track::{DayStatus, PlayBlock};

/// Days in a weekly run.
pub const WEEK_DAYS: u64 = 7;

/// One block that did not generate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockFailure {
    pub block: String,
    pub kind: &'static str,
    pub message: String,
    pub stats: Option<ShortfallStats>,
}

impl BlockFailure {
    fn new(block: &str, err: &GenerationError) -> Self {
        Self { block: block.to_string(), kind: err.kind(), message: err.to_string(), stats: err.stats() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailySummary {
    pub total_blocks: usize,
    pub total_tracks: usize,
    /// One decimal place.
    pub total_minutes: f64,
    pub errors_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub blocks: Vec<GeneratedPlaylist>,
    pub errors: Vec<BlockFailure>,
    pub summary: DailySummary,
}

impl DailyReport {
    #[must_use]
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub total_days: usize,
    pub successful_days: usize,
    pub total_blocks: usize,
    pub total_tracks: usize,
    pub total_minutes: f64,
    /// Whole percent of days that generated without errors.
    pub success_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyReport {
    pub start_date: NaiveDate,
    pub days: Vec<DailyReport>,
    pub summary: WeeklySummary,
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Generates every configured block for `date`, in block order.
///
/// Block failures are collected, not propagated. The day ends `completed`
/// when every block succeeded and `failed` when any block failed for a reason
/// other than an existing playlist. A locked day is reported and left alone.
pub fn generate_daily<S: GeneratorStore + ?Sized>(
    generator: &mut BlockGenerator<'_, S>,
    date: NaiveDate,
    options: GenerateOptions,
) -> Result<DailyReport> {
    let store = generator.store();
    let blocks = store.all().context("Failed to load play blocks")?;

    let previous = match generator.ensure_unlocked(date) {
        Ok(previous) => previous,
        Err(err @ GenerationError::DayLocked(_)) => {
            warn!("{err}");
            let errors: Vec<BlockFailure> = blocks.iter().map(|b| BlockFailure::new(&b.name, &err)).collect();
            let summary = DailySummary { errors_count: errors.len(), ..DailySummary::default() };
            return Ok(DailyReport { date, status: DayStatus::Locked, blocks: Vec::new(), errors, summary });
        }
        Err(err) => return Err(anyhow::Error::new(err)),
    };

    store.set_day_status(date, DayStatus::Generating)?;
    let mut generated = Vec::new();
    let mut errors = Vec::new();

    for block in &blocks {
        info!("Generating {} for {date}", block.name);
        match generator.generate_block(date, &block.name, options) {
            Ok(playlist) => generated.push(playlist),
            Err(err) => {
                warn!("{} for {date} failed: {err}", block.name);
                errors.push(BlockFailure::new(&block.name, &err));
            }
        }
    }

    let status = if errors.iter().any(|e| e.kind != "already_exists") {
        DayStatus::Failed
    } else if generated.is_empty() && !errors.is_empty() {
        previous.map_or(DayStatus::Pending, |day| day.status)
    } else {
        DayStatus::Completed
    };
    store.set_day_status(date, status)?;

    #[allow(clippy::cast_precision_loss)]
    let seconds = generated.iter().map(|p| p.stats.actual_seconds).sum::<u64>() as f64;
    let summary = DailySummary {
        total_blocks: generated.len(),
        total_tracks: generated.iter().map(|p| p.stats.track_count).sum(),
        total_minutes: round_tenth(seconds / 60.0),
        errors_count: errors.len(),
    };
    info!(
        "Day {date} {status}: {} blocks, {} tracks, {} errors",
        summary.total_blocks, summary.total_tracks, summary.errors_count
    );
    Ok(DailyReport { date, status, blocks: generated, errors, summary })
}

/// Runs [`generate_daily`] for seven consecutive days starting at `start`.
pub fn generate_weekly<S: GeneratorStore + ?Sized>(
    generator: &mut BlockGenerator<'_, S>,
    start: NaiveDate,
    options: GenerateOptions,
) -> Result<WeeklyReport> {
    let mut days = Vec::with_capacity(WEEK_DAYS as usize);
    for offset in 0..WEEK_DAYS {
        let date = start
            .checked_add_days(Days::new(offset))
            .with_context(|| format!("Date overflow {offset} days after {start}"))?;
        info!("Generating week day {}/{WEEK_DAYS}: {date}", offset + 1);
        days.push(generate_daily(generator, date, options)?);
    }

    let successful_days = days.iter().filter(|d| d.success()).count();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let success_rate = ((successful_days as f64 / days.len() as f64) * 100.0).round() as u32;
    let summary = WeeklySummary {
        total_days: days.len(),
        successful_days,
        total_blocks: days.iter().map(|d| d.summary.total_blocks).sum(),
        total_tracks: days.iter().map(|d| d.summary.total_tracks).sum(),
        total_minutes: round_tenth(days.iter().map(|d| d.summary.total_minutes).sum()),
        success_rate,
    };
    Ok(WeeklyReport { start_date: start, days, summary })
}

/// One block's state on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockOverview {
    pub block_id: i64,
    pub name: String,
    pub target_minutes: u32,
    pub color: String,
    pub track_count: usize,
    pub duration_sec: u64,
    pub generated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayOverview {
    pub date: NaiveDate,
    pub status: DayStatus,
    pub blocks: Vec<BlockOverview>,
}

/// Scheduled days between `from` and `to` (inclusive), newest first, each
/// with every configured block and whatever was generated for it.
pub fn schedule_overview(store: &Store, from: NaiveDate, to: NaiveDate) -> Result<Vec<DayOverview>> {
    let blocks: Vec<PlayBlock> = store.all()?;
    let history = store.playlist_history(from, to, 0)?;

    let mut days = store.days_between(from, to)?;
    days.reverse();
    Ok(days
        .into_iter()
        .map(|day| DayOverview {
            date: day.date,
            status: day.status,
            blocks: blocks
                .iter()
                .map(|block| {
                    let row = history.iter().find(|h| h.date == day.date && h.block_id == block.id);
                    BlockOverview {
                        block_id: block.id,
                        name: block.name.clone(),
                        target_minutes: block.target_minutes,
                        color: block.color.clone(),
                        track_count: row.map_or(0, |r| r.track_count),
                        duration_sec: row.map_or(0, |r| r.total_duration_sec),
                        generated: row.is_some_and(|r| r.track_count > 0),
                    }
                })
                .collect(),
        })
        .collect())
}
