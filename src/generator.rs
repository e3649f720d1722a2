//! Block generation: filter, score, select, sequence, persist.
//!
//! [`BlockGenerator::generate`] drives one (date, block) playlist through the
//! whole pipeline and keeps the schedule day's status consistent with the
//! outcome. Nothing is written until the final commit, so a failure at any
//! earlier step leaves the stored playlists untouched (apart from a forced
//! clear).

use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::algorithm::{rank_candidates, ScoringContext};
use crate::error::{GenerationError, ShortfallStats};
use crate::filter::load_candidates;
use crate::random::RandomSource;
use crate::repository::{CommitOutcome, GeneratorStore};
use crate::selector::{select_tracks, ArtistSpacing, Clock, MonotonicClock, SelectionLimits};
use crate::sequencer::build_energy_curve;
use crate::track::{DayStatus, GeneratedItem, PlayBlock, RotationRules, ScheduleDay, Track};

/// Per-request switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Replace an existing playlist instead of failing with `AlreadyExists`.
    pub force: bool,
    /// Ignore the track cooldown.
    pub admin_override: bool,
}

/// Summary of one generated block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockStats {
    pub track_count: usize,
    pub target_minutes: u32,
    pub actual_seconds: u64,
    /// Rounded to the nearest minute.
    pub actual_minutes: u64,
    /// Mean over tracks with a known tempo.
    pub average_bpm: Option<f64>,
    /// Mean over tracks with a known energy.
    pub average_energy: Option<f64>,
    pub candidates_considered: usize,
    pub discarded_by_cooldown: usize,
    pub artist_separation_min: u32,
}

impl BlockStats {
    fn compute(tracks: &[Track], block: &PlayBlock, rules: &RotationRules, shortfall: ShortfallStats) -> Self {
        let actual_seconds: u64 = tracks.iter().map(|t| u64::from(t.duration_sec)).sum();
        Self {
            track_count: tracks.len(),
            target_minutes: block.target_minutes,
            actual_seconds,
            actual_minutes: (actual_seconds + 30) / 60,
            average_bpm: mean(tracks.iter().filter_map(|t| t.tempo_bpm)),
            average_energy: mean(tracks.iter().filter_map(|t| t.energy)),
            candidates_considered: shortfall.candidates,
            discarded_by_cooldown: shortfall.discarded_by_cooldown,
            artist_separation_min: rules.artist_cooldown_minutes,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// A persisted playlist, in play order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedPlaylist {
    pub date: NaiveDate,
    pub block: PlayBlock,
    pub tracks: Vec<Track>,
    pub stats: BlockStats,
}

/// Generates block playlists against one store.
pub struct BlockGenerator<'a, S: GeneratorStore + ?Sized> {
    store: &'a S,
    rng: Box<dyn RandomSource + 'a>,
    clock: Box<dyn Clock + 'a>,
    context: ScoringContext,
    spacing: ArtistSpacing,
}

impl<'a, S: GeneratorStore + ?Sized> BlockGenerator<'a, S> {
    pub fn new(store: &'a S, rng: Box<dyn RandomSource + 'a>) -> Self {
        Self {
            store,
            rng,
            clock: Box::new(MonotonicClock::default()),
            context: ScoringContext::default(),
            spacing: ArtistSpacing::default(),
        }
    }

    #[must_use]
    pub fn with_spacing(mut self, spacing: ArtistSpacing) -> Self {
        self.spacing = spacing;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock + 'a>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_scoring(mut self, context: ScoringContext) -> Self {
        self.context = context;
        self
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    /// Generates one playlist and updates the day's status: `completed` on
    /// success, `failed` on any failure except `AlreadyExists` and `DayLocked`.
    /// A locked day or an existing playlist found up front leaves the schedule untouched.
    pub fn generate(
        &mut self,
        date: NaiveDate,
        block_name: &str,
        options: GenerateOptions,
    ) -> Result<GeneratedPlaylist, GenerationError> {
        let previous = self.ensure_unlocked(date)?;
        if !options.force {
            if let Some(block) = self.stored_block(date, block_name)? {
                debug!("{date} / {block} already has a playlist");
                return Err(GenerationError::AlreadyExists { date, block });
            }
        }
        self.store.set_day_status(date, DayStatus::Generating)?;

        let result = self.generate_block(date, block_name, options);
        let status = match &result {
            Ok(_) => DayStatus::Completed,
            // Another writer committed this playlist first.
            Err(GenerationError::AlreadyExists { .. }) => previous.map_or(DayStatus::Completed, |day| day.status),
            Err(_) => DayStatus::Failed,
        };
        self.store.set_day_status(date, status)?;
        result
    }

    /// Fails with `DayLocked` when an operator has frozen `date`. Otherwise
    /// returns the day's current record, if any.
    pub fn ensure_unlocked(&self, date: NaiveDate) -> Result<Option<ScheduleDay>, GenerationError> {
        match self.store.day(date)? {
            Some(day) if day.status == DayStatus::Locked => Err(GenerationError::DayLocked(date)),
            day => Ok(day),
        }
    }

    /// Name of `block_name` when it already has items on `date`. Unknown blocks
    /// yield `None` and fail later with `ConfigMissing`.
    fn stored_block(&self, date: NaiveDate, block_name: &str) -> Result<Option<String>, GenerationError> {
        match self.store.get(block_name)? {
            Some(block) if self.store.count_items(date, block.id)? > 0 => Ok(Some(block.name)),
            _ => Ok(None),
        }
    }

    /// The pipeline without any schedule bookkeeping. The scheduler calls this
    /// directly and settles the day's status once every block has run.
    pub fn generate_block(
        &mut self,
        date: NaiveDate,
        block_name: &str,
        options: GenerateOptions,
    ) -> Result<GeneratedPlaylist, GenerationError> {
        let block = self
            .store
            .get(block_name)?
            .ok_or_else(|| GenerationError::ConfigMissing(format!("play block `{block_name}`")))?;
        let rules = self
            .store
            .current()?
            .ok_or_else(|| GenerationError::ConfigMissing("rotation rules".into()))?;

        let existing = self.store.count_items(date, block.id)?;
        if existing > 0 {
            if !options.force {
                return Err(GenerationError::AlreadyExists { date, block: block.name });
            }
            let cleared = self.store.clear_items(date, block.id)?;
            info!("Cleared {cleared} existing items for {date} / {}", block.name);
        }

        let pool = load_candidates(self.store, date, &block, &rules, options.admin_override)?;
        let shortfall = ShortfallStats {
            candidates: pool.candidates.len(),
            discarded_by_cooldown: pool.discarded_by_cooldown,
        };
        if pool.candidates.is_empty() {
            warn!("No candidates for {date} / {}", block.name);
            return Err(GenerationError::NoCandidates(shortfall));
        }

        let ranked = rank_candidates(pool.candidates, &block, &self.context, &mut self.rng);
        let limits = SelectionLimits::new(&block, &rules, self.spacing);
        let selected = select_tracks(&ranked, &limits, self.clock.as_ref());
        if selected.is_empty() {
            warn!("Selection came back empty for {date} / {}", block.name);
            return Err(GenerationError::NoSelection(shortfall));
        }

        let ordered = build_energy_curve(selected, &mut self.rng);
        self.persist(date, &block, &ordered)?;

        let stats = BlockStats::compute(&ordered, &block, &rules, shortfall);
        info!(
            "Generated {date} / {}: {} tracks, {} of {} minutes",
            block.name, stats.track_count, stats.actual_minutes, stats.target_minutes
        );
        Ok(GeneratedPlaylist { date, block, tracks: ordered, stats })
    }

    fn persist(&self, date: NaiveDate, block: &PlayBlock, tracks: &[Track]) -> Result<(), GenerationError> {
        let generated_at = Utc::now();
        let items: Vec<GeneratedItem> = tracks
            .iter()
            .zip(1u32..)
            .map(|(track, position)| GeneratedItem {
                track_id: track.id,
                artist: track.artist.clone(),
                date,
                block_id: block.id,
                position,
                generated_at,
            })
            .collect();

        match self.store.commit_playlist(date, block.id, &items)? {
            CommitOutcome::Inserted(count) => {
                debug!("Stored {count} items for {date} / {}", block.name);
                Ok(())
            }
            CommitOutcome::Conflict => Err(GenerationError::AlreadyExists { date, block: block.name.clone() }),
        }
    }
}
