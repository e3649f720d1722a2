//! Greedy, single-pass selection of scored tracks into a block.
//!
//! Walks the ranked list once. A track is taken unless it repeats an id,
//! breaks artist spacing, or would push the running total beyond the
//! overshoot ceiling. Skipped tracks are never revisited.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::algorithm::ScoredCandidate;
use crate::track::{PlayBlock, RotationRules, Track};

/// Selection never stops before this many tracks, whatever the duration.
pub const MIN_TRACKS: usize = 8;

/// The running total may exceed the target by at most this factor.
pub const OVERSHOOT_CEILING: f64 = 1.3;

/// How the artist cooldown is measured while selecting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ArtistSpacing {
    /// Elapsed time of the selection pass itself, read from a [`Clock`].
    /// A pass finishes in milliseconds, so any non-zero cooldown keeps an
    /// artist to one track per block.
    #[default]
    SelectorClock,
    /// Seconds of playlist runtime between the start of the artist's previous
    /// pick and the start of this one, in selection order.
    PlaylistRuntime,
}

/// Millisecond clock consulted by [`ArtistSpacing::SelectorClock`].
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Monotonic clock anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock(Instant);

impl Default for MonotonicClock {
    fn default() -> Self {
        Self(Instant::now())
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.0.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Selection limits derived from a block and the rotation rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionLimits {
    pub target_seconds: u32,
    pub artist_cooldown_minutes: u32,
    pub spacing: ArtistSpacing,
}

impl SelectionLimits {
    #[must_use]
    pub fn new(block: &PlayBlock, rules: &RotationRules, spacing: ArtistSpacing) -> Self {
        Self {
            target_seconds: block.target_seconds(),
            artist_cooldown_minutes: rules.artist_cooldown_minutes,
            spacing,
        }
    }

    #[must_use]
    pub fn ceiling_seconds(&self) -> f64 {
        f64::from(self.target_seconds) * OVERSHOOT_CEILING
    }
}

/// Where each artist was last placed, in the unit of the spacing mode.
struct ArtistLedger<'c> {
    spacing: ArtistSpacing,
    cooldown_minutes: u32,
    clock: &'c dyn Clock,
    last: HashMap<String, u64>,
}

impl ArtistLedger<'_> {
    fn mark(&self, running_seconds: u64) -> u64 {
        match self.spacing {
            ArtistSpacing::SelectorClock => self.clock.now_millis(),
            ArtistSpacing::PlaylistRuntime => running_seconds,
        }
    }

    fn cooldown(&self) -> u64 {
        let minutes = u64::from(self.cooldown_minutes);
        match self.spacing {
            ArtistSpacing::SelectorClock => minutes * 60 * 1000,
            ArtistSpacing::PlaylistRuntime => minutes * 60,
        }
    }

    fn too_soon(&self, artist: &str, running_seconds: u64) -> bool {
        self.last
            .get(artist)
            .is_some_and(|&placed| self.mark(running_seconds).saturating_sub(placed) < self.cooldown())
    }

    fn place(&mut self, artist: &str, running_seconds: u64) {
        let mark = self.mark(running_seconds);
        self.last.insert(artist.to_string(), mark);
    }
}

/// Picks tracks from `ranked` (best first) until the target is met.
#[must_use]
pub fn select_tracks(ranked: &[ScoredCandidate], limits: &SelectionLimits, clock: &dyn Clock) -> Vec<Track> {
    let target = u64::from(limits.target_seconds);
    let ceiling = limits.ceiling_seconds();

    let mut selected: Vec<Track> = Vec::new();
    let mut used: HashSet<i64> = HashSet::new();
    let mut ledger = ArtistLedger {
        spacing: limits.spacing,
        cooldown_minutes: limits.artist_cooldown_minutes,
        clock,
        last: HashMap::new(),
    };
    let mut total: u64 = 0;

    for scored in ranked {
        let track = &scored.candidate.track;
        if used.contains(&track.id) {
            continue;
        }
        if total >= target && selected.len() >= MIN_TRACKS {
            break;
        }
        if ledger.too_soon(&track.artist, total) {
            log::trace!("Skipping `{}`: {} placed too recently", track.title, track.artist);
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let overshoots = (total + u64::from(track.duration_sec)) as f64 > ceiling;
        if !selected.is_empty() && overshoots {
            continue;
        }

        used.insert(track.id);
        ledger.place(&track.artist, total);
        total += u64::from(track.duration_sec);
        selected.push(track.clone());
    }

    log::debug!(
        "Selected {} tracks, {}s of {}s target",
        selected.len(),
        total,
        limits.target_seconds
    );
    selected
}
