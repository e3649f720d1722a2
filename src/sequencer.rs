//! Energy-curve ordering: low intro, rising middle, calming outro.
//!
//! The selected tracks are ranked by energy and cut into three overlapping
//! bands. Intro and outro draw from the low+mid bands, the middle from
//! mid+high. Picks are random without replacement; anything left when a
//! pool runs dry is appended at the end in its original order.

use std::collections::HashSet;

use crate::random::RandomSource;
use crate::track::Track;

/// Energy assumed for tracks with no energy value.
pub const DEFAULT_ENERGY: f64 = 0.3;

const INTRO_SHARE: f64 = 0.2;
const OUTRO_SHARE: f64 = 0.2;
/// Low band: `[0, 40%)` of the energy-sorted list.
const LOW_END: f64 = 0.4;
/// Mid band: `[30%, 70%)`.
const MID_START: f64 = 0.3;
const MID_END: f64 = 0.7;
/// High band: `[60%, 100%]`.
const HIGH_START: f64 = 0.6;

/// Segment sizes for a playlist of `total` tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segments {
    pub intro: usize,
    pub mid: usize,
    pub outro: usize,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn share(total: usize, fraction: f64) -> usize {
    (total as f64 * fraction).floor() as usize
}

impl Segments {
    /// Intro and outro get 20% each (at least one), the middle takes the rest.
    /// For one or two tracks the middle is empty and the outro may come up short;
    /// leftovers cover the difference.
    #[must_use]
    pub fn for_total(total: usize) -> Self {
        if total == 0 {
            return Self { intro: 0, mid: 0, outro: 0 };
        }
        let intro = share(total, INTRO_SHARE).max(1);
        let outro = share(total, OUTRO_SHARE).max(1);
        let mid = total.saturating_sub(intro + outro);
        Self { intro, mid, outro }
    }
}

/// Picks uniformly from the unused entries of `pool`, marking the pick used.
/// Pools are index lists and may contain the same index twice where bands overlap.
fn pick<R: RandomSource + ?Sized>(pool: &[usize], used: &mut HashSet<usize>, rng: &mut R) -> Option<usize> {
    let available: Vec<usize> = pool.iter().copied().filter(|i| !used.contains(i)).collect();
    if available.is_empty() {
        return None;
    }
    let chosen = available[rng.pick_index(available.len())];
    used.insert(chosen);
    Some(chosen)
}

/// Reorders `tracks` into an energy curve. Output is a permutation of the input.
pub fn build_energy_curve<R: RandomSource + ?Sized>(tracks: Vec<Track>, rng: &mut R) -> Vec<Track> {
    let total = tracks.len();
    if total == 0 {
        return tracks;
    }

    let energy = |i: usize| tracks[i].energy.unwrap_or(DEFAULT_ENERGY);
    let mut by_energy: Vec<usize> = (0..total).collect();
    by_energy.sort_by(|&a, &b| energy(a).partial_cmp(&energy(b)).unwrap_or(std::cmp::Ordering::Equal));

    let low = &by_energy[..share(total, LOW_END)];
    let mid = &by_energy[share(total, MID_START)..share(total, MID_END)];
    let high = &by_energy[share(total, HIGH_START)..];

    let calm_pool: Vec<usize> = low.iter().chain(mid).copied().collect();
    let rising_pool: Vec<usize> = mid.iter().chain(high).copied().collect();
    let peak_pool: Vec<usize> = high.iter().chain(mid).copied().collect();

    let segments = Segments::for_total(total);
    let mut used = HashSet::with_capacity(total);
    let mut order: Vec<usize> = Vec::with_capacity(total);

    for _ in 0..segments.intro {
        order.extend(pick(&calm_pool, &mut used, rng));
    }
    for step in 0..segments.mid {
        #[allow(clippy::cast_precision_loss)]
        let progress = step as f64 / segments.mid as f64;
        let pool = if progress < 0.5 { &rising_pool } else { &peak_pool };
        order.extend(pick(pool, &mut used, rng));
    }
    for _ in 0..segments.outro {
        order.extend(pick(&calm_pool, &mut used, rng));
    }
    order.extend((0..total).filter(|i| !used.contains(i)));

    let mut slots: Vec<Option<Track>> = tracks.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}
