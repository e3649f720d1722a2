//! Track scoring against a block's targets.
//!
//! A score is the sum of a tempo tier, an energy tier, an artist-freshness
//! bonus and a small random jitter. Only the jitter is non-deterministic.

use rayon::prelude::*;

use crate::filter::Candidate;
use crate::random::RandomSource;
use crate::track::{PlayBlock, Range};

/// Points awarded per attribute depending on how the value relates to the target range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierWeights {
    pub in_range: f64,
    pub out_of_range: f64,
    pub unknown: f64,
}

/// Scoring parameters. The defaults are the production values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringContext {
    pub tempo: TierWeights,
    pub energy: TierWeights,
    /// Bonus for an artist with no recent placements.
    pub freshness_max: f64,
    /// Bonus lost per recent placement of the artist.
    pub freshness_decay: f64,
    /// Upper bound (exclusive) of the random jitter.
    pub jitter: f64,
}

impl Default for ScoringContext {
    fn default() -> Self {
        let tiers = TierWeights { in_range: 50.0, out_of_range: 20.0, unknown: 30.0 };
        Self {
            tempo: tiers,
            energy: tiers,
            freshness_max: 20.0,
            freshness_decay: 2.0,
            jitter: 10.0,
        }
    }
}

/// A candidate with its final score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}

#[inline]
fn tier_score(value: Option<f64>, range: &Range, weights: &TierWeights) -> f64 {
    match value {
        Some(v) if range.contains(v) => weights.in_range,
        Some(_) => weights.out_of_range,
        None => weights.unknown,
    }
}

/// `max(0, freshness_max - decay * usage)`.
#[must_use]
pub fn freshness_bonus(recent_artist_usage: u32, context: &ScoringContext) -> f64 {
    (context.freshness_max - context.freshness_decay * f64::from(recent_artist_usage)).max(0.0)
}

/// The reproducible part of a score: tempo + energy + freshness.
#[must_use]
pub fn deterministic_score(candidate: &Candidate, block: &PlayBlock, context: &ScoringContext) -> f64 {
    let track = &candidate.track;
    tier_score(track.tempo_bpm, &block.tempo_range, &context.tempo)
        + tier_score(track.energy, &block.energy_range, &context.energy)
        + freshness_bonus(candidate.recent_artist_usage, context)
}

/// Full score of one candidate, jitter included.
pub fn score_candidate<R: RandomSource + ?Sized>(
    candidate: &Candidate,
    block: &PlayBlock,
    context: &ScoringContext,
    rng: &mut R,
) -> f64 {
    deterministic_score(candidate, block, context) + rng.float() * context.jitter
}

/// Scores every candidate and returns them sorted by descending score.
///
/// The deterministic parts are computed in parallel; the jitter is then drawn
/// in input order so a seeded source always yields the same ranking.
pub fn rank_candidates<R: RandomSource + ?Sized>(
    candidates: Vec<Candidate>,
    block: &PlayBlock,
    context: &ScoringContext,
    rng: &mut R,
) -> Vec<ScoredCandidate> {
    let base: Vec<f64> = candidates
        .par_iter()
        .map(|candidate| deterministic_score(candidate, block, context))
        .collect();

    let mut ranked: Vec<ScoredCandidate> = candidates
        .into_iter()
        .zip(base)
        .map(|(candidate, base)| ScoredCandidate {
            candidate,
            score: base + rng.float() * context.jitter,
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    log::trace!("Ranked {} candidates for `{}`", ranked.len(), block.name);
    ranked
}
