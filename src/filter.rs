//! Candidate filtering: which catalog tracks may appear in a block on a date.

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use log::debug;
use std::collections::HashMap;

use crate::repository::{CandidateQuery, TrackRepository};
use crate::track::{PlayBlock, PlayRecord, RotationRules, Track};

/// An eligible track plus the history the scorer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub track: Track,
    /// Latest placement after the cooldown cutoff, `None` if never (or not recently) played.
    pub last_played: Option<NaiveDate>,
    /// Placements of this artist after the cooldown cutoff.
    pub recent_artist_usage: u32,
}

/// Filter output. An empty `candidates` list is not an error here.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    pub candidates: Vec<Candidate>,
    pub cutoff: Option<NaiveDate>,
    /// Tracks that passed the content rules but were still cooling down.
    pub discarded_by_cooldown: usize,
}

/// `date - cooldown_days`. Saturates at the earliest representable date.
#[must_use]
pub fn cooldown_cutoff(date: NaiveDate, cooldown_days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(cooldown_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Content rules: explicit exclusion and instrumental preference.
#[must_use]
pub fn passes_content_rules(track: &Track, block: &PlayBlock, rules: &RotationRules) -> bool {
    let explicit_ok = !rules.exclude_explicit || !track.is_explicit;
    let instrumental_ok = !block.prefer_instrumental || track.is_instrumental != Some(false);
    explicit_ok && instrumental_ok
}

/// Splits catalog tracks into eligible candidates, annotating each with its
/// recent history. `history` must hold placements dated after `cutoff`.
#[must_use]
pub fn filter_candidates(
    tracks: Vec<Track>,
    history: &[PlayRecord],
    block: &PlayBlock,
    rules: &RotationRules,
    cutoff: NaiveDate,
    admin_override: bool,
) -> CandidatePool {
    let mut last_played: HashMap<i64, NaiveDate> = HashMap::new();
    let mut artist_usage: HashMap<&str, u32> = HashMap::new();
    for record in history.iter().filter(|record| record.date > cutoff) {
        last_played
            .entry(record.track_id)
            .and_modify(|latest| *latest = (*latest).max(record.date))
            .or_insert(record.date);
        *artist_usage.entry(record.artist.as_str()).or_default() += 1;
    }

    let mut discarded_by_cooldown = 0;
    let candidates = tracks
        .into_iter()
        .filter(|track| passes_content_rules(track, block, rules))
        .filter_map(|track| {
            let played = last_played.get(&track.id).copied();
            // Only placements after the cutoff are tracked, so any hit is still cooling down.
            let cooled = played.map_or(true, |date| date <= cutoff);
            if !admin_override && !cooled {
                discarded_by_cooldown += 1;
                return None;
            }
            let recent_artist_usage = artist_usage.get(track.artist.as_str()).copied().unwrap_or(0);
            Some(Candidate { track, last_played: played, recent_artist_usage })
        })
        .collect();

    CandidatePool { candidates, cutoff: Some(cutoff), discarded_by_cooldown }
}

/// Loads the catalog and history for `date` and runs [`filter_candidates`].
pub fn load_candidates<R: TrackRepository + ?Sized>(
    repo: &R,
    date: NaiveDate,
    block: &PlayBlock,
    rules: &RotationRules,
    admin_override: bool,
) -> Result<CandidatePool> {
    let cutoff = cooldown_cutoff(date, rules.track_cooldown_days);
    let query = CandidateQuery {
        exclude_explicit: rules.exclude_explicit,
        instrumental_only: block.prefer_instrumental,
    };

    let tracks = repo
        .query_candidates(date, &query)
        .with_context(|| format!("Failed to query candidate tracks for {date}"))?;
    let history = repo
        .play_history_after(cutoff)
        .with_context(|| format!("Failed to load play history after {cutoff}"))?;

    let pool = filter_candidates(tracks, &history, block, rules, cutoff, admin_override);
    debug!(
        "{} candidates for `{}` on {date} (cutoff {cutoff}, {} cooling down)",
        pool.candidates.len(),
        block.name,
        pool.discarded_by_cooldown
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Range;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn track(id: i64, artist: &str) -> Track {
        Track {
            id,
            title: format!("Track {id}"),
            artist: artist.to_string(),
            uri: format!("spotify:track:{id}"),
            duration_sec: 200,
            tempo_bpm: Some(95.0),
            energy: Some(0.4),
            is_instrumental: None,
            is_explicit: false,
            source: "csv".into(),
        }
    }

    fn block(prefer_instrumental: bool) -> PlayBlock {
        PlayBlock {
            id: 1,
            name: "Lunch".into(),
            target_minutes: 60,
            tempo_range: Range::new(80.0, 110.0),
            energy_range: Range::new(0.3, 0.6),
            prefer_instrumental,
            color: "#fff".into(),
        }
    }

    fn played(track_id: i64, artist: &str, on: &str) -> PlayRecord {
        PlayRecord { track_id, artist: artist.into(), date: date(on) }
    }

    #[test]
    fn test_cutoff_subtracts_cooldown_days() {
        assert_eq!(cooldown_cutoff(date("2025-08-13"), 7), date("2025-08-06"));
        assert_eq!(cooldown_cutoff(date("2025-03-02"), 2), date("2025-02-28"));
        assert_eq!(cooldown_cutoff(date("2025-08-13"), 0), date("2025-08-13"));
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let rules = RotationRules::default();
        let cutoff = cooldown_cutoff(date("2025-08-13"), rules.track_cooldown_days);
        let history = vec![
            played(1, "A", "2025-08-06"),
            played(2, "B", "2025-08-07"),
            played(3, "C", "2025-08-05"),
        ];
        let tracks = vec![track(1, "A"), track(2, "B"), track(3, "C"), track(4, "D")];

        let pool = filter_candidates(tracks, &history, &block(false), &rules, cutoff, false);
        let ids: Vec<i64> = pool.candidates.iter().map(|c| c.track.id).collect();

        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(pool.discarded_by_cooldown, 1);
    }

    #[test]
    fn test_admin_override_ignores_track_cooldown() {
        let rules = RotationRules::default();
        let cutoff = cooldown_cutoff(date("2025-08-13"), 7);
        let history = vec![played(1, "A", "2025-08-12")];

        let pool = filter_candidates(vec![track(1, "A")], &history, &block(false), &rules, cutoff, true);
        assert_eq!(pool.candidates.len(), 1);
        assert_eq!(pool.candidates[0].last_played, Some(date("2025-08-12")));
        assert_eq!(pool.discarded_by_cooldown, 0);
    }

    #[test]
    fn test_content_rules() {
        let rules = RotationRules { exclude_explicit: true, ..RotationRules::default() };
        let explicit = Track { is_explicit: true, ..track(1, "A") };
        let vocal = Track { is_instrumental: Some(false), ..track(2, "B") };
        let instrumental = Track { is_instrumental: Some(true), ..track(3, "C") };
        let unknown = track(4, "D");

        assert!(!passes_content_rules(&explicit, &block(false), &rules));
        assert!(passes_content_rules(&explicit, &block(false), &RotationRules { exclude_explicit: false, ..rules }));

        assert!(!passes_content_rules(&vocal, &block(true), &rules));
        assert!(passes_content_rules(&instrumental, &block(true), &rules));
        assert!(passes_content_rules(&unknown, &block(true), &rules));
        assert!(passes_content_rules(&vocal, &block(false), &rules));
    }

    #[test]
    fn test_artist_usage_counts_recent_placements_only() {
        let rules = RotationRules::default();
        let cutoff = cooldown_cutoff(date("2025-08-13"), 7);
        let history = vec![
            played(10, "Nina", "2025-08-10"),
            played(11, "Nina", "2025-08-11"),
            played(12, "Nina", "2025-08-01"),
        ];

        let pool = filter_candidates(vec![track(1, "Nina"), track(2, "Ella")], &history, &block(false), &rules, cutoff, false);
        assert_eq!(pool.candidates[0].recent_artist_usage, 2);
        assert_eq!(pool.candidates[1].recent_artist_usage, 0);
    }

    #[test]
    fn test_empty_catalog_is_not_an_error() {
        let rules = RotationRules::default();
        let cutoff = cooldown_cutoff(date("2025-08-13"), 7);
        let pool = filter_candidates(Vec::new(), &[], &block(false), &rules, cutoff, false);
        assert!(pool.candidates.is_empty());
    }
}
