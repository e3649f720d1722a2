//! Pushing a generated playlist to a remote streaming service.
//!
//! The service itself sits behind [`PlaylistSink`]. [`push_playlist`] owns the
//! retry policy: rate limits are waited out a bounded number of times, and an
//! expired session gets exactly one reauthentication.

use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::db::PlaylistView;

/// URI prefix of tracks the remote service can resolve.
pub const REMOTE_URI_PREFIX: &str = "spotify:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// HTTP 429. `retry_after` comes from the service when it sends one.
    #[error("rate limited by the remote service")]
    RateLimited { retry_after: Option<Duration> },

    /// HTTP 401: the session expired or was revoked.
    #[error("remote service rejected the credentials")]
    Unauthorized,

    #[error("remote service rejected the request: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Remote playlist capability.
pub trait PlaylistSink {
    /// Creates an empty private playlist and returns its remote id.
    fn create_playlist(&mut self, name: &str, description: &str) -> Result<String, SinkError>;

    /// Appends `uris` in order. Callers keep batches within the service limit.
    fn add_tracks(&mut self, playlist_id: &str, uris: &[String]) -> Result<(), SinkError>;

    /// Refreshes the session after an `Unauthorized`.
    fn reauthenticate(&mut self) -> Result<(), SinkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushPolicy {
    /// Tracks per `add_tracks` call.
    pub batch_size: usize,
    /// Rate-limit retries per call before giving up.
    pub max_rate_limit_retries: u32,
    /// First backoff when the service sends no `retry_after`; doubles per retry.
    pub base_backoff: Duration,
}

impl Default for PushPolicy {
    fn default() -> Self {
        Self { batch_size: 100, max_rate_limit_retries: 3, base_backoff: Duration::from_secs(1) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub playlist_id: String,
    pub name: String,
    pub tracks_added: usize,
    pub batches: usize,
    /// Local files and other URIs the service cannot play.
    pub skipped: usize,
}

/// `"{date} {block}"`.
#[must_use]
pub fn remote_name(playlist: &PlaylistView) -> String {
    format!("{} {}", playlist.date, playlist.block.name)
}

/// `base * 2^attempt`, saturating instead of overflowing for large attempts.
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.checked_pow(attempt).unwrap_or(u32::MAX))
}

fn with_retries<S, T, F>(
    sink: &mut S,
    policy: &PushPolicy,
    sleep: &mut dyn FnMut(Duration),
    mut op: F,
) -> Result<T, SinkError>
where
    S: PlaylistSink + ?Sized,
    F: FnMut(&mut S) -> Result<T, SinkError>,
{
    let mut rate_limited = 0;
    let mut reauthenticated = false;
    loop {
        match op(sink) {
            Ok(value) => return Ok(value),
            Err(SinkError::RateLimited { retry_after }) if rate_limited < policy.max_rate_limit_retries => {
                let wait = retry_after.unwrap_or_else(|| backoff(policy.base_backoff, rate_limited));
                rate_limited += 1;
                warn!("Rate limited, waiting {}s (retry {rate_limited})", wait.as_secs_f64());
                sleep(wait);
            }
            Err(SinkError::Unauthorized) if !reauthenticated => {
                reauthenticated = true;
                info!("Session expired, reauthenticating");
                sink.reauthenticate()?;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Creates `"{date} {block}"` on the remote service and fills it in play order.
///
/// Only URIs the service understands are sent. A playlist with none of them
/// is rejected before anything is created remotely.
pub fn push_playlist<S: PlaylistSink + ?Sized>(
    sink: &mut S,
    playlist: &PlaylistView,
    policy: &PushPolicy,
    sleep: &mut dyn FnMut(Duration),
) -> Result<PushReport, SinkError> {
    let uris: Vec<String> = playlist
        .entries
        .iter()
        .map(|e| &e.track.uri)
        .filter(|uri| uri.starts_with(REMOTE_URI_PREFIX))
        .cloned()
        .collect();
    let skipped = playlist.entries.len() - uris.len();
    if uris.is_empty() {
        return Err(SinkError::Rejected("no remote track URIs in playlist".into()));
    }

    let name = remote_name(playlist);
    let description = format!(
        "Generated playlist for {} block on {}. {} tracks, {} minutes.",
        playlist.block.name,
        playlist.date,
        playlist.entries.len(),
        (playlist.total_duration_sec() + 30) / 60
    );
    let playlist_id = with_retries(sink, policy, sleep, |s| s.create_playlist(&name, &description))?;
    debug!("Created remote playlist {playlist_id} `{name}`");

    let mut batches = 0;
    for batch in uris.chunks(policy.batch_size.max(1)) {
        with_retries(sink, policy, sleep, |s| s.add_tracks(&playlist_id, batch))?;
        batches += 1;
    }

    info!("Pushed {} tracks to `{name}` in {batches} batches ({skipped} skipped)", uris.len());
    Ok(PushReport { playlist_id, name, tracks_added: uris.len(), batches, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PlaylistEntry;
    use crate::track::{PlayBlock, Range, Track};
    use chrono::NaiveDate;
    use std::collections::VecDeque;

    /// Sink that replays scripted failures before succeeding.
    #[derive(Default)]
    struct ScriptedSink {
        create_failures: VecDeque<SinkError>,
        add_failures: VecDeque<SinkError>,
        reauth_result: Option<SinkError>,
        reauths: usize,
        batches: Vec<Vec<String>>,
    }

    impl PlaylistSink for ScriptedSink {
        fn create_playlist(&mut self, _name: &str, _description: &str) -> Result<String, SinkError> {
            match self.create_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok("remote-1".into()),
            }
        }

        fn add_tracks(&mut self, _playlist_id: &str, uris: &[String]) -> Result<(), SinkError> {
            if let Some(err) = self.add_failures.pop_front() {
                return Err(err);
            }
            self.batches.push(uris.to_vec());
            Ok(())
        }

        fn reauthenticate(&mut self) -> Result<(), SinkError> {
            self.reauths += 1;
            self.reauth_result.clone().map_or(Ok(()), Err)
        }
    }

    fn playlist(remote: usize, local: usize) -> PlaylistView {
        let track = |id: usize, uri: String| Track {
            id: id as i64,
            title: format!("Song {id}"),
            artist: format!("Artist {id}"),
            uri,
            duration_sec: 180,
            tempo_bpm: None,
            energy: None,
            is_instrumental: None,
            is_explicit: false,
            source: "csv".into(),
        };
        let entries = (0..remote)
            .map(|i| track(i, format!("spotify:track:{i}")))
            .chain((0..local).map(|i| track(remote + i, format!("/music/{i}.flac"))))
            .enumerate()
            .map(|(i, track)| PlaylistEntry { position: i as u32 + 1, track })
            .collect();
        PlaylistView {
            date: NaiveDate::from_ymd_opt(2025, 8, 13).unwrap(),
            block: PlayBlock {
                id: 1,
                name: "Lunch".into(),
                target_minutes: 120,
                tempo_range: Range::new(80.0, 110.0),
                energy_range: Range::new(0.3, 0.6),
                prefer_instrumental: false,
                color: "#f5a623".into(),
            },
            entries,
            generated_at: None,
        }
    }

    #[test]
    fn test_push_batches_remote_uris_in_order() {
        let mut sink = ScriptedSink::default();
        let mut slept = Vec::new();
        let report = push_playlist(&mut sink, &playlist(230, 4), &PushPolicy::default(), &mut |d| slept.push(d)).unwrap();

        assert_eq!(report.name, "2025-08-13 Lunch");
        assert_eq!(report.tracks_added, 230);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.batches, 3);
        assert_eq!(sink.batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![100, 100, 30]);
        assert_eq!(sink.batches[1][0], "spotify:track:100");
        assert!(slept.is_empty());
    }

    #[test]
    fn test_rate_limit_waits_then_gives_up() {
        let mut sink = ScriptedSink::default();
        sink.add_failures.push_back(SinkError::RateLimited { retry_after: Some(Duration::from_secs(7)) });
        sink.add_failures.push_back(SinkError::RateLimited { retry_after: None });
        let mut slept = Vec::new();
        push_playlist(&mut sink, &playlist(5, 0), &PushPolicy::default(), &mut |d| slept.push(d)).unwrap();
        assert_eq!(slept, vec![Duration::from_secs(7), Duration::from_secs(2)]);

        let mut sink = ScriptedSink::default();
        for _ in 0..4 {
            sink.add_failures.push_back(SinkError::RateLimited { retry_after: None });
        }
        let mut slept = Vec::new();
        let err = push_playlist(&mut sink, &playlist(5, 0), &PushPolicy::default(), &mut |d| slept.push(d)).unwrap_err();
        assert!(matches!(err, SinkError::RateLimited { .. }));
        assert_eq!(slept, vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[test]
    fn test_long_retry_budgets_do_not_overflow() {
        let policy = PushPolicy { max_rate_limit_retries: 40, ..PushPolicy::default() };
        let mut sink = ScriptedSink::default();
        for _ in 0..35 {
            sink.add_failures.push_back(SinkError::RateLimited { retry_after: None });
        }
        let mut slept = Vec::new();
        push_playlist(&mut sink, &playlist(5, 0), &policy, &mut |d| slept.push(d)).unwrap();

        assert_eq!(slept.len(), 35);
        assert_eq!(slept[31], Duration::from_secs(1 << 31));
        assert_eq!(slept[34], Duration::from_secs(u64::from(u32::MAX)));
        assert_eq!(backoff(Duration::MAX, 3), Duration::MAX);
    }

    #[test]
    fn test_single_reauthentication() {
        let mut sink = ScriptedSink::default();
        sink.create_failures.push_back(SinkError::Unauthorized);
        push_playlist(&mut sink, &playlist(3, 0), &PushPolicy::default(), &mut |_| {}).unwrap();
        assert_eq!(sink.reauths, 1);

        let mut sink = ScriptedSink::default();
        sink.create_failures.push_back(SinkError::Unauthorized);
        sink.create_failures.push_back(SinkError::Unauthorized);
        let err = push_playlist(&mut sink, &playlist(3, 0), &PushPolicy::default(), &mut |_| {}).unwrap_err();
        assert_eq!(err, SinkError::Unauthorized);
        assert_eq!(sink.reauths, 1);
    }

    #[test]
    fn test_local_only_playlist_is_rejected_up_front() {
        let mut sink = ScriptedSink::default();
        sink.create_failures.push_back(SinkError::Transport("should not be called".into()));
        let err = push_playlist(&mut sink, &playlist(0, 6), &PushPolicy::default(), &mut |_| {}).unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
        assert_eq!(sink.create_failures.len(), 1);
    }
}
