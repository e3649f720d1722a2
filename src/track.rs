//! Catalog and configuration records.
//!
//! Everything the generator reads is typed here and validated once at the
//! store boundary, so the algorithm never has to second-guess a missing field.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Default service windows, in the order a day is generated.
pub const DEFAULT_BLOCKS: [&str; 3] = ["Lunch", "Dinner", "Late"];

/// How a track is stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub artist: String,
    /// Streaming-service URI (`spotify:track:…`) or a local path.
    pub uri: String,
    pub duration_sec: u32,
    /// Unknown tempo is `None`, never zero.
    pub tempo_bpm: Option<f64>,
    /// Perceptual intensity in `[0, 1]`; unknown is `None`.
    pub energy: Option<f64>,
    pub is_instrumental: Option<bool>,
    pub is_explicit: bool,
    /// Where the track came from (`csv`, `artist`, `playlist_url`, …).
    pub source: String,
}

/// A track as handed to the importer. Mirrors [`Track`] minus the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackImport {
    pub title: String,
    pub artist: String,
    pub uri: String,
    pub duration_sec: u32,
    #[serde(default, alias = "bpm")]
    pub tempo_bpm: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default, alias = "instrumental")]
    pub is_instrumental: Option<bool>,
    #[serde(default, alias = "explicit")]
    pub is_explicit: bool,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "csv".to_string()
}

impl TrackImport {
    /// Rejects rows the catalog cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title.trim().is_empty() || self.artist.trim().is_empty() || self.uri.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "track `{}` needs a title, artist and uri",
                self.uri
            )));
        }
        if self.duration_sec == 0 {
            return Err(ConfigError::Invalid(format!("track `{}` has zero duration", self.uri)));
        }
        if let Some(energy) = self.energy {
            if !(0.0..=1.0).contains(&energy) {
                return Err(ConfigError::Invalid(format!(
                    "track `{}` energy {energy} is outside [0, 1]",
                    self.uri
                )));
            }
        }
        if matches!(self.tempo_bpm, Some(bpm) if bpm <= 0.0 || !bpm.is_finite()) {
            return Err(ConfigError::Invalid(format!("track `{}` has a non-positive BPM", self.uri)));
        }
        Ok(())
    }
}

/// Inclusive numeric range, `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One service window and its musical targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayBlock {
    pub id: i64,
    pub name: String,
    pub target_minutes: u32,
    pub tempo_range: Range,
    pub energy_range: Range,
    pub prefer_instrumental: bool,
    pub color: String,
}

/// A block never runs longer than one day of service.
pub const MAX_TARGET_MINUTES: u32 = 24 * 60;

impl PlayBlock {
    /// Target runtime in seconds.
    #[must_use]
    pub fn target_seconds(&self) -> u32 {
        self.target_minutes.saturating_mul(60)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("play block name is empty".into()));
        }
        if self.target_minutes == 0 {
            return Err(ConfigError::Invalid(format!("block `{}` has a zero target", self.name)));
        }
        if self.target_minutes > MAX_TARGET_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "block `{}` target of {} minutes exceeds {MAX_TARGET_MINUTES}",
                self.name, self.target_minutes
            )));
        }
        if self.tempo_range.min > self.tempo_range.max {
            return Err(ConfigError::Invalid(format!(
                "block `{}` tempo range {}..{} is reversed",
                self.name, self.tempo_range.min, self.tempo_range.max
            )));
        }
        let energy = self.energy_range;
        if energy.min > energy.max || energy.min < 0.0 || energy.max > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "block `{}` energy range {}..{} must be ordered inside [0, 1]",
                self.name, energy.min, energy.max
            )));
        }
        Ok(())
    }
}

/// Global rotation settings. There is only ever one current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRules {
    pub track_cooldown_days: u32,
    pub artist_cooldown_minutes: u32,
    pub exclude_explicit: bool,
    /// Carried for exporters; the generator does not read it.
    pub normalize_loudness: bool,
}

impl Default for RotationRules {
    fn default() -> Self {
        Self {
            track_cooldown_days: 7,
            artist_cooldown_minutes: 45,
            exclude_explicit: true,
            normalize_loudness: true,
        }
    }
}

impl RotationRules {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // A cooldown longer than ten years is certainly a typo.
        if self.track_cooldown_days > 3650 {
            return Err(ConfigError::Invalid(format!(
                "track cooldown of {} days is out of range",
                self.track_cooldown_days
            )));
        }
        Ok(())
    }
}

/// One track placed in one (date, block) playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedItem {
    pub track_id: i64,
    pub artist: String,
    pub date: NaiveDate,
    pub block_id: i64,
    /// 1-based.
    pub position: u32,
    pub generated_at: DateTime<Utc>,
}

/// A past placement as seen by the candidate filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRecord {
    pub track_id: i64,
    pub artist: String,
    pub date: NaiveDate,
}

/// Lifecycle of a calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Pending,
    Generating,
    Completed,
    Failed,
    Locked,
}

impl DayStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Locked => "locked",
        }
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayStatus {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "generating" => Ok(Self::Generating),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "locked" => Ok(Self::Locked),
            other => Err(ConfigError::Invalid(format!("unknown day status `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDay {
    pub date: NaiveDate,
    pub status: DayStatus,
}
