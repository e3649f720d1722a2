//! Error types shared by the generator, the store and the sink.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Invalid configuration or catalog rows, caught at the store boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Catalog numbers attached to a shortfall so the caller can suggest
/// importing more tracks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShortfallStats {
    pub candidates: usize,
    pub discarded_by_cooldown: usize,
}

/// Every way a block generation can fail. None of these are fatal to the process.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The block or the rotation rules are not configured.
    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    #[error("no tracks available that match the criteria and cooldown rules")]
    NoCandidates(ShortfallStats),

    #[error("could not select any tracks from {} candidates with artist separation requirements", .0.candidates)]
    NoSelection(ShortfallStats),

    #[error("playlist already exists for {date} / {block}; use force to regenerate")]
    AlreadyExists { date: NaiveDate, block: String },

    #[error("schedule day {0} is locked")]
    DayLocked(NaiveDate),

    #[error("persistence failure: {0:#}")]
    PersistenceFailure(#[source] anyhow::Error),
}

impl GenerationError {
    /// Errors caused by the request itself (4xx-equivalent).
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigMissing(_) | Self::AlreadyExists { .. } | Self::DayLocked(_)
        )
    }

    /// Catalog too thin for the block's constraints.
    #[must_use]
    pub const fn is_catalog_shortfall(&self) -> bool {
        matches!(self, Self::NoCandidates(_) | Self::NoSelection(_))
    }

    /// Infrastructure errors the caller may retry. The generator itself never retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistenceFailure(_))
    }

    /// Stable machine-readable tag for logs and JSON output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConfigMissing(_) => "config_missing",
            Self::NoCandidates(_) => "no_candidates",
            Self::NoSelection(_) => "no_selection",
            Self::AlreadyExists { .. } => "already_exists",
            Self::DayLocked(_) => "day_locked",
            Self::PersistenceFailure(_) => "persistence_failure",
        }
    }

    /// Shortfall numbers, when the failure carries them.
    #[must_use]
    pub const fn stats(&self) -> Option<ShortfallStats> {
        match self {
            Self::NoCandidates(stats) | Self::NoSelection(stats) => Some(*stats),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for GenerationError {
    fn from(err: anyhow::Error) -> Self {
        Self::PersistenceFailure(err)
    }
}
