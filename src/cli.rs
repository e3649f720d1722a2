//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `blockplay` binary. Parsing only; the
//! dispatch lives in `main.rs`.
//!
//! ## Examples
//!
//! ```bash
//! blockplay init-db
//! blockplay import catalog.json
//! blockplay daily 2025-08-13
//! blockplay export 2025-08-13 Dinner --format m3u
//! ```

use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::export::ExportFormat;
use crate::selector::ArtistSpacing;
use crate::track::DayStatus;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser, Debug)]
#[command(name = "blockplay")]
#[command(about = "blockplay: block playlists for restaurant service (Lunch, Dinner, Late)")]
#[command(version)]
pub struct Args {
    /// Database file (defaults to the platform data directory)
    #[arg(long, global = true, env = "BLOCKPLAY_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to `blockplay.toml` in the platform config directory)
    #[arg(long, global = true, env = "BLOCKPLAY_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Seed for reproducible generation
    #[arg(long, global = true, env = "BLOCKPLAY_SEED")]
    pub seed: Option<u64>,

    /// How artist cooldown is measured while selecting
    #[arg(long, global = true, env = "BLOCKPLAY_ARTIST_SPACING", value_enum)]
    pub artist_spacing: Option<ArtistSpacing>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every generating command.
#[derive(ClapArgs, Debug, Clone, Copy)]
pub struct GenerateFlags {
    /// Replace playlists that already exist
    #[arg(long)]
    pub force: bool,

    /// Ignore the track cooldown
    #[arg(long)]
    pub admin_override: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database and seed default blocks and rotation rules
    ///
    /// Safe to run repeatedly. With --reset, generated playlists, the
    /// schedule and all configuration are wiped first; the catalog is kept.
    InitDb {
        #[arg(long)]
        reset: bool,
    },

    /// Import tracks from a JSON array
    ///
    /// Each object needs title, artist, uri and duration_sec; bpm, energy,
    /// instrumental, explicit and source are optional. Invalid rows and
    /// already-known URIs are skipped and counted.
    Import {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,
    },

    /// Inspect and edit the track catalog
    Tracks {
        #[command(subcommand)]
        action: TracksAction,
    },

    /// List or edit play blocks
    Blocks {
        #[command(subcommand)]
        action: BlocksAction,
    },

    /// Show or change the rotation rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Generate one block's playlist for a date
    Generate {
        date: NaiveDate,
        #[arg(value_hint = clap::ValueHint::Other)]
        block: String,
        #[command(flatten)]
        flags: GenerateFlags,
    },

    /// Generate every block for a date (Lunch, Dinner, Late)
    Daily {
        date: NaiveDate,
        #[command(flatten)]
        flags: GenerateFlags,
    },

    /// Generate seven consecutive days starting at a date
    Weekly {
        start: NaiveDate,
        #[command(flatten)]
        flags: GenerateFlags,
    },

    /// Print a stored playlist
    Show {
        date: NaiveDate,
        #[arg(value_hint = clap::ValueHint::Other)]
        block: String,
    },

    /// List generated playlists, newest first
    History {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long, default_value = "30")]
        limit: usize,
    },

    /// Schedule overview and day status changes
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Write a stored playlist as CSV, M3U or JSON
    Export {
        date: NaiveDate,
        #[arg(value_hint = clap::ValueHint::Other)]
        block: String,
        #[arg(long, short, value_enum, default_value = "csv")]
        format: ExportFormat,
        /// Directory to write into (defaults to the configured export dir)
        #[arg(long, value_hint = clap::ValueHint::DirPath, env = "BLOCKPLAY_EXPORT_DIR")]
        out: Option<PathBuf>,
        /// Print to stdout instead of writing a file
        #[arg(long, conflicts_with = "out")]
        stdout: bool,
    },

    /// Generate shell completions
    ///
    /// Usage: blockplay completion bash > ~/.local/share/bash-completion/completions/blockplay
    Completion { shell: Shell },

    /// Generate completion with block name completion (bash and fish)
    CompletionEnhanced { shell: Shell },

    /// List configured block names for completion (hidden command)
    #[command(hide = true)]
    CompleteBlocks,
}

#[derive(Subcommand, Debug)]
pub enum TracksAction {
    /// List tracks, sorted by artist and title
    List {
        /// Case-insensitive artist substring
        #[arg(long)]
        artist: Option<String>,
        #[arg(long, requires = "bpm_max")]
        bpm_min: Option<f64>,
        #[arg(long, requires = "bpm_min")]
        bpm_max: Option<f64>,
        #[arg(long, requires = "energy_max")]
        energy_min: Option<f64>,
        #[arg(long, requires = "energy_min")]
        energy_max: Option<f64>,
        #[arg(long, default_value = "100")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    Show { id: i64 },

    /// Change fields of one track; unspecified fields are kept
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        uri: Option<String>,
        #[arg(long)]
        duration_sec: Option<u32>,
        #[arg(long)]
        bpm: Option<f64>,
        #[arg(long)]
        energy: Option<f64>,
        #[arg(long)]
        instrumental: Option<bool>,
        #[arg(long)]
        explicit: Option<bool>,
    },

    /// Delete a track that is not part of any playlist
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum BlocksAction {
    List,

    /// Create a block or change an existing one by name
    Set {
        name: String,
        #[arg(long)]
        target_minutes: Option<u32>,
        #[arg(long)]
        bpm_min: Option<f64>,
        #[arg(long)]
        bpm_max: Option<f64>,
        #[arg(long)]
        energy_min: Option<f64>,
        #[arg(long)]
        energy_max: Option<f64>,
        #[arg(long)]
        prefer_instrumental: Option<bool>,
        #[arg(long)]
        color: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RulesAction {
    Show,

    /// Change rotation rules; unspecified fields are kept
    Set {
        #[arg(long)]
        track_cooldown_days: Option<u32>,
        #[arg(long)]
        artist_cooldown_minutes: Option<u32>,
        #[arg(long)]
        exclude_explicit: Option<bool>,
        #[arg(long)]
        normalize_loudness: Option<bool>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScheduleAction {
    /// Scheduled days with per-block progress
    Show {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Set a day's status, e.g. `locked` to freeze it
    Set { date: NaiveDate, status: DayStatus },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_generate_parses_dates_and_flags() {
        let args = Args::try_parse_from(["blockplay", "--seed", "9", "generate", "2025-08-13", "Lunch", "--force"]).unwrap();
        assert_eq!(args.seed, Some(9));
        match args.command {
            Command::Generate { date, block, flags } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 8, 13).unwrap());
                assert_eq!(block, "Lunch");
                assert!(flags.force);
                assert!(!flags.admin_override);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Args::try_parse_from(["blockplay", "daily", "13/08/2025"]).is_err());
    }

    #[test]
    fn test_schedule_set_parses_status() {
        let args = Args::try_parse_from(["blockplay", "schedule", "set", "2025-08-13", "locked"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Schedule { action: ScheduleAction::Set { status: DayStatus::Locked, .. } }
        ));
    }
}
