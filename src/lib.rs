//! Block playlists for restaurant service.
//!
//! A day of service is split into play blocks (Lunch, Dinner, Late), each with
//! a target length, a tempo range and an energy range. Blockplay fills each
//! block from a track catalog, keeps tracks and artists from repeating too
//! often, and orders the result along an energy curve.
//!
//! Core modules:
//! - [`filter`] - Cooldown and content rules over the catalog
//! - [`algorithm`] - Candidate scoring (tempo, energy, artist freshness, jitter)
//! - [`selector`] - Duration-bounded selection with artist spacing
//! - [`sequencer`] - Calm intro, rising middle, calm outro
//! - [`generator`] - The whole pipeline for one (date, block)
//! - [`scheduler`] - Daily and weekly runs, schedule overview
//!
//! ### Supporting Modules
//!
//! - [`db`] - SQLite store implementing every [`repository`] trait
//! - [`track`] - Catalog and configuration records
//! - [`error`] - Typed generation and configuration errors
//! - [`random`] - Injectable randomness (seeded or thread RNG)
//! - [`export`] - CSV, M3U and JSON playlist files
//! - [`sink`] - Pushing playlists to a remote streaming service
//! - [`config`] - Data directory, `blockplay.toml` and overrides
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use blockplay::db::Store;
//! use blockplay::generator::{BlockGenerator, GenerateOptions};
//! use blockplay::random::SeededRandom;
//! use blockplay::scheduler::generate_daily;
//! use chrono::NaiveDate;
//!
//! let db_path = blockplay::config::get_db_path()?;
//! let store = Store::open(&db_path)?;
//! store.init(false)?;
//!
//! let date = NaiveDate::from_ymd_opt(2025, 8, 13).unwrap();
//! let mut generator = BlockGenerator::new(&store, Box::new(SeededRandom::new(42)));
//!
//! // One block
//! let lunch = generator.generate(date, "Lunch", GenerateOptions::default())?;
//! println!("Lunch: {} tracks, {} minutes", lunch.stats.track_count, lunch.stats.actual_minutes);
//!
//! // The rest of the day; Lunch is reported as already existing
//! let report = generate_daily(&mut generator, date, GenerateOptions::default())?;
//! println!("{date}: {}", report.status);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Algorithm Details
//!
//! ### Filtering
//! - Tracks placed in any block within `track_cooldown_days` are excluded
//! - Explicit tracks are dropped when the rules say so
//! - Blocks that prefer instrumentals keep instrumental or unknown tracks
//!
//! ### Scoring
//! - Tempo: 50 points inside the block range, 20 outside, 30 when unknown
//! - Energy: the same 50 / 20 / 30 tiers against the energy range
//! - Freshness: `max(0, 20 - 2 * recent artist plays)`
//! - Jitter: up to 10 points, so equal tracks don't always win in the same order
//!
//! ### Selection
//! - Highest score first, single pass
//! - Stops at the target length once at least 8 tracks are in
//! - Never overshoots the target by more than 30%
//! - The same artist is kept `artist_cooldown_minutes` apart
//!
//! ### Sequencing
//! - Tracks are ranked by energy (unknown counts as 0.3) and cut into
//!   overlapping bands: low (bottom 40%), mid (30-70%), high (top 40%)
//! - Intro and outro take 20% each, drawn at random from the low and mid bands
//! - The middle draws from the mid and high bands
//! - Whatever a band could not place is appended at the end
//!
//! ## Error Handling
//!
//! Generation returns [`error::GenerationError`] so callers can tell a missing
//! block, an exhausted catalog, an existing playlist and a locked day apart.
//! Everything around it (store, config, export) returns `anyhow::Result`.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

pub mod algorithm;
pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod generator;
pub mod random;
pub mod repository;
pub mod scheduler;
pub mod selector;
pub mod sequencer;
pub mod sink;
pub mod track;
