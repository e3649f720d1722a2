//! # blockplay
//!
//! Command-line front end: builds block playlists for restaurant service
//! windows from a local track catalog and keeps them in SQLite.
//!
//! ```bash
//! blockplay init-db
//! blockplay import catalog.json
//! blockplay weekly 2025-08-11
//! blockplay show 2025-08-13 Dinner
//! RUST_LOG=blockplay=debug blockplay generate 2025-08-14 Late --force
//! ```

use anyhow::{bail, Context, Result};
use chrono::{Days, Local, NaiveDate};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use serde::Serialize;
use std::fs;

use blockplay::cli::{self, BlocksAction, Command, RulesAction, ScheduleAction, TracksAction};
use blockplay::config::{Overrides, RuntimeConfig};
use blockplay::db::{Store, TrackFilter};
use blockplay::export;
use blockplay::generator::{BlockGenerator, GenerateOptions, GeneratedPlaylist};
use blockplay::random;
use blockplay::repository::{PlayBlockConfig, RotationRulesSource, ScheduleStore};
use blockplay::scheduler::{self, DailyReport};
use blockplay::track::{PlayBlock, Range, Track, TrackImport};
use blockplay::completion;

/// Open-ended history bounds. Dates are stored as ISO text, so stay within four-digit years.
fn history_bounds(from: Option<NaiveDate>, to: Option<NaiveDate>) -> (NaiveDate, NaiveDate) {
    let first = NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN);
    let last = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX);
    (from.unwrap_or(first), to.unwrap_or(last))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.precision$}"))
}

fn print_track_line(position: Option<u32>, track: &Track) {
    let prefix = position.map_or_else(|| format!("#{:<5}", track.id), |p| format!("{p:>3}."));
    println!(
        "{prefix} {} - {} [{}:{:02}] bpm {} energy {}{}",
        track.artist,
        track.title,
        track.duration_sec / 60,
        track.duration_sec % 60,
        fmt_opt(track.tempo_bpm, 0),
        fmt_opt(track.energy, 2),
        if track.is_explicit { " (explicit)" } else { "" },
    );
}

fn print_playlist(playlist: &GeneratedPlaylist) {
    let stats = &playlist.stats;
    println!(
        "{} / {}: {} tracks, {} of {} minutes (avg bpm {}, avg energy {}, {} candidates, {} cooling down)",
        playlist.date,
        playlist.block.name,
        stats.track_count,
        stats.actual_minutes,
        stats.target_minutes,
        fmt_opt(stats.average_bpm, 1),
        fmt_opt(stats.average_energy, 2),
        stats.candidates_considered,
        stats.discarded_by_cooldown,
    );
    for (position, track) in (1u32..).zip(&playlist.tracks) {
        print_track_line(Some(position), track);
    }
}

fn print_daily(report: &DailyReport) {
    println!(
        "{}: {} ({} blocks, {} tracks, {} minutes)",
        report.date, report.status, report.summary.total_blocks, report.summary.total_tracks, report.summary.total_minutes
    );
    for playlist in &report.blocks {
        println!("  {:<8} {:>3} tracks {:>4} min", playlist.block.name, playlist.stats.track_count, playlist.stats.actual_minutes);
    }
    for failure in &report.errors {
        println!("  {:<8} failed: {}", failure.block, failure.message);
        if let Some(stats) = failure.stats {
            println!(
                "           {} candidates, {} cooling down; import more tracks or relax the rules",
                stats.candidates, stats.discarded_by_cooldown
            );
        }
    }
}

fn print_block(block: &PlayBlock) {
    println!(
        "{:<8} {:>4} min  bpm {}-{}  energy {:.2}-{:.2}{}  {}",
        block.name,
        block.target_minutes,
        block.tempo_range.min,
        block.tempo_range.max,
        block.energy_range.min,
        block.energy_range.max,
        if block.prefer_instrumental { "  instrumental" } else { "" },
        block.color,
    );
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn open_store(config: &RuntimeConfig) -> Result<Store> {
    debug!("Using database {}", config.db_path.display());
    Store::open(&config.db_path)
}

fn generator<'a>(store: &'a Store, config: &RuntimeConfig) -> BlockGenerator<'a, Store> {
    BlockGenerator::new(store, random::source_for(config.seed)).with_spacing(config.artist_spacing)
}

/// Main entry point.
///
/// Logging goes through `env_logger` and is controlled by `RUST_LOG`:
/// - `RUST_LOG=info blockplay daily 2025-08-13` - progress per block
/// - `RUST_LOG=blockplay::selector=trace blockplay generate ...` - every skip
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let overrides = Overrides {
        db_path: args.db.clone(),
        seed: args.seed,
        artist_spacing: args.artist_spacing,
        export_dir: None,
    };
    let config = RuntimeConfig::load(args.config.as_deref(), overrides)?;
    let json = args.json;

    match args.command {
        Command::InitDb { reset } => {
            let store = open_store(&config)?;
            store.init(reset)?;
            println!("Database ready at {}", config.db_path.display());
        }
        Command::Import { file } => {
            let text = fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let tracks: Vec<TrackImport> =
                serde_json::from_str(&text).with_context(|| format!("{} is not a JSON array of tracks", file.display()))?;
            let mut store = open_store(&config)?;
            store.init(false)?;
            let report = store.import_tracks(&tracks)?;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "Imported {} tracks ({} invalid, {} duplicates skipped)",
                    report.imported, report.skipped_invalid, report.duplicates
                );
            }
        }
        Command::Tracks { action } => run_tracks(&open_store(&config)?, action, json)?,
        Command::Blocks { action } => run_blocks(&open_store(&config)?, action, json)?,
        Command::Rules { action } => run_rules(&open_store(&config)?, action, json)?,
        Command::Generate { date, block, flags } => {
            let store = open_store(&config)?;
            let options = GenerateOptions { force: flags.force, admin_override: flags.admin_override };
            info!("Generating {block} for {date}");
            let mut block_generator = generator(&store, &config);
            match block_generator.generate(date, &block, options) {
                Ok(playlist) if json => print_json(&playlist)?,
                Ok(playlist) => print_playlist(&playlist),
                Err(err) => {
                    if let Some(stats) = err.stats() {
                        eprintln!(
                            "{} candidates, {} cooling down; import more tracks or relax the rules",
                            stats.candidates, stats.discarded_by_cooldown
                        );
                    }
                    return Err(anyhow::Error::new(err).context(format!("Generating {block} for {date} failed")));
                }
            }
        }
        Command::Daily { date, flags } => {
            let store = open_store(&config)?;
            let options = GenerateOptions { force: flags.force, admin_override: flags.admin_override };
            let report = scheduler::generate_daily(&mut generator(&store, &config), date, options)?;
            if json {
                print_json(&report)?;
            } else {
                print_daily(&report);
            }
        }
        Command::Weekly { start, flags } => {
            let store = open_store(&config)?;
            let options = GenerateOptions { force: flags.force, admin_override: flags.admin_override };
            let report = scheduler::generate_weekly(&mut generator(&store, &config), start, options)?;
            if json {
                print_json(&report)?;
            } else {
                report.days.iter().for_each(print_daily);
                let summary = &report.summary;
                println!(
                    "Week of {}: {}/{} days ok ({}%), {} blocks, {} tracks, {} minutes",
                    report.start_date,
                    summary.successful_days,
                    summary.total_days,
                    summary.success_rate,
                    summary.total_blocks,
                    summary.total_tracks,
                    summary.total_minutes
                );
            }
        }
        Command::Show { date, block } => {
            let store = open_store(&config)?;
            let Some(view) = store.playlist(date, &block)? else {
                bail!("No playlist for {date} / {block}");
            };
            if json {
                print_json(&view)?;
            } else {
                println!("{} / {}: {} tracks, {} min", date, view.block.name, view.entries.len(), view.total_duration_sec() / 60);
                for entry in &view.entries {
                    print_track_line(Some(entry.position), &entry.track);
                }
            }
        }
        Command::History { from, to, limit } => {
            let store = open_store(&config)?;
            let (from, to) = history_bounds(from, to);
            let rows = store.playlist_history(from, to, limit)?;
            if json {
                print_json(&rows)?;
            } else {
                for row in rows {
                    println!(
                        "{} {:<8} {:>3} tracks {:>4} min  generated {}",
                        row.date,
                        row.block_name,
                        row.track_count,
                        row.total_duration_sec / 60,
                        row.generated_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        Command::Schedule { action } => run_schedule(&open_store(&config)?, action, json)?,
        Command::Export { date, block, format, out, stdout } => {
            let store = open_store(&config)?;
            let Some(view) = store.playlist(date, &block)? else {
                bail!("No playlist for {date} / {block}");
            };
            if stdout {
                print!("{}", export::render(&view, format)?);
            } else {
                let dir = out.unwrap_or_else(|| config.export_dir.clone());
                let path = export::write_to_dir(&view, format, &dir)?;
                println!("{}", path.display());
            }
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
        Command::CompletionEnhanced { shell } => match shell {
            cli::Shell::Bash => print!("{}", completion::enhanced_bash_completion()),
            cli::Shell::Fish => print!("{}", completion::enhanced_fish_completion()),
            _ => bail!("Enhanced completions only supported for bash and fish"),
        },
        Command::CompleteBlocks => completion::print_block_completions(&config.db_path)?,
    }

    Ok(())
}

fn run_tracks(store: &Store, action: TracksAction, json: bool) -> Result<()> {
    match action {
        TracksAction::List { artist, bpm_min, bpm_max, energy_min, energy_max, limit, offset } => {
            let filter = TrackFilter {
                artist,
                bpm: bpm_min.zip(bpm_max).map(|(min, max)| Range::new(min, max)),
                energy: energy_min.zip(energy_max).map(|(min, max)| Range::new(min, max)),
                limit,
                offset,
            };
            let tracks = store.list_tracks(&filter)?;
            if json {
                print_json(&tracks)?;
            } else {
                tracks.iter().for_each(|t| print_track_line(None, t));
                println!("{} of {} tracks", tracks.len(), store.track_count()?);
            }
        }
        TracksAction::Show { id } => {
            let track = store.track(id)?.with_context(|| format!("No track with id {id}"))?;
            if json {
                print_json(&track)?;
            } else {
                print_track_line(None, &track);
                println!("  uri {}  source {}", track.uri, track.source);
            }
        }
        TracksAction::Update { id, title, artist, uri, duration_sec, bpm, energy, instrumental, explicit } => {
            let track = store.track(id)?.with_context(|| format!("No track with id {id}"))?;
            let edit = TrackImport {
                title: title.unwrap_or(track.title),
                artist: artist.unwrap_or(track.artist),
                uri: uri.unwrap_or(track.uri),
                duration_sec: duration_sec.unwrap_or(track.duration_sec),
                tempo_bpm: bpm.or(track.tempo_bpm),
                energy: energy.or(track.energy),
                is_instrumental: instrumental.or(track.is_instrumental),
                is_explicit: explicit.unwrap_or(track.is_explicit),
                source: track.source,
            };
            store.update_track(id, &edit)?;
            println!("Updated track {id}");
        }
        TracksAction::Delete { id } => {
            if store.delete_track(id)? {
                println!("Deleted track {id}");
            } else {
                bail!("No track with id {id}");
            }
        }
    }
    Ok(())
}

fn run_blocks(store: &Store, action: BlocksAction, json: bool) -> Result<()> {
    match action {
        BlocksAction::List => {
            let blocks = store.all()?;
            if json {
                print_json(&blocks)?;
            } else {
                blocks.iter().for_each(print_block);
            }
        }
        BlocksAction::Set { name, target_minutes, bpm_min, bpm_max, energy_min, energy_max, prefer_instrumental, color } => {
            let block = match store.get(&name)? {
                Some(existing) => PlayBlock {
                    target_minutes: target_minutes.unwrap_or(existing.target_minutes),
                    tempo_range: Range::new(
                        bpm_min.unwrap_or(existing.tempo_range.min),
                        bpm_max.unwrap_or(existing.tempo_range.max),
                    ),
                    energy_range: Range::new(
                        energy_min.unwrap_or(existing.energy_range.min),
                        energy_max.unwrap_or(existing.energy_range.max),
                    ),
                    prefer_instrumental: prefer_instrumental.unwrap_or(existing.prefer_instrumental),
                    color: color.unwrap_or(existing.color),
                    ..existing
                },
                None => PlayBlock {
                    id: 0,
                    name,
                    target_minutes: target_minutes.context("A new block needs --target-minutes")?,
                    tempo_range: Range::new(
                        bpm_min.context("A new block needs --bpm-min")?,
                        bpm_max.context("A new block needs --bpm-max")?,
                    ),
                    energy_range: Range::new(
                        energy_min.context("A new block needs --energy-min")?,
                        energy_max.context("A new block needs --energy-max")?,
                    ),
                    prefer_instrumental: prefer_instrumental.unwrap_or(false),
                    color: color.unwrap_or_else(|| "#888888".into()),
                },
            };
            store.upsert_block(&block)?;
            print_block(&block);
        }
    }
    Ok(())
}

fn run_rules(store: &Store, action: RulesAction, json: bool) -> Result<()> {
    let current = store.current()?.unwrap_or_default();
    let rules = match action {
        RulesAction::Show => current,
        RulesAction::Set { track_cooldown_days, artist_cooldown_minutes, exclude_explicit, normalize_loudness } => {
            let rules = blockplay::track::RotationRules {
                track_cooldown_days: track_cooldown_days.unwrap_or(current.track_cooldown_days),
                artist_cooldown_minutes: artist_cooldown_minutes.unwrap_or(current.artist_cooldown_minutes),
                exclude_explicit: exclude_explicit.unwrap_or(current.exclude_explicit),
                normalize_loudness: normalize_loudness.unwrap_or(current.normalize_loudness),
            };
            store.set_rules(&rules)?;
            rules
        }
    };
    if json {
        print_json(&rules)?;
    } else {
        println!(
            "track cooldown {} days, artist cooldown {} min, exclude explicit {}, normalize loudness {}",
            rules.track_cooldown_days, rules.artist_cooldown_minutes, rules.exclude_explicit, rules.normalize_loudness
        );
    }
    Ok(())
}

fn run_schedule(store: &Store, action: ScheduleAction, json: bool) -> Result<()> {
    match action {
        ScheduleAction::Show { from, to } => {
            let from = from.unwrap_or_else(today);
            let to = match to {
                Some(to) => to,
                None => from.checked_add_days(Days::new(29)).unwrap_or(NaiveDate::MAX),
            };
            let days = scheduler::schedule_overview(store, from, to)?;
            if json {
                print_json(&days)?;
            } else {
                for day in days {
                    let blocks: Vec<String> = day
                        .blocks
                        .iter()
                        .map(|b| format!("{} {}", b.name, if b.generated { format!("{} tracks", b.track_count) } else { "-".into() }))
                        .collect();
                    println!("{} {:<10} {}", day.date, day.status.as_str(), blocks.join(" | "));
                }
            }
        }
        ScheduleAction::Set { date, status } => {
            store.set_day_status(date, status)?;
            println!("{date} is now {status}");
        }
    }
    Ok(())
}
