//! # blockplay Performance Benchmarks
//!
//! Benchmarks for the generation pipeline, stage by stage and end to end.
//!
//! ## Benchmark Categories
//!
//! - **Scoring**: Ranking catalogs of increasing size
//! - **Selection**: Filling a block from a ranked list
//! - **Sequencing**: Energy-curve ordering
//! - **Generation**: Full block generation against in-memory SQLite
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench scoring
//! cargo bench generation
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;

use blockplay::algorithm::{rank_candidates, ScoringContext};
use blockplay::db::Store;
use blockplay::filter::Candidate;
use blockplay::generator::{BlockGenerator, GenerateOptions};
use blockplay::random::SeededRandom;
use blockplay::selector::{select_tracks, ArtistSpacing, MonotonicClock, SelectionLimits};
use blockplay::sequencer::build_energy_curve;
use blockplay::track::{PlayBlock, Range, RotationRules, Track, TrackImport};

fn dinner() -> PlayBlock {
    PlayBlock {
        id: 2,
        name: "Dinner".into(),
        target_minutes: 180,
        tempo_range: Range::new(70.0, 100.0),
        energy_range: Range::new(0.2, 0.5),
        prefer_instrumental: false,
        color: "#7b61ff".into(),
    }
}

/// Helper function to create a realistic catalog; some tempos and energies unknown
#[allow(clippy::cast_precision_loss)]
fn create_test_tracks(count: usize) -> Vec<Track> {
    (0..count)
        .map(|i| Track {
            id: i as i64 + 1,
            title: format!("Song {i}"),
            artist: format!("Artist {}", i % (count / 3).max(1)),
            uri: format!("spotify:track:{i:06}"),
            duration_sec: 150 + (i % 180) as u32,
            tempo_bpm: (i % 11 != 0).then(|| 60.0 + (i % 90) as f64),
            energy: (i % 13 != 0).then(|| (i % 100) as f64 / 100.0),
            is_instrumental: Some(i % 4 == 0),
            is_explicit: false,
            source: "csv".into(),
        })
        .collect()
}

fn create_candidates(count: usize) -> Vec<Candidate> {
    create_test_tracks(count)
        .into_iter()
        .enumerate()
        .map(|(i, track)| Candidate { track, last_played: None, recent_artist_usage: (i % 5) as u32 })
        .collect()
}

/// Benchmark candidate scoring and ranking
fn benchmark_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");
    let block = dinner();
    let context = ScoringContext::default();

    for size in [100, 1000, 10_000].iter() {
        let candidates = create_candidates(*size);
        group.bench_with_input(BenchmarkId::new("rank_candidates", size), &candidates, |b, candidates| {
            b.iter_batched(
                || (candidates.clone(), SeededRandom::new(1)),
                |(candidates, mut rng)| rank_candidates(black_box(candidates), &block, &context, &mut rng),
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

/// Benchmark filling a block from a ranked list
fn benchmark_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");
    let block = dinner();
    let ranked = rank_candidates(create_candidates(2000), &block, &ScoringContext::default(), &mut SeededRandom::new(2));

    for spacing in [ArtistSpacing::SelectorClock, ArtistSpacing::PlaylistRuntime] {
        let limits = SelectionLimits::new(&block, &RotationRules::default(), spacing);
        group.bench_function(format!("select_tracks_{spacing:?}"), |b| {
            b.iter(|| select_tracks(black_box(&ranked), &limits, &MonotonicClock::default()))
        });
    }

    group.finish();
}

/// Benchmark energy-curve sequencing
fn benchmark_sequencing(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequencing");

    for size in [10, 45, 200].iter() {
        let tracks = create_test_tracks(*size);
        group.bench_with_input(BenchmarkId::new("build_energy_curve", size), &tracks, |b, tracks| {
            b.iter_batched(
                || (tracks.clone(), SeededRandom::new(3)),
                |(tracks, mut rng)| build_energy_curve(black_box(tracks), &mut rng),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark whole-block generation, persistence included
fn benchmark_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation");
    group.sample_size(20);

    let mut store = Store::open_in_memory().expect("Failed to open database");
    store.init(false).expect("Failed to seed database");
    let catalog: Vec<TrackImport> = create_test_tracks(3000)
        .into_iter()
        .map(|t| TrackImport {
            title: t.title,
            artist: t.artist,
            uri: t.uri,
            duration_sec: t.duration_sec,
            tempo_bpm: t.tempo_bpm,
            energy: t.energy,
            is_instrumental: t.is_instrumental,
            is_explicit: t.is_explicit,
            source: t.source,
        })
        .collect();
    store.import_tracks(&catalog).expect("Failed to import catalog");

    let day = chrono::NaiveDate::from_ymd_opt(2025, 8, 13).expect("valid date");
    let options = GenerateOptions { force: true, admin_override: true };
    let mut generator = BlockGenerator::new(&store, Box::new(SeededRandom::new(4)));

    group.bench_function("generate_dinner", |b| {
        b.iter(|| generator.generate(day, "Dinner", options).expect("generation succeeds"))
    });

    group.finish();
}

// Group all benchmarks
criterion_group!(benches, benchmark_scoring, benchmark_selection, benchmark_sequencing, benchmark_generation);

criterion_main!(benches);
