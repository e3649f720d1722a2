//! Text renderings of a persisted playlist: CSV, extended M3U and JSON.

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::db::PlaylistView;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    M3u,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::M3u => "m3u",
            Self::Json => "json",
        }
    }
}

pub const CSV_HEADER: &str = "position,title,artist,duration_sec,bpm,energy,uri";

/// One CSV line; field order follows [`CSV_HEADER`].
#[derive(Serialize)]
struct CsvRow<'a> {
    position: u32,
    title: &'a str,
    artist: &'a str,
    duration_sec: u32,
    bpm: Option<f64>,
    energy: Option<f64>,
    uri: &'a str,
}

pub fn to_csv(playlist: &PlaylistView) -> Result<String> {
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    if playlist.entries.is_empty() {
        writer.write_record(CSV_HEADER.split(','))?;
    }
    for entry in &playlist.entries {
        let track = &entry.track;
        writer.serialize(CsvRow {
            position: entry.position,
            title: &track.title,
            artist: &track.artist,
            duration_sec: track.duration_sec,
            bpm: track.tempo_bpm,
            energy: track.energy,
            uri: &track.uri,
        })?;
    }
    let bytes = writer.into_inner().map_err(|err| anyhow!("Failed to flush CSV export: {}", err.error()))?;
    String::from_utf8(bytes).context("CSV export is not valid UTF-8")
}

#[must_use]
pub fn to_m3u(playlist: &PlaylistView) -> String {
    let mut out = String::from("#EXTM3U\n");
    out.push_str(&format!("#PLAYLIST:{} - {}\n", playlist.date, playlist.block.name));
    out.push_str("#EXTENC:UTF-8\n");
    for entry in &playlist.entries {
        let track = &entry.track;
        out.push_str(&format!("#EXTINF:{},{} - {}\n{}\n", track.duration_sec, track.artist, track.title, track.uri));
    }
    out
}

pub fn to_json(playlist: &PlaylistView) -> Result<String> {
    serde_json::to_string_pretty(playlist).context("Failed to serialize playlist")
}

pub fn render(playlist: &PlaylistView, format: ExportFormat) -> Result<String> {
    Ok(match format {
        ExportFormat::Csv => to_csv(playlist)?,
        ExportFormat::M3u => to_m3u(playlist),
        ExportFormat::Json => to_json(playlist)?,
    })
}

/// `YYYY-MM-DD_block.ext`, block name lowercased.
#[must_use]
pub fn file_name(playlist: &PlaylistView, format: ExportFormat) -> String {
    format!("{}_{}.{}", playlist.date, playlist.block.name.to_lowercase(), format.extension())
}

/// Renders into `dir` under [`file_name`] and returns the written path.
pub fn write_to_dir(playlist: &PlaylistView, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create export directory {}", dir.display()))?;
    let path = dir.join(file_name(playlist, format));
    fs::write(&path, render(playlist, format)?).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Exported {} tracks to {}", playlist.entries.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PlaylistEntry;
    use crate::track::{PlayBlock, Range, Track};
    use chrono::NaiveDate;

    fn playlist() -> PlaylistView {
        let track = |id: i64, title: &str, artist: &str, bpm: Option<f64>, energy: Option<f64>| Track {
            id,
            title: title.into(),
            artist: artist.into(),
            uri: format!("spotify:track:{id}"),
            duration_sec: 200 + id as u32,
            tempo_bpm: bpm,
            energy,
            is_instrumental: None,
            is_explicit: false,
            source: "csv".into(),
        };
        PlaylistView {
            date: NaiveDate::from_ymd_opt(2025, 8, 13).unwrap(),
            block: PlayBlock {
                id: 2,
                name: "Dinner".into(),
                target_minutes: 180,
                tempo_range: Range::new(70.0, 100.0),
                energy_range: Range::new(0.2, 0.5),
                prefer_instrumental: false,
                color: "#7b61ff".into(),
            },
            entries: vec![
                PlaylistEntry { position: 1, track: track(1, "Take Five", "Dave Brubeck", Some(86.0), Some(0.35)) },
                PlaylistEntry { position: 2, track: track(2, "Say \"Hi\", Bye", "Earth, Wind & Fire", None, None) },
            ],
            generated_at: None,
        }
    }

    #[test]
    fn test_csv_quotes_only_when_needed() {
        let csv = to_csv(&playlist()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("1,Take Five,Dave Brubeck,201,"));
        assert_eq!(lines[2], "2,\"Say \"\"Hi\"\", Bye\",\"Earth, Wind & Fire\",202,,,spotify:track:2");
    }

    #[test]
    fn test_csv_reads_back() {
        let csv = to_csv(&playlist()).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let records: Vec<csv::StringRecord> = reader.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0][4].parse::<f64>().unwrap(), 86.0);
        assert_eq!(records[0][5].parse::<f64>().unwrap(), 0.35);
        assert_eq!(&records[1][1], "Say \"Hi\", Bye");
        assert_eq!(&records[1][2], "Earth, Wind & Fire");
        assert_eq!(&records[1][4], "");
    }

    #[test]
    fn test_empty_playlist_still_has_header() {
        let view = PlaylistView { entries: Vec::new(), ..playlist() };
        assert_eq!(to_csv(&view).unwrap().lines().collect::<Vec<_>>(), vec![CSV_HEADER]);
    }

    #[test]
    fn test_m3u_layout() {
        let m3u = to_m3u(&playlist());
        let lines: Vec<&str> = m3u.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#PLAYLIST:2025-08-13 - Dinner");
        assert_eq!(lines[3], "#EXTINF:201,Dave Brubeck - Take Five");
        assert_eq!(lines[4], "spotify:track:1");
        assert_eq!(lines.len(), 3 + 2 * 2);
    }

    #[test]
    fn test_file_name_and_write() {
        let dir = tempfile::tempdir().unwrap();
        let view = playlist();
        assert_eq!(file_name(&view, ExportFormat::M3u), "2025-08-13_dinner.m3u");

        let path = write_to_dir(&view, ExportFormat::Json, dir.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["block"]["name"], "Dinner");
        assert_eq!(json["entries"].as_array().unwrap().len(), 2);
    }
}
