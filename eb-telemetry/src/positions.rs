//! Position samples captured once per game frame.
//!
//! The capture writes `Timestamp,Level,X,Y,SessionTime,Deaths`. Its `Level`
//! column holds the room (screen) name, so samples carry it as `room`.
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::numbers::round_f64_to_i32;

/// One observed player position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Stream identifier from the capture's `Level` column (a room name).
    pub room: String,
    /// Wall-clock capture time; absent when the row's timestamp did not parse.
    pub timestamp: Option<DateTime<Utc>>,
    /// Seconds since the game session started.
    pub session_time: f64,
    pub x: i32,
    pub y: i32,
    /// Deaths so far in this game session; keys attempts.
    pub deaths: u32,
}

impl PositionSample {
    #[must_use]
    pub fn new(room: &str, session_time: f64, x: i32, y: i32, deaths: u32) -> Self {
        Self {
            room: room.to_string(),
            timestamp: None,
            session_time,
            x,
            y,
            deaths,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Deserialize)]
struct PositionRow {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Level")]
    level: String,
    #[serde(rename = "X")]
    x: f64,
    #[serde(rename = "Y")]
    y: f64,
    #[serde(rename = "SessionTime")]
    session_time: f64,
    #[serde(rename = "Deaths")]
    deaths: u32,
}

impl PositionRow {
    fn into_sample(self) -> Option<PositionSample> {
        if !self.session_time.is_finite() || self.session_time < 0.0 {
            return None;
        }
        if !self.x.is_finite() || !self.y.is_finite() || self.level.trim().is_empty() {
            return None;
        }
        Some(PositionSample {
            room: self.level.trim().to_string(),
            timestamp: parse_timestamp(&self.timestamp),
            session_time: self.session_time,
            x: round_f64_to_i32(self.x),
            y: round_f64_to_i32(self.y),
            deaths: self.deaths,
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .ok()
}

/// Counters describing a position load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadStats {
    pub rows: usize,
    pub loaded: usize,
    pub skipped: usize,
    pub missing_timestamps: usize,
}

/// Samples read from one position table, in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleLoad {
    pub samples: Vec<PositionSample>,
    pub stats: LoadStats,
}

/// Read position samples from CSV. Malformed rows are skipped and counted.
///
/// # Errors
///
/// Returns an error only when the underlying reader fails.
pub fn read_samples<R: Read>(reader: R) -> Result<SampleLoad, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut load = SampleLoad::default();
    for (line, row) in csv_reader.deserialize::<PositionRow>().enumerate() {
        load.stats.rows += 1;
        let row = match row {
            Ok(row) => row,
            Err(err) if err.is_io_error() => return Err(err),
            Err(err) => {
                load.stats.skipped += 1;
                log::debug!("skipping position row {}: {err}", line + 2);
                continue;
            }
        };
        let Some(sample) = row.into_sample() else {
            load.stats.skipped += 1;
            log::debug!("skipping position row {}: out-of-range values", line + 2);
            continue;
        };
        if sample.timestamp.is_none() {
            load.stats.missing_timestamps += 1;
        }
        load.stats.loaded += 1;
        load.samples.push(sample);
    }
    Ok(load)
}

/// Parse an in-memory position table.
#[must_use]
pub fn parse_samples(csv_text: &str) -> SampleLoad {
    read_samples(csv_text.as_bytes()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Timestamp,Level,X,Y,SessionTime,Deaths\n";

    #[test]
    fn capture_rows_parse_and_round() {
        let csv = format!(
            "{HEADER}2025-10-02T14:03:11.1234567Z,SpringRoom,100.400,-20.600,1.250,0\n\
             2025-10-02T14:03:11.1400000Z,SpringRoom,101.500,-20.000,1.267,1\n"
        );
        let load = parse_samples(&csv);
        assert_eq!(load.stats.loaded, 2);
        assert_eq!(load.stats.skipped, 0);
        let first = &load.samples[0];
        assert_eq!(first.room, "SpringRoom");
        assert_eq!((first.x, first.y), (100, -21));
        assert!((first.session_time - 1.25).abs() < f64::EPSILON);
        assert!(first.timestamp.is_some());
        assert_eq!(load.samples[1].x, 102);
        assert_eq!(load.samples[1].deaths, 1);

        // The capture writes UTF-8 with a byte order mark.
        let with_bom = format!("\u{feff}{csv}");
        let load = parse_samples(&with_bom);
        assert_eq!(load.stats.loaded, 2);
        assert_eq!(load.stats.skipped, 0);
        assert_eq!(load.samples[0].room, "SpringRoom");
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let csv = format!(
            "{HEADER}2025-10-02T14:03:11Z,Room,1,2,0.5,0\n\
             garbage\n\
             2025-10-02T14:03:12Z,Room,1,2,-3.0,0\n\
             2025-10-02T14:03:13Z,Room,abc,2,1.0,0\n\
             2025-10-02T14:03:14Z,Room,1,2,1.5,-1\n\
             yesterday,Room,3,4,2.0,0\n"
        );
        let load = parse_samples(&csv);
        assert_eq!(load.stats.rows, 6);
        assert_eq!(load.stats.loaded, 2);
        assert_eq!(load.stats.skipped, 4);
        assert_eq!(load.stats.missing_timestamps, 1);
        assert!(load.samples[1].timestamp.is_none());
        assert_eq!(load.samples[1].x, 3);
    }

    #[test]
    fn empty_table_yields_nothing() {
        assert!(parse_samples("").samples.is_empty());
        assert!(parse_samples(HEADER).samples.is_empty());
    }
}
