//! Per-player derived telemetry.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::attempts::{AttemptLog, segment_sorted, sort_samples};
use crate::catalog::{Level, LevelCatalog};
use crate::events::{DeathEvent, ScanStats, extract_events_from_fragments};
use crate::numbers::{i64_to_f64, non_negative_span};
use crate::positions::{LoadStats, PositionSample, SampleLoad};
use crate::sentiment::{Sentiment, SentimentClassifier, dominant_sentiment};

/// An input a session was expected to provide but did not.
///
/// These degrade the dataset instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MissingInput {
    #[error("session {session} has no position capture")]
    Positions { session: String },
    #[error("session {session} has no death-screen log")]
    Log { session: String },
}

pub type InputGaps = SmallVec<[MissingInput; 2]>;

/// Everything derived from one player's captures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerDataset {
    pub player: String,
    pub events: Vec<DeathEvent>,
    /// Samples sorted by `(room, session_time)`, untrimmed.
    pub samples: Vec<PositionSample>,
    pub attempts: AttemptLog,
    pub gaps: InputGaps,
    pub scan: ScanStats,
    pub load: LoadStats,
}

impl PlayerDataset {
    #[must_use]
    pub fn new(player: &str) -> Self {
        Self {
            player: player.to_string(),
            ..Self::default()
        }
    }

    /// Attach a position table and segment it into attempts.
    #[must_use]
    pub fn with_positions(mut self, load: SampleLoad) -> Self {
        let SampleLoad { mut samples, stats } = load;
        sort_samples(&mut samples);
        self.attempts = segment_sorted(&samples);
        self.samples = samples;
        self.load = stats;
        self
    }

    /// Attach log fragments, scanned in the given order and appended to any
    /// events already present.
    #[must_use]
    pub fn with_log_fragments<'a, I>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let extraction = extract_events_from_fragments(fragments);
        self.events.extend(extraction.events);
        self.scan.absorb(extraction.stats);
        self
    }

    pub fn record_gap(&mut self, gap: MissingInput) {
        log::warn!("player {}: {gap}", self.player);
        self.gaps.push(gap);
    }

    /// Replace log-printed labels with the classifier's, where it has one.
    pub fn relabel<C>(&mut self, classifier: &C) -> usize
    where
        C: SentimentClassifier + ?Sized,
    {
        let mut changed = 0;
        for event in &mut self.events {
            if let Some(label) = classifier.classify(&event.message)
                && label != event.sentiment
            {
                event.sentiment = label;
                changed += 1;
            }
        }
        changed
    }

    #[must_use]
    pub fn dominant_sentiment(&self) -> Option<Sentiment> {
        dominant_sentiment(self.events.iter().map(|e| &e.sentiment))
    }

    pub fn deaths_in_room<'a>(&'a self, room: &'a str) -> impl Iterator<Item = &'a DeathEvent> {
        self.events.iter().filter(move |e| e.in_room(room))
    }

    pub fn samples_in_room<'a>(
        &'a self,
        room: &'a str,
    ) -> impl Iterator<Item = &'a PositionSample> {
        self.samples.iter().filter(move |s| s.room == room)
    }

    /// A room counts as visited if the player died there or was sampled there.
    #[must_use]
    pub fn visited(&self, room: &str) -> bool {
        self.deaths_in_room(room).next().is_some() || self.samples_in_room(room).next().is_some()
    }

    /// Rooms named by any death or sample, sorted.
    #[must_use]
    pub fn visited_rooms(&self) -> BTreeSet<&str> {
        self.events
            .iter()
            .filter_map(|e| e.room.as_deref())
            .chain(self.samples.iter().map(|s| s.room.as_str()))
            .collect()
    }

    /// Session-time span between the first and last sample in `room`; 0 with fewer than two.
    #[must_use]
    pub fn time_in_room(&self, room: &str) -> f64 {
        let mut times = self.samples_in_room(room).map(|s| s.session_time);
        let Some(first) = times.next() else {
            return 0.0;
        };
        let (low, high) = times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        non_negative_span(low, high)
    }

    /// Wall-clock seconds spent in the rooms of `level`, by first and last timestamp.
    ///
    /// Rooms unknown to the catalog count toward the catalog's default level.
    #[must_use]
    pub fn playtime_in_level(&self, catalog: &LevelCatalog, level: &Level) -> f64 {
        let mut stamps = self
            .samples
            .iter()
            .filter(|s| catalog.level_for_room(&s.room).name == level.name)
            .filter_map(|s| s.timestamp);
        let Some(first) = stamps.next() else {
            return 0.0;
        };
        let (earliest, latest) = stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        i64_to_f64((latest - earliest).num_milliseconds()) / 1000.0
    }
}
