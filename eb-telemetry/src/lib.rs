//! EngagementBaiting telemetry core
//!
//! Turns the raw captures of a Celeste playtesting session (free-text mod log,
//! per-frame position table) into structured death events and attempts, then
//! aggregates them across players. This crate performs no filesystem walking
//! and no rendering; raw inputs arrive through [`SessionSource`].

pub mod aggregate;
pub mod attempts;
pub mod catalog;
pub mod constants;
pub mod dataset;
pub mod events;
pub mod numbers;
pub mod positions;
pub mod sentiment;

pub use aggregate::{
    Aggregator, DurationSummary, LevelPlaytime, PlayerDeaths, PlayerPlaytime, RoomAverage,
    RoomDeathCount, SentimentMatrix,
};
pub use attempts::{
    Attempt, AttemptLog, AttemptOutcome, LevelAttempts, load_attempts, segment_sorted,
    sort_samples,
};
pub use catalog::{CatalogDefinition, CatalogError, Level, LevelCatalog, PixelExtent};
pub use dataset::{InputGaps, MissingInput, PlayerDataset};
pub use events::{
    DeathEvent, LogExtraction, LogScanner, PendingDeath, ScanState, ScanStats, extract_events,
    extract_events_from_fragments, extract_events_with_stats,
};
pub use positions::{LoadStats, PositionSample, SampleLoad, parse_samples, read_samples};
pub use sentiment::{
    LabelTable, Sentiment, SentimentClassifier, SentimentSet, dominant_sentiment,
};

/// Trait for acquiring the raw inputs of capture sessions.
/// Storage-specific implementations should provide this
pub trait SessionSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// List session ids in processing order.
    ///
    /// # Errors
    ///
    /// Returns an error if the session listing cannot be read.
    fn sessions(&self) -> Result<Vec<String>, Self::Error>;

    /// Load the position table of a session; `Ok(None)` when it has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the table exists but cannot be read.
    fn load_positions(&self, session: &str) -> Result<Option<SampleLoad>, Self::Error>;

    /// Load the log fragments of a session in reading order; `Ok(None)` when it has none.
    ///
    /// # Errors
    ///
    /// Returns an error if a fragment exists but cannot be read.
    fn load_logs(&self, session: &str) -> Result<Option<Vec<String>>, Self::Error>;
}

/// Builds player datasets from a session source against one catalog.
pub struct TelemetryEngine<S>
where
    S: SessionSource,
{
    catalog: LevelCatalog,
    source: S,
    classifier: Option<Box<dyn SentimentClassifier>>,
}

impl<S> TelemetryEngine<S>
where
    S: SessionSource,
{
    /// Create an engine over a built catalog and a session source
    pub const fn new(catalog: LevelCatalog, source: S) -> Self {
        Self {
            catalog,
            source,
            classifier: None,
        }
    }

    /// Relabel every loaded death through `classifier`.
    #[must_use]
    pub fn with_classifier<C>(mut self, classifier: C) -> Self
    where
        C: SentimentClassifier + 'static,
    {
        self.classifier = Some(Box::new(classifier));
        self
    }

    #[must_use]
    pub const fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Load one session as a player dataset.
    ///
    /// Absent inputs are recorded as gaps on the dataset rather than failing.
    ///
    /// # Errors
    ///
    /// Returns an error if the source fails to read an input that exists.
    pub fn load_player(&self, session: &str) -> Result<PlayerDataset, S::Error> {
        let mut dataset = PlayerDataset::new(session);

        match self.source.load_positions(session)? {
            Some(load) => dataset = dataset.with_positions(load),
            None => dataset.record_gap(MissingInput::Positions {
                session: session.to_string(),
            }),
        }

        match self.source.load_logs(session)? {
            Some(fragments) => {
                dataset = dataset.with_log_fragments(fragments.iter().map(String::as_str));
            }
            None => dataset.record_gap(MissingInput::Log {
                session: session.to_string(),
            }),
        }

        if let Some(classifier) = &self.classifier {
            let changed = dataset.relabel(classifier.as_ref());
            log::debug!("player {session}: classifier relabelled {changed} deaths");
        }

        log::info!(
            "player {session}: {} deaths, {} samples ({} skipped), {} attempts",
            dataset.events.len(),
            dataset.samples.len(),
            dataset.load.skipped,
            dataset.attempts.attempt_count()
        );
        Ok(dataset)
    }

    /// Load every session the source lists, in its order.
    ///
    /// # Errors
    ///
    /// Returns the first source failure.
    pub fn load_all(&self) -> Result<Vec<PlayerDataset>, S::Error> {
        self.source
            .sessions()?
            .iter()
            .map(|session| self.load_player(session))
            .collect()
    }

    /// Query surface over `players` with this engine's catalog.
    #[must_use]
    pub fn aggregator<'a>(&'a self, players: &'a [PlayerDataset]) -> Aggregator<'a> {
        Aggregator::new(&self.catalog, players)
    }
}
