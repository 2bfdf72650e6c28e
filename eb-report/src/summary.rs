//! Serializable snapshot of every metric a report prints.
use serde::Serialize;
use std::collections::BTreeMap;

use eb_telemetry::{
    Aggregator, AttemptOutcome, DurationSummary, MissingInput, PixelExtent, PlayerDataset,
    PlayerDeaths, PlayerPlaytime, RoomAverage, RoomDeathCount, Sentiment, SentimentMatrix,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub catalog_fingerprint: String,
    pub players: usize,
    pub total_deaths: usize,
    pub gaps: Vec<MissingInput>,
    pub levels: Vec<LevelSummary>,
    pub room_averages: Vec<RoomAverage>,
    pub deaths_per_sentiment: BTreeMap<Sentiment, usize>,
    pub average_deaths_per_sentiment: BTreeMap<Sentiment, f64>,
    pub player_summaries: Vec<PlayerSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSummary {
    pub level: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent: Option<PixelExtent>,
    pub deaths: Vec<RoomDeathCount>,
    pub sentiment_matrix: SentimentMatrix,
    pub time_in_room: Vec<RoomTime>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub death_points: Vec<RoomDeaths>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomTime {
    pub room: String,
    pub by_sentiment: BTreeMap<Sentiment, DurationSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomDeaths {
    pub room: String,
    pub players: Vec<PlayerDeaths>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSummary {
    pub player: String,
    pub dominant_sentiment: Option<Sentiment>,
    pub deaths: usize,
    pub samples: usize,
    pub skipped_rows: usize,
    pub playtime: PlayerPlaytime,
    pub attempts: Vec<AttemptSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptSummary {
    pub room: String,
    pub deaths: u32,
    pub outcome: AttemptOutcome,
    pub samples: usize,
    /// Session time the attempt started at; orders attempts across rooms.
    pub start_time: f64,
    pub duration: f64,
    pub plottable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_marker: Option<(i32, i32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<(i32, i32)>>,
}

impl ReportSummary {
    /// Run every query of `aggregator`. Trajectories and death scatters are
    /// only included when `include_paths` is set.
    #[must_use]
    pub fn build(aggregator: &Aggregator<'_>, include_paths: bool) -> Self {
        let catalog = aggregator.catalog();
        let players = aggregator.players();

        let levels = catalog
            .levels()
            .iter()
            .map(|level| {
                let time_in_room = level
                    .rooms
                    .iter()
                    .map(|room| RoomTime {
                        room: room.clone(),
                        by_sentiment: aggregator
                            .time_in_room(&level.name, room)
                            .into_iter()
                            .map(|(label, durations)| {
                                (label, DurationSummary::from_durations(&durations))
                            })
                            .collect(),
                    })
                    .collect();
                let death_points = if include_paths {
                    level
                        .rooms
                        .iter()
                        .map(|room| RoomDeaths {
                            room: room.clone(),
                            players: aggregator.deaths_in_room(room),
                        })
                        .filter(|room| !room.players.is_empty())
                        .collect()
                } else {
                    Vec::new()
                };
                LevelSummary {
                    level: level.name.clone(),
                    image: level.image.clone(),
                    extent: level.extent(catalog.scale()),
                    deaths: aggregator.deaths_per_room(&level.rooms),
                    sentiment_matrix: aggregator
                        .deaths_per_room_per_sentiment(&level.name)
                        .unwrap_or_else(|| SentimentMatrix::empty(level)),
                    time_in_room,
                    death_points,
                }
            })
            .collect();

        let player_summaries = players
            .iter()
            .zip(aggregator.dominant_sentiments())
            .map(|(player, (_, dominant))| {
                player_summary(aggregator, player, dominant.cloned(), include_paths)
            })
            .collect();

        Self {
            catalog_fingerprint: format!("{:016x}", catalog.fingerprint()),
            players: players.len(),
            total_deaths: aggregator.total_deaths(),
            gaps: players.iter().flat_map(|p| p.gaps.iter().cloned()).collect(),
            levels,
            room_averages: aggregator.average_deaths_per_room(),
            deaths_per_sentiment: aggregator.deaths_per_sentiment(),
            average_deaths_per_sentiment: aggregator.average_deaths_per_sentiment(),
            player_summaries,
        }
    }
}

fn player_summary(
    aggregator: &Aggregator<'_>,
    player: &PlayerDataset,
    dominant_sentiment: Option<Sentiment>,
    include_paths: bool,
) -> PlayerSummary {
    let attempts = player
        .attempts
        .attempts()
        .map(|attempt| AttemptSummary {
            room: attempt.room.clone(),
            deaths: attempt.deaths,
            outcome: attempt.outcome,
            samples: attempt.samples.len(),
            start_time: attempt.start_time,
            duration: attempt.duration(),
            plottable: attempt.is_plottable(),
            end_marker: attempt.end_marker(),
            path: include_paths.then(|| attempt.coordinates().collect()),
        })
        .collect();

    PlayerSummary {
        player: player.player.clone(),
        dominant_sentiment,
        deaths: player.events.len(),
        samples: player.samples.len(),
        skipped_rows: player.load.skipped,
        playtime: aggregator.total_playtime(player),
        attempts,
    }
}
