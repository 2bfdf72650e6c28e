//! Cross-player metrics over a loaded set of player datasets.
//!
//! Every query is a pure function of the catalog and the players it was built
//! with, so queries can be called in any order and any number of times.
//!
//! A player *visited* a room when it has at least one death there or at least
//! one position sample whose stream id is that room. Every per-room average
//! uses that definition.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{Level, LevelCatalog};
use crate::dataset::PlayerDataset;
use crate::events::DeathEvent;
use crate::numbers::{count_to_f64, ratio};
use crate::sentiment::{Sentiment, SentimentSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDeathCount {
    pub room: String,
    pub deaths: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAverage {
    pub level: String,
    pub room: String,
    pub deaths: usize,
    pub visitors: usize,
    pub average: f64,
}

/// Deaths of one level, rooms by sentiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentMatrix {
    pub level: String,
    /// Row labels, in the level's declared order.
    pub rooms: Vec<String>,
    /// Column labels: only sentiments observed in this level, sorted.
    pub sentiments: SentimentSet,
    /// `counts[row][column]`, zero-filled.
    pub counts: Vec<Vec<usize>>,
}

impl SentimentMatrix {
    /// Matrix for a level with no observed sentiments: one empty row per room.
    #[must_use]
    pub fn empty(level: &Level) -> Self {
        Self {
            level: level.name.clone(),
            rooms: level.rooms.clone(),
            sentiments: SentimentSet::new(),
            counts: vec![Vec::new(); level.rooms.len()],
        }
    }

    fn row(&self, room: &str) -> Option<&[usize]> {
        let row = self.rooms.iter().position(|r| r == room)?;
        self.counts.get(row).map(Vec::as_slice)
    }

    #[must_use]
    pub fn get(&self, room: &str, sentiment: &Sentiment) -> usize {
        let column = self.sentiments.iter().position(|s| s == sentiment);
        self.row(room)
            .zip(column)
            .and_then(|(row, column)| row.get(column).copied())
            .unwrap_or(0)
    }

    #[must_use]
    pub fn row_total(&self, room: &str) -> usize {
        self.row(room).map_or(0, |row| row.iter().sum())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelPlaytime {
    pub level: String,
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPlaytime {
    pub player: String,
    pub levels: Vec<LevelPlaytime>,
    pub total_seconds: f64,
}

/// Death coordinates of one player in one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDeaths {
    pub player: String,
    pub points: Vec<(i32, i32)>,
}

/// Summary of a duration list.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DurationSummary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl DurationSummary {
    #[must_use]
    pub fn from_durations(durations: &[f64]) -> Self {
        let mut stats = RunningStats::default();
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &value in durations {
            stats.add(value);
            min = min.min(value);
            max = max.max(value);
        }
        if stats.count == 0 {
            return Self::default();
        }
        Self {
            count: stats.count,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
            min,
            max,
        }
    }
}

#[derive(Debug, Default, Clone)]
struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let count = count_to_f64(self.count);
        let delta = value - self.mean;
        self.mean += delta / count;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    const fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    fn variance(&self) -> f64 {
        if self.count > 1 {
            self.m2 / count_to_f64(self.count - 1)
        } else {
            0.0
        }
    }

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Query surface over a fixed set of players.
#[derive(Debug, Clone)]
pub struct Aggregator<'a> {
    catalog: &'a LevelCatalog,
    players: &'a [PlayerDataset],
    dominant: Vec<Option<Sentiment>>,
}

impl<'a> Aggregator<'a> {
    #[must_use]
    pub fn new(catalog: &'a LevelCatalog, players: &'a [PlayerDataset]) -> Self {
        let dominant = players
            .iter()
            .map(PlayerDataset::dominant_sentiment)
            .collect();
        Self {
            catalog,
            players,
            dominant,
        }
    }

    #[must_use]
    pub const fn catalog(&self) -> &'a LevelCatalog {
        self.catalog
    }

    #[must_use]
    pub const fn players(&self) -> &'a [PlayerDataset] {
        self.players
    }

    pub fn events(&self) -> impl Iterator<Item = &'a DeathEvent> + use<'a> {
        self.players.iter().flat_map(|p| p.events.iter())
    }

    #[must_use]
    pub fn total_deaths(&self) -> usize {
        self.players.iter().map(|p| p.events.len()).sum()
    }

    /// Each player paired with its dominant label, in player order.
    pub fn dominant_sentiments(
        &self,
    ) -> impl Iterator<Item = (&'a str, Option<&Sentiment>)> + '_ {
        self.players
            .iter()
            .zip(&self.dominant)
            .map(|(player, label)| (player.player.as_str(), label.as_ref()))
    }

    /// Death totals aligned to `rooms`, zero-filled.
    #[must_use]
    pub fn deaths_per_room<R: AsRef<str>>(&self, rooms: &[R]) -> Vec<RoomDeathCount> {
        rooms
            .iter()
            .map(|room| {
                let room = room.as_ref();
                RoomDeathCount {
                    room: room.to_string(),
                    deaths: self.deaths_in(room),
                }
            })
            .collect()
    }

    /// [`Aggregator::deaths_per_room`] over a level's declared rooms.
    #[must_use]
    pub fn deaths_per_level(&self, level: &str) -> Option<Vec<RoomDeathCount>> {
        self.catalog
            .level(level)
            .map(|level| self.deaths_per_room(&level.rooms))
    }

    /// Death totals keyed by observed label.
    #[must_use]
    pub fn deaths_per_sentiment(&self) -> BTreeMap<Sentiment, usize> {
        let mut counts = BTreeMap::new();
        for event in self.events() {
            *counts.entry(event.sentiment.clone()).or_default() += 1;
        }
        counts
    }

    /// Rooms of `level` by sentiments observed in `level`. `None` for an unknown level.
    #[must_use]
    pub fn deaths_per_room_per_sentiment(&self, level: &str) -> Option<SentimentMatrix> {
        let level = self.catalog.level(level)?;
        let in_level: Vec<&DeathEvent> = self
            .events()
            .filter(|e| e.room.as_deref().is_some_and(|r| level.contains_room(r)))
            .collect();
        let sentiments: SentimentSet = in_level
            .iter()
            .map(|e| e.sentiment.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let counts: Vec<Vec<usize>> = level
            .rooms
            .iter()
            .map(|room| {
                sentiments
                    .iter()
                    .map(|sentiment| {
                        in_level
                            .iter()
                            .filter(|e| e.in_room(room) && &e.sentiment == sentiment)
                            .count()
                    })
                    .collect()
            })
            .collect();

        Some(SentimentMatrix {
            level: level.name.clone(),
            rooms: level.rooms.clone(),
            sentiments,
            counts,
        })
    }

    #[must_use]
    pub fn visitors(&self, room: &str) -> usize {
        self.players.iter().filter(|p| p.visited(room)).count()
    }

    /// Deaths per visiting player, for every catalog room in canonical order,
    /// then any room seen in the data but unknown to the catalog, sorted.
    #[must_use]
    pub fn average_deaths_per_room(&self) -> Vec<RoomAverage> {
        let known: Vec<&str> = self.catalog.rooms().collect();
        let unknown: BTreeSet<&str> = self
            .players
            .iter()
            .flat_map(PlayerDataset::visited_rooms)
            .filter(|room| !self.catalog.contains_room(room))
            .collect();

        known
            .into_iter()
            .chain(unknown)
            .map(|room| {
                let deaths = self.deaths_in(room);
                let visitors = self.visitors(room);
                RoomAverage {
                    level: self.catalog.level_for_room(room).name.clone(),
                    room: room.to_string(),
                    deaths,
                    visitors,
                    average: ratio(deaths, visitors),
                }
            })
            .collect()
    }

    /// Deaths of a label divided by the players whose dominant label it is.
    #[must_use]
    pub fn average_deaths_per_sentiment(&self) -> BTreeMap<Sentiment, f64> {
        self.deaths_per_sentiment()
            .into_iter()
            .map(|(sentiment, deaths)| {
                let players = self
                    .dominant
                    .iter()
                    .filter(|label| label.as_ref() == Some(&sentiment))
                    .count();
                (sentiment, ratio(deaths, players))
            })
            .collect()
    }

    /// Per-label session-time spent in `room`, one entry per player.
    ///
    /// Players without a dominant label are filed under [`Sentiment::unlabeled`].
    /// Empty when the catalog places `room` outside `level`.
    #[must_use]
    pub fn time_in_room(&self, level: &str, room: &str) -> BTreeMap<Sentiment, Vec<f64>> {
        let mut durations: BTreeMap<Sentiment, Vec<f64>> = BTreeMap::new();
        if self.catalog.level_for_room(room).name != level {
            return durations;
        }
        for (player, label) in self.players.iter().zip(&self.dominant) {
            let label = label.clone().unwrap_or_else(Sentiment::unlabeled);
            durations
                .entry(label)
                .or_default()
                .push(player.time_in_room(room));
        }
        durations
    }

    /// Per-level wall-clock playtime of one player, in catalog level order.
    #[must_use]
    pub fn total_playtime(&self, player: &PlayerDataset) -> PlayerPlaytime {
        let levels: Vec<LevelPlaytime> = self
            .catalog
            .levels()
            .iter()
            .map(|level| LevelPlaytime {
                level: level.name.clone(),
                seconds: player.playtime_in_level(self.catalog, level),
            })
            .collect();
        let total_seconds = levels.iter().map(|l| l.seconds).sum();
        PlayerPlaytime {
            player: player.player.clone(),
            levels,
            total_seconds,
        }
    }

    #[must_use]
    pub fn playtimes(&self) -> Vec<PlayerPlaytime> {
        self.players.iter().map(|p| self.total_playtime(p)).collect()
    }

    /// Raw death coordinates in `room`, per player with at least one death there.
    #[must_use]
    pub fn deaths_in_room(&self, room: &str) -> Vec<PlayerDeaths> {
        self.players
            .iter()
            .filter_map(|player| {
                let points: Vec<(i32, i32)> =
                    player.deaths_in_room(room).map(|e| (e.x, e.y)).collect();
                (!points.is_empty()).then(|| PlayerDeaths {
                    player: player.player.clone(),
                    points,
                })
            })
            .collect()
    }

    fn deaths_in(&self, room: &str) -> usize {
        self.players
            .iter()
            .map(|p| p.deaths_in_room(room).count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::{LoadStats, PositionSample, SampleLoad};

    const PLAYER_ONE_LOG: &str = r#"Entering screen "SpringRoom"
Showing NEGATIVE death screen message "Try again!"
The player died at {X:100 Y:200}
Showing NEGATIVE death screen message "Again"
The player died at {X:101 Y:201}
Entering screen "FinalRoom"
Showing NEGATIVE death screen message "Once more"
The player died at {X:5 Y:6}
"#;

    const PLAYER_TWO_LOG: &str = r#"Entering screen "SpringRoom"
Showing POSITIVE death screen message "You can do this"
The player died at {X:90 Y:210}
"#;

    fn players() -> Vec<PlayerDataset> {
        vec![
            PlayerDataset::new("p1").with_log_fragments([PLAYER_ONE_LOG]),
            PlayerDataset::new("p2").with_log_fragments([PLAYER_TWO_LOG]),
        ]
    }

    fn positions(samples: Vec<PositionSample>) -> SampleLoad {
        SampleLoad {
            samples,
            stats: LoadStats::default(),
        }
    }

    #[test]
    fn sentiment_averages_use_dominant_label_denominators() {
        let catalog = LevelCatalog::builtin().unwrap();
        let players = players();
        let aggregator = Aggregator::new(&catalog, &players);
        let averages = aggregator.average_deaths_per_sentiment();
        assert_eq!(averages.len(), 2);
        assert!((averages[&Sentiment::new("NEGATIVE")] - 3.0).abs() < f64::EPSILON);
        assert!((averages[&Sentiment::new("POSITIVE")] - 1.0).abs() < f64::EPSILON);
        assert_eq!(aggregator.total_deaths(), 4);
    }

    #[test]
    fn deaths_per_room_is_aligned_and_zero_filled() {
        let catalog = LevelCatalog::builtin().unwrap();
        let players = players();
        let aggregator = Aggregator::new(&catalog, &players);
        let counts = aggregator.deaths_per_room(&["FinalRoom", "Nowhere", "SpringRoom"]);
        let deaths: Vec<usize> = counts.iter().map(|c| c.deaths).collect();
        assert_eq!(deaths, vec![1, 0, 3]);

        let level = aggregator.deaths_per_level("Test_level").unwrap();
        assert_eq!(level.len(), 8);
        assert_eq!(level[0].room, "SpringRoom");
        assert!(aggregator.deaths_per_level("Missing").is_none());
    }

    #[test]
    fn matrix_only_has_sentiments_seen_in_level() {
        let catalog = LevelCatalog::builtin().unwrap();
        let players = players();
        let aggregator = Aggregator::new(&catalog, &players);
        let matrix = aggregator
            .deaths_per_room_per_sentiment("Test_level")
            .unwrap();
        assert_eq!(matrix.rooms.len(), 8);
        assert_eq!(matrix.sentiments.len(), 2);
        assert_eq!(matrix.get("SpringRoom", &Sentiment::new("NEGATIVE")), 2);
        assert_eq!(matrix.get("SpringRoom", &Sentiment::new("POSITIVE")), 1);
        assert_eq!(matrix.get("Boosterroom1", &Sentiment::new("NEGATIVE")), 0);
        assert_eq!(matrix.row_total("FinalRoom"), 1);

        let tutorial = aggregator.deaths_per_room_per_sentiment("Tutorial").unwrap();
        assert!(tutorial.sentiments.is_empty());
        assert!(tutorial.counts.iter().all(Vec::is_empty));
    }

    #[test]
    fn matrix_lookups_tolerate_missing_rows() {
        let catalog = LevelCatalog::builtin().unwrap();
        let tutorial = catalog.level("Tutorial").unwrap();
        let empty = SentimentMatrix::empty(tutorial);
        assert_eq!(empty.counts.len(), tutorial.rooms.len());
        assert_eq!(empty.row_total("JumpRoomTutorial"), 0);

        let ragged = SentimentMatrix {
            level: "Tutorial".to_string(),
            rooms: tutorial.rooms.clone(),
            sentiments: std::iter::once(Sentiment::new("NEGATIVE")).collect(),
            counts: vec![vec![2]],
        };
        assert_eq!(ragged.get("StartWalkRoomTutorial", &Sentiment::new("NEGATIVE")), 2);
        assert_eq!(ragged.get("JumpRoomTutorial", &Sentiment::new("NEGATIVE")), 0);
        assert_eq!(ragged.row_total("JumpRoomTutorial"), 0);
        assert_eq!(ragged.row_total("StartWalkRoomTutorial"), 2);
    }

    #[test]
    fn room_averages_count_visits_from_samples_too() {
        let catalog = LevelCatalog::builtin().unwrap();
        let mut players = players();
        players.push(PlayerDataset::new("p3").with_positions(positions(vec![
            PositionSample::new("SpringRoom", 0.0, 0, 0, 0),
            PositionSample::new("MysteryRoom", 1.0, 0, 0, 0),
        ])));
        let aggregator = Aggregator::new(&catalog, &players);
        let averages = aggregator.average_deaths_per_room();

        let spring = averages.iter().find(|a| a.room == "SpringRoom").unwrap();
        assert_eq!(spring.deaths, 3);
        assert_eq!(spring.visitors, 3);
        assert!((spring.average - 1.0).abs() < f64::EPSILON);

        let untouched = averages.iter().find(|a| a.room == "Boosterroom2").unwrap();
        assert_eq!(untouched.visitors, 0);
        assert!((untouched.average - 0.0).abs() < f64::EPSILON);

        let last = averages.last().unwrap();
        assert_eq!(last.room, "MysteryRoom");
        assert_eq!(last.level, "Tutorial");
        assert_eq!(averages.len(), 13);
    }

    #[test]
    fn time_in_room_files_every_player_once() {
        let catalog = LevelCatalog::builtin().unwrap();
        let players = vec![
            PlayerDataset::new("p1")
                .with_log_fragments([PLAYER_ONE_LOG])
                .with_positions(positions(vec![
                    PositionSample::new("SpringRoom", 1.0, 0, 0, 0),
                    PositionSample::new("SpringRoom", 4.5, 0, 0, 0),
                ])),
            PlayerDataset::new("p2")
                .with_log_fragments([PLAYER_TWO_LOG])
                .with_positions(positions(vec![PositionSample::new("SpringRoom", 2.0, 0, 0, 0)])),
            PlayerDataset::new("p3"),
        ];
        let aggregator = Aggregator::new(&catalog, &players);
        let times = aggregator.time_in_room("Test_level", "SpringRoom");
        assert_eq!(times[&Sentiment::new("NEGATIVE")], vec![3.5]);
        assert_eq!(times[&Sentiment::new("POSITIVE")], vec![0.0]);
        assert_eq!(times[&Sentiment::unlabeled()], vec![0.0]);
        assert!(aggregator.time_in_room("Tutorial", "SpringRoom").is_empty());
    }

    #[test]
    fn empty_player_set_yields_empty_results() {
        let catalog = LevelCatalog::builtin().unwrap();
        let aggregator = Aggregator::new(&catalog, &[]);
        assert!(aggregator.deaths_per_sentiment().is_empty());
        assert!(aggregator.average_deaths_per_sentiment().is_empty());
        assert!(aggregator.playtimes().is_empty());
        assert!(aggregator.deaths_in_room("SpringRoom").is_empty());
        assert!(
            aggregator
                .average_deaths_per_room()
                .iter()
                .all(|a| a.average.abs() < f64::EPSILON && a.visitors == 0)
        );
        assert!(aggregator.time_in_room("Test_level", "SpringRoom").is_empty());
    }

    #[test]
    fn queries_are_repeatable() {
        let catalog = LevelCatalog::builtin().unwrap();
        let players = players();
        let aggregator = Aggregator::new(&catalog, &players);
        let first = aggregator.average_deaths_per_room();
        let _ = aggregator.deaths_per_room_per_sentiment("Test_level");
        assert_eq!(first, aggregator.average_deaths_per_room());
        assert_eq!(
            aggregator.deaths_per_sentiment(),
            aggregator.deaths_per_sentiment()
        );
    }

    #[test]
    fn death_scatter_groups_points_by_player() {
        let catalog = LevelCatalog::builtin().unwrap();
        let players = players();
        let aggregator = Aggregator::new(&catalog, &players);
        let scatter = aggregator.deaths_in_room("SpringRoom");
        assert_eq!(scatter.len(), 2);
        assert_eq!(scatter[0].points, vec![(100, 200), (101, 201)]);
        assert_eq!(scatter[1].player, "p2");
    }

    #[test]
    fn duration_summary_matches_hand_computation() {
        let summary = DurationSummary::from_durations(&[2.0, 4.0, 6.0]);
        assert_eq!(summary.count, 3);
        assert!((summary.mean - 4.0).abs() < 1e-12);
        assert!((summary.std_dev - 2.0).abs() < 1e-12);
        assert!((summary.min - 2.0).abs() < f64::EPSILON);
        assert!((summary.max - 6.0).abs() < f64::EPSILON);
        assert_eq!(DurationSummary::from_durations(&[]), DurationSummary::default());
    }
}
