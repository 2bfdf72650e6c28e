//! Segmentation of position streams into attempts.
//!
//! Samples are sorted by `(room, session_time)`, grouped per room in that
//! order, then split by death counter. Every attempt after the first repeats
//! the last position of the previous one, so that carried-over sample is
//! trimmed for every counter value except 0.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::positions::PositionSample;

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The player died; the next attempt starts at a respawn point.
    Died,
    /// The attempt ran until the stream's final sample.
    LevelEnd,
}

/// One uninterrupted run of samples sharing a death counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub room: String,
    pub deaths: u32,
    /// Trajectory after trimming, ordered by session time.
    pub samples: Vec<PositionSample>,
    pub start_time: f64,
    pub end_time: f64,
    pub outcome: AttemptOutcome,
    /// Whether a carried-over first sample was dropped.
    pub trimmed: bool,
}

impl Attempt {
    /// Attempts with fewer than two samples carry no drawable trajectory.
    #[must_use]
    pub fn is_plottable(&self) -> bool {
        self.samples.len() >= 2
    }

    pub fn coordinates(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.samples.iter().map(|s| (s.x, s.y))
    }

    /// Position of the death or level-end marker.
    #[must_use]
    pub fn end_marker(&self) -> Option<(i32, i32)> {
        self.samples.last().map(|s| (s.x, s.y))
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        crate::numbers::non_negative_span(self.start_time, self.end_time)
    }
}

/// Attempts of a single stream id, in ascending counter order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelAttempts {
    pub room: String,
    pub attempts: Vec<Attempt>,
}

impl LevelAttempts {
    #[must_use]
    pub fn deaths(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.outcome == AttemptOutcome::Died)
            .count()
    }
}

/// All attempts of one player, grouped per stream id in discovery order.
///
/// Discovery order follows the sort key, so groups appear by ascending id.
/// Chronological "latest first" views should use [`AttemptLog::most_recent_first`]
/// instead of reordering the groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttemptLog {
    groups: Vec<LevelAttempts>,
}

impl AttemptLog {
    #[must_use]
    pub fn groups(&self) -> &[LevelAttempts] {
        &self.groups
    }

    pub fn most_recent_first(&self) -> impl Iterator<Item = &LevelAttempts> {
        self.groups.iter().rev()
    }

    #[must_use]
    pub fn get(&self, room: &str) -> Option<&LevelAttempts> {
        self.groups.iter().find(|g| g.room == room)
    }

    pub fn attempts(&self) -> impl Iterator<Item = &Attempt> {
        self.groups.iter().flat_map(|g| g.attempts.iter())
    }

    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.groups.iter().map(|g| g.attempts.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every kept sample, in segmentation order.
    pub fn flatten(&self) -> impl Iterator<Item = &PositionSample> {
        self.attempts().flat_map(|a| a.samples.iter())
    }
}

/// Stable sort by `(room, session_time)`; ties keep input order.
pub fn sort_samples(samples: &mut [PositionSample]) {
    samples.sort_by(|a, b| {
        a.room
            .cmp(&b.room)
            .then_with(|| a.session_time.total_cmp(&b.session_time))
    });
}

/// Segment a player's samples into attempts. Input order is irrelevant.
#[must_use]
pub fn load_attempts(samples: &[PositionSample]) -> AttemptLog {
    let mut sorted = samples.to_vec();
    sort_samples(&mut sorted);
    segment_sorted(&sorted)
}

/// Segment samples already sorted with [`sort_samples`].
#[must_use]
pub fn segment_sorted(sorted: &[PositionSample]) -> AttemptLog {
    let groups = sorted
        .chunk_by(|a, b| a.room == b.room)
        .map(segment_room)
        .collect();
    AttemptLog { groups }
}

fn segment_room(stream: &[PositionSample]) -> LevelAttempts {
    let room = stream.first().map(|s| s.room.clone()).unwrap_or_default();
    let final_time = stream
        .iter()
        .map(|s| s.session_time)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut by_counter: BTreeMap<u32, Vec<&PositionSample>> = BTreeMap::new();
    for sample in stream {
        by_counter.entry(sample.deaths).or_default().push(sample);
    }

    let attempts = by_counter
        .into_iter()
        .map(|(deaths, raw)| build_attempt(&room, deaths, &raw, final_time))
        .collect();

    LevelAttempts { room, attempts }
}

fn build_attempt(room: &str, deaths: u32, raw: &[&PositionSample], final_time: f64) -> Attempt {
    let trimmed = deaths != 0 && !raw.is_empty();
    let kept: Vec<PositionSample> = raw
        .iter()
        .skip(usize::from(trimmed))
        .map(|&s| s.clone())
        .collect();

    // Outcome comes from the untrimmed run so a lone carried-over sample still classifies.
    let last_raw = raw.last().map_or(f64::NAN, |s| s.session_time);
    let outcome = if last_raw.total_cmp(&final_time).is_eq() {
        AttemptOutcome::LevelEnd
    } else {
        AttemptOutcome::Died
    };

    let span_source: Vec<f64> = if kept.is_empty() {
        raw.iter().map(|s| s.session_time).collect()
    } else {
        kept.iter().map(|s| s.session_time).collect()
    };
    let start_time = span_source.first().copied().unwrap_or(0.0);
    let end_time = span_source.last().copied().unwrap_or(0.0);

    Attempt {
        room: room.to_string(),
        deaths,
        samples: kept,
        start_time,
        end_time,
        outcome,
        trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(room: &str, counters: &[u32], times: &[f64]) -> Vec<PositionSample> {
        counters
            .iter()
            .zip(times)
            .enumerate()
            .map(|(idx, (&deaths, &time))| {
                let offset = i32::try_from(idx).unwrap_or(0);
                PositionSample::new(room, time, offset * 10, -offset, deaths)
            })
            .collect()
    }

    fn times(attempt: &Attempt) -> Vec<f64> {
        attempt.samples.iter().map(|s| s.session_time).collect()
    }

    #[test]
    fn counters_split_into_trimmed_attempts() {
        let samples = stream(
            "RoomA",
            &[0, 0, 0, 1, 1, 2, 2, 2],
            &[0.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 5.0],
        );
        let log = load_attempts(&samples);
        let group = log.get("RoomA").unwrap();
        assert_eq!(group.attempts.len(), 3);

        assert_eq!(times(&group.attempts[0]), vec![0.0, 1.0, 2.0]);
        assert_eq!(times(&group.attempts[1]), vec![3.0]);
        assert_eq!(times(&group.attempts[2]), vec![4.0, 5.0]);

        assert!(!group.attempts[0].trimmed);
        assert!(group.attempts[1].trimmed);
        assert_eq!(group.attempts[0].outcome, AttemptOutcome::Died);
        assert_eq!(group.attempts[1].outcome, AttemptOutcome::Died);
        assert_eq!(group.attempts[2].outcome, AttemptOutcome::LevelEnd);
        assert!(!group.attempts[1].is_plottable());
        assert!(group.attempts[2].is_plottable());
        assert_eq!(group.deaths(), 2);
    }

    #[test]
    fn unsorted_input_segments_like_sorted_input() {
        let mut samples = stream("RoomA", &[0, 0, 1, 1], &[0.0, 1.0, 1.0, 2.0]);
        let expected = load_attempts(&samples);
        samples.reverse();
        samples.swap(0, 3);
        let shuffled = load_attempts(&samples);
        assert_eq!(
            expected.get("RoomA").unwrap().attempts.len(),
            shuffled.get("RoomA").unwrap().attempts.len()
        );
        assert_eq!(
            times(&shuffled.get("RoomA").unwrap().attempts[1]),
            vec![2.0]
        );
    }

    #[test]
    fn flattening_reproduces_sorted_input_minus_carry_over() {
        let mut samples = stream("B", &[3, 3, 4, 4, 4], &[5.0, 6.0, 6.0, 7.0, 8.0]);
        samples.extend(stream("A", &[0, 0, 1, 1, 2], &[0.0, 1.0, 1.0, 2.0, 2.0]));
        let mut sorted = samples.clone();
        sort_samples(&mut sorted);

        let log = load_attempts(&samples);
        let trimmed_count = log.attempts().filter(|a| a.trimmed).count();
        let flattened: Vec<&PositionSample> = log.flatten().collect();
        assert_eq!(flattened.len() + trimmed_count, sorted.len());

        let mut expected = Vec::new();
        for group in sorted.chunk_by(|a, b| a.room == b.room) {
            let mut by_counter: BTreeMap<u32, Vec<&PositionSample>> = BTreeMap::new();
            for s in group {
                by_counter.entry(s.deaths).or_default().push(s);
            }
            for (counter, run) in by_counter {
                let skip = usize::from(counter != 0);
                expected.extend(run.into_iter().skip(skip));
            }
        }
        assert_eq!(flattened, expected);
    }

    #[test]
    fn lone_carry_over_sample_is_kept_and_classified() {
        let samples = stream("A", &[0, 0, 1], &[0.0, 1.0, 1.0]);
        let log = load_attempts(&samples);
        let group = log.get("A").unwrap();
        assert_eq!(group.attempts.len(), 2);
        let last = &group.attempts[1];
        assert!(last.samples.is_empty());
        assert_eq!(last.outcome, AttemptOutcome::LevelEnd);
        assert!((last.start_time - 1.0).abs() < f64::EPSILON);
        assert!(last.end_marker().is_none());
    }

    #[test]
    fn groups_follow_sort_order_and_reverse_for_recency() {
        let mut samples = stream("Zeta", &[0, 0], &[0.0, 1.0]);
        samples.extend(stream("Alpha", &[0, 0], &[2.0, 3.0]));
        let log = load_attempts(&samples);
        let order: Vec<&str> = log.groups().iter().map(|g| g.room.as_str()).collect();
        assert_eq!(order, vec!["Alpha", "Zeta"]);
        let recent: Vec<&str> = log.most_recent_first().map(|g| g.room.as_str()).collect();
        assert_eq!(recent, vec!["Zeta", "Alpha"]);
        assert_eq!(log.attempt_count(), 2);
    }

    #[test]
    fn empty_input_yields_empty_log() {
        let log = load_attempts(&[]);
        assert!(log.is_empty());
        assert_eq!(log.flatten().count(), 0);
    }
}
