//! Death-event extraction from the capture mod's free-text log.
//!
//! The scan is a single pass over the lines of one log fragment, driven by a
//! small state machine ([`ScanState`]). A death is only emitted once both its
//! death-screen message and the coordinates that follow it have been seen.
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::constants::{
    DEATH_COORDS_PATTERN, DEATH_MESSAGE_PATTERN, LOG_TIMESTAMP_FORMAT, ROOM_ENTRY_PATTERN,
    TIMESTAMP_PATTERN,
};
use crate::sentiment::Sentiment;

/// A completed death observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathEvent {
    /// Wall-clock time of the death-screen line, when it carried one.
    pub timestamp: Option<NaiveDateTime>,
    /// Room the player was in; absent if no room entry preceded the death.
    pub room: Option<String>,
    pub x: i32,
    pub y: i32,
    pub sentiment: Sentiment,
    /// Death-screen text; empty when the log line carried no quoted message.
    pub message: String,
}

impl DeathEvent {
    #[must_use]
    pub fn in_room(&self, room: &str) -> bool {
        self.room.as_deref() == Some(room)
    }
}

/// Death under construction: message seen, coordinates not yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeath {
    pub timestamp: Option<NaiveDateTime>,
    pub room: Option<String>,
    pub sentiment: Sentiment,
    pub message: String,
}

impl PendingDeath {
    fn complete(self, x: i32, y: i32) -> DeathEvent {
        DeathEvent {
            timestamp: self.timestamp,
            room: self.room,
            x,
            y,
            sentiment: self.sentiment,
            message: self.message,
        }
    }
}

/// Scanner state between lines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanState {
    /// No room entry seen yet.
    #[default]
    AwaitingRoom,
    /// Inside a known room, nothing pending.
    InRoom { room: String },
    /// A death message awaits its coordinates. `room` tracks the current room,
    /// which may move on while the death stays attributed to where it started.
    Pending {
        room: Option<String>,
        pending: PendingDeath,
    },
}

impl ScanState {
    #[must_use]
    pub fn current_room(&self) -> Option<&str> {
        match self {
            Self::AwaitingRoom => None,
            Self::InRoom { room } => Some(room),
            Self::Pending { room, .. } => room.as_deref(),
        }
    }

    fn settled(room: Option<String>) -> Self {
        room.map_or(Self::AwaitingRoom, |room| Self::InRoom { room })
    }
}

/// Counters describing what a scan kept and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub lines: usize,
    pub room_entries: usize,
    /// Pending deaths dropped because another message replaced them or the log ended.
    pub discarded_pending: usize,
    /// Coordinate lines seen with no pending death.
    pub orphan_coordinates: usize,
}

impl ScanStats {
    pub(crate) fn absorb(&mut self, other: Self) {
        self.lines += other.lines;
        self.room_entries += other.room_entries;
        self.discarded_pending += other.discarded_pending;
        self.orphan_coordinates += other.orphan_coordinates;
    }
}

/// Result of scanning one or more log fragments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogExtraction {
    pub events: Vec<DeathEvent>,
    pub stats: ScanStats,
}

struct LogPatterns {
    room: Regex,
    message: Regex,
    coords: Regex,
    timestamp: Regex,
}

impl LogPatterns {
    fn get() -> Option<&'static Self> {
        static PATTERNS: OnceLock<Option<LogPatterns>> = OnceLock::new();
        PATTERNS
            .get_or_init(|| {
                Some(Self {
                    room: Regex::new(ROOM_ENTRY_PATTERN).ok()?,
                    message: Regex::new(DEATH_MESSAGE_PATTERN).ok()?,
                    coords: Regex::new(DEATH_COORDS_PATTERN).ok()?,
                    timestamp: Regex::new(TIMESTAMP_PATTERN).ok()?,
                })
            })
            .as_ref()
    }

    fn classify<'l>(&self, line: &'l str) -> LogLine<'l> {
        if let Some(caps) = self.room.captures(line)
            && let Some(room) = caps.get(1)
        {
            return LogLine::RoomEntry(room.as_str());
        }
        if let Some(caps) = self.message.captures(line)
            && let Some(sentiment) = caps.get(1)
        {
            return LogLine::DeathMessage {
                sentiment: sentiment.as_str(),
                message: caps.get(2).map_or("", |m| m.as_str()),
            };
        }
        if let Some(caps) = self.coords.captures(line) {
            let x = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok());
            let y = caps.get(2).and_then(|m| m.as_str().parse::<i32>().ok());
            if let (Some(x), Some(y)) = (x, y) {
                return LogLine::DeathCoords { x, y };
            }
        }
        LogLine::Other
    }

    fn timestamp(&self, line: &str) -> Option<NaiveDateTime> {
        let token = self.timestamp.captures(line)?.get(1)?.as_str().trim();
        NaiveDateTime::parse_from_str(token, LOG_TIMESTAMP_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok()
    }
}

enum LogLine<'l> {
    RoomEntry(&'l str),
    DeathMessage { sentiment: &'l str, message: &'l str },
    DeathCoords { x: i32, y: i32 },
    Other,
}

/// Line-at-a-time scanner over one log fragment.
#[derive(Debug, Default)]
pub struct LogScanner {
    state: ScanState,
    events: Vec<DeathEvent>,
    stats: ScanStats,
}

impl LogScanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> &ScanState {
        &self.state
    }

    /// Feed a single line. Unrecognized lines are skipped.
    pub fn feed(&mut self, line: &str) {
        let Some(patterns) = LogPatterns::get() else {
            return;
        };
        self.stats.lines += 1;
        let timestamp = patterns.timestamp(line);
        match patterns.classify(line) {
            LogLine::RoomEntry(room) => self.enter_room(room),
            LogLine::DeathMessage { sentiment, message } => {
                self.open_pending(timestamp, Sentiment::new(sentiment), message);
            }
            LogLine::DeathCoords { x, y } => self.complete_pending(x, y),
            LogLine::Other => {}
        }
    }

    /// Room entry only moves the room context; an open pending death stays open.
    fn enter_room(&mut self, room: &str) {
        self.stats.room_entries += 1;
        let room = room.to_string();
        self.state = match std::mem::take(&mut self.state) {
            ScanState::AwaitingRoom | ScanState::InRoom { .. } => ScanState::InRoom { room },
            ScanState::Pending { pending, .. } => ScanState::Pending {
                room: Some(room),
                pending,
            },
        };
    }

    fn open_pending(
        &mut self,
        timestamp: Option<NaiveDateTime>,
        sentiment: Sentiment,
        message: &str,
    ) {
        let room = match std::mem::take(&mut self.state) {
            ScanState::AwaitingRoom => None,
            ScanState::InRoom { room } => Some(room),
            ScanState::Pending { room, pending } => {
                self.discard(&pending, "replaced by a newer death message");
                room
            }
        };
        let pending = PendingDeath {
            timestamp,
            room: room.clone(),
            sentiment,
            message: message.to_string(),
        };
        self.state = ScanState::Pending { room, pending };
    }

    fn complete_pending(&mut self, x: i32, y: i32) {
        match std::mem::take(&mut self.state) {
            ScanState::Pending { room, pending } => {
                self.events.push(pending.complete(x, y));
                self.state = ScanState::settled(room);
            }
            other => {
                self.stats.orphan_coordinates += 1;
                self.state = other;
            }
        }
    }

    fn discard(&mut self, pending: &PendingDeath, reason: &str) {
        self.stats.discarded_pending += 1;
        log::debug!(
            "dropping pending {} death in {:?}: {reason}",
            pending.sentiment,
            pending.room
        );
    }

    /// Close the scan; a death still pending at end of input is dropped.
    #[must_use]
    pub fn finish(mut self) -> LogExtraction {
        if let ScanState::Pending { pending, .. } = std::mem::take(&mut self.state) {
            self.discard(&pending, "log ended before coordinates");
        }
        LogExtraction {
            events: self.events,
            stats: self.stats,
        }
    }
}

/// Extract the completed deaths of one log, in log order.
#[must_use]
pub fn extract_events(log_text: &str) -> Vec<DeathEvent> {
    extract_events_with_stats(log_text).events
}

/// Extract deaths along with scan counters.
#[must_use]
pub fn extract_events_with_stats(log_text: &str) -> LogExtraction {
    if LogPatterns::get().is_none() {
        log::error!("log patterns failed to compile; no events extracted");
        return LogExtraction::default();
    }
    let mut scanner = LogScanner::new();
    for line in log_text.lines() {
        scanner.feed(line);
    }
    scanner.finish()
}

/// Extract deaths from several fragments of one player's log, in fragment order.
///
/// Each fragment is scanned with fresh state: a room or a pending death never
/// carries across a file boundary.
pub fn extract_events_from_fragments<'a, I>(fragments: I) -> LogExtraction
where
    I: IntoIterator<Item = &'a str>,
{
    let mut merged = LogExtraction::default();
    for fragment in fragments {
        let LogExtraction { events, stats } = extract_events_with_stats(fragment);
        merged.events.extend(events);
        merged.stats.absorb(stats);
    }
    merged
}
