//! Centralized constants for telemetry parsing and aggregation.
//!
//! The log vocabulary below is an external contract with the capture mod.
//! Changing any pattern here changes which lines count as events, so the
//! fixtures in `tests/` must be updated alongside.

// Catalog ------------------------------------------------------------------
/// Game units per map-image pixel used when aligning level art.
pub const DEFAULT_SCALE: i32 = 8;
/// Level that unrecognized rooms are attributed to.
pub const DEFAULT_LEVEL_NAME: &str = "Tutorial";
pub(crate) const BUILTIN_CATALOG_JSON: &str = include_str!("../assets/levels.json");

// Log vocabulary -----------------------------------------------------------
pub(crate) const ROOM_ENTRY_PATTERN: &str = r#"Entering screen "([^"]+)""#;
pub(crate) const DEATH_MESSAGE_PATTERN: &str =
    r#"Showing (\w+) death screen message(?:\s+"([^"]*)")?"#;
pub(crate) const DEATH_COORDS_PATTERN: &str = r"The player died at \{X:(-?\d+)\s+Y:(-?\d+)\}";
pub(crate) const TIMESTAMP_PATTERN: &str = r"^\s*\[([^\]]*)\]";
pub(crate) const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

// Sentiment ----------------------------------------------------------------
/// Bucket for players that never saw a death screen.
pub const UNLABELED_SENTIMENT: &str = "UNLABELED";

// Archive layout -----------------------------------------------------------
/// File holding one session's position samples.
pub const POSITIONS_FILE_NAME: &str = "PlayerPositions.csv";
/// Prefix shared by every log fragment of a session.
pub const LOG_FILE_PREFIX: &str = "EngagementBaiting-";
/// Extension of log fragments.
pub const LOG_FILE_EXTENSION: &str = "log";
