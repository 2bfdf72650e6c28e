//! Static registry of levels and their rooms.
//!
//! A [`LevelCatalog`] is built once from a [`CatalogDefinition`] and then shared
//! read-only by every component that needs to map a room back to its level.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hasher;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::constants::{BUILTIN_CATALOG_JSON, DEFAULT_LEVEL_NAME, DEFAULT_SCALE};

/// Errors raised when a catalog definition violates its invariants.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("room {room:?} is assigned to both {first:?} and {second:?}")]
    DuplicateRoom {
        room: String,
        first: String,
        second: String,
    },
    #[error("room {room:?} is listed more than once in level {level:?}")]
    RepeatedRoom { level: String, room: String },
    #[error("level {name:?} is defined more than once")]
    DuplicateLevel { name: String },
    #[error("default level {name:?} is not defined")]
    UnknownDefaultLevel { name: String },
    #[error("level {name:?} declares no rooms")]
    EmptyLevel { name: String },
    #[error("catalog defines no levels")]
    EmptyCatalog,
    #[error("scale must be positive (got {scale})")]
    InvalidScale { scale: i32 },
    #[error("catalog JSON invalid: {0}")]
    Json(#[from] serde_json::Error),
}

/// One level: shared background art plus an ordered run of rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub name: String,
    /// Background image reference, resolved by the renderer.
    pub image: String,
    /// Image origin in map pixels; multiply by the catalog scale for game units.
    #[serde(default)]
    pub offset: (i32, i32),
    /// Image dimensions in pixels, when known up front.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<(u32, u32)>,
    /// Room identifiers in canonical report order.
    pub rooms: Vec<String>,
}

impl Level {
    #[must_use]
    pub fn contains_room(&self, room: &str) -> bool {
        self.rooms.iter().any(|r| r == room)
    }

    /// Pixel extent of the level art when `image_size` is configured.
    #[must_use]
    pub fn extent(&self, scale: i32) -> Option<PixelExtent> {
        self.image_size
            .map(|(width, height)| PixelExtent::new(self.offset, scale, width, height))
    }
}

/// Raw catalog configuration as read from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    #[serde(default = "CatalogDefinition::default_scale")]
    pub scale: i32,
    #[serde(default = "CatalogDefinition::default_level")]
    pub default_level: String,
    pub levels: Vec<Level>,
}

impl CatalogDefinition {
    const fn default_scale() -> i32 {
        DEFAULT_SCALE
    }

    fn default_level() -> String {
        DEFAULT_LEVEL_NAME.to_string()
    }

    /// Parse a catalog definition from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The catalog shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error only if the bundled asset is malformed.
    pub fn builtin() -> Result<Self, serde_json::Error> {
        Self::from_json(BUILTIN_CATALOG_JSON)
    }
}

/// Level art placement in game coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelExtent {
    pub offset_x: i64,
    pub offset_y: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelExtent {
    fn new(offset: (i32, i32), scale: i32, width: u32, height: u32) -> Self {
        Self {
            offset_x: i64::from(offset.0) * i64::from(scale),
            offset_y: i64::from(offset.1) * i64::from(scale),
            width,
            height,
        }
    }

    #[must_use]
    pub fn left(&self) -> i64 {
        self.offset_x
    }

    #[must_use]
    pub fn right(&self) -> i64 {
        self.offset_x + i64::from(self.width)
    }

    #[must_use]
    pub fn top(&self) -> i64 {
        self.offset_y
    }

    /// Y grows downward in game space, so the bottom edge is the larger value.
    #[must_use]
    pub fn bottom(&self) -> i64 {
        self.offset_y + i64::from(self.height)
    }
}

/// Validated, immutable level registry with a room→level reverse index.
#[derive(Debug, Clone)]
pub struct LevelCatalog {
    scale: i32,
    levels: Vec<Level>,
    room_index: HashMap<String, usize>,
    default_level: usize,
}

impl LevelCatalog {
    /// Validate a definition and build the reverse index.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when a room belongs to two levels, a level is
    /// repeated or empty, the default level is missing, or the scale is not positive.
    pub fn build(definition: CatalogDefinition) -> Result<Self, CatalogError> {
        let CatalogDefinition {
            scale,
            default_level,
            levels,
        } = definition;

        if scale <= 0 {
            return Err(CatalogError::InvalidScale { scale });
        }
        if levels.is_empty() {
            return Err(CatalogError::EmptyCatalog);
        }

        let mut room_index: HashMap<String, usize> = HashMap::new();
        for (idx, level) in levels.iter().enumerate() {
            if levels[..idx].iter().any(|prior| prior.name == level.name) {
                return Err(CatalogError::DuplicateLevel {
                    name: level.name.clone(),
                });
            }
            if level.rooms.is_empty() {
                return Err(CatalogError::EmptyLevel {
                    name: level.name.clone(),
                });
            }
            for room in &level.rooms {
                if let Some(&owner) = room_index.get(room) {
                    if owner == idx {
                        return Err(CatalogError::RepeatedRoom {
                            level: level.name.clone(),
                            room: room.clone(),
                        });
                    }
                    return Err(CatalogError::DuplicateRoom {
                        room: room.clone(),
                        first: levels[owner].name.clone(),
                        second: level.name.clone(),
                    });
                }
                room_index.insert(room.clone(), idx);
            }
        }

        let default_idx = levels
            .iter()
            .position(|level| level.name == default_level)
            .ok_or(CatalogError::UnknownDefaultLevel {
                name: default_level,
            })?;

        Ok(Self {
            scale,
            levels,
            room_index,
            default_level: default_idx,
        })
    }

    /// Parse and validate a catalog in one step.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] for malformed JSON or invariant violations.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Self::build(CatalogDefinition::from_json(json)?)
    }

    /// Build the catalog shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] only if the bundled asset is invalid.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::build(CatalogDefinition::builtin()?)
    }

    #[must_use]
    pub const fn scale(&self) -> i32 {
        self.scale
    }

    /// Levels in definition order.
    #[must_use]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    #[must_use]
    pub fn level(&self, name: &str) -> Option<&Level> {
        self.levels.iter().find(|level| level.name == name)
    }

    #[must_use]
    pub fn default_level(&self) -> &Level {
        &self.levels[self.default_level]
    }

    /// Exact reverse lookup; `None` for rooms no level declares.
    #[must_use]
    pub fn lookup_level_by_room(&self, room: &str) -> Option<&Level> {
        self.room_index.get(room).map(|&idx| &self.levels[idx])
    }

    /// Reverse lookup that degrades to the default level for unknown rooms.
    #[must_use]
    pub fn level_for_room(&self, room: &str) -> &Level {
        self.lookup_level_by_room(room).unwrap_or_else(|| {
            log::debug!(
                "room {room:?} not in catalog; using default level {:?}",
                self.default_level().name
            );
            self.default_level()
        })
    }

    #[must_use]
    pub fn contains_room(&self, room: &str) -> bool {
        self.room_index.contains_key(room)
    }

    /// Every declared room, level by level, in canonical order.
    pub fn rooms(&self) -> impl Iterator<Item = &str> {
        self.levels
            .iter()
            .flat_map(|level| level.rooms.iter().map(String::as_str))
    }

    /// Placement of a level's art given its pixel dimensions.
    #[must_use]
    pub fn pixel_extent(&self, level: &Level, width: u32, height: u32) -> PixelExtent {
        PixelExtent::new(level.offset, self.scale, width, height)
    }

    /// Definition this catalog was built from.
    #[must_use]
    pub fn definition(&self) -> CatalogDefinition {
        CatalogDefinition {
            scale: self.scale,
            default_level: self.default_level().name.clone(),
            levels: self.levels.clone(),
        }
    }

    /// Stable digest of the catalog contents, used to tag reports.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let canonical = serde_json::to_vec(&self.definition()).unwrap_or_default();
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&canonical);
        hasher.finish()
    }
}
