use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::room::{GridPos, PixelPos, DEFAULT_ROOM_ID};

pub const MAX_HEALTH: i32 = 100;
const SAVE_VERSION: u32 = 1;
const STARTING_BODY_PARTS: [&str; 3] = ["Head", "Arm", "Leg"];

pub type Properties = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Enemy,
    Boulder,
    Door,
    #[serde(other)]
    Unknown,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enemy => "enemy",
            Self::Boulder => "boulder",
            Self::Door => "door",
            Self::Unknown => "unknown",
        }
    }

    pub fn pushable_by_default(self) -> bool {
        matches!(self, Self::Boulder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyPartStatus {
    Healthy,
    Damaged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyPart {
    pub name: String,
    pub status: BodyPartStatus,
}

impl BodyPart {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: BodyPartStatus::Healthy,
        }
    }
}

/// Player stats. Health stays inside `[0, MAX_HEALTH]`; every write goes
/// through [`PlayerState::set_health`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerState {
    health: i32,
    body_parts: Vec<BodyPart>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            health: MAX_HEALTH,
            body_parts: STARTING_BODY_PARTS
                .iter()
                .map(|name| BodyPart::healthy(*name))
                .collect(),
        }
    }
}

impl PlayerState {
    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn body_parts(&self) -> &[BodyPart] {
        &self.body_parts
    }

    pub fn body_parts_mut(&mut self) -> &mut [BodyPart] {
        &mut self.body_parts
    }

    pub fn damaged_parts(&self) -> impl Iterator<Item = &BodyPart> {
        self.body_parts
            .iter()
            .filter(|part| part.status == BodyPartStatus::Damaged)
    }

    pub fn set_health(&mut self, health: i32) {
        self.health = health.clamp(0, MAX_HEALTH);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerPatch {
    pub health: Option<i32>,
    pub body_parts: Option<Vec<BodyPart>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub kind: EntityKind,
    pub grid_x: i32,
    pub grid_y: i32,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl EntityRecord {
    pub fn grid(&self) -> GridPos {
        GridPos::new(self.grid_x, self.grid_y)
    }
}

fn default_active() -> bool {
    true
}

/// Partial update for an [`EntityRecord`]. Absent fields keep their current
/// value; a record created from a patch starts from `unknown`, `(0,0)`, active.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPatch {
    pub kind: Option<EntityKind>,
    pub grid: Option<GridPos>,
    pub properties: Option<Properties>,
    pub active: Option<bool>,
}

impl EntityPatch {
    pub fn position(grid: GridPos) -> Self {
        Self {
            grid: Some(grid),
            ..Self::default()
        }
    }

    pub fn deactivate() -> Self {
        Self {
            active: Some(false),
            ..Self::default()
        }
    }

    fn apply_to(self, record: &mut EntityRecord) {
        if let Some(kind) = self.kind {
            record.kind = kind;
        }
        if let Some(grid) = self.grid {
            record.grid_x = grid.x;
            record.grid_y = grid.y;
        }
        if let Some(properties) = self.properties {
            record.properties = properties;
        }
        if let Some(active) = self.active {
            record.active = active;
        }
    }
}

/// Where the next room puts the player. Written once by a door, read once by
/// the next room activation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionStaging {
    #[serde(default)]
    pub next_room_id: Option<String>,
    #[serde(default)]
    pub next_spawn_x: Option<f32>,
    #[serde(default)]
    pub next_spawn_y: Option<f32>,
    #[serde(default)]
    pub calling_room_id: Option<String>,
}

impl TransitionStaging {
    pub fn spawn_px(&self) -> Option<PixelPos> {
        match (self.next_spawn_x, self.next_spawn_y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(PixelPos { x, y }),
            _ => None,
        }
    }

    fn is_empty(&self) -> bool {
        self.next_room_id.is_none()
            && self.next_spawn_x.is_none()
            && self.next_spawn_y.is_none()
            && self.calling_room_id.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
struct RoomEntities {
    entities: BTreeMap<String, EntityRecord>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("encode world state: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decode world state at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported save version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Process-wide game state: player stats, current room, per-room entity
/// records and staged transition data. Owned by the world machine and handed
/// to controllers by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldStateStore {
    player: PlayerState,
    current_room: String,
    rooms: BTreeMap<String, RoomEntities>,
    staging: Option<TransitionStaging>,
}

impl Default for WorldStateStore {
    fn default() -> Self {
        Self {
            player: PlayerState::default(),
            current_room: DEFAULT_ROOM_ID.to_string(),
            rooms: BTreeMap::new(),
            staging: None,
        }
    }
}

impl WorldStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlayerState {
        &mut self.player
    }

    pub fn set_player(&mut self, patch: PlayerPatch) {
        if let Some(body_parts) = patch.body_parts {
            self.player.body_parts = body_parts;
        }
        if let Some(health) = patch.health {
            self.player.set_health(health);
        }
    }

    pub fn current_room(&self) -> &str {
        &self.current_room
    }

    pub fn set_current_room(&mut self, room_id: impl Into<String>) {
        self.current_room = room_id.into();
    }

    pub fn room_entities(&self, room_id: &str) -> Option<&BTreeMap<String, EntityRecord>> {
        self.rooms.get(room_id).map(|room| &room.entities)
    }

    pub fn room_entity(&self, room_id: &str, entity_id: &str) -> Option<&EntityRecord> {
        self.rooms
            .get(room_id)
            .and_then(|room| room.entities.get(entity_id))
    }

    pub fn upsert_room_entity(
        &mut self,
        room_id: &str,
        entity_id: &str,
        patch: EntityPatch,
    ) -> &EntityRecord {
        let record = self
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .entities
            .entry(entity_id.to_string())
            .or_insert_with(|| EntityRecord {
                kind: EntityKind::Unknown,
                grid_x: 0,
                grid_y: 0,
                properties: Properties::new(),
                active: true,
            });
        patch.apply_to(record);
        record
    }

    pub fn stage_transition(&mut self, staging: TransitionStaging) {
        if staging.is_empty() {
            self.staging = None;
            return;
        }
        debug!(
            next_room = staging.next_room_id.as_deref().unwrap_or("-"),
            "transition_staged"
        );
        self.staging = Some(staging);
    }

    pub fn has_staged_transition(&self) -> bool {
        self.staging.is_some()
    }

    /// Returns the staged transition and clears it.
    pub fn consume_transition(&mut self) -> Option<TransitionStaging> {
        self.staging.take()
    }

    pub fn serialize(&self) -> Result<String, StoreError> {
        let saved = SavedWorldRef {
            save_version: SAVE_VERSION,
            player: &self.player,
            current_room: &self.current_room,
            rooms: &self.rooms,
            staging: self.staging.as_ref(),
        };
        serde_json::to_string_pretty(&saved).map_err(StoreError::Encode)
    }

    /// Merges a serialized blob into this store. Fields missing from the blob
    /// keep their current in-memory value. On error the store is untouched.
    pub fn deserialize(&mut self, blob: &str) -> Result<(), StoreError> {
        let mut deserializer = serde_json::Deserializer::from_str(blob);
        let saved: SavedWorld = serde_path_to_error::deserialize(&mut deserializer).map_err(
            |error| {
                let path = error.path().to_string();
                StoreError::Decode {
                    path,
                    source: error.into_inner(),
                }
            },
        )?;

        if let Some(found) = saved.save_version {
            if found > SAVE_VERSION {
                return Err(StoreError::UnsupportedVersion {
                    found,
                    supported: SAVE_VERSION,
                });
            }
        }

        if let Some(player) = saved.player {
            self.set_player(PlayerPatch {
                health: player.health,
                body_parts: player.body_parts,
            });
        }
        if let Some(current_room) = saved.current_room.filter(|room| !room.is_empty()) {
            self.current_room = current_room;
        }
        for (room_id, room) in saved.rooms.unwrap_or_default() {
            for (entity_id, entity) in room.entities {
                self.upsert_room_entity(&room_id, &entity_id, entity.into_patch());
            }
        }
        if let Some(staging) = saved.staging {
            self.stage_transition(staging);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct SavedWorldRef<'a> {
    save_version: u32,
    player: &'a PlayerState,
    current_room: &'a str,
    rooms: &'a BTreeMap<String, RoomEntities>,
    staging: Option<&'a TransitionStaging>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SavedWorld {
    save_version: Option<u32>,
    player: Option<SavedPlayer>,
    current_room: Option<String>,
    rooms: Option<BTreeMap<String, SavedRoom>>,
    staging: Option<TransitionStaging>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SavedPlayer {
    health: Option<i32>,
    body_parts: Option<Vec<BodyPart>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SavedRoom {
    entities: BTreeMap<String, SavedEntity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SavedEntity {
    kind: Option<EntityKind>,
    grid_x: Option<i32>,
    grid_y: Option<i32>,
    properties: Option<Properties>,
    active: Option<bool>,
}

impl SavedEntity {
    fn into_patch(self) -> EntityPatch {
        let grid = match (self.grid_x, self.grid_y) {
            (Some(x), Some(y)) => Some(GridPos::new(x, y)),
            _ => None,
        };
        EntityPatch {
            kind: self.kind,
            grid,
            properties: self.properties,
            active: self.active,
        }
    }
}
