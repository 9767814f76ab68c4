use std::collections::BTreeMap;
use std::f32::consts::PI;

use tracing::{debug, info};

use super::grid::{GridPos, PixelPos};
use super::layout::RoomLayout;
use super::movement::Mover;
use crate::state::{EntityKind, EntityPatch, Properties, WorldStateStore};

const PUSHABLE_PROPERTY: &str = "pushable";
pub const BOB_HEIGHT_PX: f32 = 4.0;
pub const BOB_HALF_PERIOD_SECONDS: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Idle,
    Alert,
    Highlighted,
    Engaged,
}

impl EntityState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Alert => "alert",
            Self::Highlighted => "highlighted",
            Self::Engaged => "engaged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualCue {
    AlertTint,
    HighlightTint,
}

/// Up-and-back hover played while an enemy is alert.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IdleBob {
    elapsed: f32,
}

impl IdleBob {
    pub fn advance(&mut self, dt_seconds: f32) {
        let period = BOB_HALF_PERIOD_SECONDS * 2.0;
        self.elapsed = (self.elapsed + dt_seconds.max(0.0)) % period;
    }

    /// Vertical offset in pixels, zero or negative (screen y grows down).
    pub fn offset_px(&self) -> f32 {
        let phase = self.elapsed / BOB_HALF_PERIOD_SECONDS;
        let t = if phase <= 1.0 { phase } else { 2.0 - phase };
        let eased = (1.0 - (PI * t).cos()) / 2.0;
        -BOB_HEIGHT_PX * eased
    }
}

/// Runtime instance of a persisted entity record. Rebuilt on every room
/// activation and never persisted itself.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEntity {
    pub id: String,
    pub kind: EntityKind,
    pub properties: Properties,
    pub mover: Mover,
    pub state: EntityState,
    pub cue: Option<VisualCue>,
    pub bob: Option<IdleBob>,
    pub pushable: bool,
}

impl LiveEntity {
    fn new(id: String, kind: EntityKind, grid: GridPos, properties: Properties) -> Self {
        let pushable = properties
            .get(PUSHABLE_PROPERTY)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or_else(|| kind.pushable_by_default());
        Self {
            id,
            kind,
            properties,
            mover: Mover::at(grid),
            state: EntityState::Idle,
            cue: None,
            bob: None,
            pushable,
        }
    }

    pub fn grid(&self) -> GridPos {
        self.mover.grid()
    }

    /// Draw position including any bob offset.
    pub fn render_px(&self) -> PixelPos {
        let pixel = self.mover.pixel();
        match self.bob {
            Some(bob) => pixel.offset_y(bob.offset_px()),
            None => pixel,
        }
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(serde_json::Value::as_str)
    }

    pub fn property_i32(&self, key: &str) -> Option<i32> {
        self.properties
            .get(key)
            .and_then(serde_json::Value::as_i64)
            .and_then(|value| i32::try_from(value).ok())
    }
}

/// Live entities of the active room, indexed flat and by kind.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    room_id: String,
    entities: Vec<LiveEntity>,
    by_kind: BTreeMap<EntityKind, Vec<String>>,
}

impl EntityRegistry {
    /// Instantiates every active entity of `layout`, using the persisted cell
    /// when a record exists and creating the record on first visit.
    pub fn build(layout: &RoomLayout, store: &mut WorldStateStore) -> Self {
        let mut registry = Self {
            room_id: layout.room_id.clone(),
            entities: Vec::with_capacity(layout.entities.len()),
            by_kind: BTreeMap::new(),
        };
        let mut skipped = 0usize;

        for placement in &layout.entities {
            let (grid, properties) = match store.room_entity(&layout.room_id, &placement.id) {
                Some(record) if !record.active => {
                    debug!(room = %layout.room_id, entity = %placement.id, "entity_inactive_skipped");
                    skipped += 1;
                    continue;
                }
                Some(record) => (record.grid(), record.properties.clone()),
                None => {
                    store.upsert_room_entity(
                        &layout.room_id,
                        &placement.id,
                        EntityPatch {
                            kind: Some(placement.kind),
                            grid: Some(placement.grid()),
                            properties: Some(placement.properties.clone()),
                            active: Some(true),
                        },
                    );
                    (placement.grid(), placement.properties.clone())
                }
            };

            registry.insert(LiveEntity::new(
                placement.id.clone(),
                placement.kind,
                grid,
                properties,
            ));
        }

        info!(
            room = %registry.room_id,
            live = registry.entities.len(),
            skipped,
            "entity_registry_built"
        );
        registry
    }

    fn insert(&mut self, entity: LiveEntity) {
        self.by_kind
            .entry(entity.kind)
            .or_default()
            .push(entity.id.clone());
        self.entities.push(entity);
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn all_entities(&self) -> &[LiveEntity] {
        &self.entities
    }

    pub fn all_entities_mut(&mut self) -> &mut [LiveEntity] {
        &mut self.entities
    }

    pub fn entities_at(&self, grid: GridPos) -> Vec<&LiveEntity> {
        self.entities
            .iter()
            .filter(|entity| entity.grid() == grid)
            .collect()
    }

    pub fn entities_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &LiveEntity> + '_ {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&LiveEntity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut LiveEntity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    /// Marks the entity's record inactive and drops the live instance from
    /// every index.
    /// Ids unknown to both the registry and the store are ignored.
    pub fn deactivate(&mut self, id: &str, store: &mut WorldStateStore) -> Option<LiveEntity> {
        if self.get(id).is_none() && store.room_entity(&self.room_id, id).is_none() {
            debug!(room = %self.room_id, entity = %id, "deactivate_unknown_entity");
            return None;
        }
        store.upsert_room_entity(&self.room_id, id, EntityPatch::deactivate());

        let index = self.entities.iter().position(|entity| entity.id == id)?;
        let removed = self.entities.remove(index);
        if let Some(ids) = self.by_kind.get_mut(&removed.kind) {
            ids.retain(|known| known != id);
        }
        info!(room = %self.room_id, entity = %id, kind = removed.kind.as_str(), "entity_deactivated");
        Some(removed)
    }

    /// Steps every in-flight entity glide and writes landed cells back to the
    /// store. Returns ids of entities that landed on this call.
    pub fn advance_motions(&mut self, dt_seconds: f32, store: &mut WorldStateStore) -> Vec<String> {
        let mut landed = Vec::new();
        for entity in &mut self.entities {
            if entity.mover.advance(dt_seconds).is_some() {
                landed.push(entity.id.clone());
            }
        }
        self.write_back(&landed, store);
        landed
    }

    /// Lands every in-flight glide immediately.
    pub fn finish_motions(&mut self, store: &mut WorldStateStore) {
        let mut landed = Vec::new();
        for entity in &mut self.entities {
            if entity.mover.finish().is_some() {
                landed.push(entity.id.clone());
            }
        }
        self.write_back(&landed, store);
    }

    fn write_back(&self, landed: &[String], store: &mut WorldStateStore) {
        for id in landed {
            if let Some(entity) = self.get(id) {
                store.upsert_room_entity(&self.room_id, id, EntityPatch::position(entity.grid()));
                debug!(room = %self.room_id, entity = %id, x = entity.grid().x, y = entity.grid().y, "entity_position_saved");
            }
        }
    }
}
