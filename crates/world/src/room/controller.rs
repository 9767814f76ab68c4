use tracing::{debug, error, info, warn};

use super::grid::{GridPos, DEFAULT_SPAWN_TILE};
use super::layout::{WallGrid, DEFAULT_ROOM_ID};
use super::movement::{MoveOutcome, MovementResolver, Mover};
use super::proximity::ProximityStateMachine;
use super::registry::{EntityRegistry, EntityState};
use crate::app::{Controller, InputSnapshot, WorldContext};
use crate::combat::{CombatResult, CombatSession};
use crate::state::{EntityKind, TransitionStaging};

const DOOR_TARGET_ROOM: &str = "targetRoomId";
const DOOR_TARGET_X: &str = "targetX";
const DOOR_TARGET_Y: &str = "targetY";
pub const BANNER_SECONDS: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Loading,
    Active,
    Paused,
    Transitioning,
    Error,
}

impl RoomPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Transitioning => "transitioning",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoomCommand {
    None,
    EnterCombat(CombatSession),
    TransitionTo { room_id: String },
}

#[derive(Debug, Clone, PartialEq)]
struct Banner {
    text: &'static str,
    remaining: f32,
}

/// Runs one room instance: builds its registry on entry, moves the player,
/// drives proximity states and raises door and combat events.
#[derive(Debug)]
pub struct RoomController {
    room_id: String,
    phase: RoomPhase,
    walls: Option<WallGrid>,
    registry: EntityRegistry,
    proximity: ProximityStateMachine,
    player: Mover,
    engaged: Option<String>,
    banner: Option<Banner>,
    error: Option<String>,
    last_move: Option<MoveOutcome>,
}

impl RoomController {
    /// `room_id` is used when no staged transition names a room.
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            phase: RoomPhase::Loading,
            walls: None,
            registry: EntityRegistry::default(),
            proximity: ProximityStateMachine::new(),
            player: Mover::at(DEFAULT_SPAWN_TILE),
            engaged: None,
            banner: None,
            error: None,
            last_move: None,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn player(&self) -> &Mover {
        &self.player
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn walls(&self) -> Option<&WallGrid> {
        self.walls.as_ref()
    }

    pub fn engaged_enemy(&self) -> Option<&str> {
        self.engaged.as_deref()
    }

    pub fn banner_text(&self) -> Option<&'static str> {
        self.banner.as_ref().map(|banner| banner.text)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn take_last_move(&mut self) -> Option<MoveOutcome> {
        self.last_move.take()
    }

    /// Hands control back after combat. A victory removes the engaged enemy for
    /// good; either outcome clears its visuals and reactivates the room.
    pub fn resume_from_combat(&mut self, ctx: &mut WorldContext<'_>, result: &CombatResult) {
        if self.phase != RoomPhase::Paused {
            warn!(room = %self.room_id, phase = self.phase.as_str(), "resume_ignored_not_paused");
            return;
        }

        let engaged = self.engaged.take().or_else(|| result.enemy_id.clone());
        if let Some(enemy_id) = engaged.as_deref() {
            if result.victory {
                self.registry.deactivate(enemy_id, ctx.store);
            } else if let Some(enemy) = self.registry.get_mut(enemy_id) {
                self.proximity.clear(enemy);
            }
        }

        self.banner = Some(Banner {
            text: if result.victory { "VICTORY!" } else { "DEFEAT!" },
            remaining: BANNER_SECONDS,
        });
        self.phase = RoomPhase::Active;
        info!(
            room = %self.room_id,
            victory = result.victory,
            enemy = engaged.as_deref().unwrap_or("-"),
            "room_resumed"
        );
    }

    /// Drops the room without landing in-flight glides. Used when the store
    /// has just been replaced, so stale positions must not be written into it.
    pub fn discard(&mut self) {
        info!(room = %self.room_id, phase = self.phase.as_str(), "room_discarded");
    }

    fn tick_banner(&mut self, dt_seconds: f32) {
        if let Some(banner) = self.banner.as_mut() {
            banner.remaining -= dt_seconds;
            if banner.remaining <= 0.0 {
                self.banner = None;
            }
        }
    }

    fn adjacent_of_kind(&self, kind: EntityKind) -> Option<&super::registry::LiveEntity> {
        let player = self.player.grid();
        self.registry
            .entities_of_kind(kind)
            .find(|entity| entity.grid().is_adjacent_to(player))
    }

    fn interact(&mut self, ctx: &mut WorldContext<'_>) -> RoomCommand {
        if let Some(door) = self.adjacent_of_kind(EntityKind::Door) {
            let target_room = door
                .property_str(DOOR_TARGET_ROOM)
                .filter(|room| !room.is_empty())
                .unwrap_or(DEFAULT_ROOM_ID)
                .to_string();
            let spawn = match (door.property_i32(DOOR_TARGET_X), door.property_i32(DOOR_TARGET_Y)) {
                (Some(x), Some(y)) => Some(GridPos::new(x, y).center_px()),
                _ => None,
            };
            let door_id = door.id.clone();

            ctx.store.stage_transition(TransitionStaging {
                next_room_id: Some(target_room.clone()),
                next_spawn_x: spawn.map(|px| px.x),
                next_spawn_y: spawn.map(|px| px.y),
                calling_room_id: Some(self.room_id.clone()),
            });
            self.phase = RoomPhase::Transitioning;
            info!(room = %self.room_id, door = %door_id, target = %target_room, "door_entered");
            return RoomCommand::TransitionTo {
                room_id: target_room,
            };
        }

        let enemy_id = self
            .adjacent_of_kind(EntityKind::Enemy)
            .filter(|enemy| enemy.state != EntityState::Engaged)
            .map(|enemy| enemy.id.clone());
        if let Some(enemy_id) = enemy_id {
            if let Some(enemy) = self.registry.get_mut(&enemy_id) {
                enemy.state = EntityState::Engaged;
            }
            self.engaged = Some(enemy_id.clone());
            self.phase = RoomPhase::Paused;
            info!(room = %self.room_id, enemy = %enemy_id, "combat_requested");
            return RoomCommand::EnterCombat(CombatSession {
                enemy_id,
                calling_room_id: self.room_id.clone(),
            });
        }

        debug!(room = %self.room_id, "interact_nothing_adjacent");
        RoomCommand::None
    }
}

impl Controller for RoomController {
    type Command = RoomCommand;

    fn on_enter(&mut self, ctx: &mut WorldContext<'_>) {
        let staging = ctx.store.consume_transition();
        if let Some(next_room) = staging
            .as_ref()
            .and_then(|staged| staged.next_room_id.clone())
        {
            self.room_id = next_room;
        }
        let spawn = staging
            .as_ref()
            .and_then(TransitionStaging::spawn_px)
            .map(GridPos::from_px)
            .unwrap_or(DEFAULT_SPAWN_TILE);

        ctx.store.set_current_room(self.room_id.clone());

        let Some(layout) = ctx.layouts.layout(&self.room_id) else {
            let message = format!("room '{}' could not be loaded", self.room_id);
            error!(room = %self.room_id, "room_layout_missing");
            self.error = Some(message);
            self.phase = RoomPhase::Error;
            return;
        };

        self.walls = layout.walls.clone();
        self.registry = EntityRegistry::build(layout, ctx.store);
        self.player.place_at(spawn);
        self.engaged = None;
        self.error = None;
        self.proximity.evaluate(spawn, &mut self.registry);
        self.phase = RoomPhase::Active;
        info!(
            room = %self.room_id,
            spawn_x = spawn.x,
            spawn_y = spawn.y,
            from = staging
                .as_ref()
                .and_then(|staged| staged.calling_room_id.as_deref())
                .unwrap_or("-"),
            "room_activated"
        );
    }

    fn tick(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        ctx: &mut WorldContext<'_>,
    ) -> RoomCommand {
        self.tick_banner(fixed_dt_seconds);
        if self.phase != RoomPhase::Active {
            return RoomCommand::None;
        }

        self.player.advance(fixed_dt_seconds);
        self.registry.advance_motions(fixed_dt_seconds, ctx.store);
        self.proximity.animate(&mut self.registry, fixed_dt_seconds);
        self.proximity.evaluate(self.player.grid(), &mut self.registry);

        if self.player.is_busy() {
            return RoomCommand::None;
        }

        if input.interact_pressed() {
            return self.interact(ctx);
        }

        if let Some(direction) = input.held_direction() {
            let resolver = MovementResolver::new(self.walls.as_ref());
            let outcome = resolver.attempt_move(&mut self.player, &mut self.registry, direction);
            if outcome.moved {
                self.proximity.evaluate(self.player.grid(), &mut self.registry);
            }
            self.last_move = Some(outcome);
        }
        RoomCommand::None
    }

    fn on_exit(&mut self, ctx: &mut WorldContext<'_>) {
        self.player.finish();
        self.registry.finish_motions(ctx.store);
        info!(room = %self.room_id, phase = self.phase.as_str(), "room_exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::layout::{InMemoryRoomLayouts, LayoutEntity, RoomLayout};
    use crate::state::WorldStateStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 60.0;

    fn layouts() -> InMemoryRoomLayouts {
        InMemoryRoomLayouts::new()
            .with_layout(RoomLayout::new(
                "room1",
                Some(WallGrid::bordered(15, 10)),
                vec![
                    LayoutEntity::new("enemy1", EntityKind::Enemy, 3, 2),
                    LayoutEntity::new("door1", EntityKind::Door, 2, 1),
                ],
            ))
            .with_layout(RoomLayout::new("room2", Some(WallGrid::bordered(15, 10)), Vec::new()))
    }

    fn settle(room: &mut RoomController, ctx: &mut WorldContext<'_>) {
        for _ in 0..60 {
            room.tick(DT, &InputSnapshot::empty(), ctx);
        }
    }

    #[test]
    fn missing_layout_enters_error_phase() {
        let layouts = InMemoryRoomLayouts::new();
        let mut store = WorldStateStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = WorldContext {
            store: &mut store,
            layouts: &layouts,
            rng: &mut rng,
        };

        let mut room = RoomController::new("nowhere");
        room.on_enter(&mut ctx);
        assert_eq!(room.phase(), RoomPhase::Error);
        assert!(room.error_message().expect("message").contains("nowhere"));

        let command = room.tick(DT, &InputSnapshot::empty().with_interact_pressed(true), &mut ctx);
        assert_eq!(command, RoomCommand::None);
    }

    #[test]
    fn staged_spawn_is_consumed_on_enter() {
        let layouts = layouts();
        let mut store = WorldStateStore::new();
        store.stage_transition(TransitionStaging {
            next_room_id: Some("room2".to_string()),
            next_spawn_x: Some(GridPos::new(4, 5).center_px().x),
            next_spawn_y: Some(GridPos::new(4, 5).center_px().y),
            calling_room_id: Some("room1".to_string()),
        });
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = WorldContext {
            store: &mut store,
            layouts: &layouts,
            rng: &mut rng,
        };

        let mut room = RoomController::new("room1");
        room.on_enter(&mut ctx);
        assert_eq!(room.room_id(), "room2");
        assert_eq!(room.player().grid(), GridPos::new(4, 5));
        assert!(!ctx.store.has_staged_transition());
        assert_eq!(ctx.store.current_room(), "room2");
    }

    #[test]
    fn door_wins_over_enemy_when_both_adjacent() {
        let layouts = layouts();
        let mut store = WorldStateStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = WorldContext {
            store: &mut store,
            layouts: &layouts,
            rng: &mut rng,
        };

        let mut room = RoomController::new("room1");
        room.on_enter(&mut ctx);
        // (2,2) touches the door at (2,1) and the enemy at (3,2).
        room.tick(DT, &InputSnapshot::empty().holding(crate::room::Direction::Down), &mut ctx);
        settle(&mut room, &mut ctx);
        room.tick(DT, &InputSnapshot::empty().holding(crate::room::Direction::Right), &mut ctx);
        settle(&mut room, &mut ctx);
        assert_eq!(room.player().grid(), GridPos::new(2, 2));

        let command = room.tick(DT, &InputSnapshot::empty().with_interact_pressed(true), &mut ctx);
        assert_eq!(
            command,
            RoomCommand::TransitionTo {
                room_id: DEFAULT_ROOM_ID.to_string()
            }
        );
        let staged = ctx.store.consume_transition().expect("staged");
        assert_eq!(staged.calling_room_id.as_deref(), Some("room1"));
        assert_eq!(staged.spawn_px(), None);
    }

    #[test]
    fn interact_is_ignored_mid_move() {
        let layouts = layouts();
        let mut store = WorldStateStore::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = WorldContext {
            store: &mut store,
            layouts: &layouts,
            rng: &mut rng,
        };

        let mut room = RoomController::new("room1");
        room.on_enter(&mut ctx);
        room.tick(DT, &InputSnapshot::empty().holding(crate::room::Direction::Down), &mut ctx);
        assert!(room.player().is_busy());

        let command = room.tick(DT, &InputSnapshot::empty().with_interact_pressed(true), &mut ctx);
        assert_eq!(command, RoomCommand::None);
        assert_eq!(room.phase(), RoomPhase::Active);
    }

    #[test]
    fn banner_expires() {
        let mut room = RoomController::new("room1");
        room.banner = Some(Banner {
            text: "VICTORY!",
            remaining: BANNER_SECONDS,
        });
        room.tick_banner(1.0);
        assert_eq!(room.banner_text(), Some("VICTORY!"));
        room.tick_banner(0.6);
        assert_eq!(room.banner_text(), None);
    }
}
