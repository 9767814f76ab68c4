use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use super::controller::{Controller, WorldContext};
use super::input::InputSnapshot;
use crate::combat::{CombatCommand, CombatController, CombatResult, CombatSession};
use crate::room::{MoveOutcome, RoomCommand, RoomController, RoomLayoutProvider};
use crate::state::{SaveTrigger, WorldStateStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldMachineFocus {
    Room,
    Combat,
}

/// What happened during one [`WorldMachine::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub room_changed: Option<String>,
    pub combat_started: Option<CombatSession>,
    pub combat_result: Option<CombatResult>,
    pub save_request: Option<SaveTrigger>,
    pub player_move: Option<MoveOutcome>,
}

/// Owns the world state, the single live room and the optional combat.
///
/// The room stays alive, paused, while combat has focus. A door transition
/// replaces the room controller entirely.
pub struct WorldMachine {
    store: WorldStateStore,
    layouts: Box<dyn RoomLayoutProvider>,
    rng: StdRng,
    room: RoomController,
    combat: Option<CombatController>,
    started: bool,
}

impl WorldMachine {
    pub fn new(store: WorldStateStore, layouts: Box<dyn RoomLayoutProvider>) -> Self {
        Self::with_rng(store, layouts, StdRng::from_entropy())
    }

    pub fn with_rng(
        store: WorldStateStore,
        layouts: Box<dyn RoomLayoutProvider>,
        rng: StdRng,
    ) -> Self {
        let room = RoomController::new(store.current_room());
        Self {
            store,
            layouts,
            rng,
            room,
            combat: None,
            started: false,
        }
    }

    /// Activates the persisted current room. Calling it again is a no-op.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let mut ctx = WorldContext {
            store: &mut self.store,
            layouts: self.layouts.as_ref(),
            rng: &mut self.rng,
        };
        self.room.on_enter(&mut ctx);
    }

    /// Drops the live room (and any combat) and activates the store's current
    /// room again, e.g. after loading a save. Glides still in flight are
    /// abandoned, never written over the store.
    pub fn restart_room(&mut self) {
        let mut ctx = WorldContext {
            store: &mut self.store,
            layouts: self.layouts.as_ref(),
            rng: &mut self.rng,
        };
        if let Some(mut combat) = self.combat.take() {
            combat.on_exit(&mut ctx);
        }
        if self.started {
            self.room.discard();
        }
        self.room = RoomController::new(ctx.store.current_room());
        self.room.on_enter(&mut ctx);
        self.started = true;
        info!(room = %self.room.room_id(), "room_restarted");
    }

    pub fn tick(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> TickReport {
        let mut report = TickReport::default();
        if !self.started {
            self.start();
        }
        if input.visibility_lost() {
            report.save_request = Some(SaveTrigger::VisibilityLost);
        }

        let mut ctx = WorldContext {
            store: &mut self.store,
            layouts: self.layouts.as_ref(),
            rng: &mut self.rng,
        };

        if let Some(combat) = self.combat.as_mut() {
            if let CombatCommand::Resume(result) = combat.tick(fixed_dt_seconds, input, &mut ctx) {
                combat.on_exit(&mut ctx);
                self.combat = None;
                self.room.resume_from_combat(&mut ctx, &result);
                report.combat_result = Some(result);
                report.save_request = Some(SaveTrigger::CombatResolved);
            }
            return report;
        }

        match self.room.tick(fixed_dt_seconds, input, &mut ctx) {
            RoomCommand::None => {}
            RoomCommand::EnterCombat(session) => {
                let mut combat = CombatController::new(session.clone());
                combat.on_enter(&mut ctx);
                self.combat = Some(combat);
                report.combat_started = Some(session);
            }
            RoomCommand::TransitionTo { room_id } => {
                self.room.on_exit(&mut ctx);
                self.room = RoomController::new(room_id);
                self.room.on_enter(&mut ctx);
                report.room_changed = Some(self.room.room_id().to_string());
            }
        }
        report.player_move = self.room.take_last_move();
        report
    }

    pub fn focus(&self) -> WorldMachineFocus {
        if self.combat.is_some() {
            WorldMachineFocus::Combat
        } else {
            WorldMachineFocus::Room
        }
    }

    pub fn store(&self) -> &WorldStateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut WorldStateStore {
        &mut self.store
    }

    pub fn room(&self) -> &RoomController {
        &self.room
    }

    pub fn combat(&self) -> Option<&CombatController> {
        self.combat.as_ref()
    }

    pub fn layouts(&self) -> &dyn RoomLayoutProvider {
        self.layouts.as_ref()
    }

    /// Lands any in-flight moves so the store holds settled positions.
    pub fn shutdown(&mut self) {
        if !self.started {
            return;
        }
        let mut ctx = WorldContext {
            store: &mut self.store,
            layouts: self.layouts.as_ref(),
            rng: &mut self.rng,
        };
        self.room.on_exit(&mut ctx);
        self.started = false;
    }
}
