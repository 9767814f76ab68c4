use rand::seq::SliceRandom;
use rand::RngCore;
use tracing::{debug, info};

use crate::app::{Controller, InputSnapshot, WorldContext};
use crate::state::{BodyPartStatus, WorldStateStore};

pub const VICTORY_RECOVERY: i32 = 20;
pub const DEFEAT_PENALTY: i32 = 20;
pub const FADE_SECONDS: f32 = 0.5;

/// Who started the fight and from where. Lives only while combat runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatSession {
    pub enemy_id: String,
    pub calling_room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatResult {
    pub victory: bool,
    pub enemy_id: Option<String>,
    /// Body part picked on defeat.
    pub damaged_part: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatPhase {
    Entering,
    InProgress,
    Resolving,
    Exited,
}

impl CombatPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entering => "entering",
            Self::InProgress => "in_progress",
            Self::Resolving => "resolving",
            Self::Exited => "exited",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatCommand {
    None,
    Resume(CombatResult),
}

/// Applies the combat resolution policy to the player and returns the body
/// part hit on defeat. A part that is already damaged stays damaged.
pub fn apply_combat_outcome(
    store: &mut WorldStateStore,
    victory: bool,
    rng: &mut dyn RngCore,
) -> Option<String> {
    let player = store.player_mut();
    if victory {
        let health = player.health().saturating_add(VICTORY_RECOVERY);
        player.set_health(health);
        return None;
    }

    let health = player.health().saturating_sub(DEFEAT_PENALTY);
    player.set_health(health);
    let part = player.body_parts_mut().choose_mut(rng)?;
    let already_damaged = part.status == BodyPartStatus::Damaged;
    part.status = BodyPartStatus::Damaged;
    info!(part = %part.name, already_damaged, "body_part_damaged");
    Some(part.name.clone())
}

/// Fade in, wait for a win or lose signal, apply the outcome, fade out and
/// hand a single result back to the room that started the fight.
#[derive(Debug)]
pub struct CombatController {
    session: CombatSession,
    phase: CombatPhase,
    fade_elapsed: f32,
    result: Option<CombatResult>,
}

impl CombatController {
    pub fn new(session: CombatSession) -> Self {
        Self {
            session,
            phase: CombatPhase::Entering,
            fade_elapsed: 0.0,
            result: None,
        }
    }

    pub fn session(&self) -> &CombatSession {
        &self.session
    }

    pub fn phase(&self) -> CombatPhase {
        self.phase
    }

    /// Resolves the fight. Ignored outside `InProgress`.
    pub fn resolve(&mut self, ctx: &mut WorldContext<'_>, victory: bool) -> bool {
        if self.phase != CombatPhase::InProgress {
            debug!(phase = self.phase.as_str(), "combat_resolve_ignored");
            return false;
        }

        let damaged_part = apply_combat_outcome(ctx.store, victory, ctx.rng);
        info!(
            enemy = %self.session.enemy_id,
            room = %self.session.calling_room_id,
            victory,
            health = ctx.store.player().health(),
            "combat_resolved"
        );
        self.result = Some(CombatResult {
            victory,
            enemy_id: Some(self.session.enemy_id.clone()),
            damaged_part,
        });
        self.phase = CombatPhase::Resolving;
        self.fade_elapsed = 0.0;
        true
    }
}

impl Controller for CombatController {
    type Command = CombatCommand;

    fn on_enter(&mut self, _ctx: &mut WorldContext<'_>) {
        self.phase = CombatPhase::Entering;
        self.fade_elapsed = 0.0;
        self.result = None;
        info!(
            enemy = %self.session.enemy_id,
            room = %self.session.calling_room_id,
            "combat_entered"
        );
    }

    fn tick(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        ctx: &mut WorldContext<'_>,
    ) -> CombatCommand {
        match self.phase {
            CombatPhase::Entering => {
                self.fade_elapsed += fixed_dt_seconds;
                if self.fade_elapsed >= FADE_SECONDS {
                    self.phase = CombatPhase::InProgress;
                    self.fade_elapsed = 0.0;
                }
                CombatCommand::None
            }
            CombatPhase::InProgress => {
                if input.interact_pressed() {
                    self.resolve(ctx, true);
                } else if input.cancel_pressed() {
                    self.resolve(ctx, false);
                }
                CombatCommand::None
            }
            CombatPhase::Resolving => {
                self.fade_elapsed += fixed_dt_seconds;
                if self.fade_elapsed < FADE_SECONDS {
                    return CombatCommand::None;
                }
                self.phase = CombatPhase::Exited;
                match self.result.take() {
                    Some(result) => CombatCommand::Resume(result),
                    None => CombatCommand::None,
                }
            }
            CombatPhase::Exited => CombatCommand::None,
        }
    }

    fn on_exit(&mut self, _ctx: &mut WorldContext<'_>) {
        debug!(enemy = %self.session.enemy_id, "combat_exited");
    }
}
