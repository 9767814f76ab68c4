use tracing::debug;

use super::grid::GridPos;
use super::registry::{EntityRegistry, EntityState, IdleBob, LiveEntity, VisualCue};
use crate::state::EntityKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProximityTransition {
    pub entity_id: String,
    pub kind: EntityKind,
    pub from: EntityState,
    pub to: EntityState,
}

/// Adjacency-driven idle/alert/highlighted transitions.
///
/// Enemies go alert (tint plus bob) while the player is orthogonally adjacent
/// and calm down when the player leaves; boulders get a highlight. Engaged
/// entities are left alone until combat hands them back through
/// [`ProximityStateMachine::clear`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProximityStateMachine;

impl ProximityStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Re-evaluates every live entity against the player's cell. Calling this
    /// again with unchanged positions changes nothing and returns no
    /// transitions.
    pub fn evaluate(
        &self,
        player: GridPos,
        registry: &mut EntityRegistry,
    ) -> Vec<ProximityTransition> {
        let mut transitions = Vec::new();
        for entity in registry.all_entities_mut() {
            let adjacent = entity.grid().is_adjacent_to(player);
            let next = match (entity.kind, entity.state, adjacent) {
                (EntityKind::Enemy, EntityState::Idle, true) => Some(EntityState::Alert),
                (EntityKind::Enemy, EntityState::Alert, false) => Some(EntityState::Idle),
                (EntityKind::Boulder, EntityState::Idle, true) => Some(EntityState::Highlighted),
                (EntityKind::Boulder, EntityState::Highlighted, false) => Some(EntityState::Idle),
                _ => None,
            };
            if let Some(to) = next {
                transitions.push(apply(entity, to));
            }
        }
        transitions
    }

    /// Drops any proximity visuals and returns the entity to idle.
    pub fn clear(&self, entity: &mut LiveEntity) -> Option<ProximityTransition> {
        if entity.state == EntityState::Idle && entity.cue.is_none() && entity.bob.is_none() {
            return None;
        }
        Some(apply(entity, EntityState::Idle))
    }

    /// Advances bob animations.
    pub fn animate(&self, registry: &mut EntityRegistry, dt_seconds: f32) {
        for entity in registry.all_entities_mut() {
            if let Some(bob) = entity.bob.as_mut() {
                bob.advance(dt_seconds);
            }
        }
    }
}

fn apply(entity: &mut LiveEntity, to: EntityState) -> ProximityTransition {
    let from = entity.state;
    entity.state = to;
    match to {
        EntityState::Alert => {
            entity.cue = Some(VisualCue::AlertTint);
            entity.bob = Some(IdleBob::default());
        }
        EntityState::Highlighted => {
            entity.cue = Some(VisualCue::HighlightTint);
        }
        EntityState::Idle => {
            entity.cue = None;
            if entity.bob.take().is_some() && !entity.mover.is_busy() {
                let grid = entity.mover.grid();
                entity.mover.place_at(grid);
            }
        }
        EntityState::Engaged => {}
    }
    debug!(
        entity = %entity.id,
        from = from.as_str(),
        to = to.as_str(),
        "proximity_transition"
    );
    ProximityTransition {
        entity_id: entity.id.clone(),
        kind: entity.kind,
        from,
        to,
    }
}
