use tracing::debug;

use super::grid::{Direction, GridPos, PixelPos};
use super::layout::{CellProbe, WallGrid};
use super::registry::EntityRegistry;

pub const MOVE_DURATION_SECONDS: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Motion {
    from: PixelPos,
    to: PixelPos,
    direction: Direction,
    elapsed: f32,
}

/// Grid-locked position plus an optional in-flight glide between cells.
///
/// The logical cell switches to the destination as soon as a move begins, so
/// occupancy checks always see the reserved cell. The pixel position trails
/// behind until the glide completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Mover {
    grid: GridPos,
    pixel: PixelPos,
    motion: Option<Motion>,
}

impl Mover {
    pub fn at(grid: GridPos) -> Self {
        Self {
            grid,
            pixel: grid.center_px(),
            motion: None,
        }
    }

    pub fn grid(&self) -> GridPos {
        self.grid
    }

    pub fn pixel(&self) -> PixelPos {
        self.pixel
    }

    pub fn is_busy(&self) -> bool {
        self.motion.is_some()
    }

    pub fn moving_toward(&self) -> Option<Direction> {
        self.motion.map(|motion| motion.direction)
    }

    fn begin(&mut self, direction: Direction) {
        let target = self.grid.step(direction);
        self.motion = Some(Motion {
            from: self.grid.center_px(),
            to: target.center_px(),
            direction,
            elapsed: 0.0,
        });
        self.grid = target;
    }

    /// Steps the glide. Returns the direction of a move that completed on this
    /// call.
    pub fn advance(&mut self, dt_seconds: f32) -> Option<Direction> {
        let motion = self.motion.as_mut()?;
        motion.elapsed += dt_seconds.max(0.0);
        let progress = motion.elapsed / MOVE_DURATION_SECONDS;
        if progress >= 1.0 {
            let direction = motion.direction;
            self.pixel = motion.to;
            self.motion = None;
            return Some(direction);
        }
        self.pixel = motion.from.lerp(motion.to, progress);
        None
    }

    /// Completes any in-flight glide immediately.
    pub fn finish(&mut self) -> Option<Direction> {
        let motion = self.motion.take()?;
        self.pixel = motion.to;
        Some(motion.direction)
    }

    pub fn place_at(&mut self, grid: GridPos) {
        self.grid = grid;
        self.pixel = grid.center_px();
        self.motion = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveRejection {
    Busy,
    OutOfBounds,
    Wall,
    Occupied { blocker: String },
    PushBlocked { pushed: String },
}

impl MoveRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::OutOfBounds => "out_of_bounds",
            Self::Wall => "wall",
            Self::Occupied { .. } => "occupied",
            Self::PushBlocked { .. } => "push_blocked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub moved: bool,
    /// Entity ids displaced by this move, nearest first.
    pub pushed: Vec<String>,
    pub rejection: Option<MoveRejection>,
}

impl MoveOutcome {
    fn accepted(pushed: Vec<String>) -> Self {
        Self {
            moved: true,
            pushed,
            rejection: None,
        }
    }

    fn rejected(rejection: MoveRejection) -> Self {
        Self {
            moved: false,
            pushed: Vec::new(),
            rejection: Some(rejection),
        }
    }
}

/// Grid collision and push resolution for one room.
#[derive(Debug, Clone, Copy)]
pub struct MovementResolver<'a> {
    walls: Option<&'a WallGrid>,
}

impl<'a> MovementResolver<'a> {
    /// A missing wall grid makes every cell walkable.
    pub fn new(walls: Option<&'a WallGrid>) -> Self {
        Self { walls }
    }

    pub fn attempt_move(
        &self,
        actor: &mut Mover,
        registry: &mut EntityRegistry,
        direction: Direction,
    ) -> MoveOutcome {
        if actor.is_busy() {
            return MoveOutcome::rejected(MoveRejection::Busy);
        }
        let outcome = match self.plan_push_chain(registry, actor.grid(), direction, None) {
            Ok(chain) => {
                commit_push_chain(registry, &chain, direction);
                actor.begin(direction);
                MoveOutcome::accepted(chain)
            }
            Err(rejection) => MoveOutcome::rejected(rejection),
        };
        debug!(
            direction = direction.as_str(),
            moved = outcome.moved,
            pushed = outcome.pushed.len(),
            reason = outcome.rejection.as_ref().map(MoveRejection::as_str).unwrap_or("-"),
            "player_move_attempted"
        );
        outcome
    }

    /// Same rules as [`Self::attempt_move`] with a registry entity as the actor.
    pub fn attempt_entity_move(
        &self,
        registry: &mut EntityRegistry,
        entity_id: &str,
        direction: Direction,
    ) -> MoveOutcome {
        let Some(origin) = registry.get(entity_id).map(|entity| {
            (entity.mover.grid(), entity.mover.is_busy())
        }) else {
            return MoveOutcome::rejected(MoveRejection::Occupied {
                blocker: entity_id.to_string(),
            });
        };
        if origin.1 {
            return MoveOutcome::rejected(MoveRejection::Busy);
        }

        match self.plan_push_chain(registry, origin.0, direction, Some(entity_id)) {
            Ok(chain) => {
                commit_push_chain(registry, &chain, direction);
                if let Some(entity) = registry.get_mut(entity_id) {
                    entity.mover.begin(direction);
                }
                MoveOutcome::accepted(chain)
            }
            Err(rejection) => MoveOutcome::rejected(rejection),
        }
    }

    fn probe(&self, cell: GridPos) -> CellProbe {
        match self.walls {
            Some(walls) => walls.probe(cell),
            None => CellProbe::Floor,
        }
    }

    /// Walks forward from `origin` collecting every pushable entity in the way
    /// until a free floor cell is found. Each pushed entity must itself pass the
    /// bounds, wall and occupancy checks one cell further along.
    fn plan_push_chain(
        &self,
        registry: &EntityRegistry,
        origin: GridPos,
        direction: Direction,
        actor_id: Option<&str>,
    ) -> Result<Vec<String>, MoveRejection> {
        let mut chain: Vec<String> = Vec::new();
        let mut cursor = origin;

        loop {
            let target = cursor.step(direction);
            let blocked = match self.probe(target) {
                CellProbe::Floor => None,
                CellProbe::Wall => Some(MoveRejection::Wall),
                CellProbe::OutOfBounds => Some(MoveRejection::OutOfBounds),
            };
            if let Some(rejection) = blocked {
                return Err(blocked_by(chain, rejection));
            }

            let occupants: Vec<_> = registry
                .entities_at(target)
                .into_iter()
                .filter(|entity| Some(entity.id.as_str()) != actor_id)
                .collect();
            if occupants.is_empty() {
                return Ok(chain);
            }
            if let Some(blocker) = occupants
                .iter()
                .find(|entity| !entity.pushable || entity.mover.is_busy())
            {
                let rejection = MoveRejection::Occupied {
                    blocker: blocker.id.clone(),
                };
                return Err(blocked_by(chain, rejection));
            }
            if chain.len() >= registry.len() {
                return Err(blocked_by(chain, MoveRejection::Busy));
            }

            chain.extend(occupants.iter().map(|entity| entity.id.clone()));
            cursor = target;
        }
    }
}

fn blocked_by(chain: Vec<String>, rejection: MoveRejection) -> MoveRejection {
    match chain.into_iter().next() {
        Some(pushed) => MoveRejection::PushBlocked { pushed },
        None => rejection,
    }
}

fn commit_push_chain(registry: &mut EntityRegistry, chain: &[String], direction: Direction) {
    for id in chain.iter().rev() {
        if let Some(entity) = registry.get_mut(id) {
            entity.mover.begin(direction);
            debug!(entity = %id, direction = direction.as_str(), "entity_pushed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::layout::{LayoutEntity, RoomLayout};
    use crate::state::{EntityKind, WorldStateStore};

    fn registry_with(entities: Vec<LayoutEntity>) -> (EntityRegistry, WorldStateStore) {
        let mut store = WorldStateStore::new();
        let layout = RoomLayout::new("room1", Some(WallGrid::bordered(15, 10)), entities);
        let registry = EntityRegistry::build(&layout, &mut store);
        (registry, store)
    }

    fn settle(mover: &mut Mover) {
        while mover.advance(0.05).is_none() {}
    }

    #[test]
    fn moving_into_a_wall_is_rejected_in_every_direction() {
        let walls = WallGrid::from_rows(&[vec![1, 1, 1], vec![1, 0, 1], vec![1, 1, 1]])
            .expect("grid");
        let resolver = MovementResolver::new(Some(&walls));
        let (mut registry, _) = registry_with(Vec::new());

        for direction in Direction::ALL {
            let mut player = Mover::at(GridPos::new(1, 1));
            let outcome = resolver.attempt_move(&mut player, &mut registry, direction);
            assert!(!outcome.moved);
            assert_eq!(outcome.rejection, Some(MoveRejection::Wall));
            assert_eq!(player.grid(), GridPos::new(1, 1));
            assert!(!player.is_busy());
        }
    }

    #[test]
    fn moving_off_the_grid_is_rejected() {
        let walls = WallGrid::from_rows(&[vec![0, 0]]).expect("grid");
        let resolver = MovementResolver::new(Some(&walls));
        let (mut registry, _) = registry_with(Vec::new());
        let mut player = Mover::at(GridPos::new(0, 0));

        let outcome = resolver.attempt_move(&mut player, &mut registry, Direction::Up);
        assert_eq!(outcome.rejection, Some(MoveRejection::OutOfBounds));
        assert_eq!(player.grid(), GridPos::new(0, 0));
    }

    #[test]
    fn missing_wall_grid_is_walkable() {
        let resolver = MovementResolver::new(None);
        let (mut registry, _) = registry_with(Vec::new());
        let mut player = Mover::at(GridPos::new(0, 0));

        let outcome = resolver.attempt_move(&mut player, &mut registry, Direction::Left);
        assert!(outcome.moved);
        assert_eq!(player.grid(), GridPos::new(-1, 0));
    }

    #[test]
    fn busy_mover_cannot_start_another_move() {
        let (mut registry, _) = registry_with(Vec::new());
        let walls = WallGrid::bordered(15, 10);
        let resolver = MovementResolver::new(Some(&walls));
        let mut player = Mover::at(GridPos::new(1, 1));

        assert!(resolver.attempt_move(&mut player, &mut registry, Direction::Right).moved);
        let second = resolver.attempt_move(&mut player, &mut registry, Direction::Right);
        assert_eq!(second.rejection, Some(MoveRejection::Busy));
        assert_eq!(player.grid(), GridPos::new(2, 1));
    }

    #[test]
    fn glide_interpolates_then_lands_on_cell_center() {
        let mut player = Mover::at(GridPos::new(1, 1));
        player.begin(Direction::Right);

        assert_eq!(player.advance(MOVE_DURATION_SECONDS / 2.0), None);
        assert_eq!(player.pixel(), PixelPos { x: 32.0, y: 24.0 });
        assert_eq!(player.advance(MOVE_DURATION_SECONDS), Some(Direction::Right));
        assert_eq!(player.pixel(), GridPos::new(2, 1).center_px());
        assert!(!player.is_busy());
    }

    #[test]
    fn non_pushable_occupant_blocks_the_move() {
        let (mut registry, _) =
            registry_with(vec![LayoutEntity::new("enemy1", EntityKind::Enemy, 2, 1)]);
        let walls = WallGrid::bordered(15, 10);
        let resolver = MovementResolver::new(Some(&walls));
        let mut player = Mover::at(GridPos::new(1, 1));

        let outcome = resolver.attempt_move(&mut player, &mut registry, Direction::Right);
        assert_eq!(
            outcome.rejection,
            Some(MoveRejection::Occupied {
                blocker: "enemy1".to_string()
            })
        );
        assert_eq!(player.grid(), GridPos::new(1, 1));
    }

    #[test]
    fn doors_are_not_entered_by_walking() {
        let (mut registry, _) =
            registry_with(vec![LayoutEntity::new("door1", EntityKind::Door, 2, 1)]);
        let walls = WallGrid::bordered(15, 10);
        let resolver = MovementResolver::new(Some(&walls));
        let mut player = Mover::at(GridPos::new(1, 1));

        assert!(!resolver.attempt_move(&mut player, &mut registry, Direction::Right).moved);
    }

    #[test]
    fn pushing_into_open_floor_moves_both() {
        let (mut registry, _) =
            registry_with(vec![LayoutEntity::new("boulder1", EntityKind::Boulder, 3, 3)]);
        let walls = WallGrid::bordered(15, 10);
        let resolver = MovementResolver::new(Some(&walls));
        let mut player = Mover::at(GridPos::new(2, 3));

        let outcome = resolver.attempt_move(&mut player, &mut registry, Direction::Right);
        assert!(outcome.moved);
        assert_eq!(outcome.pushed, ["boulder1"]);
        assert_eq!(player.grid(), GridPos::new(3, 3));
        let boulder = registry.get("boulder1").expect("boulder");
        assert_eq!(boulder.mover.grid(), GridPos::new(4, 3));
        assert!(boulder.mover.is_busy());
    }

    #[test]
    fn pushing_against_a_wall_fails_both_moves() {
        let (mut registry, _) =
            registry_with(vec![LayoutEntity::new("boulder1", EntityKind::Boulder, 13, 3)]);
        let walls = WallGrid::bordered(15, 10);
        let resolver = MovementResolver::new(Some(&walls));
        let mut player = Mover::at(GridPos::new(12, 3));

        let outcome = resolver.attempt_move(&mut player, &mut registry, Direction::Right);
        assert!(!outcome.moved);
        assert_eq!(
            outcome.rejection,
            Some(MoveRejection::PushBlocked {
                pushed: "boulder1".to_string()
            })
        );
        assert_eq!(player.grid(), GridPos::new(12, 3));
        let boulder = registry.get("boulder1").expect("boulder");
        assert_eq!(boulder.mover.grid(), GridPos::new(13, 3));
        assert!(!boulder.mover.is_busy());
    }

    #[test]
    fn push_chain_moves_every_boulder_one_cell() {
        let (mut registry, _) = registry_with(vec![
            LayoutEntity::new("b1", EntityKind::Boulder, 3, 3),
            LayoutEntity::new("b2", EntityKind::Boulder, 4, 3),
        ]);
        let walls = WallGrid::bordered(15, 10);
        let resolver = MovementResolver::new(Some(&walls));
        let mut player = Mover::at(GridPos::new(2, 3));

        let outcome = resolver.attempt_move(&mut player, &mut registry, Direction::Right);
        assert!(outcome.moved);
        assert_eq!(outcome.pushed, ["b1", "b2"]);
        assert_eq!(registry.get("b1").expect("b1").mover.grid(), GridPos::new(4, 3));
        assert_eq!(registry.get("b2").expect("b2").mover.grid(), GridPos::new(5, 3));
    }

    #[test]
    fn boulder_pushed_into_enemy_blocks_the_player() {
        let (mut registry, _) = registry_with(vec![
            LayoutEntity::new("b1", EntityKind::Boulder, 3, 3),
            LayoutEntity::new("enemy1", EntityKind::Enemy, 4, 3),
        ]);
        let walls = WallGrid::bordered(15, 10);
        let resolver = MovementResolver::new(Some(&walls));
        let mut player = Mover::at(GridPos::new(2, 3));

        let outcome = resolver.attempt_move(&mut player, &mut registry, Direction::Right);
        assert!(!outcome.moved);
        assert_eq!(player.grid(), GridPos::new(2, 3));
        assert_eq!(registry.get("b1").expect("b1").mover.grid(), GridPos::new(3, 3));
    }

    #[test]
    fn pushable_property_overrides_type_default() {
        let (mut registry, _) = registry_with(vec![
            LayoutEntity::new("crate1", EntityKind::Unknown, 3, 3)
                .with_property("pushable", serde_json::json!(true)),
            LayoutEntity::new("rock1", EntityKind::Boulder, 3, 5)
                .with_property("pushable", serde_json::json!(false)),
        ]);
        let walls = WallGrid::bordered(15, 10);
        let resolver = MovementResolver::new(Some(&walls));

        let mut player = Mover::at(GridPos::new(2, 3));
        assert!(resolver.attempt_move(&mut player, &mut registry, Direction::Right).moved);

        let mut other = Mover::at(GridPos::new(2, 5));
        assert!(!resolver.attempt_move(&mut other, &mut registry, Direction::Right).moved);
    }

    #[test]
    fn entity_moves_follow_the_same_rules() {
        let (mut registry, _) = registry_with(vec![
            LayoutEntity::new("b1", EntityKind::Boulder, 3, 3),
            LayoutEntity::new("b2", EntityKind::Boulder, 4, 3),
        ]);
        let walls = WallGrid::bordered(15, 10);
        let resolver = MovementResolver::new(Some(&walls));

        let outcome = resolver.attempt_entity_move(&mut registry, "b1", Direction::Right);
        assert!(outcome.moved);
        assert_eq!(outcome.pushed, ["b2"]);

        let mut b1 = registry.get("b1").expect("b1").mover.clone();
        settle(&mut b1);
        assert_eq!(b1.grid(), GridPos::new(4, 3));
    }
}
