mod controller;
mod grid;
mod layout;
mod movement;
mod proximity;
mod registry;

pub use controller::{RoomCommand, RoomController, RoomPhase, BANNER_SECONDS};
pub use grid::{Direction, GridPos, PixelPos, DEFAULT_SPAWN_TILE, TILE_SIZE_PX};
pub use layout::{
    Cell, CellProbe, InMemoryRoomLayouts, LayoutEntity, LayoutError, RoomLayout,
    RoomLayoutProvider, RoomLayoutSource, WallGrid, DEFAULT_ROOM_ID,
};
pub use movement::{MoveOutcome, MoveRejection, MovementResolver, Mover, MOVE_DURATION_SECONDS};
pub use proximity::{ProximityStateMachine, ProximityTransition};
pub use registry::{
    EntityRegistry, EntityState, IdleBob, LiveEntity, VisualCue, BOB_HALF_PERIOD_SECONDS,
    BOB_HEIGHT_PX,
};
