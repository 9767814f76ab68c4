use rand::RngCore;

use super::input::InputSnapshot;
use crate::room::RoomLayoutProvider;
use crate::state::WorldStateStore;

/// Shared resources lent to whichever controller currently has focus.
pub struct WorldContext<'a> {
    pub store: &'a mut WorldStateStore,
    pub layouts: &'a dyn RoomLayoutProvider,
    pub rng: &'a mut dyn RngCore,
}

/// Lifecycle shared by the room and combat controllers.
pub trait Controller {
    type Command;

    fn on_enter(&mut self, ctx: &mut WorldContext<'_>);
    fn tick(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        ctx: &mut WorldContext<'_>,
    ) -> Self::Command;
    fn on_exit(&mut self, ctx: &mut WorldContext<'_>);
}
