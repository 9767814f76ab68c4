use crate::room::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
}

const ACTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

impl InputAction {
    /// Checked in this order when several directions are held.
    pub const DIRECTIONS: [InputAction; ACTION_COUNT] = [
        InputAction::MoveLeft,
        InputAction::MoveRight,
        InputAction::MoveUp,
        InputAction::MoveDown,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::MoveLeft => 0,
            InputAction::MoveRight => 1,
            InputAction::MoveUp => 2,
            InputAction::MoveDown => 3,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            InputAction::MoveLeft => Direction::Left,
            InputAction::MoveRight => Direction::Right,
            InputAction::MoveUp => Direction::Up,
            InputAction::MoveDown => Direction::Down,
        }
    }

    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Left => InputAction::MoveLeft,
            Direction::Right => InputAction::MoveRight,
            Direction::Up => InputAction::MoveUp,
            Direction::Down => InputAction::MoveDown,
        }
    }
}

/// Resolved per-tick intent. Held directions are levels; interact, cancel and
/// visibility loss are edges that are true for a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    actions: ActionStates,
    interact_pressed: bool,
    cancel_pressed: bool,
    visibility_lost: bool,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn interact_pressed(&self) -> bool {
        self.interact_pressed
    }

    pub fn cancel_pressed(&self) -> bool {
        self.cancel_pressed
    }

    pub fn visibility_lost(&self) -> bool {
        self.visibility_lost
    }

    pub fn held_direction(&self) -> Option<Direction> {
        InputAction::DIRECTIONS
            .into_iter()
            .find(|action| self.is_down(*action))
            .map(InputAction::direction)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn holding(self, direction: Direction) -> Self {
        self.with_action_down(InputAction::for_direction(direction), true)
    }

    pub fn with_interact_pressed(mut self, interact_pressed: bool) -> Self {
        self.interact_pressed = interact_pressed;
        self
    }

    pub fn with_cancel_pressed(mut self, cancel_pressed: bool) -> Self {
        self.cancel_pressed = cancel_pressed;
        self
    }

    pub fn with_visibility_lost(mut self, visibility_lost: bool) -> Self {
        self.visibility_lost = visibility_lost;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_direction_prefers_left_right_up_down() {
        let input = InputSnapshot::empty()
            .holding(Direction::Down)
            .holding(Direction::Right);
        assert_eq!(input.held_direction(), Some(Direction::Right));

        let input = input.with_action_down(InputAction::MoveRight, false);
        assert_eq!(input.held_direction(), Some(Direction::Down));
        assert_eq!(InputSnapshot::empty().held_direction(), None);
    }

    #[test]
    fn edges_default_to_false() {
        let input = InputSnapshot::empty();
        assert!(!input.interact_pressed());
        assert!(!input.cancel_pressed());
        assert!(!input.visibility_lost());
        assert!(InputSnapshot::empty().with_visibility_lost(true).visibility_lost());
    }
}
