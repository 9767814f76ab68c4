use world::{
    BodyPartStatus, EntityKind, EntityState, GridPos, LiveEntity, PixelPos, RoomPhase,
    WorldMachine, MAX_HEALTH,
};

use super::message_board::{BoardMessage, MessageBoard};

const WALL: char = '#';
const FLOOR: char = '.';
const PLAYER: char = '@';
const NOTE: char = '*';
const MAX_VIEW_COLS: i32 = 48;
const MAX_VIEW_ROWS: i32 = 24;

fn entity_glyph(entity: &LiveEntity) -> char {
    match (entity.kind, entity.state) {
        (EntityKind::Enemy, EntityState::Idle) => 'E',
        (EntityKind::Enemy, _) => '!',
        (EntityKind::Boulder, EntityState::Highlighted) => 'o',
        (EntityKind::Boulder, _) => 'O',
        (EntityKind::Door, _) => 'D',
        (EntityKind::Unknown, _) => '?',
    }
}

/// ASCII map of the live room.
pub(crate) fn render_room(machine: &WorldMachine, notes: &[BoardMessage]) -> Vec<String> {
    let room = machine.room();
    if room.phase() == RoomPhase::Error {
        return vec![format!(
            "!! {}",
            room.error_message().unwrap_or("room failed to load")
        )];
    }

    let player = room.player().grid();
    let entities = room.registry().all_entities();
    let bounds = room
        .walls()
        .map(|walls| (clamp_extent(walls.width()), clamp_extent(walls.height())));
    let (start_x, cols) = axis_window(player.x, bounds.map(|(width, _)| width), MAX_VIEW_COLS);
    let (start_y, rows_len) = axis_window(player.y, bounds.map(|(_, height)| height), MAX_VIEW_ROWS);

    let mut rows = Vec::with_capacity(rows_len as usize);
    for dy in 0..rows_len {
        let mut row = String::with_capacity(cols as usize);
        for dx in 0..cols {
            let cell = GridPos::new(start_x.saturating_add(dx), start_y.saturating_add(dy));
            let glyph = if cell == player {
                PLAYER
            } else if let Some(entity) = entities.iter().find(|entity| entity.grid() == cell) {
                entity_glyph(entity)
            } else if room.walls().is_some_and(|walls| !walls.is_walkable(cell)) {
                WALL
            } else if notes.iter().any(|note| note_cell(note) == cell) {
                NOTE
            } else {
                FLOOR
            };
            row.push(glyph);
        }
        rows.push(row);
    }
    rows
}

fn clamp_extent(extent: u32) -> i32 {
    i32::try_from(extent).unwrap_or(i32::MAX)
}

/// First cell and cell count drawn along one axis. A grid that fits is drawn
/// whole; otherwise at most `max` cells around `center`, kept inside the grid
/// when there is one.
fn axis_window(center: i32, extent: Option<i32>, max: i32) -> (i32, i32) {
    match extent {
        Some(extent) if extent <= max => (0, extent.max(0)),
        Some(extent) => {
            let start = center.saturating_sub(max / 2).clamp(0, extent - max);
            (start, max)
        }
        None => (center.saturating_sub(max / 2), max),
    }
}

fn note_cell(note: &BoardMessage) -> GridPos {
    GridPos::from_px(PixelPos {
        x: note.x,
        y: note.y,
    })
}

pub(crate) fn status_lines(machine: &WorldMachine, board: Option<&MessageBoard>) -> Vec<String> {
    let store = machine.store();
    let room = machine.room();
    let player = store.player();
    let parts = player
        .body_parts()
        .iter()
        .map(|part| match part.status {
            BodyPartStatus::Healthy => format!("{} ok", part.name),
            BodyPartStatus::Damaged => format!("{} DAMAGED", part.name),
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut lines = vec![
        format!("room {} [{}]", room.room_id(), room.phase().as_str()),
        format!("health {}/{}  parts: {}", player.health(), MAX_HEALTH, parts),
    ];
    if let Some(combat) = machine.combat() {
        lines.push(format!(
            "combat vs {} ({}): interact to win, cancel to lose",
            combat.session().enemy_id,
            combat.phase().as_str()
        ));
    }
    if let Some(banner) = room.banner_text() {
        lines.push(format!("*** {banner} ***"));
    }
    match board {
        Some(board) => lines.push(format!("board: {}", board.status().label())),
        None => lines.push("board: off".to_string()),
    }
    lines
}

pub(crate) fn note_lines(notes: &[BoardMessage]) -> Vec<String> {
    notes
        .iter()
        .map(|note| {
            let cell = note_cell(note);
            let origin = if note.is_local() { " (unsent)" } else { "" };
            format!("{NOTE} ({},{}) {}{}", cell.x, cell.y, note.text, origin)
        })
        .collect()
}

pub(crate) fn render(machine: &WorldMachine, board: Option<&MessageBoard>) -> Vec<String> {
    let notes = board.map(MessageBoard::annotations).unwrap_or(&[]);
    let mut lines = render_room(machine, notes);
    lines.extend(status_lines(machine, board));
    lines.extend(note_lines(notes));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use world::{InMemoryRoomLayouts, LayoutEntity, RoomLayout, WallGrid, WorldStateStore};

    fn machine() -> WorldMachine {
        let layouts = InMemoryRoomLayouts::new().with_layout(RoomLayout::new(
            "room1",
            Some(WallGrid::bordered(6, 4)),
            vec![
                LayoutEntity::new("enemy1", EntityKind::Enemy, 2, 1),
                LayoutEntity::new("boulder1", EntityKind::Boulder, 4, 2),
                LayoutEntity::new("door1", EntityKind::Door, 1, 2),
            ],
        ));
        let mut machine = WorldMachine::new(WorldStateStore::new(), Box::new(layouts));
        machine.start();
        machine
    }

    #[test]
    fn room_renders_walls_entities_and_player() {
        let machine = machine();
        let rows = render_room(&machine, &[]);
        assert_eq!(rows, ["######", "#@!..#", "#D..O#", "######"]);
    }

    #[test]
    fn wall_less_room_draws_a_bounded_window_around_the_player() {
        let layouts = InMemoryRoomLayouts::new().with_layout(RoomLayout::new(
            "room1",
            None,
            vec![
                LayoutEntity::new("enemy1", EntityKind::Enemy, 2, 1),
                LayoutEntity::new("far1", EntityKind::Boulder, i32::MAX, 1),
                LayoutEntity::new("far2", EntityKind::Boulder, 100_000, 100_000),
            ],
        ));
        let mut machine = WorldMachine::new(WorldStateStore::new(), Box::new(layouts));
        machine.start();

        let rows = render_room(&machine, &[]);
        assert_eq!(rows.len(), MAX_VIEW_ROWS as usize);
        assert!(rows
            .iter()
            .all(|row| row.chars().count() == MAX_VIEW_COLS as usize));

        let center_row: Vec<char> = rows[(MAX_VIEW_ROWS / 2) as usize].chars().collect();
        assert_eq!(center_row[(MAX_VIEW_COLS / 2) as usize], '@');
        assert_eq!(center_row[(MAX_VIEW_COLS / 2 + 1) as usize], '!');
        assert!(!rows.iter().any(|row| row.contains('O')));
    }

    #[test]
    fn large_walled_room_is_clipped_inside_the_grid() {
        assert_eq!(axis_window(1, Some(200), 48), (0, 48));
        assert_eq!(axis_window(150, Some(200), 48), (126, 48));
        assert_eq!(axis_window(199, Some(200), 48), (152, 48));
        assert_eq!(axis_window(3, Some(10), 48), (0, 10));
        assert_eq!(axis_window(i32::MIN, None, 48), (i32::MIN, 48));
    }

    #[test]
    fn notes_mark_empty_floor() {
        let machine = machine();
        let note = BoardMessage {
            id: Some("local-1".to_string()),
            text: "hi".to_string(),
            x: 56.0,
            y: 24.0,
            level: "default".to_string(),
            timestamp: None,
        };
        let rows = render_room(&machine, std::slice::from_ref(&note));
        assert_eq!(rows[1], "#@!*.#");
        assert_eq!(note_lines(&[note]), ["* (3,1) hi (unsent)"]);
    }

    #[test]
    fn status_shows_health_parts_and_board_off() {
        let machine = machine();
        let lines = status_lines(&machine, None);
        assert_eq!(lines[0], "room room1 [active]");
        assert_eq!(lines[1], "health 100/100  parts: Head ok, Arm ok, Leg ok");
        assert_eq!(lines.last().map(String::as_str), Some("board: off"));
    }
}
