use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};
use world::{InMemoryRoomLayouts, RoomLayout, RoomLayoutSource};

const ROOM_FILE_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub(crate) enum RoomLoadError {
    #[error("failed to read room directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read room file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse room file {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("room file has no usable name: {0}")]
    BadFileName(PathBuf),
}

/// Loads every `<room_id>.json` under `dir`. Files that fail to load are
/// logged and skipped; only an unreadable directory is an error.
pub(crate) fn load_room_layouts(dir: &Path) -> Result<InMemoryRoomLayouts, RoomLoadError> {
    let entries = fs::read_dir(dir).map_err(|source| RoomLoadError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RoomLoadError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file()
            && path.extension().and_then(|ext| ext.to_str()) == Some(ROOM_FILE_EXTENSION)
        {
            paths.push(path);
        }
    }
    paths.sort();

    let mut layouts = InMemoryRoomLayouts::new();
    for path in paths {
        match load_room_file(&path) {
            Ok(layout) => {
                info!(
                    room = %layout.room_id,
                    entities = layout.entities.len(),
                    has_walls = layout.walls.is_some(),
                    "room_layout_loaded"
                );
                layouts.insert(layout);
            }
            Err(error) => warn!(error = %error, "room_layout_skipped"),
        }
    }
    Ok(layouts)
}

pub(crate) fn load_room_file(path: &Path) -> Result<RoomLayout, RoomLoadError> {
    let room_id = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| RoomLoadError::BadFileName(path.to_path_buf()))?
        .to_string();
    let raw = fs::read_to_string(path).map_err(|source| RoomLoadError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    let source: RoomLayoutSource =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            RoomLoadError::Parse {
                path: path.to_path_buf(),
                json_path: error.path().to_string(),
                source: error.into_inner(),
            }
        })?;

    Ok(RoomLayout::from_source(room_id, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use world::{EntityKind, GridPos, RoomLayoutProvider};

    const ROOM_JSON: &str = r#"{
        "wallData": [[1,1,1,1],[1,0,0,1],[1,1,1,1]],
        "entities": [
            { "id": "enemy1", "type": "enemy", "x": 2, "y": 1 }
        ]
    }"#;

    #[test]
    fn loads_rooms_keyed_by_file_stem() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("cellar.json"), ROOM_JSON).expect("write room");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write notes");

        let layouts = load_room_layouts(dir.path()).expect("layouts");
        assert_eq!(layouts.room_ids(), ["cellar"]);
        let cellar = layouts.layout("cellar").expect("cellar");
        assert_eq!(cellar.entities[0].kind, EntityKind::Enemy);
        assert!(cellar
            .walls
            .as_ref()
            .is_some_and(|walls| walls.is_walkable(GridPos::new(1, 1))));
    }

    #[test]
    fn broken_room_file_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("good.json"), ROOM_JSON).expect("write good");
        fs::write(
            dir.path().join("bad.json"),
            r#"{ "entities": [ { "id": "x", "type": "enemy", "x": "two", "y": 1 } ] }"#,
        )
        .expect("write bad");

        let layouts = load_room_layouts(dir.path()).expect("layouts");
        assert_eq!(layouts.room_ids(), ["good"]);
    }

    #[test]
    fn parse_error_reports_json_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{ "entities": [ { "id": "x", "type": "enemy", "x": "two", "y": 1 } ] }"#,
        )
        .expect("write bad");

        match load_room_file(&path) {
            Err(RoomLoadError::Parse { json_path, .. }) => assert_eq!(json_path, "entities[0].x"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope");
        assert!(matches!(
            load_room_layouts(&missing),
            Err(RoomLoadError::ReadDir { .. })
        ));
    }

    #[test]
    fn shipped_rooms_parse() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../assets/rooms");
        let layouts = load_room_layouts(&dir).expect("layouts");
        for room in ["room1", "room2", "room3"] {
            let layout = layouts.layout(room).expect("shipped room");
            assert!(layout.walls.is_some(), "{room} has walls");
        }
    }
}
