use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use world::{
    load_world, resolve_app_paths, AutosaveTimer, FileSaveStore, MemorySaveStore, SaveStore,
    StartupError, WorldMachine, WorldStateStore,
};

use super::message_board::{BoardClient, MessageBoard, DEFAULT_API_URL};
use super::rooms::{load_room_layouts, RoomLoadError};

const API_URL_ENV_VAR: &str = "DREAMLANDS_API_URL";
const AUTOSAVE_SECS_ENV_VAR: &str = "DREAMLANDS_AUTOSAVE_SECS";
const SAVE_ENV_VAR: &str = "DREAMLANDS_SAVE";
const BOARD_ENV_VAR: &str = "DREAMLANDS_BOARD";
const DEFAULT_AUTOSAVE_SECONDS: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SaveMode {
    File,
    Off,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SessionConfig {
    pub(crate) api_url: String,
    pub(crate) autosave_seconds: f32,
    pub(crate) save_mode: SaveMode,
    pub(crate) board_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            autosave_seconds: DEFAULT_AUTOSAVE_SECONDS,
            save_mode: SaveMode::File,
            board_enabled: true,
        }
    }
}

impl SessionConfig {
    pub(crate) fn from_env() -> Self {
        let read = |var: &str| std::env::var(var).ok();
        Self {
            api_url: parse_api_url(read(API_URL_ENV_VAR).as_deref()),
            autosave_seconds: parse_autosave_seconds(read(AUTOSAVE_SECS_ENV_VAR).as_deref()),
            save_mode: parse_save_mode(read(SAVE_ENV_VAR).as_deref()),
            board_enabled: parse_board_enabled(read(BOARD_ENV_VAR).as_deref()),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Rooms(#[from] RoomLoadError),
}

pub(crate) struct AppWiring {
    pub(crate) machine: WorldMachine,
    pub(crate) saves: Box<dyn SaveStore>,
    pub(crate) board: Option<MessageBoard>,
    pub(crate) autosave: AutosaveTimer,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Dreamlands Startup ===");

    let config = SessionConfig::from_env();
    let paths = resolve_app_paths()?;
    let layouts = load_room_layouts(&paths.rooms_dir)?;
    info!(
        root = %paths.root.display(),
        rooms = layouts.len(),
        save_mode = ?config.save_mode,
        autosave_seconds = config.autosave_seconds,
        board = config.board_enabled,
        "bootstrap_config"
    );

    let saves: Box<dyn SaveStore> = match config.save_mode {
        SaveMode::File => Box::new(FileSaveStore::new(paths.save_file())),
        SaveMode::Off => Box::new(MemorySaveStore::new()),
    };

    let mut store = WorldStateStore::new();
    load_world(&mut store, saves.as_ref());

    let mut machine = WorldMachine::new(store, Box::new(layouts));
    machine.start();

    let board = config.board_enabled.then(|| {
        let mut board = MessageBoard::new(BoardClient::new(&config.api_url));
        board.refresh();
        board
    });

    Ok(AppWiring {
        autosave: AutosaveTimer::new(config.autosave_seconds),
        machine,
        saves,
        board,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn parse_api_url(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            url.trim_end_matches('/').to_string()
        }
        Some(other) => {
            warn!(var = API_URL_ENV_VAR, value = other, "invalid_env_value");
            DEFAULT_API_URL.to_string()
        }
        None => DEFAULT_API_URL.to_string(),
    }
}

fn parse_autosave_seconds(raw: Option<&str>) -> f32 {
    let Some(raw) = raw else {
        return DEFAULT_AUTOSAVE_SECONDS;
    };
    match raw.trim().parse::<f32>() {
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => seconds,
        _ => {
            warn!(var = AUTOSAVE_SECS_ENV_VAR, value = raw, "invalid_env_value");
            DEFAULT_AUTOSAVE_SECONDS
        }
    }
}

fn parse_save_mode(raw: Option<&str>) -> SaveMode {
    match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        None | Some("file") => SaveMode::File,
        Some("off") => SaveMode::Off,
        Some(other) => {
            warn!(var = SAVE_ENV_VAR, value = other, "invalid_env_value");
            SaveMode::File
        }
    }
}

fn parse_board_enabled(raw: Option<&str>) -> bool {
    match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        None | Some("on") => true,
        Some("off") => false,
        Some(other) => {
            warn!(var = BOARD_ENV_VAR, value = other, "invalid_env_value");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_strips_trailing_slash() {
        assert_eq!(
            parse_api_url(Some("https://board.example/")),
            "https://board.example"
        );
        assert_eq!(parse_api_url(None), DEFAULT_API_URL);
        assert_eq!(parse_api_url(Some("ftp://nope")), DEFAULT_API_URL);
    }

    #[test]
    fn autosave_rejects_non_positive_values() {
        assert_eq!(parse_autosave_seconds(Some("15")), 15.0);
        assert_eq!(parse_autosave_seconds(Some("0")), DEFAULT_AUTOSAVE_SECONDS);
        assert_eq!(parse_autosave_seconds(Some("soon")), DEFAULT_AUTOSAVE_SECONDS);
        assert_eq!(parse_autosave_seconds(None), DEFAULT_AUTOSAVE_SECONDS);
    }

    #[test]
    fn save_mode_and_board_switches() {
        assert_eq!(parse_save_mode(Some("OFF")), SaveMode::Off);
        assert_eq!(parse_save_mode(Some("disk")), SaveMode::File);
        assert_eq!(parse_save_mode(None), SaveMode::File);

        assert!(!parse_board_enabled(Some("off")));
        assert!(parse_board_enabled(Some("maybe")));
        assert!(parse_board_enabled(None));
    }

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.autosave_seconds, 60.0);
        assert_eq!(config.save_mode, SaveMode::File);
        assert!(config.board_enabled);
    }
}
