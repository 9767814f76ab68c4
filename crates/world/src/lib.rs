use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod combat;
pub mod room;
pub mod state;

pub use app::{
    Controller, InputAction, InputSnapshot, TickReport, WorldContext, WorldMachine,
    WorldMachineFocus,
};
pub use combat::{
    apply_combat_outcome, CombatCommand, CombatController, CombatPhase, CombatResult,
    CombatSession, DEFEAT_PENALTY, VICTORY_RECOVERY,
};
pub use room::{
    Direction, EntityRegistry, EntityState, GridPos, InMemoryRoomLayouts, LayoutEntity,
    LayoutError, LiveEntity, MoveOutcome, MoveRejection, MovementResolver, Mover, PixelPos,
    ProximityStateMachine, ProximityTransition, RoomCommand, RoomController, RoomLayout,
    RoomLayoutProvider, RoomLayoutSource, RoomPhase, VisualCue, WallGrid, DEFAULT_ROOM_ID,
    DEFAULT_SPAWN_TILE, MOVE_DURATION_SECONDS, TILE_SIZE_PX,
};
pub use state::{
    load_world, save_world, AutosaveTimer, BodyPart, BodyPartStatus, EntityKind, EntityPatch,
    EntityRecord, FileSaveStore, MemorySaveStore, PersistenceError, PlayerPatch, PlayerState,
    Properties, SaveStore, SaveTrigger, StoreError, TransitionStaging, WorldStateStore,
    MAX_HEALTH,
};

pub const ROOT_ENV_VAR: &str = "DREAMLANDS_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub rooms_dir: PathBuf,
    pub save_dir: PathBuf,
}

impl AppPaths {
    pub fn save_file(&self) -> PathBuf {
        self.save_dir.join("dreamlands.save.json")
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "DREAMLANDS_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/dreamlands\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let rooms_dir = root.join("assets").join("rooms");
    let save_dir = root.join("cache").join("saves");

    fs::create_dir_all(&save_dir).map_err(|source| StartupError::CreateSaveDir {
        path: save_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        rooms_dir,
        save_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(&PathBuf::from(value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
