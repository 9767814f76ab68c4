mod persistence;
mod store;

pub use persistence::{
    load_world, save_world, AutosaveTimer, FileSaveStore, MemorySaveStore, PersistenceError,
    SaveStore, SaveTrigger,
};
pub use store::{
    BodyPart, BodyPartStatus, EntityKind, EntityPatch, EntityRecord, PlayerPatch, PlayerState,
    Properties, StoreError, TransitionStaging, WorldStateStore, MAX_HEALTH,
};
