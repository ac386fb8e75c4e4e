// Project persistence
// Event storage text format and the ZIP project container

pub mod manager;
pub mod storage;
pub mod types;

pub use manager::{LoadedProject, ProjectError, ProjectManager, validate_manifest};
pub use storage::{
    RestoreReport, StorageError, StorageResult, restore_part, restore_track, store_part,
    store_track,
};
pub use types::{PartManifest, ProjectManifest, ProjectVersion, TrackManifest};
