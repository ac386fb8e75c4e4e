// Project manager for loading and saving songs
//
// A project is a ZIP container: manifest.json plus one event storage text
// file per part (parts/<id>.events) and per track (tracks/<id>.events).

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::Utc;
use zip::result::ZipError;
use zip::{ZipArchive, ZipWriter};

use crate::messaging::ChangeDispatcher;
use crate::project::storage::{
    RestoreReport, StorageError, restore_part, restore_track, store_part, store_track,
};
use crate::project::types::*;
use crate::song::{Song, SongError};

const MANIFEST_FILE: &str = "manifest.json";

/// Project error types
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Invalid project structure: {0}")]
    InvalidStructure(String),

    #[error("Unsupported project format version {0}")]
    InvalidVersion(ProjectVersion),

    #[error("Missing required file in project: {0}")]
    MissingFiles(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error in {file}: {source}")]
    Storage {
        file: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Song(#[from] SongError),
}

/// A loaded project: the song, its manifest and what restoring skipped
#[derive(Debug)]
pub struct LoadedProject {
    pub song: Song,
    pub manifest: ProjectManifest,
    pub report: RestoreReport,
}

/// Project manager - handles saving/loading projects
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectManager;

impl ProjectManager {
    pub fn new() -> Self {
        Self
    }

    /// Describe a song for manifest.json
    pub fn manifest_for(&self, song: &Song) -> ProjectManifest {
        let now = Utc::now();
        ProjectManifest {
            name: song.name().to_string(),
            version: ProjectVersion::current(),
            created: now,
            modified: now,
            timing: *song.timing(),
            parts: song
                .parts()
                .map(|part| PartManifest {
                    id: part.id(),
                    name: part.name().to_string(),
                    channels: part.n_channels(),
                })
                .collect(),
            tracks: song
                .tracks()
                .map(|track| TrackManifest {
                    id: track.id(),
                    name: track.name().to_string(),
                    muted: track.is_muted(),
                })
                .collect(),
        }
    }

    /// Save a song to a ZIP file
    ///
    /// Overwriting an existing project keeps its creation timestamp.
    pub fn save_project<P: AsRef<Path>>(&self, song: &Song, project_path: P) -> Result<(), ProjectError> {
        let project_path = project_path.as_ref();
        if let Some(dir) = project_path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }

        let mut manifest = self.manifest_for(song);
        if project_path.exists() {
            match self.read_manifest(project_path) {
                Ok(previous) => manifest.created = previous.created,
                Err(e) => log::warn!("Overwriting unreadable project {:?}: {}", project_path, e),
            }
        }

        let zip_file = File::create(project_path)?;
        let mut zip_writer = ZipWriter::new(zip_file);

        zip_writer.start_file(MANIFEST_FILE, file_options())?;
        zip_writer.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

        for part in song.parts() {
            zip_writer.start_file(ProjectManifest::part_file(part.id()), file_options())?;
            zip_writer.write_all(store_part(part).as_bytes())?;
        }
        for track in song.tracks() {
            zip_writer.start_file(ProjectManifest::track_file(track.id()), file_options())?;
            zip_writer.write_all(store_track(track, song).as_bytes())?;
        }

        zip_writer.finish().map_err(ProjectError::Zip)?;
        log::debug!(
            "Saved project '{}' ({} parts, {} tracks) to {:?}",
            manifest.name,
            manifest.parts.len(),
            manifest.tracks.len(),
            project_path
        );
        Ok(())
    }

    /// Read only the manifest of a project file
    pub fn read_manifest<P: AsRef<Path>>(&self, project_path: P) -> Result<ProjectManifest, ProjectError> {
        let mut zip_archive = ZipArchive::new(File::open(project_path)?)?;
        let manifest_json = read_entry(&mut zip_archive, MANIFEST_FILE)?;
        Ok(serde_json::from_str(&manifest_json)?)
    }

    /// Load a project into a new song using `dispatcher`
    pub fn load_project<P: AsRef<Path>>(
        &self,
        project_path: P,
        dispatcher: ChangeDispatcher,
    ) -> Result<LoadedProject, ProjectError> {
        let mut zip_archive = ZipArchive::new(File::open(project_path.as_ref())?)?;

        let manifest_json = read_entry(&mut zip_archive, MANIFEST_FILE)?;
        let manifest: ProjectManifest = serde_json::from_str(&manifest_json)?;
        validate_manifest(&manifest)?;

        let mut song = Song::new(manifest.name.clone(), dispatcher);
        song.set_timing(manifest.timing);
        let mut report = RestoreReport::default();

        for entry in &manifest.parts {
            song.create_part_with_id(entry.id, entry.name.clone())?;
            let file = ProjectManifest::part_file(entry.id);
            let text = read_entry(&mut zip_archive, &file)?;
            let part = song.get_part_mut(entry.id)?;
            part.set_channel_count(entry.channels)
                .map_err(SongError::from)?;
            let restored =
                restore_part(part, &text).map_err(|source| ProjectError::Storage { file, source })?;
            merge_report(&mut report, restored);
        }

        for entry in &manifest.tracks {
            song.create_track_with_id(entry.id, entry.name.clone())?;
            if let Some(track) = song.track_mut(entry.id) {
                track.set_muted(entry.muted);
            }
            let file = ProjectManifest::track_file(entry.id);
            let text = read_entry(&mut zip_archive, &file)?;
            let restored = restore_track(&mut song, entry.id, &text)
                .map_err(|source| ProjectError::Storage { file, source })?;
            merge_report(&mut report, restored);
        }

        if report.skipped > 0 {
            log::warn!(
                "Project '{}' loaded with {} skipped statements",
                manifest.name,
                report.skipped
            );
        }
        Ok(LoadedProject {
            song,
            manifest,
            report,
        })
    }
}

fn file_options() -> zip::write::FileOptions<'static, ()> {
    zip::write::FileOptions::default()
}

fn read_entry(zip_archive: &mut ZipArchive<File>, name: &str) -> Result<String, ProjectError> {
    let mut entry = match zip_archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Err(ProjectError::MissingFiles(name.to_string())),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Ok(text)
}

fn merge_report(total: &mut RestoreReport, part: RestoreReport) {
    total.notes += part.notes;
    total.controls += part.controls;
    total.parts += part.parts;
    total.skipped += part.skipped;
}

/// Check a manifest before building a song from it
pub fn validate_manifest(manifest: &ProjectManifest) -> Result<(), ProjectError> {
    if !manifest.version.is_compatible() {
        return Err(ProjectError::InvalidVersion(manifest.version));
    }

    let timing = &manifest.timing;
    if timing.tpqn == 0 {
        return Err(ProjectError::InvalidStructure(
            "ticks per quarter note must be > 0".to_string(),
        ));
    }
    if timing.time_signature.numerator == 0 || !timing.time_signature.denominator.is_power_of_two() {
        return Err(ProjectError::InvalidStructure(format!(
            "invalid time signature {}",
            timing.time_signature
        )));
    }

    let mut part_ids = std::collections::HashSet::new();
    for part in &manifest.parts {
        if !part_ids.insert(part.id) {
            return Err(ProjectError::InvalidStructure(format!(
                "Duplicate part ID: {}",
                part.id
            )));
        }
    }
    let mut track_ids = std::collections::HashSet::new();
    for track in &manifest.tracks {
        if !track_ids.insert(track.id) {
            return Err(ProjectError::InvalidStructure(format!(
                "Duplicate track ID: {}",
                track.id
            )));
        }
    }
    Ok(())
}
