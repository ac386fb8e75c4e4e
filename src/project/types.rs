// Types for project persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::part::PartId;
use crate::sequencer::timeline::SongTiming;
use crate::track::TrackId;

/// Project version information
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProjectVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn current() -> Self {
        Self::new(1, 0, 0)
    }

    /// Same major version; newer minor versions only add optional fields
    pub fn is_compatible(&self) -> bool {
        self.major == Self::current().major
    }
}

impl std::fmt::Display for ProjectVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Part entry of the manifest; events live in `parts/<id>.events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartManifest {
    pub id: PartId,
    pub name: String,
    pub channels: usize,
}

/// Track entry of the manifest; placements live in `tracks/<id>.events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackManifest {
    pub id: TrackId,
    pub name: String,
    #[serde(default)]
    pub muted: bool,
}

/// Contents of `manifest.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub name: String,
    /// Version of the project format
    pub version: ProjectVersion,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub timing: SongTiming,
    #[serde(default)]
    pub parts: Vec<PartManifest>,
    #[serde(default)]
    pub tracks: Vec<TrackManifest>,
}

impl ProjectManifest {
    pub fn part_file(id: PartId) -> String {
        format!("parts/{}.events", id)
    }

    pub fn track_file(id: TrackId) -> String {
        format!("tracks/{}.events", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_compatibility() {
        assert!(ProjectVersion::current().is_compatible());
        assert!(ProjectVersion::new(1, 7, 2).is_compatible());
        assert!(!ProjectVersion::new(2, 0, 0).is_compatible());
        assert_eq!(ProjectVersion::new(1, 2, 3).to_string(), "1.2.3");
    }

    #[test]
    fn test_manifest_json_defaults() {
        let json = r#"{
            "name": "Old",
            "version": {"major": 1, "minor": 0, "patch": 0},
            "created": "2024-01-01T00:00:00Z",
            "modified": "2024-01-02T00:00:00Z",
            "timing": {
                "tpqn": 96,
                "time_signature": {"numerator": 3, "denominator": 4},
                "tempo": {"bpm": 90.0}
            }
        }"#;
        let manifest: ProjectManifest = serde_json::from_str(json).unwrap();
        assert!(manifest.parts.is_empty());
        assert_eq!(manifest.timing.tpt(), 288);
        assert_eq!(ProjectManifest::part_file(4), "parts/4.events");
    }
}
