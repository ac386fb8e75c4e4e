// Song - owner of parts and tracks
// Timing, part lifetime with cascade into tracks, and playback preparation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::messaging::ChangeDispatcher;
use crate::part::{EventId, Part, PartError, PartId};
use crate::sequencer::note::{MAX_NOTE, MIN_NOTE};
use crate::sequencer::timeline::SongTiming;
use crate::track::{Track, TrackError, TrackId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SongError {
    #[error("No part with id {0}")]
    NoSuchPart(PartId),

    #[error("No track with id {0}")]
    NoSuchTrack(TrackId),

    #[error("Part id {0} is already in use")]
    DuplicatePart(PartId),

    #[error("Track id {0} is already in use")]
    DuplicateTrack(TrackId),

    #[error(transparent)]
    Part(#[from] PartError),

    #[error(transparent)]
    Track(#[from] TrackError),
}

pub type SongResult<T> = Result<T, SongError>;

/// One placement of a part, as seen from the part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartLink {
    pub track: TrackId,
    pub tick: u32,
    pub id: EventId,
    pub duration: u32,
}

/// Container of parts and tracks sharing one timing and one dispatcher
#[derive(Debug)]
pub struct Song {
    name: String,
    timing: SongTiming,
    parts: BTreeMap<PartId, Part>,
    tracks: BTreeMap<TrackId, Track>,
    next_part_id: PartId,
    next_track_id: TrackId,
    default_channels: usize,
    dispatcher: ChangeDispatcher,
    prepared: bool,
}

impl Song {
    pub fn new(name: impl Into<String>, dispatcher: ChangeDispatcher) -> Self {
        Self {
            name: name.into(),
            timing: SongTiming::default(),
            parts: BTreeMap::new(),
            tracks: BTreeMap::new(),
            next_part_id: 1,
            next_track_id: 1,
            default_channels: 1,
            dispatcher,
            prepared: false,
        }
    }

    /// Song using the timing and part defaults of a configuration
    pub fn from_config(
        name: impl Into<String>,
        config: &StoreConfig,
        dispatcher: ChangeDispatcher,
    ) -> Self {
        let mut song = Self::new(name, dispatcher);
        song.timing = config.timing();
        song.default_channels = config.part_channels.max(1);
        song
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn dispatcher(&self) -> &ChangeDispatcher {
        &self.dispatcher
    }

    pub fn timing(&self) -> &SongTiming {
        &self.timing
    }

    pub fn set_timing(&mut self, timing: SongTiming) {
        self.timing = timing;
        let parts: Vec<PartId> = self.parts.keys().copied().collect();
        for part in parts {
            self.dispatcher.queue_links(part);
        }
    }

    /// Ticks per tact
    pub fn tpt(&self) -> u32 {
        self.timing.tpt()
    }

    // Parts

    /// Create an empty part, returning its id
    pub fn create_part(&mut self, name: impl Into<String>) -> PartId {
        let id = self.next_part_id;
        self.insert_new_part(id, name.into());
        id
    }

    /// Create an empty part with a given id
    pub fn create_part_with_id(&mut self, id: PartId, name: impl Into<String>) -> SongResult<()> {
        if self.parts.contains_key(&id) {
            return Err(SongError::DuplicatePart(id));
        }
        self.insert_new_part(id, name.into());
        Ok(())
    }

    fn insert_new_part(&mut self, id: PartId, name: String) {
        let mut part = Part::with_channels(id, name, self.default_channels, self.dispatcher.clone());
        part.set_prepared(self.prepared);
        self.parts.insert(id, part);
        self.next_part_id = self.next_part_id.max(id + 1);
        log::debug!("Created part {}", id);
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(&id)
    }

    pub fn part_mut(&mut self, id: PartId) -> Option<&mut Part> {
        self.parts.get_mut(&id)
    }

    /// Same as [`part_mut`](Self::part_mut) with a typed error
    pub fn get_part_mut(&mut self, id: PartId) -> SongResult<&mut Part> {
        self.parts.get_mut(&id).ok_or(SongError::NoSuchPart(id))
    }

    pub fn get_part(&self, id: PartId) -> SongResult<&Part> {
        self.parts.get(&id).ok_or(SongError::NoSuchPart(id))
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    pub fn find_part_by_name(&self, name: &str) -> Option<&Part> {
        self.parts.values().find(|part| part.name() == name)
    }

    /// Destroy a part; every track placement of it is removed first
    pub fn destroy_part(&mut self, id: PartId) -> SongResult<()> {
        self.detach_part(id)?;
        log::debug!("Destroyed part {}", id);
        Ok(())
    }

    /// Take a part out of the song with the same cascade as destruction
    ///
    /// The part keeps its events and ids; pending notifications for it are
    /// dropped.
    pub fn detach_part(&mut self, id: PartId) -> SongResult<Part> {
        let part = self.parts.remove(&id).ok_or(SongError::NoSuchPart(id))?;
        part.shared().notify_destroyed();
        self.dispatcher.forget_part(id);
        Ok(part)
    }

    /// Put a detached part back under its own id
    pub fn attach_part(&mut self, mut part: Part) -> SongResult<()> {
        let id = part.id();
        if self.parts.contains_key(&id) {
            return Err(SongError::DuplicatePart(id));
        }
        part.set_prepared(self.prepared);
        let bound = part.last_tick();
        if bound > 0 {
            self.dispatcher.queue_range(id, 0, bound, MIN_NOTE, MAX_NOTE);
        }
        self.parts.insert(id, part);
        self.next_part_id = self.next_part_id.max(id + 1);
        log::debug!("Attached part {}", id);
        Ok(())
    }

    // Tracks

    pub fn create_track(&mut self, name: impl Into<String>) -> TrackId {
        let id = self.next_track_id;
        self.insert_new_track(id, name.into());
        id
    }

    pub fn create_track_with_id(&mut self, id: TrackId, name: impl Into<String>) -> SongResult<()> {
        if self.tracks.contains_key(&id) {
            return Err(SongError::DuplicateTrack(id));
        }
        self.insert_new_track(id, name.into());
        Ok(())
    }

    fn insert_new_track(&mut self, id: TrackId, name: String) {
        self.tracks
            .insert(id, Track::new(id, name, self.dispatcher.clone()));
        self.next_track_id = self.next_track_id.max(id + 1);
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Remove a track and unlink all its placements
    pub fn remove_track(&mut self, id: TrackId) -> SongResult<()> {
        let mut track = self.tracks.remove(&id).ok_or(SongError::NoSuchTrack(id))?;
        track.clear();
        Ok(())
    }

    /// Place a part on a track
    pub fn place_part(&mut self, track: TrackId, tick: u32, part: PartId) -> SongResult<EventId> {
        let part = self.parts.get(&part).ok_or(SongError::NoSuchPart(part))?;
        let track = self
            .tracks
            .get_mut(&track)
            .ok_or(SongError::NoSuchTrack(track))?;
        Ok(track.insert_part(tick, part)?)
    }

    /// Remove the placement at `tick` of a track, returning the part it held
    pub fn remove_placement(&mut self, track: TrackId, tick: u32) -> SongResult<PartId> {
        let track = self
            .tracks
            .get_mut(&track)
            .ok_or(SongError::NoSuchTrack(track))?;
        Ok(track.remove_tick(tick)?)
    }

    /// Every placement of a part, ordered by tick, duration, then track
    pub fn list_part_links(&self, part: PartId) -> Vec<PartLink> {
        let mut links: Vec<PartLink> = self
            .tracks
            .values()
            .flat_map(|track| {
                track
                    .list_part(part, &self.timing)
                    .into_iter()
                    .map(|placed| PartLink {
                        track: track.id(),
                        tick: placed.tick,
                        id: placed.id,
                        duration: placed.duration,
                    })
            })
            .collect();
        links.sort_by_key(|link| (link.tick, link.duration, link.track));
        links
    }

    /// End of the song: the latest track end
    pub fn last_tick(&self) -> u32 {
        self.tracks
            .values()
            .map(|track| track.last_tick(&self.timing))
            .max()
            .unwrap_or(0)
    }

    // Playback

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Enter playback; channel reduction and retuning are refused until
    /// [`unprepare`](Self::unprepare)
    pub fn prepare(&mut self) {
        self.set_prepared(true);
    }

    pub fn unprepare(&mut self) {
        self.set_prepared(false);
    }

    fn set_prepared(&mut self, prepared: bool) {
        self.prepared = prepared;
        for part in self.parts.values_mut() {
            part.set_prepared(prepared);
        }
    }
}
