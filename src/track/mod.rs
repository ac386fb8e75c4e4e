// Track - tick-sorted placements of parts
//
// A track never owns its parts. Each entry keeps a Weak reference to the
// part's shared state and registers the track as an observer on the part, so
// destroying the part removes its placements through remove_tick().

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::messaging::ChangeDispatcher;
use crate::part::{EventId, IdTable, Part, PartId, PartObserver, PartShared};
use crate::sequencer::lock::SeqLock;
use crate::sequencer::timeline::SongTiming;

/// Identifier of a track within its song
pub type TrackId = u32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    #[error("A part is already placed at tick {0}")]
    TickOccupied(u32),

    #[error("No placement at tick {0}")]
    NoSuchEntry(u32),
}

pub type TrackResult<T> = Result<T, TrackError>;

/// One placement of a part
#[derive(Debug, Clone)]
pub struct TrackEntry {
    pub tick: u32,
    pub id: EventId,
    part_id: PartId,
    part: Weak<PartShared>,
}

impl TrackEntry {
    pub fn part_id(&self) -> PartId {
        self.part_id
    }

    /// The placed part, `None` once it is gone
    pub fn part(&self) -> Option<Arc<PartShared>> {
        self.part.upgrade()
    }
}

/// Placement of a part with its effective duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackPart {
    pub tick: u32,
    pub id: EventId,
    pub part: PartId,
    pub duration: u32,
}

/// Placement list, guarded by the sequencer lock
#[derive(Debug, Default)]
pub struct TrackEntries {
    entries: Vec<TrackEntry>,
    ids: IdTable,
}

impl TrackEntries {
    fn search(&self, tick: u32) -> Result<usize, usize> {
        self.entries.binary_search_by(|entry| entry.tick.cmp(&tick))
    }

    pub fn entries(&self) -> &[TrackEntry] {
        &self.entries
    }

    /// Nearest entry starting at or before `tick`
    pub fn lookup_tick(&self, tick: u32) -> Option<&TrackEntry> {
        let end = self.entries.partition_point(|entry| entry.tick <= tick);
        end.checked_sub(1).map(|ix| &self.entries[ix])
    }

    /// Entry starting exactly at `tick`
    pub fn entry_at(&self, tick: u32) -> Option<&TrackEntry> {
        self.search(tick).ok().map(|ix| &self.entries[ix])
    }

    /// First entry starting after `tick`
    pub fn next_after(&self, tick: u32) -> Option<&TrackEntry> {
        let ix = self.entries.partition_point(|entry| entry.tick <= tick);
        self.entries.get(ix)
    }

    /// Part sounding at `tick` with its start and the start of the next entry
    pub fn part_at(&self, tick: u32) -> Option<(Arc<PartShared>, u32, Option<u32>)> {
        let entry = self.lookup_tick(tick)?;
        let next = self.next_after(tick).map(|next| next.tick);
        entry.part().map(|part| (part, entry.tick, next))
    }
}

/// Track state shared with parts and the sequencer thread
pub struct TrackShared {
    id: TrackId,
    me: Weak<TrackShared>,
    entries: SeqLock<TrackEntries>,
    muted: AtomicBool,
    dispatcher: ChangeDispatcher,
}

impl fmt::Debug for TrackShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackShared")
            .field("id", &self.id)
            .field("entries", &self.entries)
            .field("muted", &self.is_muted())
            .finish()
    }
}

impl TrackShared {
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// Placement list behind the sequencer lock
    pub fn entries(&self) -> &SeqLock<TrackEntries> {
        &self.entries
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    fn observer(&self) -> Weak<dyn PartObserver> {
        self.me.clone()
    }

    fn remove_tick(&self, tick: u32) -> Option<TrackEntry> {
        let removed = {
            let mut guard = self.entries.write();
            let entries = &mut *guard;
            let ix = entries.search(tick).ok()?;
            let removed = entries.entries.remove(ix);
            entries.ids.free(removed.id);
            removed
        };
        if let Some(part) = removed.part() {
            part.cross_unlink(&self.observer());
        }
        self.dispatcher.queue_links(removed.part_id);
        self.dispatcher.queue_track_changed(self.id);
        Some(removed)
    }
}

impl PartObserver for TrackShared {
    fn part_destroyed(&self, part: PartId) {
        let tick = self
            .entries
            .read()
            .entries
            .iter()
            .find(|entry| entry.part_id == part)
            .map(|entry| entry.tick);
        if let Some(tick) = tick {
            log::debug!("Track {}: removing placement of part {} at {}", self.id, part, tick);
            self.remove_tick(tick);
        }
    }
}

/// Editing handle of a track
pub struct Track {
    name: String,
    shared: Arc<TrackShared>,
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id())
            .field("name", &self.name)
            .finish()
    }
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>, dispatcher: ChangeDispatcher) -> Self {
        let shared = Arc::new_cyclic(|me| TrackShared {
            id,
            me: me.clone(),
            entries: SeqLock::new(TrackEntries::default()),
            muted: AtomicBool::new(false),
            dispatcher,
        });
        Self {
            name: name.into(),
            shared,
        }
    }

    pub fn id(&self) -> TrackId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Shared state for the sequencer thread
    pub fn shared(&self) -> &Arc<TrackShared> {
        &self.shared
    }

    pub fn is_muted(&self) -> bool {
        self.shared.is_muted()
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.shared.muted.store(muted, Ordering::Relaxed);
        self.shared.dispatcher.queue_track_changed(self.id());
    }

    pub fn len(&self) -> usize {
        self.shared.entries.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Place `part` at `tick`
    pub fn insert_part(&mut self, tick: u32, part: &Part) -> TrackResult<EventId> {
        let id = {
            let mut guard = self.shared.entries.write();
            let entries = &mut *guard;
            let ix = match entries.search(tick) {
                Ok(_) => return Err(TrackError::TickOccupied(tick)),
                Err(ix) => ix,
            };
            let id = entries.ids.alloc(tick);
            entries.entries.insert(
                ix,
                TrackEntry {
                    tick,
                    id,
                    part_id: part.id(),
                    part: Arc::downgrade(part.shared()),
                },
            );
            id
        };
        part.shared().cross_link(self.shared.observer());
        self.shared.dispatcher.queue_links(part.id());
        self.shared.dispatcher.queue_track_changed(self.id());
        Ok(id)
    }

    /// Remove the placement starting at `tick`
    pub fn remove_tick(&mut self, tick: u32) -> TrackResult<PartId> {
        self.shared
            .remove_tick(tick)
            .map(|entry| entry.part_id)
            .ok_or(TrackError::NoSuchEntry(tick))
    }

    /// Remove the placement with entry id `id`
    pub fn remove_link(&mut self, id: EventId) -> TrackResult<PartId> {
        let tick = self
            .shared
            .entries
            .read()
            .ids
            .tick_of(id)
            .ok_or(TrackError::NoSuchEntry(id.get()))?;
        self.remove_tick(tick)
    }

    /// Remove every placement
    pub fn clear(&mut self) {
        let ticks: Vec<u32> = self
            .shared
            .entries
            .read()
            .entries
            .iter()
            .map(|entry| entry.tick)
            .collect();
        for tick in ticks {
            self.shared.remove_tick(tick);
        }
    }

    /// Nearest placement starting at or before `tick`
    pub fn lookup_tick(&self, tick: u32) -> Option<TrackEntry> {
        self.shared.entries.read().lookup_tick(tick).cloned()
    }

    /// Placement starting exactly at `tick`
    pub fn entry_at(&self, tick: u32) -> Option<TrackEntry> {
        self.shared.entries.read().entry_at(tick).cloned()
    }

    /// Placement with entry id `id`
    pub fn find_link(&self, id: EventId) -> Option<TrackEntry> {
        let entries = self.shared.entries.read();
        let tick = entries.ids.tick_of(id)?;
        entries.entry_at(tick).filter(|entry| entry.id == id).cloned()
    }

    /// Start tick of the first placement of `part`
    pub fn find_part(&self, part: PartId) -> Option<u32> {
        self.shared
            .entries
            .read()
            .entries
            .iter()
            .find(|entry| entry.part_id == part)
            .map(|entry| entry.tick)
    }

    /// Part sounding at `tick`, its start, and the next placement's start
    pub fn part_at(&self, tick: u32) -> Option<(Arc<PartShared>, u32, Option<u32>)> {
        self.shared.entries.read().part_at(tick)
    }

    fn list_filtered(&self, timing: &SongTiming, filter: Option<PartId>) -> Vec<TrackPart> {
        let tpt = timing.tpt();
        let entries = self.shared.entries.read();
        let list = &entries.entries;
        list.iter()
            .enumerate()
            .filter(|(_, entry)| filter.is_none_or(|part| entry.part_id == part))
            .map(|(ix, entry)| {
                let part_ticks = entry.part().map_or(0, |part| part.last_tick());
                let mut duration = part_ticks.max(tpt);
                if let Some(next) = list.get(ix + 1) {
                    duration = duration.min(next.tick - entry.tick);
                }
                TrackPart {
                    tick: entry.tick,
                    id: entry.id,
                    part: entry.part_id,
                    duration,
                }
            })
            .collect()
    }

    /// Every placement with its effective duration
    ///
    /// A placement lasts at least one tact and is cut off by the next one.
    pub fn list_parts(&self, timing: &SongTiming) -> Vec<TrackPart> {
        self.list_filtered(timing, None)
    }

    /// Placements of one part
    pub fn list_part(&self, part: PartId, timing: &SongTiming) -> Vec<TrackPart> {
        self.list_filtered(timing, Some(part))
    }

    /// End of the last placement, 1 for an empty track
    pub fn last_tick(&self, timing: &SongTiming) -> u32 {
        let entries = self.shared.entries.read();
        match entries.entries.last() {
            Some(entry) => {
                let part_ticks = entry.part().map_or(0, |part| part.last_tick());
                entry.tick.saturating_add(part_ticks.max(timing.tpt()))
            }
            None => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::Notification;
    use crate::part::ChannelChoice;

    fn setup() -> (ChangeDispatcher, Part, Part, Track) {
        let dispatcher = ChangeDispatcher::new();
        let a = Part::new(1, "A", dispatcher.clone());
        let b = Part::new(2, "B", dispatcher.clone());
        let track = Track::new(10, "Track", dispatcher.clone());
        (dispatcher, a, b, track)
    }

    #[test]
    fn test_insert_and_lookup() {
        let (_, a, b, mut track) = setup();
        track.insert_part(0, &a).unwrap();
        track.insert_part(384, &b).unwrap();

        assert_eq!(track.lookup_tick(500).map(|e| e.part_id()), Some(2));
        assert_eq!(track.lookup_tick(383).map(|e| e.part_id()), Some(1));
        assert!(track.entry_at(383).is_none());
        assert_eq!(track.find_part(2), Some(384));
        assert_eq!(track.insert_part(384, &a), Err(TrackError::TickOccupied(384)));
        assert_eq!(a.shared().n_links(), 1);
    }

    #[test]
    fn test_destroy_cascade() {
        let (_, a, b, mut track) = setup();
        track.insert_part(0, &a).unwrap();
        track.insert_part(384, &b).unwrap();

        b.shared().notify_destroyed();
        assert_eq!(track.len(), 1);
        assert_eq!(track.lookup_tick(500).map(|e| e.part_id()), Some(1));
    }

    #[test]
    fn test_cascade_removes_every_placement() {
        let (_, a, _, mut track) = setup();
        track.insert_part(0, &a).unwrap();
        track.insert_part(1000, &a).unwrap();
        track.insert_part(5000, &a).unwrap();
        assert_eq!(a.shared().n_links(), 3);

        a.shared().notify_destroyed();
        assert!(track.is_empty());
    }

    #[test]
    fn test_remove_tick_unlinks() {
        let (dispatcher, a, _, mut track) = setup();
        let id = track.insert_part(100, &a).unwrap();
        dispatcher.dispatch();

        assert_eq!(track.find_link(id).map(|e| e.tick), Some(100));
        assert_eq!(track.remove_tick(100), Ok(1));
        assert_eq!(a.shared().n_links(), 0);
        assert_eq!(track.remove_tick(100), Err(TrackError::NoSuchEntry(100)));
        assert!(track.find_link(id).is_none());

        let batch = dispatcher.dispatch();
        assert!(batch.contains(&Notification::LinksChanged { part: 1 }));
        assert!(batch.contains(&Notification::TrackChanged { track: 10 }));
    }

    #[test]
    fn test_list_parts_durations() {
        let (_, mut a, b, mut track) = setup();
        let timing = SongTiming::default();
        a.insert_note(ChannelChoice::Auto, 0, 4000, 60, 0, 1.0)
            .unwrap();
        track.insert_part(0, &a).unwrap();
        track.insert_part(3000, &b).unwrap();
        track.insert_part(10000, &a).unwrap();

        let parts = track.list_parts(&timing);
        let durations: Vec<u32> = parts.iter().map(|p| p.duration).collect();
        // cut by the next placement, at least one tact, full length
        assert_eq!(durations, vec![3000, 1536, 4000]);
        assert_eq!(track.list_part(1, &timing).len(), 2);
        assert_eq!(track.last_tick(&timing), 14000);
    }

    #[test]
    fn test_last_tick_empty() {
        let (_, _, _, track) = setup();
        assert_eq!(track.last_tick(&SongTiming::default()), 1);
    }

    #[test]
    fn test_part_at() {
        let (_, a, b, mut track) = setup();
        track.insert_part(100, &a).unwrap();
        track.insert_part(500, &b).unwrap();

        assert!(track.part_at(50).is_none());
        let (part, start, next) = track.part_at(200).unwrap();
        assert_eq!((part.id(), start, next), (1, 100, Some(500)));
        let (part, start, next) = track.part_at(600).unwrap();
        assert_eq!((part.id(), start, next), (2, 500, None));
    }

    #[test]
    fn test_clear() {
        let (_, a, b, mut track) = setup();
        track.insert_part(0, &a).unwrap();
        track.insert_part(10, &b).unwrap();
        track.clear();
        assert!(track.is_empty());
        assert_eq!(a.shared().n_links(), 0);
        assert_eq!(b.shared().n_links(), 0);
    }
}
