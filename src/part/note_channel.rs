// Note channel - one polyphonic voice lane of a part
// Tick-sorted note array; every note carries the ticks of the earlier notes
// of the same lane that still sound at its start (its "crossings").

use super::ids::EventId;

/// A note as stored in a channel
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    pub tick: u32,
    pub id: EventId,
    pub selected: bool,
    pub duration: u32,
    pub note: i32,
    pub fine_tune: i32,
    pub velocity: f32,
    crossings: Vec<u32>,
}

impl NoteEvent {
    pub fn new(
        id: EventId,
        tick: u32,
        duration: u32,
        note: i32,
        fine_tune: i32,
        velocity: f32,
    ) -> Self {
        Self {
            tick,
            id,
            selected: false,
            duration,
            note,
            fine_tune,
            velocity,
            crossings: Vec::new(),
        }
    }

    /// First tick after the note
    pub fn end_tick(&self) -> u32 {
        self.tick + self.duration
    }

    /// True if the note sounds at `tick`
    pub fn contains_tick(&self, tick: u32) -> bool {
        tick >= self.tick && tick < self.end_tick()
    }

    /// Start ticks of earlier notes overlapping this note's start
    ///
    /// Unordered.
    pub fn crossings(&self) -> &[u32] {
        &self.crossings
    }
}

/// Tick-sorted note lane, at most one note per start tick
#[derive(Debug, Clone, Default)]
pub struct NoteChannel {
    notes: Vec<NoteEvent>,
}

impl NoteChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// All notes in tick order
    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    fn search(&self, tick: u32) -> Result<usize, usize> {
        self.notes.binary_search_by(|note| note.tick.cmp(&tick))
    }

    /// Index of the note starting exactly at `tick`
    pub fn index_of(&self, tick: u32) -> Option<usize> {
        self.search(tick).ok()
    }

    /// Index of the first note starting at or after `tick` (`len()` if none)
    pub fn index_ge(&self, tick: u32) -> usize {
        self.notes.partition_point(|note| note.tick < tick)
    }

    pub fn lookup(&self, tick: u32) -> Option<&NoteEvent> {
        self.index_of(tick).map(|ix| &self.notes[ix])
    }

    /// First note starting at or after `tick`
    pub fn lookup_ge(&self, tick: u32) -> Option<&NoteEvent> {
        self.notes.get(self.index_ge(tick))
    }

    /// Last note starting at or before `tick`
    pub fn lookup_le(&self, tick: u32) -> Option<&NoteEvent> {
        let end = self.notes.partition_point(|note| note.tick <= tick);
        end.checked_sub(1).map(|ix| &self.notes[ix])
    }

    /// Last note starting strictly before `tick`
    pub fn lookup_lt(&self, tick: u32) -> Option<&NoteEvent> {
        self.index_ge(tick).checked_sub(1).map(|ix| &self.notes[ix])
    }

    /// Notes starting in `[tick, bound)`
    pub fn range(&self, tick: u32, bound: u32) -> &[NoteEvent] {
        let start = self.index_ge(tick);
        let end = self.index_ge(bound).max(start);
        &self.notes[start..end]
    }

    fn crossing_note(&self, tick: u32) -> &NoteEvent {
        match self.lookup(tick) {
            Some(note) => note,
            None => panic!("crossing references missing note at tick {}", tick),
        }
    }

    /// Notes starting before `tick` that still sound at `tick`
    pub fn sounding_before(&self, tick: u32) -> Vec<&NoteEvent> {
        let Some(pre) = self.lookup_lt(tick) else {
            return Vec::new();
        };
        let mut sounding: Vec<&NoteEvent> = pre
            .crossings
            .iter()
            .map(|&xtick| self.crossing_note(xtick))
            .filter(|xnote| xnote.end_tick() > tick)
            .collect();
        if pre.end_tick() > tick {
            sounding.push(pre);
        }
        sounding
    }

    /// Insert a note; the start tick must be free
    ///
    /// Returns the index of the new note.
    pub fn insert(&mut self, mut note: NoteEvent) -> usize {
        let ix = match self.search(note.tick) {
            Ok(_) => panic!("note channel slot at tick {} already occupied", note.tick),
            Err(ix) => ix,
        };

        let tick = note.tick;
        let bound = note.end_tick();
        note.crossings.clear();
        if ix > 0 {
            let pre = &self.notes[ix - 1];
            note.crossings.extend(
                pre.crossings
                    .iter()
                    .copied()
                    .filter(|&xtick| self.crossing_note(xtick).end_tick() > tick),
            );
            if pre.end_tick() > tick {
                note.crossings.push(pre.tick);
            }
        }

        self.notes.insert(ix, note);
        for next in &mut self.notes[ix + 1..] {
            if next.tick >= bound {
                break;
            }
            next.crossings.push(tick);
        }
        ix
    }

    /// Remove the note starting at `tick`; it must exist
    pub fn remove(&mut self, tick: u32) -> NoteEvent {
        let ix = match self.search(tick) {
            Ok(ix) => ix,
            Err(_) => panic!("no note at tick {} to remove", tick),
        };
        let bound = self.notes[ix].end_tick();
        for next in &mut self.notes[ix + 1..] {
            if next.tick >= bound {
                break;
            }
            match next.crossings.iter().position(|&xtick| xtick == tick) {
                Some(pos) => {
                    next.crossings.swap_remove(pos);
                }
                None => panic!(
                    "note at tick {} lacks crossing for tick {}",
                    next.tick, tick
                ),
            }
        }
        self.notes.remove(ix)
    }

    /// Update the payload of the note at `index`, keeping tick and duration
    ///
    /// Returns true if anything changed.
    pub fn change_note(
        &mut self,
        index: usize,
        selected: bool,
        note: i32,
        fine_tune: i32,
        velocity: f32,
    ) -> bool {
        let event = &mut self.notes[index];
        let changed = event.selected != selected
            || event.note != note
            || event.fine_tune != fine_tune
            || event.velocity != velocity;
        event.selected = selected;
        event.note = note;
        event.fine_tune = fine_tune;
        event.velocity = velocity;
        changed
    }

    /// Set the selection of the note at `index`, returns true on change
    pub fn set_selected(&mut self, index: usize, selected: bool) -> bool {
        let event = &mut self.notes[index];
        let changed = event.selected != selected;
        event.selected = selected;
        changed
    }

    /// End tick of the last sounding note, 0 for an empty lane
    pub fn last_tick(&self) -> u32 {
        let Some(last) = self.notes.last() else {
            return 0;
        };
        last.crossings
            .iter()
            .map(|&xtick| self.crossing_note(xtick).end_tick())
            .fold(last.end_tick(), u32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: u32, tick: u32, duration: u32) -> NoteEvent {
        NoteEvent::new(EventId::new(id).unwrap(), tick, duration, 60, 0, 1.0)
    }

    fn crossings_of(channel: &NoteChannel, tick: u32) -> Vec<u32> {
        let mut crossings = channel.lookup(tick).unwrap().crossings().to_vec();
        crossings.sort_unstable();
        crossings
    }

    #[test]
    fn test_sorted_insert() {
        let mut channel = NoteChannel::new();
        channel.insert(note(1, 200, 10));
        channel.insert(note(2, 0, 10));
        channel.insert(note(3, 100, 10));
        let ticks: Vec<u32> = channel.notes().iter().map(|n| n.tick).collect();
        assert_eq!(ticks, vec![0, 100, 200]);
    }

    #[test]
    #[should_panic(expected = "already occupied")]
    fn test_double_occupancy_panics() {
        let mut channel = NoteChannel::new();
        channel.insert(note(1, 0, 10));
        channel.insert(note(2, 0, 20));
    }

    #[test]
    fn test_lookups() {
        let mut channel = NoteChannel::new();
        channel.insert(note(1, 10, 5));
        channel.insert(note(2, 20, 5));

        assert_eq!(channel.lookup(10).map(|n| n.tick), Some(10));
        assert!(channel.lookup(15).is_none());
        assert_eq!(channel.lookup_ge(11).map(|n| n.tick), Some(20));
        assert!(channel.lookup_ge(21).is_none());
        assert_eq!(channel.lookup_le(19).map(|n| n.tick), Some(10));
        assert_eq!(channel.lookup_le(20).map(|n| n.tick), Some(20));
        assert_eq!(channel.lookup_lt(20).map(|n| n.tick), Some(10));
        assert!(channel.lookup_lt(10).is_none());
        assert_eq!(channel.range(10, 20).len(), 1);
        assert_eq!(channel.range(0, 100).len(), 2);
    }

    #[test]
    fn test_crossings_on_insert() {
        let mut channel = NoteChannel::new();
        channel.insert(note(1, 0, 100));
        channel.insert(note(2, 50, 10));
        channel.insert(note(3, 70, 50));
        channel.insert(note(4, 110, 5));

        assert_eq!(crossings_of(&channel, 50), vec![0]);
        assert_eq!(crossings_of(&channel, 70), vec![0]);
        assert_eq!(crossings_of(&channel, 110), vec![70]);
    }

    #[test]
    fn test_crossings_on_insert_before() {
        let mut channel = NoteChannel::new();
        channel.insert(note(1, 50, 10));
        channel.insert(note(2, 80, 10));
        channel.insert(note(3, 0, 85));

        assert_eq!(crossings_of(&channel, 50), vec![0]);
        assert_eq!(crossings_of(&channel, 80), vec![0]);
    }

    #[test]
    fn test_crossings_on_remove() {
        let mut channel = NoteChannel::new();
        channel.insert(note(1, 0, 100));
        channel.insert(note(2, 10, 100));
        channel.insert(note(3, 50, 10));

        assert_eq!(crossings_of(&channel, 50), vec![0, 10]);
        let removed = channel.remove(10);
        assert_eq!(removed.tick, 10);
        assert_eq!(crossings_of(&channel, 50), vec![0]);
        channel.remove(0);
        assert!(crossings_of(&channel, 50).is_empty());
    }

    #[test]
    fn test_sounding_before() {
        let mut channel = NoteChannel::new();
        channel.insert(note(1, 0, 100));
        channel.insert(note(2, 10, 5));
        channel.insert(note(3, 20, 50));

        let mut ticks: Vec<u32> = channel.sounding_before(30).iter().map(|n| n.tick).collect();
        ticks.sort_unstable();
        assert_eq!(ticks, vec![0, 20]);
        assert!(channel.sounding_before(0).is_empty());
    }

    #[test]
    fn test_last_tick() {
        let mut channel = NoteChannel::new();
        assert_eq!(channel.last_tick(), 0);
        channel.insert(note(1, 0, 1000));
        channel.insert(note(2, 10, 10));
        assert_eq!(channel.last_tick(), 1000);
        channel.remove(0);
        assert_eq!(channel.last_tick(), 20);
    }

    #[test]
    fn test_change_note_in_place() {
        let mut channel = NoteChannel::new();
        channel.insert(note(1, 0, 100));
        channel.insert(note(2, 50, 10));
        let ix = channel.index_of(50).unwrap();

        assert!(channel.change_note(ix, true, 72, 5, 0.5));
        assert!(!channel.change_note(ix, true, 72, 5, 0.5));
        let changed = channel.lookup(50).unwrap();
        assert_eq!(changed.note, 72);
        assert_eq!(changed.crossings(), &[0]);
    }
}
