// Part - reusable timeline region holding notes and controls
//
// The event storage (ids, controls, note channels, last tick) sits behind the
// sequencer lock in PartShared, which the sequencer thread reads directly.
// Part is the editing handle: every mutation takes the write guard, publishes,
// releases, and only then queues a change notification.

pub mod controls;
pub mod ids;
mod listing;
pub mod note_channel;
pub mod query;
mod selection;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::messaging::ChangeDispatcher;
use crate::sequencer::control::ControlType;
use crate::sequencer::lock::SeqLock;
use crate::sequencer::note::{
    MAX_CHANNELS, MAX_FINE_TUNE, MAX_NOTE, MAX_TICK, MIN_FINE_TUNE, MIN_NOTE, SemitoneTable,
    fine_tune_is_valid, note_is_valid,
};

pub use controls::{ControlEvent, ControlIndex, TickNode};
pub use ids::{EventId, IdTable};
pub use note_channel::{NoteChannel, NoteEvent};
pub use query::{ChannelChoice, ChannelFilter, EventType, PartControl, PartNote, QueryEvent};

/// Identifier of a part within its song
pub type PartId = u32;

/// Errors returned by part operations
///
/// No operation mutates the part when it returns an error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PartError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Channel {channel} already holds a note at tick {tick}")]
    SlotTaken { channel: usize, tick: u32 },

    #[error("A {control_type} control already exists at tick {tick}")]
    ControlTaken { tick: u32, control_type: ControlType },

    #[error("Invalid event id {0}")]
    InvalidId(u32),

    #[error("Part is prepared for playback")]
    Busy,
}

pub type PartResult<T> = Result<T, PartError>;

/// Listener told when a part is destroyed
///
/// Tracks register one observer per placement of the part.
pub trait PartObserver: Send + Sync {
    fn part_destroyed(&self, part: PartId);
}

/// Event storage of a part, guarded by the sequencer lock
#[derive(Debug, Clone)]
pub struct PartEvents {
    pub(crate) ids: IdTable,
    pub(crate) controls: ControlIndex,
    pub(crate) channels: Vec<NoteChannel>,
    pub(crate) last_tick: u32,
    pub(crate) semitones: SemitoneTable,
}

impl PartEvents {
    fn new(n_channels: usize) -> Self {
        Self {
            ids: IdTable::new(),
            controls: ControlIndex::new(),
            channels: vec![NoteChannel::new(); n_channels.max(1)],
            last_tick: 0,
            semitones: SemitoneTable::default(),
        }
    }

    pub fn channels(&self) -> &[NoteChannel] {
        &self.channels
    }

    pub fn controls(&self) -> &ControlIndex {
        &self.controls
    }

    pub fn ids(&self) -> &IdTable {
        &self.ids
    }

    pub fn last_tick(&self) -> u32 {
        self.last_tick
    }

    pub fn semitones(&self) -> &SemitoneTable {
        &self.semitones
    }

    /// Channel and index of the note behind `id`
    pub fn find_note(&self, id: EventId) -> Option<(usize, usize)> {
        let tick = self.ids.tick_of(id)?;
        self.channels.iter().enumerate().find_map(|(channel, lane)| {
            lane.index_of(tick)
                .filter(|&ix| lane.notes()[ix].id == id)
                .map(|ix| (channel, ix))
        })
    }

    fn ensure_channels(&mut self, n_channels: usize) {
        if self.channels.len() < n_channels {
            self.channels.resize_with(n_channels, NoteChannel::new);
        }
    }

    /// First channel from `start` on with no note at `tick`, growing if needed
    /// First channel free at `tick`, growing the lane list up to
    /// `MAX_CHANNELS`
    fn free_channel(&mut self, tick: u32, start: usize) -> PartResult<usize> {
        let free = (start..self.channels.len()).find(|&c| self.channels[c].lookup(tick).is_none());
        match free {
            Some(channel) => Ok(channel),
            None => {
                let channel = self.channels.len().max(start);
                if channel >= MAX_CHANNELS {
                    return Err(PartError::InvalidArgument(format!(
                        "all {} channels are taken at tick {}",
                        MAX_CHANNELS, tick
                    )));
                }
                self.ensure_channels(channel + 1);
                Ok(channel)
            }
        }
    }

    fn compute_last_tick(&self) -> u32 {
        self.channels
            .iter()
            .map(NoteChannel::last_tick)
            .fold(self.controls.last_tick(), u32::max)
    }

    /// Recompute the last tick, returns true on change
    fn update_last_tick(&mut self) -> bool {
        let last_tick = self.compute_last_tick();
        let changed = last_tick != self.last_tick;
        self.last_tick = last_tick;
        changed
    }
}

/// Part state shared with tracks and the sequencer thread
pub struct PartShared {
    id: PartId,
    events: SeqLock<PartEvents>,
    observers: Mutex<Vec<Weak<dyn PartObserver>>>,
}

impl fmt::Debug for PartShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartShared")
            .field("id", &self.id)
            .field("events", &self.events)
            .finish()
    }
}

impl PartShared {
    pub fn id(&self) -> PartId {
        self.id
    }

    /// Event storage behind the sequencer lock
    pub fn events(&self) -> &SeqLock<PartEvents> {
        &self.events
    }

    pub fn last_tick(&self) -> u32 {
        self.events.read().last_tick
    }

    /// Register an observer, once per link
    pub fn cross_link(&self, observer: Weak<dyn PartObserver>) {
        log::trace!("Cross-linking part {}", self.id);
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Remove one registration of an observer
    pub fn cross_unlink(&self, observer: &Weak<dyn PartObserver>) {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = observers.iter().position(|o| Weak::ptr_eq(o, observer)) {
            observers.swap_remove(pos);
            log::trace!("Cross-unlinked part {}", self.id);
        }
    }

    pub fn n_links(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Tell every linked observer that the part is going away
    pub(crate) fn notify_destroyed(&self) {
        let observers =
            std::mem::take(&mut *self.observers.lock().unwrap_or_else(PoisonError::into_inner));
        log::debug!("Part {} destroyed, {} links to undo", self.id, observers.len());
        for observer in observers.iter().filter_map(Weak::upgrade) {
            observer.part_destroyed(self.id);
        }
    }
}

fn check_note_args(tick: u32, duration: u32, note: i32, fine_tune: i32, velocity: f32) -> PartResult<()> {
    if !note_is_valid(note) {
        return Err(PartError::InvalidArgument(format!("note {} out of range", note)));
    }
    if !fine_tune_is_valid(fine_tune) {
        return Err(PartError::InvalidArgument(format!(
            "fine tune {} out of range",
            fine_tune
        )));
    }
    if !(0.0..=1.0).contains(&velocity) {
        return Err(PartError::InvalidArgument(format!(
            "velocity {} out of range",
            velocity
        )));
    }
    if tick >= MAX_TICK
        || duration == 0
        || duration >= MAX_TICK
        || tick as u64 + duration as u64 > MAX_TICK as u64
    {
        return Err(PartError::InvalidArgument(format!(
            "note span {}+{} out of range",
            tick, duration
        )));
    }
    Ok(())
}

fn check_control_args(tick: u32, control_type: ControlType, value: f32) -> PartResult<()> {
    if tick >= MAX_TICK {
        return Err(PartError::InvalidArgument(format!("tick {} out of range", tick)));
    }
    if !control_type.is_valid() {
        return Err(PartError::InvalidArgument(format!(
            "malformed control type {:?}",
            control_type
        )));
    }
    if !(-1.0..=1.0).contains(&value) {
        return Err(PartError::InvalidArgument(format!(
            "control value {} out of range",
            value
        )));
    }
    Ok(())
}

/// Editing handle of a part
pub struct Part {
    name: String,
    shared: Arc<PartShared>,
    dispatcher: ChangeDispatcher,
    prepared: bool,
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("id", &self.id())
            .field("name", &self.name)
            .field("prepared", &self.prepared)
            .finish()
    }
}

impl Part {
    /// New part with a single note channel
    pub fn new(id: PartId, name: impl Into<String>, dispatcher: ChangeDispatcher) -> Self {
        Self::with_channels(id, name, 1, dispatcher)
    }

    pub fn with_channels(
        id: PartId,
        name: impl Into<String>,
        n_channels: usize,
        dispatcher: ChangeDispatcher,
    ) -> Self {
        let n_channels = n_channels.clamp(1, MAX_CHANNELS);
        Self {
            name: name.into(),
            shared: Arc::new(PartShared {
                id,
                events: SeqLock::new(PartEvents::new(n_channels)),
                observers: Mutex::new(Vec::new()),
            }),
            dispatcher,
            prepared: false,
        }
    }

    pub fn id(&self) -> PartId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Shared state for tracks and the sequencer thread
    pub fn shared(&self) -> &Arc<PartShared> {
        &self.shared
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub(crate) fn set_prepared(&mut self, prepared: bool) {
        self.prepared = prepared;
    }

    pub fn n_channels(&self) -> usize {
        self.shared.events.read().channels.len()
    }

    /// One past the end of the last event
    pub fn last_tick(&self) -> u32 {
        self.shared.events.read().last_tick
    }

    /// Grow or shrink the number of note channels
    ///
    /// Notes in removed channels are deleted. Shrinking is refused while the
    /// part is prepared for playback.
    pub fn set_channel_count(&mut self, n_channels: usize) -> PartResult<()> {
        if n_channels == 0 || n_channels > MAX_CHANNELS {
            return Err(PartError::InvalidArgument(format!(
                "channel count {} out of range",
                n_channels
            )));
        }
        let (dropped, last_tick_changed) = {
            let mut guard = self.shared.events.write();
            let events = &mut *guard;
            if n_channels >= events.channels.len() {
                events.ensure_channels(n_channels);
                return Ok(());
            }
            if self.prepared {
                return Err(PartError::Busy);
            }
            let dropped: Vec<NoteEvent> = events
                .channels
                .drain(n_channels..)
                .flat_map(|lane| lane.notes().to_vec())
                .collect();
            for note in &dropped {
                events.ids.free(note.id);
            }
            (dropped, events.update_last_tick())
        };
        for note in &dropped {
            self.queue_update(note.tick, note.duration, note.note);
        }
        if last_tick_changed {
            self.queue_links();
        }
        Ok(())
    }

    /// Replace the tuning table; refused while prepared for playback
    pub fn set_semitone_table(&mut self, table: SemitoneTable) -> PartResult<()> {
        if self.prepared {
            return Err(PartError::Busy);
        }
        self.shared.events.write().semitones = table;
        Ok(())
    }

    pub fn semitone_factor(&self, note: i32) -> f64 {
        self.shared.events.read().semitones.note_factor(note)
    }

    pub fn note_frequency(&self, note: i32, fine_tune: i32) -> f64 {
        self.shared
            .events
            .read()
            .semitones
            .note_frequency(note, fine_tune)
    }

    /// Insert a note, returning its new id
    pub fn insert_note(
        &mut self,
        channel: ChannelChoice,
        tick: u32,
        duration: u32,
        note: i32,
        fine_tune: i32,
        velocity: f32,
    ) -> PartResult<EventId> {
        check_note_args(tick, duration, note, fine_tune, velocity)?;

        let (id, last_tick_changed) = {
            let mut guard = self.shared.events.write();
            let events = &mut *guard;
            let channel = match channel {
                ChannelChoice::Fixed(channel) => {
                    if channel >= MAX_CHANNELS {
                        return Err(PartError::InvalidArgument(format!(
                            "channel {} out of range",
                            channel
                        )));
                    }
                    if events
                        .channels
                        .get(channel)
                        .is_some_and(|lane| lane.lookup(tick).is_some())
                    {
                        return Err(PartError::SlotTaken { channel, tick });
                    }
                    events.ensure_channels(channel + 1);
                    channel
                }
                ChannelChoice::Auto => events.free_channel(tick, 0)?,
            };
            let id = events.ids.alloc(tick);
            events.channels[channel].insert(NoteEvent::new(
                id, tick, duration, note, fine_tune, velocity,
            ));
            let last_tick_changed =
                tick + duration >= events.last_tick && events.update_last_tick();
            (id, last_tick_changed)
        };

        self.queue_update(tick, duration, note);
        if last_tick_changed {
            self.queue_links();
        }
        Ok(id)
    }

    /// Move and/or modify a note
    ///
    /// With a fixed channel the target slot must be free or already hold
    /// this note. `Auto` keeps the current channel when possible.
    #[allow(clippy::too_many_arguments)]
    pub fn change_note(
        &mut self,
        id: EventId,
        channel: ChannelChoice,
        tick: u32,
        duration: u32,
        note: i32,
        fine_tune: i32,
        velocity: f32,
    ) -> PartResult<()> {
        check_note_args(tick, duration, note, fine_tune, velocity)?;

        let (old, last_tick_changed) = {
            let mut guard = self.shared.events.write();
            let events = &mut *guard;
            let (old_channel, old_ix) = events
                .find_note(id)
                .ok_or(PartError::InvalidId(id.get()))?;
            let old = events.channels[old_channel].notes()[old_ix].clone();

            let slot_free = |events: &PartEvents, channel: usize| {
                events.channels[channel]
                    .lookup(tick)
                    .is_none_or(|occupant| occupant.id == id)
            };
            let target = match channel {
                ChannelChoice::Fixed(channel) => {
                    if channel >= events.channels.len() {
                        return Err(PartError::InvalidArgument(format!(
                            "no channel {}",
                            channel
                        )));
                    }
                    if !slot_free(events, channel) {
                        return Err(PartError::SlotTaken { channel, tick });
                    }
                    channel
                }
                ChannelChoice::Auto => {
                    if slot_free(events, old_channel) {
                        old_channel
                    } else {
                        events.free_channel(tick, 0)?
                    }
                }
            };

            if target == old_channel && old.tick == tick && old.duration == duration {
                events.channels[target].change_note(old_ix, old.selected, note, fine_tune, velocity);
                (old, false)
            } else {
                events.channels[old_channel].remove(old.tick);
                events.ids.move_id(id, tick);
                let mut moved = NoteEvent::new(id, tick, duration, note, fine_tune, velocity);
                moved.selected = old.selected;
                events.channels[target].insert(moved);
                let reach = old.end_tick().max(tick + duration);
                let last_tick_changed = reach >= events.last_tick && events.update_last_tick();
                (old, last_tick_changed)
            }
        };

        self.queue_update(old.tick, old.duration, old.note);
        self.queue_update(tick, duration, note);
        if last_tick_changed {
            self.queue_links();
        }
        Ok(())
    }

    /// Insert a control event; an existing event of the same type at `tick`
    /// takes the new value and keeps its id
    pub fn insert_control(
        &mut self,
        tick: u32,
        control_type: ControlType,
        value: f32,
    ) -> PartResult<EventId> {
        check_control_args(tick, control_type, value)?;
        if control_type.is_note_control() {
            return Err(PartError::InvalidArgument(format!(
                "{} is attached to notes",
                control_type
            )));
        }

        let (id, last_tick_changed) = {
            let mut guard = self.shared.events.write();
            let events = &mut *guard;
            let existing = events
                .controls
                .find_type(tick, control_type)
                .map(|ev| (ev.id, ev.selected));
            match existing {
                Some((id, selected)) => {
                    events.controls.change(tick, id, selected, control_type, value);
                    (id, false)
                }
                None => {
                    let id = events.ids.alloc(tick);
                    events.controls.insert(
                        tick,
                        ControlEvent {
                            id,
                            selected: false,
                            control_type,
                            value,
                        },
                    );
                    let last_tick_changed = tick + 1 >= events.last_tick && events.update_last_tick();
                    (id, last_tick_changed)
                }
            }
        };

        self.queue_control_update(tick);
        if last_tick_changed {
            self.queue_links();
        }
        Ok(id)
    }

    /// Move and/or modify a control event
    ///
    /// Velocity and fine tune address the note behind `id` instead.
    pub fn change_control(
        &mut self,
        id: EventId,
        tick: u32,
        control_type: ControlType,
        value: f32,
    ) -> PartResult<()> {
        check_control_args(tick, control_type, value)?;

        if control_type.is_note_control() {
            let current = {
                let events = self.shared.events.read();
                let (channel, ix) = events
                    .find_note(id)
                    .ok_or(PartError::InvalidId(id.get()))?;
                PartNote::from_event(channel, &events.channels[channel].notes()[ix])
            };
            let mut fine_tune = current.fine_tune;
            let mut velocity = current.velocity;
            if control_type == ControlType::Velocity {
                velocity = value.clamp(0.0, 1.0);
            } else {
                fine_tune = ((value * MAX_FINE_TUNE as f32).round() as i32)
                    .clamp(MIN_FINE_TUNE, MAX_FINE_TUNE);
            }
            return self.change_note(
                id,
                ChannelChoice::Fixed(current.channel),
                tick,
                current.duration,
                current.note,
                fine_tune,
                velocity,
            );
        }

        let (old_tick, last_tick_changed) = {
            let mut guard = self.shared.events.write();
            let events = &mut *guard;
            let old_tick = events
                .ids
                .tick_of(id)
                .ok_or(PartError::InvalidId(id.get()))?;
            let old = events
                .controls
                .lookup_event(old_tick, id)
                .cloned()
                .ok_or(PartError::InvalidId(id.get()))?;
            if events
                .controls
                .find_type(tick, control_type)
                .is_some_and(|other| other.id != id)
            {
                return Err(PartError::ControlTaken { tick, control_type });
            }

            if old_tick == tick {
                events
                    .controls
                    .change(tick, id, old.selected, control_type, value);
                (old_tick, false)
            } else {
                events.controls.remove(old_tick, id);
                events.ids.move_id(id, tick);
                events.controls.insert(
                    tick,
                    ControlEvent {
                        id,
                        selected: old.selected,
                        control_type,
                        value,
                    },
                );
                let last_tick_changed =
                    old_tick.max(tick) + 1 >= events.last_tick && events.update_last_tick();
                (old_tick, last_tick_changed)
            }
        };

        self.queue_control_update(old_tick);
        self.queue_control_update(tick);
        if last_tick_changed {
            self.queue_links();
        }
        Ok(())
    }

    /// Delete the note `id` from `channel`
    pub fn delete_note(&mut self, id: EventId, channel: usize) -> PartResult<()> {
        let (removed, last_tick_changed) = {
            let mut guard = self.shared.events.write();
            let events = &mut *guard;
            let tick = events
                .ids
                .tick_of(id)
                .ok_or(PartError::InvalidId(id.get()))?;
            let present = events
                .channels
                .get(channel)
                .and_then(|lane| lane.lookup(tick))
                .is_some_and(|note| note.id == id);
            if !present {
                return Err(PartError::InvalidId(id.get()));
            }
            let removed = events.channels[channel].remove(tick);
            events.ids.free(id);
            let last_tick_changed =
                removed.end_tick() >= events.last_tick && events.update_last_tick();
            (removed, last_tick_changed)
        };

        self.queue_update(removed.tick, removed.duration, removed.note);
        if last_tick_changed {
            self.queue_links();
        }
        Ok(())
    }

    /// Delete the control event `id`
    pub fn delete_control(&mut self, id: EventId) -> PartResult<()> {
        let (tick, last_tick_changed) = {
            let mut guard = self.shared.events.write();
            let events = &mut *guard;
            let tick = events
                .ids
                .tick_of(id)
                .ok_or(PartError::InvalidId(id.get()))?;
            if events.controls.remove(tick, id).is_none() {
                return Err(PartError::InvalidId(id.get()));
            }
            events.ids.free(id);
            let last_tick_changed = tick + 1 >= events.last_tick && events.update_last_tick();
            (tick, last_tick_changed)
        };

        self.queue_control_update(tick);
        if last_tick_changed {
            self.queue_links();
        }
        Ok(())
    }

    /// Delete whatever event `id` refers to
    pub fn delete_event(&mut self, id: EventId) -> PartResult<()> {
        match self.query_event(id) {
            QueryEvent::Note { note, .. } => self.delete_note(id, note.channel),
            QueryEvent::Control(_) => self.delete_control(id),
            QueryEvent::None => Err(PartError::InvalidId(id.get())),
        }
    }

    /// Full description of the event behind `id`
    pub fn query_event(&self, id: EventId) -> QueryEvent {
        let events = self.shared.events.read();
        let Some(tick) = events.ids.tick_of(id) else {
            return QueryEvent::None;
        };
        if let Some(control) = events.controls.lookup_event(tick, id) {
            return QueryEvent::Control(PartControl::from_event(tick, control));
        }
        match events.find_note(id) {
            Some((channel, ix)) => QueryEvent::from_note(PartNote::from_event(
                channel,
                &events.channels[channel].notes()[ix],
            )),
            None => QueryEvent::None,
        }
    }

    /// Lowest note number in the part
    pub fn min_note(&self) -> Option<i32> {
        let events = self.shared.events.read();
        events
            .channels
            .iter()
            .flat_map(|lane| lane.notes().iter().map(|n| n.note))
            .min()
    }

    /// Highest note number in the part
    pub fn max_note(&self) -> Option<i32> {
        let events = self.shared.events.read();
        events
            .channels
            .iter()
            .flat_map(|lane| lane.notes().iter().map(|n| n.note))
            .max()
    }

    pub(crate) fn queue_update(&self, tick: u32, duration: u32, note: i32) {
        self.dispatcher
            .queue_range(self.id(), tick, tick.saturating_add(duration), note, note);
    }

    pub(crate) fn queue_control_update(&self, tick: u32) {
        self.dispatcher
            .queue_range(self.id(), tick, tick.saturating_add(1), MIN_NOTE, MAX_NOTE);
    }

    fn queue_links(&self) {
        self.dispatcher.queue_links(self.id());
    }

    /// Queue a redraw of all controls in `[tick, tick + duration)`
    pub fn queue_controls(&self, tick: u32, duration: u32) {
        if tick >= MAX_TICK || duration == 0 {
            return;
        }
        self.dispatcher.queue_range(
            self.id(),
            tick,
            tick.saturating_add(duration),
            MIN_NOTE,
            MAX_NOTE,
        );
    }
}

impl Drop for Part {
    fn drop(&mut self) {
        self.dispatcher.forget_part(self.id());
    }
}
