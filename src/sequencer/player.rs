// Sequencer Player - Reads track placements and triggers notes
// Runs on the real-time thread: only try_read() on the sequencer locks

use crate::part::{PartId, PartShared};
use crate::sequencer::control::ControlType;
use crate::track::TrackShared;

/// Event produced for one processing block
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    NoteOn {
        tick: u32,
        part: PartId,
        channel: usize,
        note: i32,
        fine_tune: i32,
        velocity: f32,
        frequency: f64,
    },
    NoteOff {
        tick: u32,
        part: PartId,
        channel: usize,
        note: i32,
    },
    Control {
        tick: u32,
        part: PartId,
        control_type: ControlType,
        value: f32,
    },
}

impl PlaybackEvent {
    pub fn tick(&self) -> u32 {
        match self {
            Self::NoteOn { tick, .. } | Self::NoteOff { tick, .. } | Self::Control { tick, .. } => {
                *tick
            }
        }
    }

    // NoteOff before Control before NoteOn at the same tick
    fn sort_key(&self) -> (u32, u8) {
        let rank = match self {
            Self::NoteOff { .. } => 0,
            Self::Control { .. } => 1,
            Self::NoteOn { .. } => 2,
        };
        (self.tick(), rank)
    }
}

/// Tracks active notes (NoteOn sent, waiting for NoteOff)
#[derive(Debug, Clone)]
struct ActiveNote {
    part: PartId,
    channel: usize,
    note: i32,
    end_tick: u32,
}

/// Sequencer player - converts track placements into playback events
#[derive(Debug, Default)]
pub struct SequencerPlayer {
    /// Currently active notes (waiting for NoteOff)
    active_notes: Vec<ActiveNote>,
}

impl SequencerPlayer {
    /// Create a new sequencer player
    pub fn new() -> Self {
        Self {
            active_notes: Vec::with_capacity(64),
        }
    }

    /// Number of notes waiting for their NoteOff
    pub fn active_count(&self) -> usize {
        self.active_notes.len()
    }

    /// Process the block `[start_tick, start_tick + n_ticks)` of a track
    ///
    /// Events come back in tick order. When the editor holds a lock, the
    /// block carries no new notes or controls; pending NoteOffs still fire.
    pub fn process(
        &mut self,
        track: &TrackShared,
        start_tick: u32,
        n_ticks: u32,
    ) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        let bound = start_tick.saturating_add(n_ticks);

        if n_ticks > 0
            && !track.is_muted()
            && let Some(entries) = track.entries().try_read()
        {
            let mut tick = start_tick;
            while tick < bound {
                let Some((part, part_start, next)) = entries.part_at(tick) else {
                    // Before the first placement, or the part is gone
                    match entries.next_after(tick) {
                        Some(entry) if entry.tick < bound => {
                            tick = entry.tick;
                            continue;
                        }
                        _ => break,
                    }
                };
                let segment_end = next.map_or(bound, |next| next.min(bound));
                self.play_part(&part, part_start, tick, segment_end, &mut events);
                tick = segment_end;
            }
        }

        self.active_notes.retain(|active| {
            if active.end_tick < bound {
                events.push(PlaybackEvent::NoteOff {
                    tick: active.end_tick,
                    part: active.part,
                    channel: active.channel,
                    note: active.note,
                });
                false
            } else {
                true
            }
        });

        events.sort_by_key(PlaybackEvent::sort_key);
        events
    }

    fn play_part(
        &mut self,
        part: &PartShared,
        part_start: u32,
        from: u32,
        to: u32,
        events: &mut Vec<PlaybackEvent>,
    ) {
        let Some(storage) = part.events().try_read() else {
            return;
        };
        let rel_from = from - part_start;
        let rel_to = to - part_start;

        for node in storage.controls().range(rel_from, rel_to) {
            for control in node.events() {
                events.push(PlaybackEvent::Control {
                    tick: part_start + node.tick,
                    part: part.id(),
                    control_type: control.control_type,
                    value: control.value,
                });
            }
        }

        for (channel, lane) in storage.channels().iter().enumerate() {
            for note in lane.range(rel_from, rel_to) {
                events.push(PlaybackEvent::NoteOn {
                    tick: part_start + note.tick,
                    part: part.id(),
                    channel,
                    note: note.note,
                    fine_tune: note.fine_tune,
                    velocity: note.velocity,
                    frequency: storage.semitones().note_frequency(note.note, note.fine_tune),
                });
                self.active_notes.push(ActiveNote {
                    part: part.id(),
                    channel,
                    note: note.note,
                    end_tick: part_start.saturating_add(note.end_tick()),
                });
            }
        }
    }

    /// Release every active note at `tick`
    pub fn stop_all_notes(&mut self, tick: u32) -> Vec<PlaybackEvent> {
        self.active_notes
            .drain(..)
            .map(|active| PlaybackEvent::NoteOff {
                tick,
                part: active.part,
                channel: active.channel,
                note: active.note,
            })
            .collect()
    }

    /// Forget active notes without emitting NoteOffs
    pub fn reset(&mut self) {
        self.active_notes.clear();
    }
}
