// Query types - value snapshots of part events handed to callers

use serde::{Deserialize, Serialize};

use super::controls::ControlEvent;
use super::ids::EventId;
use super::note_channel::NoteEvent;
use crate::sequencer::control::ControlType;
use crate::sequencer::note::MAX_FINE_TUNE;

/// Channel selection for inserting or moving a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelChoice {
    /// First channel free at the tick, a new one if all are taken
    Auto,
    Fixed(usize),
}

/// Channel filter for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelFilter {
    All,
    Only(usize),
}

impl ChannelFilter {
    pub fn matches(self, channel: usize) -> bool {
        match self {
            Self::All => true,
            Self::Only(only) => only == channel,
        }
    }
}

/// Snapshot of a note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartNote {
    pub id: EventId,
    pub channel: usize,
    pub tick: u32,
    pub duration: u32,
    pub note: i32,
    pub fine_tune: i32,
    pub velocity: f32,
    pub selected: bool,
}

impl PartNote {
    pub(crate) fn from_event(channel: usize, event: &NoteEvent) -> Self {
        Self {
            id: event.id,
            channel,
            tick: event.tick,
            duration: event.duration,
            note: event.note,
            fine_tune: event.fine_tune,
            velocity: event.velocity,
            selected: event.selected,
        }
    }

    /// Fine tune scaled to `[-1, 1]`
    pub fn fine_tune_value(&self) -> f32 {
        self.fine_tune as f32 / MAX_FINE_TUNE as f32
    }

    /// Value of a note-attached control type
    pub fn control_value(&self, control_type: ControlType) -> Option<f32> {
        match control_type {
            ControlType::Velocity => Some(self.velocity),
            ControlType::FineTune => Some(self.fine_tune_value()),
            _ => None,
        }
    }
}

/// Snapshot of a control event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartControl {
    pub id: EventId,
    pub tick: u32,
    pub control_type: ControlType,
    pub value: f32,
    pub selected: bool,
}

impl PartControl {
    pub(crate) fn from_event(tick: u32, event: &ControlEvent) -> Self {
        Self {
            id: event.id,
            tick,
            control_type: event.control_type,
            value: event.value,
            selected: event.selected,
        }
    }

    /// Control view of a note for a pseudo-control type
    pub(crate) fn from_note(note: &PartNote, control_type: ControlType) -> Option<Self> {
        note.control_value(control_type).map(|value| Self {
            id: note.id,
            tick: note.tick,
            control_type,
            value,
            selected: note.selected,
        })
    }
}

/// Kind of event behind an id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    None,
    Note,
    Control,
}

/// Full description of the event behind an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryEvent {
    None,
    Note {
        note: PartNote,
        fine_tune_value: f32,
        velocity_value: f32,
    },
    Control(PartControl),
}

impl QueryEvent {
    pub(crate) fn from_note(note: PartNote) -> Self {
        Self::Note {
            fine_tune_value: note.fine_tune_value(),
            velocity_value: note.velocity,
            note,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Self::None => EventType::None,
            Self::Note { .. } => EventType::Note,
            Self::Control(_) => EventType::Control,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn id(&self) -> Option<EventId> {
        match self {
            Self::None => None,
            Self::Note { note, .. } => Some(note.id),
            Self::Control(control) => Some(control.id),
        }
    }

    pub fn tick(&self) -> Option<u32> {
        match self {
            Self::None => None,
            Self::Note { note, .. } => Some(note.tick),
            Self::Control(control) => Some(control.tick),
        }
    }

    pub fn is_selected(&self) -> bool {
        match self {
            Self::None => false,
            Self::Note { note, .. } => note.selected,
            Self::Control(control) => control.selected,
        }
    }

    pub fn as_note(&self) -> Option<&PartNote> {
        match self {
            Self::Note { note, .. } => Some(note),
            _ => None,
        }
    }

    pub fn as_control(&self) -> Option<&PartControl> {
        match self {
            Self::Control(control) => Some(control),
            _ => None,
        }
    }
}
