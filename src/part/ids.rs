// Event ids - small stable handles mapping to tick positions
// Slots form a LIFO free list so that undo replays hand out the same ids

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Handle of an event inside one part (or of a placement inside one track)
///
/// Ids start at 1; 0 is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(NonZeroU32);

impl EventId {
    /// Wrap a raw id, `None` for 0
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Raw numeric value
    pub fn get(self) -> u32 {
        self.0.get()
    }

    fn from_index(index: usize) -> Self {
        match NonZeroU32::new(index as u32 + 1) {
            Some(id) => Self(id),
            None => unreachable!("slot index overflow"),
        }
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdSlot {
    Allocated(u32),
    /// Next free id in the list
    Free(Option<EventId>),
}

/// Id allocator with tick lookup
#[derive(Debug, Clone, Default)]
pub struct IdTable {
    slots: Vec<IdSlot>,
    free_head: Option<EventId>,
}

impl IdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id for an event at `tick`
    ///
    /// The most recently freed id is handed out first.
    pub fn alloc(&mut self, tick: u32) -> EventId {
        match self.free_head {
            Some(id) => {
                let slot = &mut self.slots[id.index()];
                self.free_head = match *slot {
                    IdSlot::Free(next) => next,
                    IdSlot::Allocated(_) => unreachable!("free list points at allocated id {}", id),
                };
                *slot = IdSlot::Allocated(tick);
                id
            }
            None => {
                self.slots.push(IdSlot::Allocated(tick));
                EventId::from_index(self.slots.len() - 1)
            }
        }
    }

    /// Update the tick of an allocated id; other ids are ignored
    pub fn move_id(&mut self, id: EventId, tick: u32) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            if matches!(slot, IdSlot::Allocated(_)) {
                *slot = IdSlot::Allocated(tick);
            }
        }
    }

    /// Release an allocated id; other ids are ignored
    pub fn free(&mut self, id: EventId) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            if matches!(slot, IdSlot::Allocated(_)) {
                *slot = IdSlot::Free(self.free_head);
                self.free_head = Some(id);
            }
        }
    }

    /// Tick of an allocated id
    pub fn tick_of(&self, id: EventId) -> Option<u32> {
        match self.slots.get(id.index()) {
            Some(IdSlot::Allocated(tick)) => Some(*tick),
            _ => None,
        }
    }

    /// Raw variant of [`tick_of`](Self::tick_of) accepting 0 and stale values
    pub fn tick_of_raw(&self, raw: u32) -> Option<u32> {
        EventId::new(raw).and_then(|id| self.tick_of(id))
    }

    /// Number of live ids
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, IdSlot::Allocated(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
