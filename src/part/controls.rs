// Control index - tick-keyed controller events of a part
// One TickNode per occupied tick, each holding every control event at that tick

use super::ids::EventId;
use crate::sequencer::control::ControlType;

/// A controller change
#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    pub id: EventId,
    pub selected: bool,
    pub control_type: ControlType,
    pub value: f32,
}

/// All control events at one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickNode {
    pub tick: u32,
    events: Vec<ControlEvent>,
}

impl TickNode {
    pub fn events(&self) -> &[ControlEvent] {
        &self.events
    }

    /// The event of a given type, there is at most one
    pub fn find_type(&self, control_type: ControlType) -> Option<&ControlEvent> {
        self.events.iter().find(|ev| ev.control_type == control_type)
    }

    pub fn find_id(&self, id: EventId) -> Option<&ControlEvent> {
        self.events.iter().find(|ev| ev.id == id)
    }

    pub(crate) fn events_mut(&mut self) -> &mut [ControlEvent] {
        &mut self.events
    }
}

/// Tick-sorted array of [`TickNode`]s
#[derive(Debug, Clone, Default)]
pub struct ControlIndex {
    nodes: Vec<TickNode>,
}

impl ControlIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[TickNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn search(&self, tick: u32) -> Result<usize, usize> {
        self.nodes.binary_search_by(|node| node.tick.cmp(&tick))
    }

    fn index_ge(&self, tick: u32) -> usize {
        self.nodes.partition_point(|node| node.tick < tick)
    }

    /// Index of the node at `tick`, inserting an empty one if absent
    pub fn ensure_tick(&mut self, tick: u32) -> usize {
        match self.search(tick) {
            Ok(ix) => ix,
            Err(ix) => {
                self.nodes.insert(
                    ix,
                    TickNode {
                        tick,
                        events: Vec::new(),
                    },
                );
                ix
            }
        }
    }

    pub fn lookup(&self, tick: u32) -> Option<&TickNode> {
        self.search(tick).ok().map(|ix| &self.nodes[ix])
    }

    pub fn lookup_event(&self, tick: u32, id: EventId) -> Option<&ControlEvent> {
        self.lookup(tick).and_then(|node| node.find_id(id))
    }

    pub fn find_type(&self, tick: u32, control_type: ControlType) -> Option<&ControlEvent> {
        self.lookup(tick).and_then(|node| node.find_type(control_type))
    }

    /// First node at or after `tick`
    pub fn lookup_ge(&self, tick: u32) -> Option<&TickNode> {
        self.nodes.get(self.index_ge(tick))
    }

    /// Last node at or before `tick`
    pub fn lookup_le(&self, tick: u32) -> Option<&TickNode> {
        let end = self.nodes.partition_point(|node| node.tick <= tick);
        end.checked_sub(1).map(|ix| &self.nodes[ix])
    }

    /// Last node strictly before `tick`
    pub fn lookup_lt(&self, tick: u32) -> Option<&TickNode> {
        self.index_ge(tick).checked_sub(1).map(|ix| &self.nodes[ix])
    }

    /// Nodes in `[tick, bound)`
    pub fn range(&self, tick: u32, bound: u32) -> &[TickNode] {
        let start = self.index_ge(tick);
        let end = self.index_ge(bound).max(start);
        &self.nodes[start..end]
    }

    pub(crate) fn range_mut(&mut self, tick: u32, bound: u32) -> &mut [TickNode] {
        let start = self.index_ge(tick);
        let end = self.index_ge(bound).max(start);
        &mut self.nodes[start..end]
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [TickNode] {
        &mut self.nodes
    }

    /// Add an event at `tick`
    pub fn insert(&mut self, tick: u32, event: ControlEvent) {
        let ix = self.ensure_tick(tick);
        self.nodes[ix].events.push(event);
    }

    /// Overwrite type, value and selection of an event, returns false if absent
    pub fn change(
        &mut self,
        tick: u32,
        id: EventId,
        selected: bool,
        control_type: ControlType,
        value: f32,
    ) -> bool {
        let Some(event) = self.event_mut(tick, id) else {
            return false;
        };
        event.selected = selected;
        event.control_type = control_type;
        event.value = value;
        true
    }

    /// Set the selection of an event, returns true on change
    pub fn set_selected(&mut self, tick: u32, id: EventId, selected: bool) -> bool {
        match self.event_mut(tick, id) {
            Some(event) if event.selected != selected => {
                event.selected = selected;
                true
            }
            _ => false,
        }
    }

    fn event_mut(&mut self, tick: u32, id: EventId) -> Option<&mut ControlEvent> {
        let ix = self.search(tick).ok()?;
        self.nodes[ix].events.iter_mut().find(|ev| ev.id == id)
    }

    /// Remove an event; the node goes away with its last event
    pub fn remove(&mut self, tick: u32, id: EventId) -> Option<ControlEvent> {
        let ix = self.search(tick).ok()?;
        let node = &mut self.nodes[ix];
        let pos = node.events.iter().position(|ev| ev.id == id)?;
        let event = node.events.remove(pos);
        if node.events.is_empty() {
            self.nodes.remove(ix);
        }
        Some(event)
    }

    /// One past the tick of the last node, 0 when empty
    pub fn last_tick(&self) -> u32 {
        self.nodes.last().map_or(0, |node| node.tick + 1)
    }
}
