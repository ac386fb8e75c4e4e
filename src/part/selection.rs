// Part selection - selection flags of notes and controls
//
// Selection never changes what the sequencer plays, but the flags live in the
// guarded storage so every change still goes through the write guard.

use super::ids::EventId;
use super::query::{ChannelFilter, QueryEvent};
use super::{Part, PartError, PartResult};
use crate::sequencer::control::ControlType;
use crate::sequencer::note::{MAX_NOTE, MAX_TICK, MIN_NOTE, note_clamp};

/// Changed note area to redraw: (tick, duration, note)
type NoteTouch = (u32, u32, i32);

impl Part {
    fn flush_touched(&self, notes: &[NoteTouch], control_ticks: &[u32]) {
        for &(tick, duration, note) in notes {
            self.queue_update(tick, duration, note);
        }
        for &tick in control_ticks {
            self.queue_control_update(tick);
        }
    }

    /// Set the selection of notes starting in a rectangle
    pub fn select_notes(
        &mut self,
        channel: ChannelFilter,
        tick: u32,
        duration: u32,
        min_note: i32,
        max_note: i32,
        selected: bool,
    ) {
        if tick >= MAX_TICK || duration == 0 {
            return;
        }
        let bound = tick.saturating_add(duration);
        let pitch = note_clamp(min_note)..=note_clamp(max_note);
        let mut touched = Vec::new();
        {
            let mut events = self.shared.events.write();
            for (index, lane) in events.channels.iter_mut().enumerate() {
                if !channel.matches(index) {
                    continue;
                }
                let start = lane.index_ge(tick);
                let end = lane.index_ge(bound);
                for ix in start..end {
                    let note = &lane.notes()[ix];
                    if pitch.contains(&note.note) && note.selected != selected {
                        touched.push((note.tick, note.duration, note.note));
                        lane.set_selected(ix, selected);
                    }
                }
            }
        }
        self.flush_touched(&touched, &[]);
    }

    /// Set the selection of controls of one type in `[tick, tick + duration)`
    ///
    /// Note-attached types select the notes starting in the range.
    pub fn select_controls(
        &mut self,
        tick: u32,
        duration: u32,
        control_type: ControlType,
        selected: bool,
    ) {
        if control_type.is_note_control() {
            self.select_notes(
                ChannelFilter::All,
                tick,
                duration,
                MIN_NOTE,
                MAX_NOTE,
                selected,
            );
            return;
        }
        if tick >= MAX_TICK || duration == 0 {
            return;
        }
        let bound = tick.saturating_add(duration);
        let mut touched = Vec::new();
        {
            let mut events = self.shared.events.write();
            for node in events.controls.range_mut(tick, bound) {
                let node_tick = node.tick;
                for ev in node.events_mut() {
                    if ev.control_type == control_type && ev.selected != selected {
                        ev.selected = selected;
                        touched.push(node_tick);
                    }
                }
            }
        }
        self.flush_touched(&[], &touched);
    }

    /// Select exactly the notes in a rectangle
    ///
    /// Every other note and every control inside the range is deselected.
    pub fn select_notes_exclusive(
        &mut self,
        channel: ChannelFilter,
        tick: u32,
        duration: u32,
        min_note: i32,
        max_note: i32,
    ) {
        let bound = tick.saturating_add(duration);
        let pitch = note_clamp(min_note)..=note_clamp(max_note);
        let mut touched_notes = Vec::new();
        let mut touched_controls = Vec::new();
        {
            let mut guard = self.shared.events.write();
            let events = &mut *guard;
            for (index, lane) in events.channels.iter_mut().enumerate() {
                for ix in 0..lane.len() {
                    let note = &lane.notes()[ix];
                    let inside = channel.matches(index)
                        && note.tick >= tick
                        && note.tick < bound
                        && pitch.contains(&note.note);
                    if note.selected != inside {
                        touched_notes.push((note.tick, note.duration, note.note));
                        lane.set_selected(ix, inside);
                    }
                }
            }
            for node in events.controls.range_mut(tick, bound) {
                let node_tick = node.tick;
                for ev in node.events_mut() {
                    if ev.selected {
                        ev.selected = false;
                        touched_controls.push(node_tick);
                    }
                }
            }
        }
        self.flush_touched(&touched_notes, &touched_controls);
    }

    /// Select exactly the controls of one type in `[tick, tick + duration)`
    ///
    /// All notes and all controls of other types are deselected. Note-attached
    /// types select notes exclusively instead.
    pub fn select_controls_exclusive(&mut self, tick: u32, duration: u32, control_type: ControlType) {
        if control_type.is_note_control() {
            self.select_notes_exclusive(ChannelFilter::All, tick, duration, MIN_NOTE, MAX_NOTE);
            return;
        }
        let bound = tick.saturating_add(duration);
        let mut touched_notes = Vec::new();
        let mut touched_controls = Vec::new();
        {
            let mut guard = self.shared.events.write();
            let events = &mut *guard;
            for lane in events.channels.iter_mut() {
                for ix in 0..lane.len() {
                    let note = &lane.notes()[ix];
                    if note.selected {
                        touched_notes.push((note.tick, note.duration, note.note));
                        lane.set_selected(ix, false);
                    }
                }
            }
            for node in events.controls.nodes_mut() {
                let node_tick = node.tick;
                let inside = node_tick >= tick && node_tick < bound;
                for ev in node.events_mut() {
                    let want = inside && ev.control_type == control_type;
                    if ev.selected != want {
                        ev.selected = want;
                        touched_controls.push(node_tick);
                    }
                }
            }
        }
        self.flush_touched(&touched_notes, &touched_controls);
    }

    /// Set the selection of the note `id` in `channel`
    pub fn set_note_selected(&mut self, id: EventId, channel: usize, selected: bool) -> PartResult<()> {
        let touched = {
            let mut events = self.shared.events.write();
            let tick = events
                .ids
                .tick_of(id)
                .ok_or(PartError::InvalidId(id.get()))?;
            let lane = events
                .channels
                .get_mut(channel)
                .ok_or(PartError::InvalidId(id.get()))?;
            let ix = lane
                .index_of(tick)
                .filter(|&ix| lane.notes()[ix].id == id)
                .ok_or(PartError::InvalidId(id.get()))?;
            let note = &lane.notes()[ix];
            let touch = (note.tick, note.duration, note.note);
            lane.set_selected(ix, selected).then_some(touch)
        };
        if let Some(touch) = touched {
            self.flush_touched(&[touch], &[]);
        }
        Ok(())
    }

    /// Set the selection of the control event `id`
    pub fn set_control_selected(&mut self, id: EventId, selected: bool) -> PartResult<()> {
        let (tick, changed) = {
            let mut events = self.shared.events.write();
            let tick = events
                .ids
                .tick_of(id)
                .ok_or(PartError::InvalidId(id.get()))?;
            if events.controls.lookup_event(tick, id).is_none() {
                return Err(PartError::InvalidId(id.get()));
            }
            (tick, events.controls.set_selected(tick, id, selected))
        };
        if changed {
            self.flush_touched(&[], &[tick]);
        }
        Ok(())
    }

    fn set_event_selected(&mut self, id: EventId, selected: bool) -> PartResult<()> {
        match self.query_event(id) {
            QueryEvent::Note { note, .. } => self.set_note_selected(id, note.channel, selected),
            QueryEvent::Control(_) => self.set_control_selected(id, selected),
            QueryEvent::None => Err(PartError::InvalidId(id.get())),
        }
    }

    /// Select whatever event `id` refers to
    pub fn select_event(&mut self, id: EventId) -> PartResult<()> {
        self.set_event_selected(id, true)
    }

    /// Deselect whatever event `id` refers to
    pub fn deselect_event(&mut self, id: EventId) -> PartResult<()> {
        self.set_event_selected(id, false)
    }

    /// Selection state of an event, false for unknown ids
    pub fn is_event_selected(&self, id: EventId) -> bool {
        self.query_event(id).is_selected()
    }
}

#[cfg(test)]
mod tests {
    use super::super::ChannelChoice;
    use super::*;
    use crate::messaging::ChangeDispatcher;

    fn part_with_notes() -> (Part, Vec<EventId>) {
        let mut part = Part::new(1, "selection", ChangeDispatcher::new());
        let ids = vec![
            part.insert_note(ChannelChoice::Fixed(0), 0, 10, 60, 0, 1.0)
                .unwrap(),
            part.insert_note(ChannelChoice::Fixed(0), 100, 10, 70, 0, 1.0)
                .unwrap(),
            part.insert_note(ChannelChoice::Fixed(1), 100, 10, 50, 0, 1.0)
                .unwrap(),
        ];
        (part, ids)
    }

    #[test]
    fn test_select_notes_rectangle() {
        let (mut part, ids) = part_with_notes();
        part.select_notes(ChannelFilter::All, 50, 100, 55, 80, true);
        assert!(!part.is_event_selected(ids[0]));
        assert!(part.is_event_selected(ids[1]));
        assert!(!part.is_event_selected(ids[2]));
        assert_eq!(part.list_selected_notes().len(), 1);
    }

    #[test]
    fn test_select_notes_exclusive() {
        let (mut part, ids) = part_with_notes();
        let control = part
            .insert_control(5, ControlType::PitchBend, 0.0)
            .unwrap();
        part.select_event(ids[0]).unwrap();
        part.select_event(control).unwrap();

        part.select_notes_exclusive(ChannelFilter::Only(1), 0, 200, MIN_NOTE, MAX_NOTE);
        assert!(!part.is_event_selected(ids[0]));
        assert!(!part.is_event_selected(ids[1]));
        assert!(part.is_event_selected(ids[2]));
        assert!(!part.is_event_selected(control));
    }

    #[test]
    fn test_select_notes_exclusive_keeps_controls_outside() {
        let (mut part, ids) = part_with_notes();
        let inside = part
            .insert_control(10, ControlType::PitchBend, 0.0)
            .unwrap();
        let outside = part
            .insert_control(1000, ControlType::PitchBend, 0.5)
            .unwrap();
        part.select_event(inside).unwrap();
        part.select_event(outside).unwrap();

        part.select_notes_exclusive(ChannelFilter::All, 0, 100, MIN_NOTE, MAX_NOTE);
        assert!(part.is_event_selected(ids[0]));
        assert!(!part.is_event_selected(inside));
        assert!(part.is_event_selected(outside));
        assert_eq!(part.list_selected_controls(ControlType::PitchBend).len(), 1);
    }

    #[test]
    fn test_select_controls_exclusive() {
        let (mut part, ids) = part_with_notes();
        let bend = part
            .insert_control(10, ControlType::PitchBend, 0.0)
            .unwrap();
        let late_bend = part
            .insert_control(500, ControlType::PitchBend, 0.0)
            .unwrap();
        let program = part.insert_control(10, ControlType::Program, 0.0).unwrap();
        part.select_event(ids[1]).unwrap();
        part.select_event(program).unwrap();

        part.select_controls_exclusive(0, 100, ControlType::PitchBend);
        assert!(part.is_event_selected(bend));
        assert!(!part.is_event_selected(late_bend));
        assert!(!part.is_event_selected(program));
        assert!(!part.is_event_selected(ids[1]));
        assert_eq!(
            part.list_selected_controls(ControlType::PitchBend).len(),
            1
        );
    }

    #[test]
    fn test_pseudo_control_selection_routes_to_notes() {
        let (mut part, ids) = part_with_notes();
        part.select_controls(0, 50, ControlType::Velocity, true);
        assert!(part.is_event_selected(ids[0]));
        assert_eq!(part.list_selected_controls(ControlType::Velocity).len(), 1);

        part.select_controls_exclusive(90, 20, ControlType::FineTune);
        assert!(!part.is_event_selected(ids[0]));
        assert!(part.is_event_selected(ids[1]));
        assert!(part.is_event_selected(ids[2]));
    }

    #[test]
    fn test_select_controls_range() {
        let mut part = Part::new(1, "controls", ChangeDispatcher::new());
        let a = part.insert_control(0, ControlType::Pressure, 0.0).unwrap();
        let b = part.insert_control(20, ControlType::Pressure, 0.0).unwrap();
        part.select_controls(0, 10, ControlType::Pressure, true);
        assert!(part.is_event_selected(a));
        assert!(!part.is_event_selected(b));
        part.select_controls(0, 100, ControlType::Pressure, false);
        assert!(!part.is_event_selected(a));
    }

    #[test]
    fn test_event_selection_errors() {
        let (mut part, ids) = part_with_notes();
        assert_eq!(
            part.set_note_selected(ids[0], 1, true),
            Err(PartError::InvalidId(ids[0].get()))
        );
        let stale = EventId::new(42).unwrap();
        assert!(part.select_event(stale).is_err());
        assert!(!part.is_event_selected(stale));
        part.deselect_event(ids[0]).unwrap();
    }
}
