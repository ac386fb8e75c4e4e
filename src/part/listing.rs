// Part listing - range queries over notes and controls

use std::collections::HashSet;

use super::query::{ChannelFilter, PartControl, PartNote};
use super::{Part, PartEvents};
use crate::sequencer::control::ControlType;
use crate::sequencer::note::{MAX_NOTE, MAX_TICK, MIN_NOTE, note_clamp};

fn query_bound(tick: u32, duration: u32) -> Option<u32> {
    (tick < MAX_TICK && duration > 0).then(|| tick.saturating_add(duration).min(MAX_TICK))
}

fn collect_notes(
    events: &PartEvents,
    channel: ChannelFilter,
    tick: u32,
    bound: u32,
    min_note: i32,
    max_note: i32,
    include_crossings: bool,
) -> Vec<PartNote> {
    let pitch = note_clamp(min_note)..=note_clamp(max_note);
    let mut result = Vec::new();
    for (index, lane) in events.channels.iter().enumerate() {
        if !channel.matches(index) {
            continue;
        }
        let mut seen = HashSet::new();
        if include_crossings {
            for note in lane.sounding_before(tick) {
                if pitch.contains(&note.note) && seen.insert(note.tick) {
                    result.push(PartNote::from_event(index, note));
                }
            }
        }
        for note in lane.range(tick, bound) {
            if pitch.contains(&note.note) && seen.insert(note.tick) {
                result.push(PartNote::from_event(index, note));
            }
        }
    }
    result
}

impl Part {
    /// Notes starting in `[tick, tick + duration)` with pitch in
    /// `min_note..=max_note`
    ///
    /// With `include_crossings`, notes that started earlier but still sound
    /// at `tick` are included too. The result is not ordered by tick.
    pub fn list_notes(
        &self,
        channel: ChannelFilter,
        tick: u32,
        duration: u32,
        min_note: i32,
        max_note: i32,
        include_crossings: bool,
    ) -> Vec<PartNote> {
        let Some(bound) = query_bound(tick, duration) else {
            return Vec::new();
        };
        let events = self.shared.events.read();
        collect_notes(
            &events,
            channel,
            tick,
            bound,
            min_note,
            max_note,
            include_crossings,
        )
    }

    /// All notes sounding anywhere in `[tick, tick + duration)`
    pub fn list_notes_crossing(&self, tick: u32, duration: u32) -> Vec<PartNote> {
        self.list_notes(ChannelFilter::All, tick, duration, MIN_NOTE, MAX_NOTE, true)
    }

    /// Notes of one channel starting in `[tick, tick + duration)`
    pub fn list_notes_within(&self, channel: usize, tick: u32, duration: u32) -> Vec<PartNote> {
        self.list_notes(
            ChannelFilter::Only(channel),
            tick,
            duration,
            MIN_NOTE,
            MAX_NOTE,
            false,
        )
    }

    /// Notes of pitch `note` sounding in `[tick, tick + duration)`
    pub fn check_overlap(&self, tick: u32, duration: u32, note: i32) -> Vec<PartNote> {
        self.list_notes(ChannelFilter::All, tick, duration, note, note, true)
    }

    /// Notes of pitch `note` sounding at `tick`
    pub fn get_notes(&self, tick: u32, note: i32) -> Vec<PartNote> {
        self.list_notes(ChannelFilter::All, tick, 1, note, note, true)
    }

    /// Snapshot of the note behind `id`
    pub fn note(&self, id: super::EventId) -> Option<PartNote> {
        let events = self.shared.events.read();
        events
            .find_note(id)
            .map(|(channel, ix)| PartNote::from_event(channel, &events.channels[channel].notes()[ix]))
    }

    /// Control events of `control_type` in `[tick, tick + duration)`
    ///
    /// Note-attached types report one entry per note starting in the range;
    /// `channel` only filters those.
    pub fn list_controls(
        &self,
        channel: ChannelFilter,
        tick: u32,
        duration: u32,
        control_type: ControlType,
    ) -> Vec<PartControl> {
        let Some(bound) = query_bound(tick, duration) else {
            return Vec::new();
        };
        let events = self.shared.events.read();
        if control_type.is_note_control() {
            return collect_notes(&events, channel, tick, bound, MIN_NOTE, MAX_NOTE, false)
                .iter()
                .filter_map(|note| PartControl::from_note(note, control_type))
                .collect();
        }
        events
            .controls
            .range(tick, bound)
            .iter()
            .flat_map(|node| {
                node.events()
                    .iter()
                    .filter(move |ev| ev.control_type == control_type)
                    .map(move |ev| PartControl::from_event(node.tick, ev))
            })
            .collect()
    }

    /// Controls of `control_type` at exactly `tick`
    pub fn get_controls(&self, tick: u32, control_type: ControlType) -> Vec<PartControl> {
        self.list_controls(ChannelFilter::All, tick, 1, control_type)
    }

    pub fn get_channel_controls(
        &self,
        channel: usize,
        tick: u32,
        duration: u32,
        control_type: ControlType,
    ) -> Vec<PartControl> {
        self.list_controls(ChannelFilter::Only(channel), tick, duration, control_type)
    }

    /// Every selected note, in channel then tick order
    pub fn list_selected_notes(&self) -> Vec<PartNote> {
        let events = self.shared.events.read();
        events
            .channels
            .iter()
            .enumerate()
            .flat_map(|(channel, lane)| {
                lane.notes()
                    .iter()
                    .filter(|note| note.selected)
                    .map(move |note| PartNote::from_event(channel, note))
            })
            .collect()
    }

    /// Every selected control of `control_type`, in tick order
    pub fn list_selected_controls(&self, control_type: ControlType) -> Vec<PartControl> {
        if control_type.is_note_control() {
            return self
                .list_selected_notes()
                .iter()
                .filter_map(|note| PartControl::from_note(note, control_type))
                .collect();
        }
        let events = self.shared.events.read();
        events
            .controls
            .nodes()
            .iter()
            .flat_map(|node| {
                node.events()
                    .iter()
                    .filter(move |ev| ev.selected && ev.control_type == control_type)
                    .map(move |ev| PartControl::from_event(node.tick, ev))
            })
            .collect()
    }

    /// Queue a redraw of the notes in an area
    ///
    /// The area widens to the right for notes crossing its right edge.
    pub fn queue_notes_within(&self, tick: u32, duration: u32, min_note: i32, max_note: i32) {
        let Some(bound) = query_bound(tick, duration) else {
            return;
        };
        let min_note = note_clamp(min_note);
        let max_note = note_clamp(max_note);
        let end_tick = {
            let events = self.shared.events.read();
            events
                .channels
                .iter()
                .flat_map(|lane| lane.range(tick, bound))
                .filter(|note| (min_note..=max_note).contains(&note.note))
                .map(|note| note.end_tick())
                .fold(bound, u32::max)
        };
        self.dispatcher
            .queue_range(self.id(), tick, end_tick, min_note, min_note);
        self.dispatcher
            .queue_range(self.id(), tick, end_tick, max_note, max_note);
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ChannelChoice, EventId};
    use super::*;
    use crate::messaging::{ChangeDispatcher, Notification};

    fn part() -> Part {
        Part::new(1, "listing", ChangeDispatcher::new())
    }

    fn ticks(notes: &[PartNote]) -> Vec<u32> {
        let mut ticks: Vec<u32> = notes.iter().map(|n| n.tick).collect();
        ticks.sort_unstable();
        ticks
    }

    #[test]
    fn test_list_notes_range() {
        let mut part = part();
        for tick in [0, 100, 200, 300] {
            part.insert_note(ChannelChoice::Fixed(0), tick, 50, 60, 0, 1.0)
                .unwrap();
        }
        let notes = part.list_notes(ChannelFilter::All, 100, 200, MIN_NOTE, MAX_NOTE, false);
        assert_eq!(ticks(&notes), vec![100, 200]);
        assert!(
            part.list_notes(ChannelFilter::All, 0, 0, MIN_NOTE, MAX_NOTE, true)
                .is_empty()
        );
    }

    #[test]
    fn test_list_notes_crossing() {
        let mut part = part();
        part.insert_note(ChannelChoice::Fixed(0), 0, 1000, 60, 0, 1.0)
            .unwrap();
        part.insert_note(ChannelChoice::Fixed(0), 100, 10, 62, 0, 1.0)
            .unwrap();
        part.insert_note(ChannelChoice::Fixed(0), 400, 200, 64, 0, 1.0)
            .unwrap();

        assert_eq!(ticks(&part.list_notes_crossing(500, 1)), vec![0, 400]);
        assert_eq!(ticks(&part.list_notes_crossing(105, 1)), vec![0, 100]);
        assert_eq!(ticks(&part.get_notes(500, 64)), vec![400]);
        assert!(part.get_notes(500, 62).is_empty());
        assert_eq!(ticks(&part.check_overlap(50, 100, 62)), vec![100]);
    }

    #[test]
    fn test_list_notes_pitch_and_channel_filter() {
        let mut part = part();
        part.insert_note(ChannelChoice::Fixed(0), 0, 10, 40, 0, 1.0)
            .unwrap();
        part.insert_note(ChannelChoice::Fixed(1), 0, 10, 80, 0, 1.0)
            .unwrap();

        let low = part.list_notes(ChannelFilter::All, 0, 10, 0, 60, false);
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].note, 40);
        let second = part.list_notes_within(1, 0, 10);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].channel, 1);
    }

    #[test]
    fn test_list_controls() {
        let mut part = part();
        part.insert_control(0, ControlType::PitchBend, 0.1).unwrap();
        part.insert_control(0, ControlType::Program, 0.2).unwrap();
        part.insert_control(50, ControlType::PitchBend, 0.3).unwrap();
        part.insert_note(ChannelChoice::Fixed(0), 10, 10, 60, 50, 0.5)
            .unwrap();

        let bends = part.list_controls(ChannelFilter::All, 0, 100, ControlType::PitchBend);
        assert_eq!(bends.len(), 2);
        assert_eq!(part.get_controls(0, ControlType::Program).len(), 1);

        let velocities = part.list_controls(ChannelFilter::All, 0, 100, ControlType::Velocity);
        assert_eq!(velocities.len(), 1);
        assert_eq!(velocities[0].value, 0.5);
        let tunes = part.get_channel_controls(0, 0, 100, ControlType::FineTune);
        assert_eq!(tunes[0].value, 0.5);
        assert!(
            part.get_channel_controls(1, 0, 100, ControlType::FineTune)
                .is_empty()
        );
    }

    #[test]
    fn test_note_lookup() {
        let mut part = part();
        let id = part
            .insert_note(ChannelChoice::Fixed(0), 10, 10, 60, 0, 1.0)
            .unwrap();
        assert_eq!(part.note(id).map(|n| n.tick), Some(10));
        assert!(part.note(EventId::new(5).unwrap()).is_none());
    }

    #[test]
    fn test_queue_notes_within_widens() {
        let dispatcher = ChangeDispatcher::new();
        let mut part = Part::new(7, "queue", dispatcher.clone());
        part.insert_note(ChannelChoice::Fixed(0), 90, 100, 60, 0, 1.0)
            .unwrap();
        dispatcher.dispatch();

        part.queue_notes_within(0, 100, 50, 70);
        assert_eq!(
            dispatcher.dispatch(),
            vec![Notification::RangeChanged {
                part: 7,
                tick: 0,
                duration: 190,
                min_note: 50,
                max_note: 70,
            }]
        );
    }
}
