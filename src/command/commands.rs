// Concrete command implementations
//
// Each command snapshots the event or part it touches before mutating and
// applies the inverse edit on undo. Freed ids are reused last-in first-out,
// so a redo hands out the same ids as the original execution.

use crate::command::trait_def::{CommandError, CommandResult, UndoableCommand};
use crate::part::{
    ChannelChoice, EventId, Part, PartControl, PartError, PartId, PartNote, QueryEvent,
};
use crate::sequencer::control::ControlType;
use crate::sequencer::note::note_name;
use crate::song::Song;
use crate::track::TrackId;

fn not_executed(what: &str) -> CommandError {
    CommandError::UndoFailed(format!("{} was not executed", what))
}

/// Insert a note into a part
pub struct InsertNoteCommand {
    part: PartId,
    channel: ChannelChoice,
    tick: u32,
    duration: u32,
    note: i32,
    fine_tune: i32,
    velocity: f32,
    inserted: Option<EventId>,
}

impl InsertNoteCommand {
    pub fn new(
        part: PartId,
        channel: ChannelChoice,
        tick: u32,
        duration: u32,
        note: i32,
        fine_tune: i32,
        velocity: f32,
    ) -> Self {
        Self {
            part,
            channel,
            tick,
            duration,
            note,
            fine_tune,
            velocity,
            inserted: None,
        }
    }

    /// Id of the inserted note, once executed
    pub fn inserted_id(&self) -> Option<EventId> {
        self.inserted
    }
}

impl UndoableCommand for InsertNoteCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let id = song.get_part_mut(self.part)?.insert_note(
            self.channel,
            self.tick,
            self.duration,
            self.note,
            self.fine_tune,
            self.velocity,
        )?;
        self.inserted = Some(id);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let id = self.inserted.take().ok_or_else(|| not_executed("Insert note"))?;
        song.get_part_mut(self.part)?.delete_event(id)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Insert note {}", note_name(self.note))
    }
}

/// Move and/or modify a note
pub struct ChangeNoteCommand {
    part: PartId,
    id: EventId,
    channel: ChannelChoice,
    tick: u32,
    duration: u32,
    note: i32,
    fine_tune: i32,
    velocity: f32,
    previous: Option<PartNote>,
}

impl ChangeNoteCommand {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        part: PartId,
        id: EventId,
        channel: ChannelChoice,
        tick: u32,
        duration: u32,
        note: i32,
        fine_tune: i32,
        velocity: f32,
    ) -> Self {
        Self {
            part,
            id,
            channel,
            tick,
            duration,
            note,
            fine_tune,
            velocity,
            previous: None,
        }
    }
}

impl UndoableCommand for ChangeNoteCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let part = song.get_part_mut(self.part)?;
        let previous = part
            .note(self.id)
            .ok_or(PartError::InvalidId(self.id.get()))?;
        part.change_note(
            self.id,
            self.channel,
            self.tick,
            self.duration,
            self.note,
            self.fine_tune,
            self.velocity,
        )?;
        self.previous = Some(previous);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let old = self.previous.take().ok_or_else(|| not_executed("Change note"))?;
        song.get_part_mut(self.part)?.change_note(
            self.id,
            ChannelChoice::Fixed(old.channel),
            old.tick,
            old.duration,
            old.note,
            old.fine_tune,
            old.velocity,
        )?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Change note {}", note_name(self.note))
    }
}

/// Delete a note or a control event
pub struct DeleteEventCommand {
    part: PartId,
    id: EventId,
    deleted: Option<QueryEvent>,
}

impl DeleteEventCommand {
    pub fn new(part: PartId, id: EventId) -> Self {
        Self {
            part,
            id,
            deleted: None,
        }
    }
}

impl UndoableCommand for DeleteEventCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let part = song.get_part_mut(self.part)?;
        let snapshot = part.query_event(self.id);
        if snapshot.is_none() {
            return Err(PartError::InvalidId(self.id.get()).into());
        }
        part.delete_event(self.id)?;
        self.deleted = Some(snapshot);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let snapshot = self.deleted.take().ok_or_else(|| not_executed("Delete event"))?;
        let part = song.get_part_mut(self.part)?;
        self.id = match snapshot {
            QueryEvent::Note { note, .. } => {
                let id = part.insert_note(
                    ChannelChoice::Fixed(note.channel),
                    note.tick,
                    note.duration,
                    note.note,
                    note.fine_tune,
                    note.velocity,
                )?;
                if note.selected {
                    part.set_note_selected(id, note.channel, true)?;
                }
                id
            }
            QueryEvent::Control(control) => {
                let id = part.insert_control(control.tick, control.control_type, control.value)?;
                if control.selected {
                    part.set_control_selected(id, true)?;
                }
                id
            }
            QueryEvent::None => {
                return Err(CommandError::InvalidState("empty snapshot".into()));
            }
        };
        Ok(())
    }

    fn description(&self) -> String {
        match &self.deleted {
            Some(QueryEvent::Note { note, .. }) => format!("Delete note {}", note_name(note.note)),
            Some(QueryEvent::Control(control)) => format!("Delete {}", control.control_type),
            _ => "Delete event".to_string(),
        }
    }
}

/// Insert a control event; undo restores a value it overwrote
pub struct InsertControlCommand {
    part: PartId,
    tick: u32,
    control_type: ControlType,
    value: f32,
    inserted: Option<EventId>,
    previous: Option<PartControl>,
}

impl InsertControlCommand {
    pub fn new(part: PartId, tick: u32, control_type: ControlType, value: f32) -> Self {
        Self {
            part,
            tick,
            control_type,
            value,
            inserted: None,
            previous: None,
        }
    }

    pub fn inserted_id(&self) -> Option<EventId> {
        self.inserted
    }
}

impl UndoableCommand for InsertControlCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let part = song.get_part_mut(self.part)?;
        let previous = part
            .get_controls(self.tick, self.control_type)
            .into_iter()
            .next();
        let id = part.insert_control(self.tick, self.control_type, self.value)?;
        self.inserted = Some(id);
        self.previous = previous;
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let id = self.inserted.take().ok_or_else(|| not_executed("Insert control"))?;
        let part = song.get_part_mut(self.part)?;
        match self.previous.take() {
            Some(old) => {
                part.change_control(id, old.tick, old.control_type, old.value)?;
                part.set_control_selected(id, old.selected)?;
            }
            None => part.delete_control(id)?,
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Insert {} {:.2}", self.control_type, self.value)
    }
}

/// Move and/or modify a control event, or a note's velocity or fine tune
pub struct ChangeControlCommand {
    part: PartId,
    id: EventId,
    tick: u32,
    control_type: ControlType,
    value: f32,
    previous: Option<QueryEvent>,
}

impl ChangeControlCommand {
    pub fn new(part: PartId, id: EventId, tick: u32, control_type: ControlType, value: f32) -> Self {
        Self {
            part,
            id,
            tick,
            control_type,
            value,
            previous: None,
        }
    }
}

impl UndoableCommand for ChangeControlCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let part = song.get_part_mut(self.part)?;
        let snapshot = part.query_event(self.id);
        if snapshot.is_none() {
            return Err(PartError::InvalidId(self.id.get()).into());
        }
        part.change_control(self.id, self.tick, self.control_type, self.value)?;
        self.previous = Some(snapshot);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let snapshot = self.previous.take().ok_or_else(|| not_executed("Change control"))?;
        let part = song.get_part_mut(self.part)?;
        match snapshot {
            QueryEvent::Control(old) => {
                part.change_control(self.id, old.tick, old.control_type, old.value)?
            }
            QueryEvent::Note { note, .. } => part.change_note(
                self.id,
                ChannelChoice::Fixed(note.channel),
                note.tick,
                note.duration,
                note.note,
                note.fine_tune,
                note.velocity,
            )?,
            QueryEvent::None => {
                return Err(CommandError::InvalidState("empty snapshot".into()));
            }
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Change {} to {:.2}", self.control_type, self.value)
    }
}

/// Place a part on a track
pub struct InsertPartCommand {
    track: TrackId,
    tick: u32,
    part: PartId,
    link: Option<EventId>,
}

impl InsertPartCommand {
    pub fn new(track: TrackId, tick: u32, part: PartId) -> Self {
        Self {
            track,
            tick,
            part,
            link: None,
        }
    }

    /// Track entry id of the placement, once executed
    pub fn link_id(&self) -> Option<EventId> {
        self.link
    }
}

impl UndoableCommand for InsertPartCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        self.link = Some(song.place_part(self.track, self.tick, self.part)?);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        self.link.take().ok_or_else(|| not_executed("Insert part"))?;
        song.remove_placement(self.track, self.tick)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Place part {} at {}", self.part, self.tick)
    }
}

/// Remove the placement starting at a tick
pub struct RemovePartPlacementCommand {
    track: TrackId,
    tick: u32,
    removed: Option<PartId>,
}

impl RemovePartPlacementCommand {
    pub fn new(track: TrackId, tick: u32) -> Self {
        Self {
            track,
            tick,
            removed: None,
        }
    }
}

impl UndoableCommand for RemovePartPlacementCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        self.removed = Some(song.remove_placement(self.track, self.tick)?);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let part = self
            .removed
            .take()
            .ok_or_else(|| not_executed("Remove placement"))?;
        song.place_part(self.track, self.tick, part)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Remove placement at {}", self.tick)
    }
}

/// Destroy a part; undo brings it back with its events and placements
pub struct DestroyPartCommand {
    part: PartId,
    detached: Option<(Part, Vec<(TrackId, u32)>)>,
}

impl DestroyPartCommand {
    pub fn new(part: PartId) -> Self {
        Self {
            part,
            detached: None,
        }
    }
}

impl UndoableCommand for DestroyPartCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let links = song
            .list_part_links(self.part)
            .into_iter()
            .map(|link| (link.track, link.tick))
            .collect();
        let part = song.detach_part(self.part)?;
        self.detached = Some((part, links));
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let (part, links) = self
            .detached
            .take()
            .ok_or_else(|| not_executed("Destroy part"))?;
        song.attach_part(part)?;
        for (track, tick) in links {
            song.place_part(track, tick, self.part)?;
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Destroy part {}", self.part)
    }
}
