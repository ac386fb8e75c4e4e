// Command Pattern for Undo/Redo functionality
//
// Edits of a song that should be undoable go through UndoableCommand.
//
// Architecture:
// - UndoableCommand trait: Defines execute(), undo(), description()
// - CommandManager: Manages undo/redo stacks
// - Concrete commands: InsertNoteCommand, DeleteEventCommand, etc.
//
// Commands run on the editing thread against &mut Song. The sequencer thread
// sees their effect through the sequencer lock like any other edit.

pub mod commands;
pub mod manager;
pub mod trait_def;

pub use commands::{
    ChangeControlCommand, ChangeNoteCommand, DeleteEventCommand, DestroyPartCommand,
    InsertControlCommand, InsertNoteCommand, InsertPartCommand, RemovePartPlacementCommand,
};
pub use manager::CommandManager;
pub use trait_def::{CommandError, CommandResult, UndoableCommand};
