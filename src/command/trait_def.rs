// UndoableCommand trait definition

use crate::part::PartError;
use crate::song::{Song, SongError};

/// Result type for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors that can occur during command execution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// Command execution failed
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Undo operation failed
    #[error("Undo failed: {0}")]
    UndoFailed(String),

    /// The song does not hold what the command expects
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Song(#[from] SongError),

    #[error(transparent)]
    Part(#[from] PartError),
}

/// Trait for commands that support undo/redo
///
/// Every edit of a song that should be undoable goes through this trait.
/// A command captures what it needs for undo while executing, so executing
/// it again after an undo (redo) starts from a fresh snapshot.
///
/// # Example
/// ```no_run
/// use mymusic_timeline::command::trait_def::{CommandError, CommandResult, UndoableCommand};
/// use mymusic_timeline::song::Song;
///
/// struct RenameSongCommand {
///     new_name: String,
///     old_name: Option<String>,
/// }
///
/// impl UndoableCommand for RenameSongCommand {
///     fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
///         self.old_name = Some(song.name().to_string());
///         song.set_name(self.new_name.clone());
///         Ok(())
///     }
///
///     fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
///         let old = self
///             .old_name
///             .take()
///             .ok_or_else(|| CommandError::UndoFailed("No old name stored".into()))?;
///         song.set_name(old);
///         Ok(())
///     }
///
///     fn description(&self) -> String {
///         format!("Rename song to {}", self.new_name)
///     }
/// }
/// ```
pub trait UndoableCommand: Send {
    /// Execute the command, storing the previous state internally
    fn execute(&mut self, song: &mut Song) -> CommandResult<()>;

    /// Restore the song to what it was before execute() was called
    fn undo(&mut self, song: &mut Song) -> CommandResult<()>;

    /// Human-readable description (e.g. "Insert note C4")
    fn description(&self) -> String;
}
