// CommandManager - Manages undo/redo stacks

use crate::command::trait_def::{CommandError, CommandResult, UndoableCommand};
use crate::config::StoreConfig;
use crate::song::Song;
use std::collections::VecDeque;

/// Default maximum number of commands to keep in history
const DEFAULT_MAX_HISTORY: usize = 100;

/// Manages command execution and undo/redo functionality
///
/// The CommandManager maintains two stacks:
/// - Undo stack: Commands that have been executed and can be undone
/// - Redo stack: Commands that have been undone and can be redone
///
/// Executing a new command clears the redo stack. When the undo stack
/// exceeds the history limit, the oldest command is dropped.
pub struct CommandManager {
    /// Most recent at the back
    undo_stack: VecDeque<Box<dyn UndoableCommand>>,

    /// Most recent at the back
    redo_stack: VecDeque<Box<dyn UndoableCommand>>,

    max_history: usize,
}

impl CommandManager {
    /// Create a new CommandManager with default settings
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    /// Create a new CommandManager with a custom history limit
    pub fn with_capacity(max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            undo_stack: VecDeque::with_capacity(max_history),
            redo_stack: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// History limit taken from the store configuration
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::with_capacity(config.max_undo_history)
    }

    /// Execute a command and add it to the undo stack
    ///
    /// # Errors
    /// Returns an error if the command execution fails; the stacks are left
    /// untouched in that case.
    pub fn execute(
        &mut self,
        mut command: Box<dyn UndoableCommand>,
        song: &mut Song,
    ) -> CommandResult<()> {
        command.execute(song)?;
        log::debug!("Executed: {}", command.description());

        self.undo_stack.push_back(command);
        self.redo_stack.clear();

        if self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }

        Ok(())
    }

    /// Undo the last command, returning its description
    ///
    /// A command whose undo fails stays on the undo stack.
    pub fn undo(&mut self, song: &mut Song) -> CommandResult<String> {
        let mut command = self
            .undo_stack
            .pop_back()
            .ok_or_else(|| CommandError::UndoFailed("Nothing to undo".into()))?;

        let description = command.description();
        if let Err(e) = command.undo(song) {
            self.undo_stack.push_back(command);
            return Err(e);
        }
        log::debug!("Undone: {}", description);

        self.redo_stack.push_back(command);
        Ok(description)
    }

    /// Redo the last undone command, returning its description
    pub fn redo(&mut self, song: &mut Song) -> CommandResult<String> {
        let mut command = self
            .redo_stack
            .pop_back()
            .ok_or_else(|| CommandError::ExecutionFailed("Nothing to redo".into()))?;

        let description = command.description();
        if let Err(e) = command.execute(song) {
            self.redo_stack.push_back(command);
            return Err(e);
        }
        log::debug!("Redone: {}", description);

        self.undo_stack.push_back(command);
        Ok(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Description of the command that would be undone
    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|cmd| cmd.description())
    }

    /// Description of the command that would be redone
    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|cmd| cmd.description())
    }

    /// Clear all command history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::ChangeDispatcher;

    struct RenameCommand {
        name: String,
        previous: Option<String>,
    }

    fn rename(name: &str) -> Box<dyn UndoableCommand> {
        Box::new(RenameCommand {
            name: name.to_string(),
            previous: None,
        })
    }

    impl UndoableCommand for RenameCommand {
        fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
            self.previous = Some(song.name().to_string());
            song.set_name(self.name.clone());
            Ok(())
        }

        fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
            let previous = self
                .previous
                .take()
                .ok_or_else(|| CommandError::UndoFailed("rename was not executed".into()))?;
            song.set_name(previous);
            Ok(())
        }

        fn description(&self) -> String {
            format!("Rename song to {}", self.name)
        }
    }

    struct Rejected;

    impl UndoableCommand for Rejected {
        fn execute(&mut self, _song: &mut Song) -> CommandResult<()> {
            Err(CommandError::ExecutionFailed("rejected".into()))
        }

        fn undo(&mut self, _song: &mut Song) -> CommandResult<()> {
            Ok(())
        }

        fn description(&self) -> String {
            "Rejected".into()
        }
    }

    fn song() -> Song {
        Song::new("untitled", ChangeDispatcher::new())
    }

    #[test]
    fn test_execute_pushes_undo() {
        let mut history = CommandManager::new();
        let mut song = song();

        history.execute(rename("Ballad"), &mut song).unwrap();

        assert_eq!(song.name(), "Ballad");
        assert_eq!((history.undo_count(), history.redo_count()), (1, 0));
        assert_eq!(history.undo_description().as_deref(), Some("Rename song to Ballad"));
    }

    #[test]
    fn test_undo_then_redo() {
        let mut history = CommandManager::new();
        let mut song = song();
        history.execute(rename("Ballad"), &mut song).unwrap();
        history.execute(rename("Anthem"), &mut song).unwrap();

        assert_eq!(history.undo(&mut song).unwrap(), "Rename song to Anthem");
        assert_eq!(song.name(), "Ballad");
        assert_eq!(history.undo(&mut song).unwrap(), "Rename song to Ballad");
        assert_eq!(song.name(), "untitled");
        assert!(!history.can_undo());
        assert_eq!(history.redo_count(), 2);

        history.redo(&mut song).unwrap();
        assert_eq!(song.name(), "Ballad");
        assert_eq!(history.redo_description().as_deref(), Some("Rename song to Anthem"));
    }

    #[test]
    fn test_execute_drops_redo() {
        let mut history = CommandManager::new();
        let mut song = song();
        history.execute(rename("a"), &mut song).unwrap();
        history.undo(&mut song).unwrap();
        assert!(history.can_redo());

        history.execute(rename("b"), &mut song).unwrap();
        assert!(!history.can_redo());
    }

    #[test]
    fn test_oldest_dropped_past_limit() {
        let mut history = CommandManager::with_capacity(3);
        let mut song = song();
        for name in ["a", "b", "c", "d", "e"] {
            history.execute(rename(name), &mut song).unwrap();
        }
        assert_eq!(history.undo_count(), 3);

        while history.can_undo() {
            history.undo(&mut song).unwrap();
        }
        assert_eq!(song.name(), "b");
        assert_eq!(CommandManager::with_capacity(0).max_history(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = StoreConfig {
            max_undo_history: 7,
            ..StoreConfig::default()
        };
        assert_eq!(CommandManager::from_config(&config).max_history(), 7);
    }

    #[test]
    fn test_rejected_command_not_recorded() {
        let mut history = CommandManager::new();
        let mut song = song();

        assert!(history.execute(Box::new(Rejected), &mut song).is_err());
        assert!(!history.can_undo());
        assert!(history.undo(&mut song).is_err());
        assert!(history.redo(&mut song).is_err());
    }
}
