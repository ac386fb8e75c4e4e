// MyMusic Timeline - Library exports for tests and benchmarks
//
// Event store of the sequencer: parts holding notes and controls on an
// integer tick axis, tracks placing parts, and the song owning both.

pub mod command;
pub mod config;
pub mod messaging;
pub mod part;
pub mod project;
pub mod sequencer;
pub mod song;
pub mod track;

// Re-export commonly used types for convenience
pub use command::{CommandManager, UndoableCommand};
pub use config::{ConfigError, StoreConfig};
pub use messaging::{ChangeDispatcher, Notification, NotificationSink, create_notification_channel};
pub use part::{
    ChannelChoice, ChannelFilter, EventId, Part, PartControl, PartError, PartId, PartNote,
    QueryEvent,
};
pub use project::{ProjectError, ProjectManager};
pub use sequencer::{ControlType, PlaybackEvent, SequencerPlayer, SongTiming, Tempo, TimeSignature};
pub use song::{Song, SongError};
pub use track::{Track, TrackError, TrackId};
