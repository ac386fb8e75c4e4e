// Sequencer module
// Musical time, note and control vocabulary, the sequencer lock and the player

pub mod control;
pub mod lock;
pub mod note;
pub mod player;
pub mod timeline;

pub use control::ControlType;
pub use lock::{SeqLock, SeqReadGuard, SeqWriteGuard};
pub use note::SemitoneTable;
pub use player::{PlaybackEvent, SequencerPlayer};
pub use timeline::{SongTiming, Tempo, TimeSignature};
