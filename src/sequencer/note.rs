// Note constants for the event store
// Pitch/fine-tune ranges, tick limits and the 12-TET semitone table

use std::sync::Arc;

/// Exclusive upper bound of the tick axis
pub const MAX_TICK: u32 = 0x7fff_ffff;

/// Maximum number of note channels a part may grow to
pub const MAX_CHANNELS: usize = 0x1024;

/// Lowest note number
pub const MIN_NOTE: i32 = 0;

/// Highest note number
pub const MAX_NOTE: i32 = 131;

/// Reference note (A4, tuned to [`KAMMER_FREQUENCY`])
pub const KAMMER_NOTE: i32 = 69;

/// Frequency of [`KAMMER_NOTE`] in Hz
pub const KAMMER_FREQUENCY: f64 = 440.0;

/// Lowest fine tune in cents
pub const MIN_FINE_TUNE: i32 = -100;

/// Highest fine tune in cents
pub const MAX_FINE_TUNE: i32 = 100;

/// Default ticks per quarter note
pub const DEFAULT_TPQN: u32 = 384;

/// Check a note number against [`MIN_NOTE`]..=[`MAX_NOTE`]
pub fn note_is_valid(note: i32) -> bool {
    (MIN_NOTE..=MAX_NOTE).contains(&note)
}

/// Check a fine tune value against [`MIN_FINE_TUNE`]..=[`MAX_FINE_TUNE`]
pub fn fine_tune_is_valid(fine_tune: i32) -> bool {
    (MIN_FINE_TUNE..=MAX_FINE_TUNE).contains(&fine_tune)
}

/// Clamp a note number into the valid range
pub fn note_clamp(note: i32) -> i32 {
    note.clamp(MIN_NOTE, MAX_NOTE)
}

/// Get the note name (e.g., "C4", "A#5")
///
/// Note 60 is middle C, so octave numbers follow the MIDI convention.
pub fn note_name(note: i32) -> String {
    const NOTE_NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];

    let note = note_clamp(note);
    let octave = note / 12 - 1;
    let note_index = (note % 12) as usize;

    format!("{}{}", NOTE_NAMES[note_index], octave)
}

/// Frequency factor of a fine tune offset in cents
pub fn cent_factor(fine_tune: i32) -> f64 {
    2f64.powf(fine_tune as f64 / 1200.0)
}

/// Frequency factors for every semitone offset from [`KAMMER_NOTE`]
///
/// Index 0 is `-SPAN` semitones, the middle entry is the reference pitch.
/// The table is immutable once built; a part swaps the whole `Arc` when the
/// tuning changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SemitoneTable {
    factors: Arc<[f64]>,
}

impl SemitoneTable {
    /// Largest semitone offset covered in either direction
    pub const SPAN: i32 = MAX_NOTE + 1;

    /// Twelve tone equal temperament
    pub fn equal_temperament() -> Self {
        let factors: Vec<f64> = (-Self::SPAN..=Self::SPAN)
            .map(|offset| 2f64.powf(offset as f64 / 12.0))
            .collect();
        Self {
            factors: factors.into(),
        }
    }

    /// Build a table from explicit factors, `2 * SPAN + 1` entries
    pub fn from_factors(factors: Vec<f64>) -> Option<Self> {
        let expected = (2 * Self::SPAN + 1) as usize;
        if factors.len() != expected || factors.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return None;
        }
        Some(Self {
            factors: factors.into(),
        })
    }

    /// Factor for a semitone offset relative to the reference note
    pub fn factor(&self, offset: i32) -> f64 {
        let offset = offset.clamp(-Self::SPAN, Self::SPAN);
        self.factors[(offset + Self::SPAN) as usize]
    }

    /// Frequency factor of a note relative to [`KAMMER_NOTE`]
    pub fn note_factor(&self, note: i32) -> f64 {
        self.factor(note_clamp(note) - KAMMER_NOTE)
    }

    /// Frequency in Hz of a note plus fine tune
    pub fn note_frequency(&self, note: i32, fine_tune: i32) -> f64 {
        KAMMER_FREQUENCY * self.note_factor(note) * cent_factor(fine_tune)
    }
}

impl Default for SemitoneTable {
    fn default() -> Self {
        Self::equal_temperament()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(69), "A4");
        assert_eq!(note_name(73), "C#5");
        assert_eq!(note_name(0), "C-1");
    }

    #[test]
    fn test_ranges() {
        assert!(note_is_valid(0));
        assert!(note_is_valid(131));
        assert!(!note_is_valid(132));
        assert!(!note_is_valid(-1));
        assert!(fine_tune_is_valid(-100));
        assert!(!fine_tune_is_valid(101));
    }

    #[test]
    fn test_equal_temperament() {
        let table = SemitoneTable::equal_temperament();
        assert!((table.note_frequency(KAMMER_NOTE, 0) - 440.0).abs() < 1e-9);
        assert!((table.note_frequency(81, 0) - 880.0).abs() < 1e-9);
        assert!((table.note_frequency(57, 0) - 220.0).abs() < 1e-9);

        // +100 cents equals one semitone up
        let up = table.note_frequency(69, 100);
        assert!((up - table.note_frequency(70, 0)).abs() < 1e-9);
    }

    #[test]
    fn test_from_factors_rejects_wrong_length() {
        assert!(SemitoneTable::from_factors(vec![1.0; 12]).is_none());
        let len = (2 * SemitoneTable::SPAN + 1) as usize;
        assert!(SemitoneTable::from_factors(vec![1.0; len]).is_some());
    }
}
