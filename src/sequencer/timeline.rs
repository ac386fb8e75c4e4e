// Timeline - Song timing on the integer tick axis
// Ticks per quarter note, time signature and tempo, plus tact arithmetic

use serde::{Deserialize, Serialize};
use std::fmt;

use super::note::DEFAULT_TPQN;

/// Time signature (numerator/denominator)
/// Example: 4/4 time = TimeSignature { numerator: 4, denominator: 4 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,   // Beats per bar (typically 3, 4, 5, 6, 7)
    pub denominator: u8, // Note value (4 = quarter note, 8 = eighth note)
}

impl TimeSignature {
    /// Creates a new time signature
    pub fn new(numerator: u8, denominator: u8) -> Self {
        assert!(numerator > 0, "Time signature numerator must be > 0");
        assert!(
            denominator.is_power_of_two(),
            "Time signature denominator must be power of 2"
        );
        Self {
            numerator,
            denominator,
        }
    }

    /// Fallible constructor for values read from configuration
    pub fn try_new(numerator: u8, denominator: u8) -> Option<Self> {
        (numerator > 0 && denominator.is_power_of_two()).then_some(Self {
            numerator,
            denominator,
        })
    }

    /// Common 4/4 time signature
    pub fn four_four() -> Self {
        Self::new(4, 4)
    }

    /// Common 3/4 time signature (waltz)
    pub fn three_four() -> Self {
        Self::new(3, 4)
    }

    /// Common 6/8 time signature
    pub fn six_eight() -> Self {
        Self::new(6, 8)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub const MIN_BPM: f64 = 20.0;
    pub const MAX_BPM: f64 = 999.0;

    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> Self {
        assert!(
            (Self::MIN_BPM..=Self::MAX_BPM).contains(&bpm),
            "BPM must be between 20 and 999"
        );
        Self { bpm }
    }

    /// Fallible constructor for values read from configuration
    pub fn try_new(bpm: f64) -> Option<Self> {
        (Self::MIN_BPM..=Self::MAX_BPM)
            .contains(&bpm)
            .then_some(Self { bpm })
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Timing of a song: resolution, meter and tempo
///
/// A "tact" is one bar; its length in ticks is
/// `tpqn * 4 * numerator / denominator`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SongTiming {
    /// Ticks per quarter note
    pub tpqn: u32,
    pub time_signature: TimeSignature,
    pub tempo: Tempo,
}

impl SongTiming {
    pub fn new(tpqn: u32, time_signature: TimeSignature, tempo: Tempo) -> Self {
        assert!(tpqn > 0, "Ticks per quarter note must be > 0");
        Self {
            tpqn,
            time_signature,
            tempo,
        }
    }

    /// Ticks per tact (bar)
    pub fn tpt(&self) -> u32 {
        self.tpqn * 4 * self.time_signature.numerator as u32
            / self.time_signature.denominator as u32
    }

    /// Ticks of one beat of the time signature
    pub fn ticks_per_beat(&self) -> u32 {
        self.tpqn * 4 / self.time_signature.denominator as u32
    }

    /// Wall clock position of a tick in seconds
    pub fn tick_to_seconds(&self, tick: u32) -> f64 {
        tick as f64 / self.tpqn as f64 * self.tempo.beat_duration_seconds()
    }

    /// Split a tick into 1-based bar and beat plus the tick within the beat
    pub fn bar_beat_tick(&self, tick: u32) -> (u32, u32, u32) {
        let tpt = self.tpt();
        let tpb = self.ticks_per_beat();
        let bar = tick / tpt + 1;
        let in_bar = tick % tpt;
        (bar, in_bar / tpb + 1, in_bar % tpb)
    }
}

impl Default for SongTiming {
    fn default() -> Self {
        Self::new(DEFAULT_TPQN, TimeSignature::default(), Tempo::default())
    }
}
