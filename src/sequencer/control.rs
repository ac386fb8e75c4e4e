// Control types - controller signals stored in a part
// Numbering follows the MIDI signal layout of the event store

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a control event
///
/// `Velocity` and `FineTune` are attached to notes: they can be listed and
/// changed like controls, but their values live on the note itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlType {
    Program,
    Pressure,
    PitchBend,
    Velocity,
    FineTune,
    /// Continuous controller 0..=31
    Continuous(u8),
    Parameter,
    NonParameter,
    /// Plain MIDI controller 0..=127
    Control(u8),
}

impl ControlType {
    const CONTINUOUS_BASE: u32 = 64;
    const CONTROL_BASE: u32 = 128;

    /// Decode the numeric signal value
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::Program),
            2 => Some(Self::Pressure),
            3 => Some(Self::PitchBend),
            4 => Some(Self::Velocity),
            5 => Some(Self::FineTune),
            64..=95 => Some(Self::Continuous((raw - Self::CONTINUOUS_BASE) as u8)),
            101 => Some(Self::Parameter),
            102 => Some(Self::NonParameter),
            128..=255 => Some(Self::Control((raw - Self::CONTROL_BASE) as u8)),
            _ => None,
        }
    }

    /// Numeric signal value
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Program => 1,
            Self::Pressure => 2,
            Self::PitchBend => 3,
            Self::Velocity => 4,
            Self::FineTune => 5,
            Self::Continuous(n) => Self::CONTINUOUS_BASE + n as u32,
            Self::Parameter => 101,
            Self::NonParameter => 102,
            Self::Control(n) => Self::CONTROL_BASE + n as u32,
        }
    }

    /// False for out-of-range controller numbers
    pub fn is_valid(self) -> bool {
        match self {
            Self::Continuous(n) => n <= 31,
            Self::Control(n) => n <= 127,
            _ => true,
        }
    }

    /// True for the note-attached pseudo-controls
    pub fn is_note_control(self) -> bool {
        matches!(self, Self::Velocity | Self::FineTune)
    }

    /// Name used by the event storage format
    pub fn name(self) -> String {
        match self {
            Self::Program => "program".to_string(),
            Self::Pressure => "pressure".to_string(),
            Self::PitchBend => "pitch-bend".to_string(),
            Self::Velocity => "velocity".to_string(),
            Self::FineTune => "fine-tune".to_string(),
            Self::Continuous(n) => format!("continuous-{}", n),
            Self::Parameter => "parameter".to_string(),
            Self::NonParameter => "non-parameter".to_string(),
            Self::Control(n) => format!("control-{}", n),
        }
    }

    /// Parse a storage name back into a control type
    pub fn from_name(name: &str) -> Option<Self> {
        let parsed = match name {
            "program" => Self::Program,
            "pressure" => Self::Pressure,
            "pitch-bend" => Self::PitchBend,
            "velocity" => Self::Velocity,
            "fine-tune" => Self::FineTune,
            "parameter" => Self::Parameter,
            "non-parameter" => Self::NonParameter,
            _ => {
                if let Some(n) = name.strip_prefix("continuous-") {
                    Self::Continuous(n.parse().ok()?)
                } else if let Some(n) = name.strip_prefix("control-") {
                    Self::Control(n.parse().ok()?)
                } else {
                    return None;
                }
            }
        };
        parsed.is_valid().then_some(parsed)
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_numbering() {
        assert_eq!(ControlType::Program.to_raw(), 1);
        assert_eq!(ControlType::Continuous(7).to_raw(), 71);
        assert_eq!(ControlType::Control(0).to_raw(), 128);
        assert_eq!(ControlType::from_raw(71), Some(ControlType::Continuous(7)));
        assert_eq!(ControlType::from_raw(255), Some(ControlType::Control(127)));
        assert_eq!(ControlType::from_raw(0), None);
        assert_eq!(ControlType::from_raw(96), None);
    }

    #[test]
    fn test_validity() {
        assert!(ControlType::Continuous(31).is_valid());
        assert!(!ControlType::Continuous(32).is_valid());
        assert!(!ControlType::Control(128).is_valid());
    }

    #[test]
    fn test_note_controls() {
        assert!(ControlType::Velocity.is_note_control());
        assert!(ControlType::FineTune.is_note_control());
        assert!(!ControlType::PitchBend.is_note_control());
    }

    #[test]
    fn test_names() {
        for ctype in [
            ControlType::Program,
            ControlType::PitchBend,
            ControlType::Continuous(12),
            ControlType::NonParameter,
            ControlType::Control(64),
        ] {
            assert_eq!(ControlType::from_name(&ctype.name()), Some(ctype));
        }
        assert_eq!(ControlType::from_name("continuous-40"), None);
        assert_eq!(ControlType::from_name("bogus"), None);
    }
}
