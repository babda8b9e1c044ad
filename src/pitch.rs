//! Pitch classes and their fundamental frequencies.
//!
//! The instrument covers one octave starting at middle C (C4 = 261.63 Hz).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SongError;

/// One of the twelve chromatic pitch classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Pitch {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

/// Fundamental frequency (Hz) per pitch class, indexed by `Pitch::index`.
const FREQUENCIES: [f64; Pitch::COUNT] = [
    261.63, 277.18, 293.66, 311.13, 329.63, 349.23, 369.99, 392.00, 415.30, 440.00, 466.16, 493.88,
];

const NAMES: [&str; Pitch::COUNT] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

impl Pitch {
    pub const COUNT: usize = 12;

    pub const ALL: [Pitch; Pitch::COUNT] = [
        Pitch::C,
        Pitch::CSharp,
        Pitch::D,
        Pitch::DSharp,
        Pitch::E,
        Pitch::F,
        Pitch::FSharp,
        Pitch::G,
        Pitch::GSharp,
        Pitch::A,
        Pitch::ASharp,
        Pitch::B,
    ];

    /// Semitone index above C, in `0..12`.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn frequency(self) -> f64 {
        FREQUENCIES[self.index()]
    }

    #[inline]
    pub fn name(self) -> &'static str {
        NAMES[self.index()]
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pitch {
    type Err = SongError;

    /// Parse a sharp (`"F#"`) or flat (`"Gb"`) spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || SongError::UnknownPitch { name: s.to_string() };
        let mut chars = s.trim().chars();
        let base = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('C') => 0,
            Some('D') => 2,
            Some('E') => 4,
            Some('F') => 5,
            Some('G') => 7,
            Some('A') => 9,
            Some('B') => 11,
            _ => return Err(unknown()),
        };
        let semitone = match (chars.next(), chars.next()) {
            (None, _) => base,
            (Some('#'), None) => base + 1,
            (Some('b'), None) => base + 11,
            _ => return Err(unknown()),
        };
        Ok(Pitch::ALL[semitone % Pitch::COUNT])
    }
}

impl TryFrom<String> for Pitch {
    type Error = SongError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pitch> for String {
    fn from(pitch: Pitch) -> Self {
        pitch.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_is_440() {
        assert!((Pitch::A.frequency() - 440.0).abs() < 1e-9);
    }

    #[test]
    fn frequencies_ascend() {
        for pair in Pitch::ALL.windows(2) {
            assert!(
                pair[0].frequency() < pair[1].frequency(),
                "{} should be below {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn parses_sharps_and_flats() {
        assert_eq!("F#".parse::<Pitch>(), Ok(Pitch::FSharp));
        assert_eq!("Gb".parse::<Pitch>(), Ok(Pitch::FSharp));
        assert_eq!("Db".parse::<Pitch>(), Ok(Pitch::CSharp));
        assert_eq!("Cb".parse::<Pitch>(), Ok(Pitch::B));
        assert_eq!("c".parse::<Pitch>(), Ok(Pitch::C));
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("H".parse::<Pitch>().is_err());
        assert!("C##".parse::<Pitch>().is_err());
        assert!("".parse::<Pitch>().is_err());
    }

    #[test]
    fn names_round_trip_through_display() {
        for pitch in Pitch::ALL {
            assert_eq!(pitch.to_string().parse::<Pitch>(), Ok(pitch));
        }
    }

    #[test]
    fn serde_uses_note_names() {
        let json = serde_json::to_string(&Pitch::ASharp).unwrap();
        assert_eq!(json, "\"A#\"");
        let pitch: Pitch = serde_json::from_str("\"Eb\"").unwrap();
        assert_eq!(pitch, Pitch::DSharp);
    }
}
