//! Song data: ordered `(pitch, offset)` lists shared by rhythm and demo modes.

use serde::{Deserialize, Serialize};

use crate::error::{KeyfallError, SongError};
use crate::pitch::Pitch;

const BUILTIN_SONGS: &str = include_str!("../songs/builtin.json");

/// One note of a song, relative to the song start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongNote {
    pub pitch: Pitch,
    pub offset_ms: u64,
}

impl SongNote {
    pub fn new(pitch: Pitch, offset_ms: u64) -> Self {
        SongNote { pitch, offset_ms }
    }
}

/// A named note sequence. Offsets need not be sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub name: String,
    pub notes: Vec<SongNote>,
}

impl Song {
    pub fn new(name: impl Into<String>, notes: Vec<SongNote>) -> Self {
        Song {
            name: name.into(),
            notes,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, KeyfallError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Offset of the latest note (0 for an empty song).
    pub fn duration_ms(&self) -> u64 {
        self.notes.iter().map(|n| n.offset_ms).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// A list of songs the player can pick from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongBook {
    songs: Vec<Song>,
}

impl SongBook {
    /// The five songs bundled with the instrument.
    pub fn builtin() -> Result<Self, KeyfallError> {
        Self::from_json(BUILTIN_SONGS)
    }

    pub fn from_json(json: &str) -> Result<Self, KeyfallError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, name: &str) -> Result<&Song, SongError> {
        self.songs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| SongError::UnknownSong { name: name.to_string() })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.songs.iter().map(|s| s.name.as_str())
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn insert(&mut self, song: Song) {
        match self.songs.iter_mut().find(|s| s.name == song.name) {
            Some(existing) => *existing = song,
            None => self.songs.push(song),
        }
    }
}
