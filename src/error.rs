use std::fmt;

#[derive(Debug)]
pub enum KeyfallError {
    Config(ConfigError),
    Song(SongError),
    Json(serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidSampleRate { value: f64 },
    InvalidEnvelope { field: &'static str, value: f64 },
    EmptyHarmonics,
    InvalidHarmonic { multiplier: u32, gain: f64 },
    MissingFundamental,
    FundamentalNotLoudest { multiplier: u32, gain: f64 },
    InvalidCutoff { min: f64, max: f64, nyquist: f64 },
    InvalidVelocity { value: f64 },
    InvalidTiming { field: &'static str },
    DuplicateKey { key: char },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SongError {
    UnknownPitch { name: String },
    UnknownSong { name: String },
}

impl fmt::Display for KeyfallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyfallError::Config(e) => write!(f, "Config error: {e}"),
            KeyfallError::Song(e) => write!(f, "Song error: {e}"),
            KeyfallError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for KeyfallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyfallError::Config(e) => Some(e),
            KeyfallError::Song(e) => Some(e),
            KeyfallError::Json(e) => Some(e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidSampleRate { value } => write!(f, "Invalid sample rate {value}"),
            ConfigError::InvalidEnvelope { field, value } => {
                write!(f, "Envelope {field} out of range: {value}")
            }
            ConfigError::EmptyHarmonics => write!(f, "Harmonic stack is empty"),
            ConfigError::InvalidHarmonic { multiplier, gain } => {
                write!(f, "Invalid harmonic x{multiplier} with gain {gain}")
            }
            ConfigError::MissingFundamental => write!(f, "Harmonic stack has no fundamental (x1)"),
            ConfigError::FundamentalNotLoudest { multiplier, gain } => write!(
                f,
                "Harmonic x{multiplier} (gain {gain}) is louder than the fundamental"
            ),
            ConfigError::InvalidCutoff { min, max, nyquist } => write!(
                f,
                "Filter cutoff range {min}..{max} Hz is invalid (nyquist {nyquist} Hz)"
            ),
            ConfigError::InvalidVelocity { value } => write!(f, "Default velocity {value} not in (0, 1]"),
            ConfigError::InvalidTiming { field } => write!(f, "Timing value {field} must be positive"),
            ConfigError::DuplicateKey { key } => write!(f, "Key '{key}' is bound more than once"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl fmt::Display for SongError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SongError::UnknownPitch { name } => write!(f, "Unknown pitch '{name}'"),
            SongError::UnknownSong { name } => write!(f, "Unknown song '{name}'"),
        }
    }
}

impl std::error::Error for SongError {}

impl From<ConfigError> for KeyfallError {
    fn from(e: ConfigError) -> Self {
        KeyfallError::Config(e)
    }
}

impl From<SongError> for KeyfallError {
    fn from(e: SongError) -> Self {
        KeyfallError::Song(e)
    }
}

impl From<serde_json::Error> for KeyfallError {
    fn from(e: serde_json::Error) -> Self {
        KeyfallError::Json(e)
    }
}
