//! Instrument, rhythm-game and playback configuration.
//!
//! Every section deserializes from JSON with camelCase keys and falls back
//! to the stock instrument for anything omitted, so `{}` is a valid config.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, KeyfallError};
use crate::pitch::Pitch;

// ── Top level ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PianoConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f64,
    /// Velocity used when an input carries none, in (0, 1].
    pub default_velocity: f64,
    pub envelope: EnvelopeConfig,
    /// Sine partials summed per voice.
    pub harmonics: Vec<Harmonic>,
    pub filter: FilterConfig,
    pub limiter: LimiterConfig,
    pub game: GameConfig,
    pub playback: PlaybackConfig,
    pub keymap: Vec<KeyBinding>,
}

impl Default for PianoConfig {
    fn default() -> Self {
        PianoConfig {
            sample_rate: 44_100.0,
            default_velocity: 0.8,
            envelope: EnvelopeConfig::default(),
            harmonics: vec![
                Harmonic { multiplier: 1, gain: 0.7 },
                Harmonic { multiplier: 2, gain: 0.25 },
                Harmonic { multiplier: 3, gain: 0.15 },
                Harmonic { multiplier: 4, gain: 0.075 },
            ],
            filter: FilterConfig::default(),
            limiter: LimiterConfig::default(),
            game: GameConfig::default(),
            playback: PlaybackConfig::default(),
            keymap: default_keymap(),
        }
    }
}

impl PianoConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, KeyfallError> {
        let config: PianoConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::InvalidSampleRate { value: self.sample_rate });
        }
        if !(self.default_velocity > 0.0 && self.default_velocity <= 1.0) {
            return Err(ConfigError::InvalidVelocity { value: self.default_velocity });
        }
        self.envelope.validate()?;
        validate_harmonics(&self.harmonics)?;
        self.filter.validate(self.sample_rate / 2.0)?;
        self.game.validate()?;
        self.playback.validate()?;

        let mut seen = HashSet::new();
        for binding in &self.keymap {
            if !seen.insert(binding.key.to_ascii_uppercase()) {
                return Err(ConfigError::DuplicateKey { key: binding.key });
            }
        }
        Ok(())
    }
}

// ── Envelope ────────────────────────────────────────────────

/// ADSR shape shared by every voice. Times are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnvelopeConfig {
    pub attack: f64,
    pub decay: f64,
    /// Sustain level [0, 1], relative to the note's velocity.
    pub sustain: f64,
    pub release: f64,
    /// Re-attack time used when a sounding pitch is triggered again.
    pub retrigger_attack: f64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        EnvelopeConfig {
            attack: 0.015,
            decay: 0.1,
            sustain: 0.8,
            release: 0.3,
            retrigger_attack: 0.005,
        }
    }
}

impl EnvelopeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let times = [
            ("attack", self.attack),
            ("decay", self.decay),
            ("release", self.release),
            ("retriggerAttack", self.retrigger_attack),
        ];
        for (field, value) in times {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidEnvelope { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.sustain) {
            return Err(ConfigError::InvalidEnvelope {
                field: "sustain",
                value: self.sustain,
            });
        }
        Ok(())
    }

    /// Release time in whole milliseconds, rounded up so the disposal
    /// never fires before the fade-out reaches silence.
    pub fn release_ms(&self) -> u64 {
        (self.release * 1000.0 - 1e-9).ceil().max(0.0) as u64
    }
}

// ── Timbre ──────────────────────────────────────────────────

/// One partial of the harmonic stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Harmonic {
    /// Integer multiple of the fundamental frequency.
    pub multiplier: u32,
    /// Relative gain in (0, 1].
    pub gain: f64,
}

fn validate_harmonics(harmonics: &[Harmonic]) -> Result<(), ConfigError> {
    if harmonics.is_empty() {
        return Err(ConfigError::EmptyHarmonics);
    }
    for h in harmonics {
        if h.multiplier == 0 || !(h.gain > 0.0 && h.gain <= 1.0) {
            return Err(ConfigError::InvalidHarmonic {
                multiplier: h.multiplier,
                gain: h.gain,
            });
        }
    }
    let fundamental = harmonics
        .iter()
        .filter(|h| h.multiplier == 1)
        .map(|h| h.gain)
        .fold(None, |best: Option<f64>, g| Some(best.map_or(g, |b| b.max(g))))
        .ok_or(ConfigError::MissingFundamental)?;
    if let Some(louder) = harmonics
        .iter()
        .find(|h| h.multiplier != 1 && h.gain > fundamental)
    {
        return Err(ConfigError::FundamentalNotLoudest {
            multiplier: louder.multiplier,
            gain: louder.gain,
        });
    }
    Ok(())
}

/// Velocity-tracking low-pass applied per voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterConfig {
    /// Cutoff at velocity 0, in Hz.
    pub min_cutoff: f64,
    /// Cutoff at velocity 1, in Hz.
    pub max_cutoff: f64,
    pub q: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            min_cutoff: 2000.0,
            max_cutoff: 8000.0,
            q: 1.5,
        }
    }
}

impl FilterConfig {
    fn validate(&self, nyquist: f64) -> Result<(), ConfigError> {
        let ordered = self.min_cutoff > 0.0 && self.min_cutoff <= self.max_cutoff;
        if !ordered || self.max_cutoff >= nyquist || !(self.q > 0.0) {
            return Err(ConfigError::InvalidCutoff {
                min: self.min_cutoff,
                max: self.max_cutoff,
                nyquist,
            });
        }
        Ok(())
    }

    /// Brighter tone for harder notes.
    pub fn cutoff_for(&self, velocity: f64) -> f64 {
        self.min_cutoff + velocity * (self.max_cutoff - self.min_cutoff)
    }
}

/// Shared dynamics stage at the end of the signal path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LimiterConfig {
    /// Threshold in dB.
    pub threshold: f64,
    /// Knee width in dB.
    pub knee: f64,
    pub ratio: f64,
    /// Attack time in seconds.
    pub attack: f64,
    /// Release time in seconds.
    pub release: f64,
    /// Linear gain applied after limiting.
    pub master_gain: f64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        LimiterConfig {
            threshold: -24.0,
            knee: 30.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
            master_gain: 1.0,
        }
    }
}

// ── Modes ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    /// Delay before the first note of a song is due.
    pub lead_in_ms: u64,
    /// Tolerance on either side of a note's target time.
    pub hit_window_ms: u64,
    /// Time a note takes to fall from the top of its lane to the hit line.
    pub note_speed_seconds: f64,
    /// How long the feedback note for a hit sounds.
    pub feedback_release_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            lead_in_ms: 3000,
            hit_window_ms: 300,
            note_speed_seconds: 2.0,
            feedback_release_ms: 300,
        }
    }
}

impl GameConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.hit_window_ms == 0 {
            return Err(ConfigError::InvalidTiming { field: "hitWindowMs" });
        }
        if !(self.note_speed_seconds.is_finite() && self.note_speed_seconds > 0.0) {
            return Err(ConfigError::InvalidTiming { field: "noteSpeedSeconds" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackConfig {
    /// How long each demo note is held.
    pub note_duration_ms: u64,
    /// Delay after the last note's start before playback stops.
    pub tail_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            note_duration_ms: 300,
            tail_ms: 500,
        }
    }
}

impl PlaybackConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tail_ms < self.note_duration_ms {
            return Err(ConfigError::InvalidTiming { field: "tailMs" });
        }
        Ok(())
    }
}

// ── Keymap ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyBinding {
    pub key: char,
    pub pitch: Pitch,
}

/// Home-row layout for an AZERTY keyboard: white keys on Q S D F G H J,
/// black keys on the row above.
pub fn default_keymap() -> Vec<KeyBinding> {
    [
        ('Q', Pitch::C),
        ('Z', Pitch::CSharp),
        ('S', Pitch::D),
        ('E', Pitch::DSharp),
        ('D', Pitch::E),
        ('F', Pitch::F),
        ('R', Pitch::FSharp),
        ('G', Pitch::G),
        ('T', Pitch::GSharp),
        ('H', Pitch::A),
        ('Y', Pitch::ASharp),
        ('J', Pitch::B),
    ]
    .into_iter()
    .map(|(key, pitch)| KeyBinding { key, pitch })
    .collect()
}
