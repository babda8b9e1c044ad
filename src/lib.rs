pub mod config;
pub mod dsp;
pub mod error;
pub mod game;
pub mod input;
pub mod piano;
pub mod pitch;
pub mod playback;
pub mod song;
pub mod timer;

pub use config::PianoConfig;
pub use dsp::envelope::Stage;
pub use dsp::registry::Notification;
pub use error::{ConfigError, KeyfallError, SongError};
pub use game::HitOutcome;
pub use piano::{FrameReport, Piano, SessionSummary};
pub use pitch::Pitch;
pub use song::{Song, SongBook, SongNote};

use log::warn;
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the keyfall version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: send panics and `log` output to the browser console.
/// Call once before creating a `WasmPiano`.
#[cfg(feature = "web")]
#[wasm_bindgen]
pub fn keyfall_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&format!("{e}")))
}

fn parse_pitch(name: &str) -> Option<Pitch> {
    match name.parse() {
        Ok(pitch) => Some(pitch),
        Err(e) => {
            warn!("{e}");
            None
        }
    }
}

/// WASM-exposed: the bundled songs as `[{name, notes: [{pitch, offsetMs}]}]`.
#[wasm_bindgen]
pub fn builtin_songs() -> Result<JsValue, JsValue> {
    let book = SongBook::builtin().map_err(|e| JsValue::from_str(&format!("{e}")))?;
    to_js(&book)
}

/// WASM-exposed instrument. Times are milliseconds on the host's clock;
/// unknown keys, pitches and song names are ignored.
#[wasm_bindgen]
pub struct WasmPiano {
    inner: Piano,
}

#[wasm_bindgen]
impl WasmPiano {
    /// Build from a config object, or the defaults when `undefined`/`null`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WasmPiano, JsValue> {
        let config: PianoConfig = if config.is_undefined() || config.is_null() {
            PianoConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| JsValue::from_str(&format!("{e}")))?
        };
        let inner = Piano::new(config).map_err(|e| JsValue::from_str(&format!("{e}")))?;
        Ok(WasmPiano { inner })
    }

    pub fn advance_to(&mut self, ms: f64) {
        self.inner.advance_to(ms.max(0.0) as u64);
    }

    pub fn now(&self) -> f64 {
        self.inner.now() as f64
    }

    pub fn key_down(&mut self, key: &str) -> Result<JsValue, JsValue> {
        let outcome = key.chars().next().and_then(|c| self.inner.key_down(c));
        to_js(&outcome)
    }

    pub fn key_up(&mut self, key: &str) {
        if let Some(c) = key.chars().next() {
            self.inner.key_up(c);
        }
    }

    pub fn pointer_down(&mut self, pitch: &str) -> Result<JsValue, JsValue> {
        let outcome = parse_pitch(pitch).and_then(|p| self.inner.pointer_down(p));
        to_js(&outcome)
    }

    pub fn pointer_up(&mut self) {
        self.inner.pointer_up();
    }

    pub fn blur(&mut self) {
        self.inner.blur();
    }

    pub fn trigger(&mut self, pitch: &str, velocity: Option<f64>) {
        if let Some(p) = parse_pitch(pitch) {
            match velocity {
                Some(v) => self.inner.trigger_with_velocity(p, v),
                None => self.inner.trigger(p),
            }
        }
    }

    pub fn release(&mut self, pitch: &str) {
        if let Some(p) = parse_pitch(pitch) {
            self.inner.release(p);
        }
    }

    pub fn force_stop_all(&mut self) {
        self.inner.force_stop_all();
    }

    /// Start a rhythm session on a bundled song. Returns false if unknown.
    pub fn start_song(&mut self, name: &str) -> bool {
        match self.inner.start_song(name) {
            Ok(()) => true,
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    pub fn frame(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.frame())
    }

    pub fn game_input(&mut self, pitch: &str) -> Result<JsValue, JsValue> {
        let outcome = parse_pitch(pitch).map(|p| self.inner.game_input(p));
        to_js(&outcome)
    }

    pub fn end_session(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.end_session())
    }

    pub fn score(&self) -> u32 {
        self.inner.score()
    }

    pub fn is_session_active(&self) -> bool {
        self.inner.is_session_active()
    }

    /// Play a bundled song in demo mode. Returns false if unknown.
    pub fn play_song(&mut self, name: &str) -> bool {
        match self.inner.play_song(name) {
            Ok(()) => true,
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }

    pub fn stop_playback(&mut self) {
        self.inner.stop_playback();
    }

    pub fn is_playing(&self) -> bool {
        self.inner.is_playing()
    }

    /// Render the next `frames` mono samples for an AudioWorklet.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        self.inner.render(frames)
    }

    pub fn drain_notifications(&mut self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.drain_notifications())
    }

    /// Keyboard key to print on the on-screen key for `pitch`.
    pub fn key_label(&self, pitch: &str) -> Option<String> {
        parse_pitch(pitch)
            .and_then(|p| self.inner.key_label(p))
            .map(String::from)
    }

    /// Clock time (ms) of the next scheduled task, if any.
    pub fn next_deadline(&self) -> Option<f64> {
        self.inner.next_deadline().map(|ms| ms as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn unknown_pitch_names_are_ignored() {
        assert_eq!(parse_pitch("Bb"), Some(Pitch::ASharp));
        assert_eq!(parse_pitch("H"), None);
    }
}
