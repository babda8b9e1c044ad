//! DSP — the voice chain and the shared output bus.
//!
//! Every voice runs harmonic stack → envelope gain → low-pass, and all voices
//! sum into one bus that is limited and soft-clipped before leaving the crate.

pub mod compressor;
pub mod envelope;
pub mod filter;
pub mod mixer;
pub mod oscillator;
pub mod registry;
pub mod voice;
