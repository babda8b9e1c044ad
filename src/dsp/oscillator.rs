//! Sine oscillator used for each partial of the harmonic stack.

use std::f64::consts::PI;

/// A phase-accumulating sine oscillator.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub frequency: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(frequency: f64, sample_rate: f64) -> Self {
        Oscillator {
            frequency,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Phase increment per sample.
    fn phase_inc(&self) -> f64 {
        self.frequency / self.sample_rate
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        let sample = (2.0 * PI * self.phase).sin();

        self.phase += self.phase_inc();
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample
    }

    /// Reset oscillator phase.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// A sine partial with its fixed mix gain.
#[derive(Debug, Clone)]
pub struct Partial {
    pub oscillator: Oscillator,
    pub gain: f64,
}

impl Partial {
    pub fn new(frequency: f64, gain: f64, sample_rate: f64) -> Self {
        Partial {
            oscillator: Oscillator::new(frequency, sample_rate),
            gain,
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        self.oscillator.next_sample() * self.gain
    }
}
