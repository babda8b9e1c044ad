//! Per-voice low-pass. Darkens soft notes and opens up for hard ones.
//!
//! A second-order RBJ low-pass, the same response as a WebAudio
//! `BiquadFilterNode` of type `lowpass`.

use std::f64::consts::PI;

/// Normalized biquad coefficients (a0 = 1).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    fn lowpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);
        let a0 = 1.0 + alpha;

        // b0 = b2 = (1 - cos) / 2, b1 = 1 - cos
        let b1 = (1.0 - cos_w0) / a0;
        Coefficients {
            b0: b1 / 2.0,
            b1,
            b2: b1 / 2.0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LowPass {
    cutoff: f64,
    q: f64,
    sample_rate: f64,
    coefficients: Coefficients,
    // Transposed direct form II state
    z1: f64,
    z2: f64,
}

impl LowPass {
    /// `cutoff` is kept just under Nyquist.
    pub fn new(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let cutoff = clamp_cutoff(cutoff, sample_rate);
        LowPass {
            cutoff,
            q,
            sample_rate,
            coefficients: Coefficients::lowpass(cutoff, q, sample_rate),
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Move the cutoff without clearing the filter state, so a sounding
    /// note changes colour without a click.
    pub fn retune(&mut self, cutoff: f64) {
        self.cutoff = clamp_cutoff(cutoff, self.sample_rate);
        self.coefficients = Coefficients::lowpass(self.cutoff, self.q, self.sample_rate);
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let c = self.coefficients;
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }
}

fn clamp_cutoff(cutoff: f64, sample_rate: f64) -> f64 {
    cutoff.clamp(1.0, sample_rate * 0.49)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44_100.0;

    /// Steady-state peak of a sine at `freq` through `filter`.
    fn response(filter: &mut LowPass, freq: f64) -> f64 {
        (0..8820)
            .map(|i| filter.process((2.0 * PI * freq * i as f64 / SR).sin()))
            .skip(4410)
            .fold(0.0, |m: f64, s| m.max(s.abs()))
    }

    #[test]
    fn unity_gain_at_dc() {
        let mut f = LowPass::new(2000.0, 1.5, SR);
        let settled = (0..2000).map(|_| f.process(1.0)).last().unwrap();
        assert!((settled - 1.0).abs() < 1e-6, "got {settled}");
    }

    #[test]
    fn resonant_peak_at_cutoff() {
        // Q 1.5 lifts the cutoff region above unity.
        let mut f = LowPass::new(2000.0, 1.5, SR);
        let gain = response(&mut f, 2000.0);
        assert!((gain - 1.5).abs() < 0.05, "gain at cutoff {gain}");
    }

    #[test]
    fn soft_notes_are_darker() {
        let dark = response(&mut LowPass::new(2000.0, 1.5, SR), 6000.0);
        let bright = response(&mut LowPass::new(8000.0, 1.5, SR), 6000.0);
        assert!(dark < 0.2, "6 kHz through 2 kHz cutoff: {dark}");
        assert!(bright > 0.9, "6 kHz through 8 kHz cutoff: {bright}");
    }

    #[test]
    fn retune_keeps_state() {
        let mut f = LowPass::new(8000.0, 1.5, SR);
        for _ in 0..100 {
            f.process(1.0);
        }
        f.retune(2000.0);
        assert_eq!(f.cutoff(), 2000.0);
        // State carries over, so the output does not fall back to zero.
        let next = f.process(1.0);
        assert!(next > 0.5, "retune dropped the signal: {next}");
        let settled = (0..2000).map(|_| f.process(1.0)).last().unwrap();
        assert!((settled - 1.0).abs() < 1e-6, "got {settled}");
    }

    #[test]
    fn cutoff_stays_below_nyquist() {
        let mut f = LowPass::new(30_000.0, 1.5, SR);
        assert!(f.cutoff() < SR / 2.0);
        for i in 0..1000 {
            let out = f.process(if i % 2 == 0 { 1.0 } else { -1.0 });
            assert!(out.is_finite());
        }
    }
}
