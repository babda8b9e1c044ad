//! Compressor — the shared dynamics stage that keeps dense chords from clipping.
//!
//! Implements a feed-forward compressor with threshold, ratio, knee,
//! attack, and release parameters matching the WebAudio DynamicsCompressorNode.

use crate::config::LimiterConfig;

/// A mono dynamics compressor.
#[derive(Debug, Clone)]
pub struct Compressor {
    /// Threshold in dB (typical: -50 to 0).
    pub threshold: f64,
    /// Compression ratio (e.g., 12.0 = 12:1 compression).
    pub ratio: f64,
    /// Knee width in dB (0 = hard knee, higher = softer transition).
    pub knee: f64,

    attack_coef: f64,
    release_coef: f64,

    // Internal state
    envelope: f64, // Current envelope level (linear)
}

impl Compressor {
    pub fn new(config: &LimiterConfig, sample_rate: f64) -> Self {
        let attack = config.attack.clamp(0.0001, 1.0);
        let release = config.release.clamp(0.001, 5.0);
        Self {
            threshold: config.threshold.clamp(-100.0, 0.0),
            ratio: config.ratio.clamp(1.0, 20.0),
            knee: config.knee.clamp(0.0, 40.0),
            attack_coef: (-1.0 / (attack * sample_rate)).exp(),
            release_coef: (-1.0 / (release * sample_rate)).exp(),
            envelope: 0.0,
        }
    }

    /// Convert linear amplitude to dB.
    #[inline]
    fn linear_to_db(linear: f64) -> f64 {
        if linear <= 0.0 {
            -120.0
        } else {
            20.0 * linear.log10()
        }
    }

    /// Convert dB to linear amplitude.
    #[inline]
    fn db_to_linear(db: f64) -> f64 {
        10.0_f64.powf(db / 20.0)
    }

    /// Compute gain reduction for a given input level (in dB).
    #[inline]
    fn compute_gain(&self, input_db: f64) -> f64 {
        let threshold = self.threshold;
        let ratio = self.ratio;
        let knee = self.knee;

        if knee <= 0.0 {
            // Hard knee
            if input_db <= threshold {
                0.0
            } else {
                (threshold - input_db) * (1.0 - 1.0 / ratio)
            }
        } else {
            // Soft knee
            let half_knee = knee / 2.0;
            let knee_start = threshold - half_knee;
            let knee_end = threshold + half_knee;

            if input_db <= knee_start {
                0.0
            } else if input_db >= knee_end {
                (threshold - input_db) * (1.0 - 1.0 / ratio)
            } else {
                // In the knee region - quadratic interpolation
                let x = input_db - knee_start;
                let knee_factor = x / knee;
                -knee_factor * knee_factor * (1.0 - 1.0 / ratio) * half_knee
            }
        }
    }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let input_level = input.abs();

        // Envelope follower (peak detection with attack/release)
        let coef = if input_level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * input_level;

        let gain_reduction_db = self.compute_gain(Self::linear_to_db(self.envelope));
        input * Self::db_to_linear(gain_reduction_db)
    }

    /// Reset the compressor state.
    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    /// Get the current gain reduction in dB (for metering).
    pub fn gain_reduction(&self) -> f64 {
        -self.compute_gain(Self::linear_to_db(self.envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hard_knee(threshold: f64, ratio: f64, attack: f64, release: f64) -> Compressor {
        Compressor::new(
            &LimiterConfig {
                threshold,
                knee: 0.0,
                ratio,
                attack,
                release,
                master_gain: 1.0,
            },
            44100.0,
        )
    }

    #[test]
    fn passthrough_below_threshold() {
        let mut comp = hard_knee(-20.0, 4.0, 0.001, 0.1);

        for _ in 0..1000 {
            comp.process(0.05); // -26 dB, below -20 threshold
        }

        let out = comp.process(0.05);
        assert!(
            (out - 0.05).abs() < 0.01,
            "Below threshold, output should be close to input: got {out}"
        );
    }

    #[test]
    fn reduces_loud_signals() {
        let mut comp = hard_knee(-12.0, 4.0, 0.001, 0.1);

        for _ in 0..5000 {
            comp.process(1.0);
        }

        // 4:1 ratio at 12dB above threshold should reduce by 9dB
        let out = comp.process(1.0);
        assert!(out < 0.5, "Compressor should reduce loud signals: got {out}");
        assert!(out > 0.1, "Compressor should not over-compress: got {out}");
    }

    #[test]
    fn attack_time() {
        let mut comp = hard_knee(-20.0, 10.0, 0.01, 0.5);

        let first = comp.process(1.0);
        for _ in 0..500 {
            comp.process(1.0);
        }
        let later = comp.process(1.0);

        assert!(
            first > later,
            "First sample should be louder than after attack: first={first}, later={later}"
        );
    }

    #[test]
    fn release_time() {
        let mut comp = hard_knee(-20.0, 10.0, 0.001, 0.05);

        for _ in 0..1000 {
            comp.process(1.0);
        }
        let compressed = comp.process(0.1);
        for _ in 0..5000 {
            comp.process(0.1);
        }
        let released = comp.process(0.1);

        assert!(
            released > compressed,
            "After release, gain should recover: compressed={compressed}, released={released}"
        );
    }

    #[test]
    fn default_limiter_tames_a_loud_chord() {
        let mut comp = Compressor::new(&LimiterConfig::default(), 44100.0);
        for _ in 0..10_000 {
            comp.process(2.0);
        }
        assert!(comp.gain_reduction() > 20.0, "reduction {}", comp.gain_reduction());
        comp.reset();
        assert_eq!(comp.gain_reduction(), 0.0);
    }
}
