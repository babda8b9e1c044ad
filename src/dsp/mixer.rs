//! Output bus — the end of every voice's signal path.
//!
//! Voices add into a scratch buffer; the bus then runs the shared limiter,
//! master gain and a soft clipper over the sum. There is exactly one bus per
//! instrument, created with it and never rebuilt.

use crate::config::LimiterConfig;

use super::compressor::Compressor;

#[derive(Debug, Clone)]
pub struct OutputBus {
    pub master_gain: f64,
    limiter: Compressor,
    buffer: Vec<f64>,
}

impl OutputBus {
    pub fn new(config: &LimiterConfig, sample_rate: f64) -> Self {
        OutputBus {
            master_gain: config.master_gain,
            limiter: Compressor::new(config, sample_rate),
            buffer: Vec::new(),
        }
    }

    /// Prepare a buffer of `num_samples` filled with zeros and hand it out
    /// for voices to sum into.
    pub fn clear(&mut self, num_samples: usize) -> &mut [f64] {
        self.buffer.clear();
        self.buffer.resize(num_samples, 0.0);
        &mut self.buffer
    }

    /// Run the summed buffer through the limiter into `out`.
    pub fn finish(&mut self, out: &mut [f32]) {
        for (dst, &s) in out.iter_mut().zip(self.buffer.iter()) {
            let limited = self.limiter.process(s);
            *dst = soft_clip(limited * self.master_gain) as f32;
        }
    }

    pub fn gain_reduction(&self) -> f64 {
        self.limiter.gain_reduction()
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_in_silence_out() {
        let mut bus = OutputBus::new(&LimiterConfig::default(), 44100.0);
        bus.clear(128);
        let mut out = vec![1.0_f32; 128];
        bus.finish(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn accumulates_and_passes_quiet_signal() {
        let mut bus = OutputBus::new(&LimiterConfig::default(), 44100.0);
        let buf = bus.clear(4);
        buf[0] += 0.01;
        buf[0] += 0.01;
        buf[1] += 0.005;

        let mut out = vec![0.0_f32; 4];
        bus.finish(&mut out);
        assert!((out[0] - soft_clip(0.02) as f32).abs() < 1e-4);
        assert!(out[1] > 0.0);
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn loud_input_stays_bounded() {
        let mut bus = OutputBus::new(&LimiterConfig::default(), 44100.0);
        let buf = bus.clear(4410);
        for s in buf.iter_mut() {
            *s = 8.0;
        }
        let mut out = vec![0.0_f32; 4410];
        bus.finish(&mut out);
        assert!(out.iter().all(|s| s.abs() <= 1.0));
        assert!(out[4409] < out[0], "limiter should clamp down over time");
    }
}
