//! 512-point FFT analysis of the mono downmix.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use super::AudioChunk;
use super::agc::AgcState;
use super::bands::{NUM_BANDS, band_levels};
use super::heights::SpectrumHeights;

/// Samples per analysis window.
pub const FFT_SIZE: usize = 512;

/// Owns the FFT plan, working buffers and AGC state for the analyzer task.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    levels: [f32; NUM_BANDS],
    pending: Vec<f32>,
    agc: AgcState,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        Self::with_agc(AgcState::default())
    }

    pub fn with_agc(agc: AgcState) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let window = (0..FFT_SIZE)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / (FFT_SIZE - 1) as f32;
                0.5 - 0.5 * phase.cos()
            })
            .collect();
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            scratch,
            magnitudes: vec![0.0; FFT_SIZE / 2],
            levels: [0.0; NUM_BANDS],
            pending: Vec::with_capacity(FFT_SIZE),
            agc,
        }
    }

    pub fn agc(&self) -> &AgcState {
        &self.agc
    }

    /// Samples waiting for the current window to fill.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Downmix `chunk` into the window accumulator.
    ///
    /// Calls `on_pass` with fresh heights every time a window fills. Samples
    /// past the window boundary start the next window.
    pub fn ingest(&mut self, chunk: &AudioChunk, mut on_pass: impl FnMut(&SpectrumHeights)) {
        let channels = chunk.channels.max(1) as usize;
        for frame in chunk.samples.chunks_exact(channels) {
            let mono = if channels == 2 {
                (frame[0] as i32 + frame[1] as i32) / 2
            } else {
                frame[0] as i32
            };
            self.pending.push(mono as f32);
            if self.pending.len() == FFT_SIZE {
                let heights = self.analyze();
                self.pending.clear();
                on_pass(&heights);
            }
        }
    }

    /// Run one pass over the full accumulator.
    fn analyze(&mut self) -> SpectrumHeights {
        for ((slot, sample), w) in self.buffer.iter_mut().zip(&self.pending).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
        for (mag, bin) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *mag = bin.norm();
        }

        band_levels(&self.magnitudes, &mut self.levels);
        self.agc.update(&self.levels);

        let mut heights = [0u8; NUM_BANDS];
        for (h, level) in heights.iter_mut().zip(&self.levels) {
            *h = self.agc.height(*level);
        }
        heights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::agc::{AGC_FLOOR, MAX_HEIGHT};

    fn mono(samples: Vec<i16>) -> AudioChunk {
        AudioChunk {
            samples,
            channels: 1,
        }
    }

    fn run(analyzer: &mut SpectrumAnalyzer, chunk: &AudioChunk) -> Vec<SpectrumHeights> {
        let mut passes = Vec::new();
        analyzer.ingest(chunk, |h| passes.push(*h));
        passes
    }

    /// Tone centred on FFT bin 62, inside band 22.
    fn tone(amplitude: f32) -> Vec<i16> {
        (0..FFT_SIZE)
            .map(|n| {
                let phase = 2.0 * std::f32::consts::PI * 62.0 * n as f32 / FFT_SIZE as f32;
                (amplitude * phase.sin()) as i16
            })
            .collect()
    }

    #[test]
    fn window_is_symmetric_hann() {
        let analyzer = SpectrumAnalyzer::new();
        assert!(analyzer.window[0].abs() < 1e-6);
        assert!(analyzer.window[FFT_SIZE - 1].abs() < 1e-6);
        assert!((analyzer.window[10] - analyzer.window[FFT_SIZE - 11]).abs() < 1e-5);
    }

    #[test]
    fn sine_lights_only_its_band() {
        let mut analyzer = SpectrumAnalyzer::new();
        let passes = run(&mut analyzer, &mono(tone(16_000.0)));
        assert_eq!(passes.len(), 1);
        let heights = passes[0];
        assert_eq!(heights[22], MAX_HEIGHT);
        for (band, h) in heights.iter().enumerate() {
            if !(21..=23).contains(&band) {
                assert_eq!(*h, 0, "band {band}");
            }
        }
    }

    #[test]
    fn silence_is_flat_and_decays_ceiling() {
        let mut analyzer = SpectrumAnalyzer::new();
        run(&mut analyzer, &mono(tone(16_000.0)));
        let loud = analyzer.agc().ceiling();
        assert!(loud > AGC_FLOOR);

        let passes = run(&mut analyzer, &mono(vec![0; FFT_SIZE]));
        assert_eq!(passes, vec![[0u8; NUM_BANDS]]);
        let decayed = analyzer.agc().ceiling();
        assert!((decayed - loud * 0.99).abs() <= loud * 1e-5);
        assert!(decayed >= AGC_FLOOR);
    }

    #[test]
    fn full_scale_input_stays_in_range() {
        let mut analyzer = SpectrumAnalyzer::new();
        let square: Vec<i16> = (0..FFT_SIZE * 3)
            .map(|n| if (n / 3) % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        for heights in run(&mut analyzer, &mono(square)) {
            assert!(heights.iter().all(|h| *h <= MAX_HEIGHT));
        }
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let mut stereo_analyzer = SpectrumAnalyzer::new();
        let mut mono_analyzer = SpectrumAnalyzer::new();
        let signal = tone(8_000.0);
        let stereo: Vec<i16> = signal.iter().flat_map(|s| [*s, *s]).collect();

        let from_stereo = run(
            &mut stereo_analyzer,
            &AudioChunk {
                samples: stereo,
                channels: 2,
            },
        );
        let from_mono = run(&mut mono_analyzer, &mono(signal));
        assert_eq!(from_stereo, from_mono);
        assert_eq!(stereo_analyzer.agc(), mono_analyzer.agc());
    }

    #[test]
    fn samples_past_window_carry_over() {
        let mut analyzer = SpectrumAnalyzer::new();
        assert!(run(&mut analyzer, &mono(vec![0; 300])).is_empty());
        assert_eq!(analyzer.pending_len(), 300);

        let passes = run(&mut analyzer, &mono(vec![0; 300]));
        assert_eq!(passes.len(), 1);
        assert_eq!(analyzer.pending_len(), 88);
    }

    #[test]
    fn stereo_pairs_cancel_when_opposed() {
        let mut analyzer = SpectrumAnalyzer::new();
        let signal = tone(12_000.0);
        let stereo: Vec<i16> = signal.iter().flat_map(|s| [*s, -*s]).collect();
        let passes = run(
            &mut analyzer,
            &AudioChunk {
                samples: stereo,
                channels: 2,
            },
        );
        assert_eq!(passes, vec![[0u8; NUM_BANDS]]);
        assert_eq!(analyzer.agc().ceiling(), AGC_FLOOR);
    }
}
