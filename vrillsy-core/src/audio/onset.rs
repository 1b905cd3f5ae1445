//! OnsetDetector — extracts a filtered sequence of onset times from the
//! conditioned audio via spectral-flux onset strength.
//!
//! The conditioned WAV is always 48 kHz PCM16, written by our own
//! `AudioConditioner`, so it is read directly with `hound` rather than
//! through symphonia's general-purpose decode path.

use rustfft::{FftPlanner, num_complex::Complex};

use crate::error::{PipelineError, Result};

const FFT_SIZE: usize = 1024;
const HOP_SIZE: usize = 512;

pub struct OnsetDetectorConfig {
    pub threshold: f64,
    pub min_gap_s: f64,
}

impl Default for OnsetDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.35,
            min_gap_s: 0.20,
        }
    }
}

pub struct OnsetDetector {
    config: OnsetDetectorConfig,
}

impl OnsetDetector {
    pub fn new(config: OnsetDetectorConfig) -> Self {
        Self { config }
    }

    /// Load `path` (a conditioned 48 kHz PCM WAV) and return its strictly
    /// increasing, minimum-gap-filtered onset times.
    pub fn detect(&self, path: &std::path::Path) -> Result<Vec<f64>> {
        let (mono, sample_rate) = load_mono_wav(path)?;
        let strengths = spectral_flux(&mono);
        let raw = pick_peaks(&strengths, self.config.threshold, sample_rate);
        Ok(post_filter(&raw, self.config.min_gap_s))
    }
}

fn load_mono_wav(path: &std::path::Path) -> Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::open(path).map_err(|e| PipelineError::BeatPipelineFail {
        type_name: "WavReaderError".to_string(),
        message: format!("cannot open {}: {e}", path.display()),
    })?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    let sample_rate = spec.sample_rate;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.into_samples::<f32>().filter_map(|s| s.ok()).collect(),
        hound::SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
    };

    let mono: Vec<f32> = if channels <= 1 {
        samples
    } else {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok((mono, sample_rate))
}

/// Short-time spectral flux: the positive-only sum of magnitude increase
/// between consecutive STFT frames, one value per hop.
fn spectral_flux(mono: &[f32]) -> Vec<(f64, f64)> {
    if mono.len() < FFT_SIZE {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);

    let window: Vec<f32> = (0..FFT_SIZE)
        .map(|i| {
            0.5 - 0.5
                * (2.0 * std::f32::consts::PI * i as f32 / (FFT_SIZE as f32 - 1.0)).cos()
        })
        .collect();

    let mut prev_mag = vec![0.0f32; FFT_SIZE / 2];
    let mut out = Vec::new();
    let mut pos = 0usize;

    while pos + FFT_SIZE <= mono.len() {
        let mut buf: Vec<Complex<f32>> = (0..FFT_SIZE)
            .map(|i| Complex::new(mono[pos + i] * window[i], 0.0))
            .collect();
        fft.process(&mut buf);

        let mut flux = 0.0f32;
        for bin in 0..FFT_SIZE / 2 {
            let mag = buf[bin].norm();
            let diff = mag - prev_mag[bin];
            if diff > 0.0 {
                flux += diff;
            }
            prev_mag[bin] = mag;
        }

        out.push((pos as f64, flux as f64));
        pos += HOP_SIZE;
    }

    out
}

fn pick_peaks(strengths: &[(f64, f64)], threshold: f64, sample_rate: u32) -> Vec<f64> {
    if strengths.is_empty() {
        return Vec::new();
    }
    let max_flux = strengths.iter().map(|(_, f)| *f).fold(0.0f64, f64::max);
    if max_flux <= 0.0 {
        return Vec::new();
    }

    let mut onsets = Vec::new();
    for i in 1..strengths.len() - 1 {
        let (pos, val) = strengths[i];
        let (_, prev) = strengths[i - 1];
        let (_, next) = strengths[i + 1];
        let normalized = val / max_flux;
        if normalized >= threshold && val >= prev && val >= next {
            onsets.push(pos / sample_rate as f64);
        }
    }
    onsets
}

/// Keep `o` only if `o - last_kept >= min_gap_s`, guaranteeing the OnsetList
/// spacing invariant.
fn post_filter(onsets: &[f64], min_gap_s: f64) -> Vec<f64> {
    let mut kept = Vec::new();
    let mut last_kept = f64::NEG_INFINITY;
    for &o in onsets {
        if o - last_kept >= min_gap_s {
            kept.push(o);
            last_kept = o;
        }
    }
    kept
}
