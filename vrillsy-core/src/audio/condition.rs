//! AudioConditioner — produces a normalized, trimmed, faded WAV of known
//! duration from the raw input track.

use crate::error::{PipelineError, Result};
use crate::media::{MediaProbe, MediaRunner};

pub const CONDITIONED_FILENAME: &str = "audio_proc.wav";

/// In-fade/out-fade durations and loudnorm/compressor parameters, fixed by
/// the spec rather than configurable per job.
const IN_FADE_S: f64 = 0.020;
const OUT_FADE_S: f64 = 0.060;
const TRIM_PAD_S: f64 = 0.2;

pub struct AudioConditioner {
    runner: MediaRunner,
    probe: MediaProbe,
}

impl AudioConditioner {
    pub fn new(runner: MediaRunner, probe: MediaProbe) -> Self {
        Self { runner, probe }
    }

    /// Condition `audio_path` into `<tempdir>/audio_proc.wav`, trimmed to
    /// `target_s + 0.2`. Returns the conditioned file's path and measured
    /// duration.
    pub fn condition(
        &self,
        audio_path: &str,
        tempdir: &std::path::Path,
        target_s: f64,
    ) -> Result<(std::path::PathBuf, f64)> {
        let trimmed_duration = target_s + TRIM_PAD_S;
        let out_fade_start = trimmed_duration - OUT_FADE_S;
        let out_path = tempdir.join(CONDITIONED_FILENAME);

        let filter = format!(
            "loudnorm=I=-14:TP=-1.5:LRA=11:linear=true,\
             acompressor=threshold=-1.5dB:ratio=4:attack=5:release=50,\
             afade=t=in:st=0:d={in_fade},\
             afade=t=out:st={out_start:.3}:d={out_fade}",
            in_fade = IN_FADE_S,
            out_start = out_fade_start.max(0.0),
            out_fade = OUT_FADE_S,
        );

        let args = vec![
            "-i".to_string(),
            audio_path.to_string(),
            "-t".to_string(),
            format!("{trimmed_duration:.3}"),
            "-af".to_string(),
            filter,
            "-ac".to_string(),
            "2".to_string(),
            "-ar".to_string(),
            "48000".to_string(),
            "-c:a".to_string(),
            "pcm_s16le".to_string(),
            out_path.to_string_lossy().to_string(),
        ];

        self.runner.run(&args).map_err(|e| PipelineError::RenderFail {
            step: "audio_condition".to_string(),
            tail: e.tail,
        })?;

        let duration = self
            .probe
            .duration(&out_path.to_string_lossy())
            .map_err(|e| PipelineError::RenderFail {
                step: "audio_condition_probe".to_string(),
                tail: e.message,
            })?;

        Ok((out_path, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_fade_anchor_is_duration_minus_60ms() {
        let target_s = 10.0;
        let trimmed = target_s + TRIM_PAD_S;
        let anchor = trimmed - OUT_FADE_S;
        assert!((anchor - 10.14).abs() < 1e-9);
    }
}
