//! SegmentBuilder — extracts and re-encodes one cut-plan segment from its
//! assigned source clip, applying the short-source reversal fallback when
//! the source is too short to cover the segment's duration directly.

use std::collections::HashMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::{PipelineError, Result};
use crate::media::{MediaProbe, MediaRunner};
use crate::profile::VideoProfile;

const MIN_SLACK_S: f64 = 0.05;
const SUB_OFFSET_PAD_S: f64 = 0.01;

pub struct SegmentBuilder {
    runner: MediaRunner,
    probe: MediaProbe,
    profile: VideoProfile,
    /// Running read offset per source clip, keyed by clip index. A clip's
    /// offset wraps back to zero once it would exceed the clip's own
    /// duration, per the orchestrator's wrap-around boundary policy.
    offsets: HashMap<usize, f64>,
}

impl SegmentBuilder {
    pub fn new(runner: MediaRunner, probe: MediaProbe, profile: VideoProfile) -> Self {
        Self {
            runner,
            probe,
            profile,
            offsets: HashMap::new(),
        }
    }

    /// Build segment `index` (duration `w` seconds) from `clip_path`, writing
    /// the re-encoded result to `out_path`.
    pub fn build_segment(
        &mut self,
        clip_index: usize,
        clip_path: &str,
        duration_s: f64,
        out_path: &std::path::Path,
        tempdir: &std::path::Path,
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        let d_v = self.probe.duration(clip_path).map_err(|e| PipelineError::VideoBroken {
            path: clip_path.to_string(),
            tail: e.message,
        })?;

        let offset = *self.offsets.get(&clip_index).unwrap_or(&0.0);
        let offset = if offset >= d_v { 0.0 } else { offset };

        let (start, need_reverse) = if d_v - offset >= duration_s + MIN_SLACK_S {
            let max_start = d_v - duration_s - SUB_OFFSET_PAD_S;
            let span_start = offset.min(max_start.max(offset));
            let t0 = if max_start > span_start {
                rng.gen_range(span_start..max_start)
            } else {
                span_start
            };
            (t0, false)
        } else {
            (offset, true)
        };

        let effective_span = (d_v - start).min(duration_s);

        if need_reverse && effective_span < duration_s - self.profile.min_frame_gap_s() / 2.0 {
            self.build_with_reversal(clip_path, start, duration_s, out_path, tempdir)?;
        } else {
            self.extract_forward(clip_path, start, duration_s, out_path)?;
        }

        self.offsets.insert(clip_index, start + duration_s);
        Ok(())
    }

    fn extract_forward(
        &self,
        clip_path: &str,
        start_s: f64,
        duration_s: f64,
        out_path: &std::path::Path,
    ) -> Result<()> {
        let args = vec![
            "-ss".to_string(),
            format!("{start_s:.3}"),
            "-i".to_string(),
            clip_path.to_string(),
            "-t".to_string(),
            format!("{duration_s:.3}"),
            "-filter_complex".to_string(),
            self.profile.background_pad_filter_complex("vout"),
            "-map".to_string(),
            "[vout]".to_string(),
            "-an".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "18".to_string(),
            out_path.to_string_lossy().to_string(),
        ];
        self.runner.run(&args).map_err(|e| PipelineError::VideoBroken {
            path: clip_path.to_string(),
            tail: e.tail,
        })
    }

    /// Forward-read what's available, then append a time-reversed copy of
    /// the same span so the concatenation covers at least `duration_s`.
    fn build_with_reversal(
        &self,
        clip_path: &str,
        start_s: f64,
        duration_s: f64,
        out_path: &std::path::Path,
        tempdir: &std::path::Path,
    ) -> Result<()> {
        let forward_path = tempdir.join(format!("seg_fwd_{}.mp4", uuid::Uuid::new_v4()));
        let reversed_path = tempdir.join(format!("seg_rev_{}.mp4", uuid::Uuid::new_v4()));

        let fwd_args = vec![
            "-ss".to_string(),
            format!("{start_s:.3}"),
            "-i".to_string(),
            clip_path.to_string(),
            "-filter_complex".to_string(),
            self.profile.background_pad_filter_complex("vout"),
            "-map".to_string(),
            "[vout]".to_string(),
            "-an".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "18".to_string(),
            forward_path.to_string_lossy().to_string(),
        ];
        self.runner.run(&fwd_args).map_err(|e| PipelineError::VideoBroken {
            path: clip_path.to_string(),
            tail: e.tail,
        })?;

        let rev_args = vec![
            "-i".to_string(),
            forward_path.to_string_lossy().to_string(),
            "-vf".to_string(),
            "reverse".to_string(),
            "-an".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "18".to_string(),
            reversed_path.to_string_lossy().to_string(),
        ];
        self.runner.run(&rev_args).map_err(|e| PipelineError::VideoBroken {
            path: clip_path.to_string(),
            tail: e.tail,
        })?;

        let manifest_path = tempdir.join(format!("seg_concat_{}.txt", uuid::Uuid::new_v4()));
        let manifest = format!(
            "file '{}'\nfile '{}'\n",
            forward_path.display(),
            reversed_path.display()
        );
        std::fs::write(&manifest_path, manifest).map_err(|e| PipelineError::RenderFail {
            step: "segment_reverse_manifest".to_string(),
            tail: e.to_string(),
        })?;

        let concat_args = vec![
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            manifest_path.to_string_lossy().to_string(),
            "-t".to_string(),
            format!("{duration_s:.3}"),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "18".to_string(),
            out_path.to_string_lossy().to_string(),
        ];
        self.runner.run(&concat_args).map_err(|e| PipelineError::VideoBroken {
            path: clip_path.to_string(),
            tail: e.tail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_wraps_around_when_exceeding_clip_duration() {
        let mut offsets: HashMap<usize, f64> = HashMap::new();
        offsets.insert(0, 9.9);
        let d_v = 10.0;
        let offset = *offsets.get(&0).unwrap_or(&0.0);
        let offset = if offset >= d_v { 0.0 } else { offset };
        assert_eq!(offset, 9.9);

        offsets.insert(0, 10.1);
        let offset = *offsets.get(&0).unwrap_or(&0.0);
        let offset = if offset >= d_v { 0.0 } else { offset };
        assert_eq!(offset, 0.0);
    }
}
