//! Assembler — concatenates segments, muxes with the conditioned audio, and
//! atomically publishes the final artifacts.

use crate::error::{PipelineError, Result};
use crate::media::MediaRunner;

pub struct Assembler {
    runner: MediaRunner,
}

impl Assembler {
    pub fn new(runner: MediaRunner) -> Self {
        Self { runner }
    }

    /// Write a concat-demuxer manifest referencing `segment_paths` in plan
    /// order.
    pub fn write_concat_manifest(
        &self,
        segment_paths: &[std::path::PathBuf],
        manifest_path: &std::path::Path,
    ) -> Result<()> {
        let mut body = String::new();
        for p in segment_paths {
            body.push_str(&format!("file '{}'\n", p.display()));
        }
        std::fs::write(manifest_path, body).map_err(|e| PipelineError::RenderFail {
            step: "assemble_manifest".to_string(),
            tail: e.to_string(),
        })
    }

    /// Run the concat demuxer to produce a video-only intermediate
    /// (`<J>.mp4.vtmp.mp4`).
    pub fn concat_video(
        &self,
        manifest_path: &std::path::Path,
        vtmp_path: &std::path::Path,
    ) -> Result<()> {
        let args = vec![
            "-f".to_string(),
            "concat".to_string(),
            "-safe".to_string(),
            "0".to_string(),
            "-i".to_string(),
            manifest_path.to_string_lossy().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            vtmp_path.to_string_lossy().to_string(),
        ];
        self.runner.run(&args).map_err(|e| PipelineError::RenderFail {
            step: "assemble_concat".to_string(),
            tail: e.tail,
        })
    }

    /// Mux the video-only intermediate with the conditioned audio, clamping
    /// the final duration to exactly `target_s` on both branches.
    pub fn mux(
        &self,
        vtmp_path: &std::path::Path,
        audio_path: &std::path::Path,
        target_s: f64,
        final_path: &std::path::Path,
    ) -> Result<()> {
        let args = vec![
            "-i".to_string(),
            vtmp_path.to_string_lossy().to_string(),
            "-i".to_string(),
            audio_path.to_string_lossy().to_string(),
            "-filter:a".to_string(),
            format!("atrim=0:{target_s:.3}"),
            "-t".to_string(),
            format!("{target_s:.3}"),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-crf".to_string(),
            "18".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            final_path.to_string_lossy().to_string(),
        ];
        self.runner.run(&args).map_err(|e| PipelineError::RenderFail {
            step: "assemble_mux".to_string(),
            tail: e.tail,
        })
    }

    /// Atomically publish `src` to `dest` via a same-filesystem rename. The
    /// caller writes to a `.tmp`-suffixed sibling of `dest` and passes that
    /// path as `src`.
    pub fn publish_atomic(&self, src: &std::path::Path, dest: &std::path::Path) -> Result<()> {
        std::fs::rename(src, dest).map_err(|e| PipelineError::RenderFail {
            step: "assemble_publish".to_string(),
            tail: e.to_string(),
        })
    }

    /// Touch the `<J>.done` marker. Must only be called after both the
    /// final MP4 and the QA JSON are in place.
    pub fn touch_done_marker(&self, done_path: &std::path::Path) -> Result<()> {
        std::fs::write(done_path, []).map_err(|e| PipelineError::RenderFail {
            step: "assemble_done_marker".to_string(),
            tail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_manifest_quotes_each_segment_path() {
        let assembler = Assembler::new(MediaRunner::new("ffmpeg"));
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join("concat.txt");
        let segments = vec![dir.path().join("seg0.mp4"), dir.path().join("seg1.mp4")];
        assembler
            .write_concat_manifest(&segments, &manifest_path)
            .unwrap();
        let body = std::fs::read_to_string(&manifest_path).unwrap();
        assert!(body.contains("file '"));
        assert_eq!(body.lines().count(), 2);
    }

    #[test]
    fn publish_atomic_renames_tmp_to_final() {
        let assembler = Assembler::new(MediaRunner::new("ffmpeg"));
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("out.mp4.tmp");
        let dest = dir.path().join("out.mp4");
        std::fs::write(&src, b"data").unwrap();
        assembler.publish_atomic(&src, &dest).unwrap();
        assert!(dest.exists());
        assert!(!src.exists());
    }

    #[test]
    fn done_marker_is_zero_bytes() {
        let assembler = Assembler::new(MediaRunner::new("ffmpeg"));
        let dir = tempfile::tempdir().unwrap();
        let done_path = dir.path().join("job.done");
        assembler.touch_done_marker(&done_path).unwrap();
        let meta = std::fs::metadata(&done_path).unwrap();
        assert_eq!(meta.len(), 0);
    }
}
