//! The fixed output video profile. Every rendering stage treats this as an
//! invariant of output space, never a per-job parameter.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub pix_fmt: &'static str,
    pub sar: u32,
}

impl Default for VideoProfile {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            pix_fmt: "yuv420p",
            sar: 1,
        }
    }
}

impl VideoProfile {
    pub fn label(&self) -> String {
        format!("{}x{}@{}", self.width, self.height, self.fps)
    }

    /// The minimum inter-cut gap, `2/fps`, computed exactly as a rational.
    pub fn min_frame_gap_s(&self) -> f64 {
        2.0 / self.fps as f64
    }

    /// Per-segment normalization filter graph: builds a boxblur-inflated,
    /// frame-filling background from the source and overlays a letterboxed
    /// foreground copy centered on it. Replaces flat black center-pad bars
    /// with the source's own (blurred) imagery, per the output profile's
    /// framing contract. Reads `[0:v]` twice and writes to the label
    /// `out_label` (without brackets).
    pub fn background_pad_filter_complex(&self, out_label: &str) -> String {
        format!(
            "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,boxblur=20:1,crop={w}:{h}[bg];\
             [0:v]scale={w}:{h}:force_original_aspect_ratio=decrease[fg];\
             [bg][fg]overlay=(W-w)/2:(H-h)/2,setsar={sar},fps={fps},format={pf}[{out_label}]",
            w = self.width,
            h = self.height,
            fps = self.fps,
            sar = self.sar,
            pf = self.pix_fmt,
            out_label = out_label,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_frame_gap_is_exact_rational() {
        let p = VideoProfile::default();
        assert!((p.min_frame_gap_s() - (2.0 / 30.0)).abs() < 1e-12);
    }

    #[test]
    fn label_matches_qa_profile_field() {
        assert_eq!(VideoProfile::default().label(), "1080x1920@30");
    }

    #[test]
    fn background_pad_filter_builds_blurred_background_and_labels_output() {
        let p = VideoProfile::default();
        let chain = p.background_pad_filter_complex("vout");
        assert!(chain.starts_with("[0:v]scale=1080:1920"));
        assert!(chain.contains("boxblur=20:1"));
        assert!(chain.contains("overlay=(W-w)/2:(H-h)/2"));
        assert!(chain.ends_with("[vout]"));
    }
}
