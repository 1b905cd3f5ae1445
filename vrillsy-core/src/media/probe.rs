//! MediaProbe — queries `ffprobe` for format duration and per-stream metadata.

use std::process::Command;

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct ProbeError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "probe failed for {}: {}", self.path, self.message)
    }
}

impl std::error::Error for ProbeError {}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub codec_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Raw `avg_frame_rate` string, e.g. `"30/1"`, left unparsed for callers
    /// that only need duration; `frame_rate()` parses it on demand.
    pub avg_frame_rate: Option<String>,
}

impl StreamInfo {
    pub fn frame_rate(&self) -> Option<f64> {
        let raw = self.avg_frame_rate.as_deref()?;
        let (num, den) = raw.split_once('/')?;
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            None
        } else {
            Some(num / den)
        }
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffprobe_bin: String,
}

impl Default for MediaProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MediaProbe {
    pub fn new(ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Format duration in seconds.
    pub fn duration(&self, path: &str) -> Result<f64, ProbeError> {
        let parsed = self.probe(path)?;
        parsed
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| ProbeError {
                path: path.to_string(),
                message: "no parseable format.duration in ffprobe output".to_string(),
            })
    }

    /// Per-stream metadata, in the order `ffprobe` reports them.
    pub fn streams(&self, path: &str) -> Result<Vec<StreamInfo>, ProbeError> {
        let parsed = self.probe(path)?;
        Ok(parsed
            .streams
            .unwrap_or_default()
            .into_iter()
            .map(|s| StreamInfo {
                codec_type: s.codec_type,
                width: s.width,
                height: s.height,
                avg_frame_rate: s.avg_frame_rate,
            })
            .collect())
    }

    fn probe(&self, path: &str) -> Result<FfprobeOutput, ProbeError> {
        let output = Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                path,
            ])
            .output()
            .map_err(|e| ProbeError {
                path: path.to_string(),
                message: format!("failed to spawn {}: {}", self.ffprobe_bin, e),
            })?;

        if !output.status.success() {
            return Err(ProbeError {
                path: path.to_string(),
                message: format!(
                    "ffprobe exited {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| ProbeError {
            path: path.to_string(),
            message: format!("unparseable ffprobe JSON: {e}"),
        })
    }
}
