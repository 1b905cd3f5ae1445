//! Error taxonomy for the cut-planning and render pipeline.
//!
//! Mirrors the error codes surfaced to callers of `orchestrator::run_job`; every
//! variant carries enough context to serialize into the job's failure payload
//! without a caller needing to inspect the `Display` string.

use thiserror::Error;

/// Tail of combined stdout/stderr captured from a failed media-tool invocation,
/// capped at 4096 bytes so a failure payload never balloons past one ffmpeg run.
pub const TOOL_TAIL_CAP: usize = 4096;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("audio file not found: {path}")]
    AudioNotFound { path: String },

    #[error("{missing_count} video file(s) not found")]
    VideoNotFound {
        missing_count: usize,
        sample: Vec<String>,
    },

    #[error("fewer than 2 video clips supplied ({count})")]
    NotEnoughVideos { count: usize },

    #[error("invalid payload: {reason}")]
    InvalidPayload { reason: String },

    #[error("target duration must be > 0, got {target_s}")]
    TargetTooSmall { target_s: f64 },

    #[error("video source broken: {path}: {tail}")]
    VideoBroken { path: String, tail: String },

    #[error("render step failed: {step}: {tail}")]
    RenderFail { step: String, tail: String },

    #[error("output duration {duration_out_s:.3}s exceeds target {target_s:.3}s by more than 0.1s")]
    DurationCapViolation { duration_out_s: f64, target_s: f64 },

    #[error("beat pipeline failed: {type_name}: {message}")]
    BeatPipelineFail { type_name: String, message: String },

    #[error("job is locked by another worker")]
    Locked,
}

impl PipelineError {
    /// Stable machine-readable code, as listed in the job failure payload.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::AudioNotFound { .. } => "AUDIO_NOT_FOUND",
            PipelineError::VideoNotFound { .. } => "VIDEO_NOT_FOUND",
            PipelineError::NotEnoughVideos { .. } => "NOT_ENOUGH_VIDEOS",
            PipelineError::InvalidPayload { .. } => "INVALID_PAYLOAD",
            PipelineError::TargetTooSmall { .. } => "TARGET_TOO_SMALL",
            PipelineError::VideoBroken { .. } => "VIDEO_BROKEN",
            PipelineError::RenderFail { .. } => "RENDER_FAIL",
            PipelineError::DurationCapViolation { .. } => "DURATION_CAP_VIOLATION",
            PipelineError::BeatPipelineFail { .. } => "BEAT_PIPELINE_FAIL",
            PipelineError::Locked => "LOCKED",
        }
    }

    pub fn beat_pipeline_fail(err: &anyhow::Error) -> Self {
        PipelineError::BeatPipelineFail {
            type_name: "PipelineError".to_string(),
            message: err.to_string(),
        }
    }

    /// Per-variant structured fields, flattened into the job failure payload
    /// alongside `code`/`msg` (§6's "…diagnostics", e.g. S4's `missing_count`).
    pub fn diagnostics(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        match self {
            PipelineError::AudioNotFound { path } => {
                map.insert("path".to_string(), serde_json::Value::String(path.clone()));
            }
            PipelineError::VideoNotFound { missing_count, sample } => {
                map.insert("missing_count".to_string(), serde_json::json!(missing_count));
                map.insert("missing_sample".to_string(), serde_json::json!(sample));
            }
            PipelineError::NotEnoughVideos { count } => {
                map.insert("count".to_string(), serde_json::json!(count));
            }
            PipelineError::InvalidPayload { reason } => {
                map.insert("reason".to_string(), serde_json::Value::String(reason.clone()));
            }
            PipelineError::TargetTooSmall { target_s } => {
                map.insert("target_s".to_string(), serde_json::json!(target_s));
            }
            PipelineError::VideoBroken { path, tail } => {
                map.insert("path".to_string(), serde_json::Value::String(path.clone()));
                map.insert("ffmpeg_tail".to_string(), serde_json::Value::String(tail.clone()));
            }
            PipelineError::RenderFail { step, tail } => {
                map.insert("step".to_string(), serde_json::Value::String(step.clone()));
                map.insert("ffmpeg_tail".to_string(), serde_json::Value::String(tail.clone()));
            }
            PipelineError::DurationCapViolation { duration_out_s, target_s } => {
                map.insert("duration_out_s".to_string(), serde_json::json!(duration_out_s));
                map.insert("target_s".to_string(), serde_json::json!(target_s));
            }
            PipelineError::BeatPipelineFail { type_name, message } => {
                map.insert("type".to_string(), serde_json::Value::String(type_name.clone()));
                map.insert("message".to_string(), serde_json::Value::String(message.clone()));
            }
            PipelineError::Locked => {}
        }
        map
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Truncate combined tool output to its last [`TOOL_TAIL_CAP`] bytes, at a char
/// boundary, so the diagnostic that actually explains the failure survives.
pub fn tail(output: &str) -> String {
    if output.len() <= TOOL_TAIL_CAP {
        return output.to_string();
    }
    let start = output.len() - TOOL_TAIL_CAP;
    let mut start = start;
    while start < output.len() && !output.is_char_boundary(start) {
        start += 1;
    }
    output[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(PipelineError::Locked.code(), "LOCKED");
        assert_eq!(
            PipelineError::TargetTooSmall { target_s: 0.0 }.code(),
            "TARGET_TOO_SMALL"
        );
    }

    #[test]
    fn tail_truncates_to_cap_at_char_boundary() {
        let s = "é".repeat(TOOL_TAIL_CAP);
        let t = tail(&s);
        assert!(t.len() <= TOOL_TAIL_CAP);
        assert!(s.ends_with(&t));
    }

    #[test]
    fn tail_passthrough_when_short() {
        assert_eq!(tail("short"), "short");
    }

    #[test]
    fn video_not_found_diagnostics_carry_count_and_sample() {
        let err = PipelineError::VideoNotFound {
            missing_count: 1,
            sample: vec!["missing.mp4".to_string()],
        };
        let diag = err.diagnostics();
        assert_eq!(diag["missing_count"], 1);
        assert_eq!(diag["missing_sample"][0], "missing.mp4");
    }

    #[test]
    fn locked_has_no_diagnostics() {
        assert!(PipelineError::Locked.diagnostics().is_empty());
    }
}
