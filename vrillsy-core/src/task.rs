//! TaskInvocation — the job payload accepted by the CLI's `--task` flag and
//! by `orchestrator::run_job` directly.

use serde::Deserialize;

fn default_target_duration_s() -> f64 {
    10.0
}

fn default_attention_min_s() -> f64 {
    0.25
}

fn default_attention_max_s() -> f64 {
    0.30
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskInvocation {
    pub job_id: String,
    pub audio_path: String,
    pub video_paths: Vec<String>,
    #[serde(default = "default_target_duration_s")]
    pub target_duration_s: f64,
    #[serde(default = "default_attention_min_s")]
    pub attention_min_s: f64,
    #[serde(default = "default_attention_max_s")]
    pub attention_max_s: f64,
    #[serde(default)]
    pub shuffle: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_documented_defaults() {
        let json = r#"{"job_id":"j1","audio_path":"a.wav","video_paths":["v1.mp4","v2.mp4"]}"#;
        let task: TaskInvocation = serde_json::from_str(json).unwrap();
        assert_eq!(task.target_duration_s, 10.0);
        assert_eq!(task.attention_min_s, 0.25);
        assert_eq!(task.attention_max_s, 0.30);
        assert!(!task.shuffle);
    }

    #[test]
    fn deserializes_with_explicit_overrides() {
        let json = r#"{
            "job_id":"j1",
            "audio_path":"a.wav",
            "video_paths":["v1.mp4"],
            "target_duration_s":15.0,
            "shuffle":true
        }"#;
        let task: TaskInvocation = serde_json::from_str(json).unwrap();
        assert_eq!(task.target_duration_s, 15.0);
        assert!(task.shuffle);
    }
}
