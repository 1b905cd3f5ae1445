//! Process-wide settings loaded once from the environment.
//!
//! Mirrors `worker/config.py` in shape (a flat dataclass of env-derived
//! values) but as an explicit struct threaded through components instead of
//! module-level globals.

use std::env;

use crate::profile::VideoProfile;

#[derive(Debug, Clone)]
pub struct Settings {
    pub shared_dir: String,
    pub outputs_dir: String,
    pub target_duration_s: f64,
    pub min_cut_gap_s: f64,
    pub fallback_interval_s: f64,
    pub aubio_method: String,
    pub aubio_threshold: f64,
    pub lock_ttl_s: u64,
    pub worker_version: String,
    pub redis_url: String,
    pub profile: VideoProfile,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shared_dir: "/shared".to_string(),
            outputs_dir: "/outputs".to_string(),
            target_duration_s: 10.0,
            min_cut_gap_s: 0.20,
            fallback_interval_s: 0.50,
            aubio_method: "complex".to_string(),
            aubio_threshold: 0.35,
            lock_ttl_s: 600,
            worker_version: env!("CARGO_PKG_VERSION").to_string(),
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            profile: VideoProfile::default(),
        }
    }
}

impl Settings {
    /// Build settings from the environment, falling back to the documented
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        Settings {
            shared_dir: env_or("SHARED_DIR", defaults.shared_dir),
            outputs_dir: env_or("OUTPUTS_DIR", defaults.outputs_dir),
            target_duration_s: env_parsed_or("TARGET_DURATION_S", defaults.target_duration_s),
            min_cut_gap_s: env_parsed_or("MIN_CUT_GAP_S", defaults.min_cut_gap_s),
            fallback_interval_s: env_parsed_or(
                "FALLBACK_INTERVAL_S",
                defaults.fallback_interval_s,
            ),
            aubio_method: env_or("AUBIO_METHOD", defaults.aubio_method),
            aubio_threshold: env_parsed_or("AUBIO_THRESHOLD", defaults.aubio_threshold),
            lock_ttl_s: env_parsed_or("LOCK_TTL_S", defaults.lock_ttl_s),
            worker_version: env_or("WORKER_VERSION", defaults.worker_version),
            redis_url: env_or("REDIS_URL", defaults.redis_url),
            profile: VideoProfile::default(),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn env_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.shared_dir, "/shared");
        assert_eq!(s.outputs_dir, "/outputs");
        assert_eq!(s.target_duration_s, 10.0);
        assert_eq!(s.min_cut_gap_s, 0.20);
        assert_eq!(s.fallback_interval_s, 0.50);
        assert_eq!(s.lock_ttl_s, 600);
        assert_eq!(s.profile.width, 1080);
        assert_eq!(s.profile.height, 1920);
        assert_eq!(s.profile.fps, 30);
    }
}
