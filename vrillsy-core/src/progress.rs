//! ProgressSink — publishes stage/percent/metadata keyed by job id.
//!
//! Writes are best-effort: a write failure is logged and swallowed rather
//! than aborting the job, since progress is an observability aid, not a
//! correctness input.

use redis::Commands;

/// Stage name and percent-complete pairs, in pipeline order. `stage_progress`
/// looks these up so the orchestrator never hardcodes a percentage inline.
pub const STAGES: &[(&str, u8)] = &[
    ("ingest", 3),
    ("normalize", 15),
    ("normalize_audio", 25),
    ("detect_beats", 35),
    ("plan", 50),
    ("cut", 70),
    ("mux_prep", 80),
    ("finalize", 95),
    ("done", 100),
];

pub fn stage_progress(stage: &str) -> u8 {
    STAGES
        .iter()
        .find(|(name, _)| *name == stage)
        .map(|(_, pct)| *pct)
        .unwrap_or(0)
}

pub trait ProgressSink: Send + Sync {
    fn publish(&self, job_id: &str, stage: &str, progress: u8, extras: &[(&str, String)]);
}

fn progress_key(job_id: &str) -> String {
    format!("job:{job_id}")
}

/// Redis-hash-backed `ProgressSink` (`HSET job:<J> stage .. progress .. ..`).
pub struct RedisProgressSink {
    client: redis::Client,
}

impl RedisProgressSink {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }
}

impl ProgressSink for RedisProgressSink {
    fn publish(&self, job_id: &str, stage: &str, progress: u8, extras: &[(&str, String)]) {
        let conn = self.client.get_connection();
        let mut conn = match conn {
            Ok(c) => c,
            Err(e) => {
                log::warn!("progress sink: failed to connect to redis: {e}");
                return;
            }
        };

        let mut fields: Vec<(String, String)> = vec![
            ("stage".to_string(), stage.to_string()),
            ("progress".to_string(), progress.to_string()),
        ];
        fields.extend(extras.iter().map(|(k, v)| (k.to_string(), v.clone())));

        if let Err(e) = conn.hset_multiple::<_, _, _, ()>(progress_key(job_id), &fields) {
            log::warn!("progress sink: failed to write job:{job_id}: {e}");
        }
    }
}

/// No-op sink: useful for tests and single-shot CLI runs where no progress
/// observer exists.
#[derive(Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn publish(&self, _job_id: &str, _stage: &str, _progress: u8, _extras: &[(&str, String)]) {}
}

/// In-memory sink for tests that assert on the recorded sequence of stages.
#[derive(Default)]
pub struct RecordingProgressSink {
    pub events: std::sync::Mutex<Vec<(String, u8)>>,
}

impl ProgressSink for RecordingProgressSink {
    fn publish(&self, _job_id: &str, stage: &str, progress: u8, _extras: &[(&str, String)]) {
        self.events
            .lock()
            .unwrap()
            .push((stage.to_string(), progress));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_progress_matches_documented_table() {
        assert_eq!(stage_progress("ingest"), 3);
        assert_eq!(stage_progress("plan"), 50);
        assert_eq!(stage_progress("done"), 100);
        assert_eq!(stage_progress("unknown"), 0);
    }

    #[test]
    fn stages_are_monotonic_non_decreasing() {
        let mut last = 0u8;
        for (_, pct) in STAGES {
            assert!(*pct >= last);
            last = *pct;
        }
    }

    #[test]
    fn recording_sink_captures_events_in_order() {
        let sink = RecordingProgressSink::default();
        sink.publish("j1", "ingest", 3, &[]);
        sink.publish("j1", "plan", 50, &[]);
        let events = sink.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![("ingest".to_string(), 3), ("plan".to_string(), 50)]
        );
    }
}
