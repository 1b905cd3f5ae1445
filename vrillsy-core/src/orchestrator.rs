//! JobOrchestrator — wires every component together into the single public
//! entry point `run_job`.
//!
//! State machine: `INIT -> LOCKED -> NORMALIZED -> AUDIO_READY -> BEATS ->
//! PLANNED -> CUT -> MUXED -> DONE`, with any stage after `LOCKED` able to
//! fall through to `FAILED`. Absence of the `<J>.done` marker is the only
//! authoritative "incomplete" signal; this function never leaves a partial
//! artifact at its published path.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::assemble::Assembler;
use crate::audio::{AudioConditioner, OnsetDetector, OnsetDetectorConfig};
use crate::config::Settings;
use crate::error::{PipelineError, Result};
use crate::lock::{JobLock, LockToken};
use crate::media::{MediaProbe, MediaRunner};
use crate::plan::{rng_for_job, CutPlanner, CutPlannerConfig};
use crate::progress::ProgressSink;
use crate::qa::{QaReport, QaReportInputs};
use crate::segment::SegmentBuilder;
use crate::task::TaskInvocation;

#[derive(Debug, Serialize)]
pub struct JobSuccess {
    pub ok: bool,
    pub job_id: String,
    pub out: String,
    pub qa: QaReport,
}

#[derive(Debug, Serialize)]
pub struct JobFailure {
    pub ok: bool,
    pub job_id: String,
    pub code: String,
    pub msg: String,
    /// Per-variant structured fields (§6's "…diagnostics"), flattened
    /// alongside the fixed fields above — e.g. S4's `missing_count`.
    #[serde(flatten)]
    pub diagnostics: serde_json::Map<String, serde_json::Value>,
}

pub enum JobOutcome {
    Success(JobSuccess),
    Failure(JobFailure),
}

impl JobOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, JobOutcome::Success(_))
    }
}

pub struct JobOrchestrator {
    settings: Settings,
    lock: Box<dyn JobLock>,
    progress: Box<dyn ProgressSink>,
}

impl JobOrchestrator {
    pub fn new(settings: Settings, lock: Box<dyn JobLock>, progress: Box<dyn ProgressSink>) -> Self {
        Self {
            settings,
            lock,
            progress,
        }
    }

    pub fn run_job(&self, task: TaskInvocation) -> JobOutcome {
        let start = Instant::now();
        let job_id = task.job_id.clone();

        let done_path = self.outputs_path(&job_id, "done");
        if done_path.exists() {
            log::info!("job {job_id}: already done, short-circuiting");
            if let Some(outcome) = self.load_existing_success(&job_id) {
                return outcome;
            }
        }

        match self.run_inner(&task, start) {
            Ok(success) => JobOutcome::Success(success),
            Err(err) => {
                self.progress.publish(
                    &job_id,
                    "failed",
                    crate::progress::stage_progress("done"),
                    &[("code", err.code().to_string())],
                );
                JobOutcome::Failure(JobFailure {
                    ok: false,
                    job_id,
                    code: err.code().to_string(),
                    msg: err.to_string(),
                    diagnostics: err.diagnostics(),
                })
            }
        }
    }

    fn run_inner(&self, task: &TaskInvocation, start: Instant) -> Result<JobSuccess> {
        self.validate(task)?;

        let token = self.acquire_lock(&task.job_id)?;
        let lock_guard = LockGuard {
            lock: self.lock.as_ref(),
            job_id: task.job_id.clone(),
            token,
        };

        self.progress.publish(&task.job_id, "ingest", crate::progress::stage_progress("ingest"), &[]);
        self.check_inputs_exist(task)?;

        let tempdir = tempfile::tempdir().map_err(|e| PipelineError::RenderFail {
            step: "tempdir".to_string(),
            tail: e.to_string(),
        })?;

        self.progress
            .publish(&task.job_id, "normalize", crate::progress::stage_progress("normalize"), &[]);

        let runner = MediaRunner::default();
        let probe = MediaProbe::default();

        self.progress.publish(
            &task.job_id,
            "normalize_audio",
            crate::progress::stage_progress("normalize_audio"),
            &[],
        );
        let conditioner = AudioConditioner::new(runner.clone(), probe.clone());
        let (conditioned_path, audio_duration_s) =
            conditioner.condition(&task.audio_path, tempdir.path(), task.target_duration_s)?;
        let pre_time_s = start.elapsed().as_secs_f64();

        self.progress.publish(
            &task.job_id,
            "detect_beats",
            crate::progress::stage_progress("detect_beats"),
            &[],
        );
        let onset_detector = OnsetDetector::new(OnsetDetectorConfig {
            threshold: self.settings.aubio_threshold,
            min_gap_s: self.settings.min_cut_gap_s,
        });
        let onsets = onset_detector.detect(&conditioned_path)?;
        let beats_total = onsets.len();

        self.progress.publish(&task.job_id, "plan", crate::progress::stage_progress("plan"), &[]);
        let planner = CutPlanner::new(CutPlannerConfig {
            fps: self.settings.profile.fps,
            fallback_interval_s: self.settings.fallback_interval_s,
        });
        let mut rng = rng_for_job(&task.job_id);
        let plan = planner.plan(
            &onsets,
            task.target_duration_s,
            audio_duration_s,
            task.video_paths.len(),
            &mut rng,
        );
        let beats_used_count = onsets
            .iter()
            .filter(|&&o| o > plan.hook_end_s && o < task.target_duration_s)
            .count();
        let fallback_used = beats_used_count < 4;

        self.progress.publish(&task.job_id, "cut", crate::progress::stage_progress("cut"), &[]);
        let mut segment_builder = SegmentBuilder::new(runner.clone(), probe.clone(), self.settings.profile);
        let mut segment_paths = Vec::with_capacity(plan.shots.len());
        for (i, &shot) in plan.shots.iter().enumerate() {
            let duration_s = plan.cuts[i + 1] - plan.cuts[i];
            let clip_path = &task.video_paths[shot];
            let seg_path = tempdir.path().join(format!("seg_{i:04}.mp4"));
            segment_builder.build_segment(
                shot,
                clip_path,
                duration_s,
                &seg_path,
                tempdir.path(),
                &mut rng,
            )?;
            segment_paths.push(seg_path);
        }

        self.progress.publish(
            &task.job_id,
            "mux_prep",
            crate::progress::stage_progress("mux_prep"),
            &[],
        );
        let assembler = Assembler::new(runner.clone());
        let manifest_path = tempdir.path().join("concat.txt");
        assembler.write_concat_manifest(&segment_paths, &manifest_path)?;

        let vtmp_path = self.outputs_path(&task.job_id, "mp4.vtmp.mp4");
        assembler.concat_video(&manifest_path, &vtmp_path)?;

        let final_tmp_path = self.outputs_path(&task.job_id, "mp4.tmp");
        assembler.mux(&vtmp_path, &conditioned_path, task.target_duration_s, &final_tmp_path)?;
        let _ = std::fs::remove_file(&vtmp_path);

        let final_path = self.outputs_path(&task.job_id, "mp4");
        assembler.publish_atomic(&final_tmp_path, &final_path)?;

        let duration_out_s = probe.duration(&final_path.to_string_lossy()).map_err(|e| {
            PipelineError::RenderFail {
                step: "final_probe".to_string(),
                tail: e.message,
            }
        })?;

        if duration_out_s - task.target_duration_s > 0.10 {
            return Err(PipelineError::DurationCapViolation {
                duration_out_s,
                target_s: task.target_duration_s,
            });
        }

        self.progress.publish(
            &task.job_id,
            "finalize",
            crate::progress::stage_progress("finalize"),
            &[],
        );

        let qa = QaReport::build(QaReportInputs {
            job_id: task.job_id.clone(),
            target_s: task.target_duration_s,
            duration_out_s,
            attention_end_s: plan.hook_end_s,
            beats_total,
            beats_used: beats_used_count,
            cuts: plan.cuts.clone(),
            onsets: onsets.clone(),
            fallback_used,
            profile_label: self.settings.profile.label(),
            pre_time_s,
            worker_version: self.settings.worker_version.clone(),
            timestamp_utc: chrono::Utc::now().to_rfc3339(),
            elapsed_s: start.elapsed().as_secs_f64(),
        });

        let qa_tmp_path = self.outputs_path(&task.job_id, "json.tmp");
        let qa_path = self.outputs_path(&task.job_id, "json");
        let qa_json = serde_json::to_vec_pretty(&qa).map_err(|e| PipelineError::RenderFail {
            step: "qa_serialize".to_string(),
            tail: e.to_string(),
        })?;
        std::fs::write(&qa_tmp_path, qa_json).map_err(|e| PipelineError::RenderFail {
            step: "qa_write".to_string(),
            tail: e.to_string(),
        })?;
        assembler.publish_atomic(&qa_tmp_path, &qa_path)?;

        let done_path = self.outputs_path(&task.job_id, "done");
        assembler.touch_done_marker(&done_path)?;

        self.progress.publish(&task.job_id, "done", crate::progress::stage_progress("done"), &[]);

        drop(lock_guard);

        Ok(JobSuccess {
            ok: true,
            job_id: task.job_id.clone(),
            out: final_path.to_string_lossy().to_string(),
            qa,
        })
    }

    fn validate(&self, task: &TaskInvocation) -> Result<()> {
        if task.target_duration_s <= 0.0 {
            return Err(PipelineError::TargetTooSmall {
                target_s: task.target_duration_s,
            });
        }
        if task.video_paths.len() < 2 {
            return Err(PipelineError::NotEnoughVideos {
                count: task.video_paths.len(),
            });
        }
        if task.attention_min_s > task.attention_max_s {
            return Err(PipelineError::InvalidPayload {
                reason: format!(
                    "attention_min_s ({}) > attention_max_s ({})",
                    task.attention_min_s, task.attention_max_s
                ),
            });
        }
        Ok(())
    }

    fn check_inputs_exist(&self, task: &TaskInvocation) -> Result<()> {
        if !Path::new(&task.audio_path).exists() {
            return Err(PipelineError::AudioNotFound {
                path: task.audio_path.clone(),
            });
        }
        let missing: Vec<String> = task
            .video_paths
            .iter()
            .filter(|p| !Path::new(p).exists())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::VideoNotFound {
                missing_count: missing.len(),
                sample: missing.into_iter().take(3).collect(),
            });
        }
        Ok(())
    }

    fn acquire_lock(&self, job_id: &str) -> Result<LockToken> {
        self.lock
            .acquire(job_id, self.settings.lock_ttl_s)
            .map_err(|e| PipelineError::beat_pipeline_fail(&e))?
            .ok_or(PipelineError::Locked)
    }

    /// Property 8 (idempotence): a `<J>.done` marker already present means a
    /// prior run published a complete, never-partially-written artifact; we
    /// short-circuit by replaying its recorded QA report rather than
    /// re-rendering.
    fn load_existing_success(&self, job_id: &str) -> Option<JobOutcome> {
        let qa_path = self.outputs_path(job_id, "json");
        let out_path = self.outputs_path(job_id, "mp4");
        let qa_bytes = std::fs::read(&qa_path).ok()?;
        let qa: QaReport = serde_json::from_slice(&qa_bytes).ok()?;
        Some(JobOutcome::Success(JobSuccess {
            ok: true,
            job_id: job_id.to_string(),
            out: out_path.to_string_lossy().to_string(),
            qa,
        }))
    }

    fn outputs_path(&self, job_id: &str, suffix: &str) -> PathBuf {
        Path::new(&self.settings.outputs_dir).join(format!("{job_id}.{suffix}"))
    }
}

/// Releases the job lock on drop, covering every early-return `?` exit
/// from `run_inner` as well as the success path.
struct LockGuard<'a> {
    lock: &'a dyn JobLock,
    job_id: String,
    token: LockToken,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(&self.job_id, &self.token);
    }
}
