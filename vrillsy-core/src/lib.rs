//! Vrillsy Core — the beat-synchronous cut-planning and render pipeline.
//!
//! This crate provides:
//! - **config**: process-wide `Settings`, loaded once from the environment.
//! - **error**: the `PipelineError` taxonomy and its stable error codes.
//! - **profile**: the fixed output `VideoProfile`.
//! - **media**: shell-free `ffmpeg`/`ffprobe` wrappers (`MediaRunner`, `MediaProbe`).
//! - **lock**: cluster-wide, TTL-bounded job mutual exclusion.
//! - **progress**: best-effort job progress reporting.
//! - **audio**: loudness conditioning and onset detection.
//! - **plan**: the deterministic `CutPlanner` and its seeded PRNG.
//! - **segment**: per-segment extraction with short-source reversal fallback.
//! - **assemble**: concat/mux and atomic output publication.
//! - **qa**: the QA report published alongside every rendered output.
//! - **task**: the job payload accepted from the task queue or CLI.
//! - **orchestrator**: `run_job`, the crate's single public entry point.

pub mod assemble;
pub mod audio;
pub mod config;
pub mod error;
pub mod lock;
pub mod media;
pub mod orchestrator;
pub mod plan;
pub mod profile;
pub mod progress;
pub mod qa;
pub mod segment;
pub mod task;

pub use config::Settings;
pub use error::{PipelineError, Result};
pub use orchestrator::{JobOrchestrator, JobOutcome};
pub use profile::VideoProfile;
pub use task::TaskInvocation;
