//! Vrillsy worker — headless renderer for one beat-synchronous cut job.
//!
//! Usage:
//!     vrillsy-worker run --job-id J1 --audio a.wav --video v1.mp4 --video v2.mp4
//!     vrillsy-worker run --task ./task.json
//!     cat task.json | vrillsy-worker run --task -

use clap::{Parser, Subcommand};

use vrillsy_core::orchestrator::{JobOrchestrator, JobOutcome};
use vrillsy_core::{Settings, TaskInvocation};
use vrillsy_core::lock::RedisJobLock;
use vrillsy_core::progress::RedisProgressSink;

#[derive(Parser)]
#[command(
    name = "vrillsy-worker",
    version,
    about = "Vrillsy worker — renders a beat-synchronous short-form cut for one job"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a single job, either from discrete flags or a task JSON payload.
    Run {
        /// Read the task invocation from this path, or '-' for stdin. When
        /// given, all other flags are ignored.
        #[arg(long)]
        task: Option<String>,

        #[arg(long)]
        job_id: Option<String>,

        #[arg(long)]
        audio: Option<String>,

        #[arg(long = "video")]
        video: Vec<String>,

        #[arg(long)]
        target_duration_s: Option<f64>,

        #[arg(long)]
        attention_min_s: Option<f64>,

        #[arg(long)]
        attention_max_s: Option<f64>,

        #[arg(long)]
        shuffle: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            task,
            job_id,
            audio,
            video,
            target_duration_s,
            attention_min_s,
            attention_max_s,
            shuffle,
        } => {
            let invocation = match task {
                Some(path) => load_task_from_source(&path)?,
                None => build_task_from_flags(
                    job_id,
                    audio,
                    video,
                    target_duration_s,
                    attention_min_s,
                    attention_max_s,
                    shuffle,
                )?,
            };
            run(invocation)
        }
    }
}

fn load_task_from_source(path: &str) -> anyhow::Result<TaskInvocation> {
    let raw = if path == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&raw)?)
}

fn build_task_from_flags(
    job_id: Option<String>,
    audio: Option<String>,
    video: Vec<String>,
    target_duration_s: Option<f64>,
    attention_min_s: Option<f64>,
    attention_max_s: Option<f64>,
    shuffle: bool,
) -> anyhow::Result<TaskInvocation> {
    let defaults = TaskInvocation {
        job_id: job_id.ok_or_else(|| anyhow::anyhow!("--job-id is required without --task"))?,
        audio_path: audio.ok_or_else(|| anyhow::anyhow!("--audio is required without --task"))?,
        video_paths: video,
        target_duration_s: target_duration_s.unwrap_or(10.0),
        attention_min_s: attention_min_s.unwrap_or(0.25),
        attention_max_s: attention_max_s.unwrap_or(0.30),
        shuffle,
    };
    Ok(defaults)
}

fn run(task: TaskInvocation) -> anyhow::Result<()> {
    let settings = Settings::from_env();
    let lock: Box<dyn vrillsy_core::lock::JobLock> = Box::new(RedisJobLock::new(&settings.redis_url)?);
    let progress: Box<dyn vrillsy_core::progress::ProgressSink> =
        Box::new(RedisProgressSink::new(&settings.redis_url)?);
    let orchestrator = JobOrchestrator::new(settings, lock, progress);

    match orchestrator.run_job(task) {
        JobOutcome::Success(success) => {
            println!("{}", serde_json::to_string_pretty(&success)?);
            Ok(())
        }
        JobOutcome::Failure(failure) => {
            println!("{}", serde_json::to_string_pretty(&failure)?);
            std::process::exit(1);
        }
    }
}
