//! End-to-end pipeline test against stub `ffmpeg`/`ffprobe` scripts,
//! mirroring the happy-path scenario: beat-rich audio, several video clips,
//! a 10 second target, expecting no fallback and a duration-clamped output.
//!
//! The stub `ffmpeg` copies a real WAV fixture whenever its output path ends
//! in `.wav` (the audio-conditioning step) and otherwise just creates an
//! empty placeholder file, since nothing downstream of that step decodes
//! video bytes directly — everything else is driven through `ffprobe`,
//! which this test also stubs out via environment-variable-selected
//! durations.

use std::io::Write;
use std::path::PathBuf;

use vrillsy_core::config::Settings;
use vrillsy_core::lock::InMemoryJobLock;
use vrillsy_core::orchestrator::{JobOrchestrator, JobOutcome};
use vrillsy_core::profile::VideoProfile;
use vrillsy_core::progress::NullProgressSink;
use vrillsy_core::task::TaskInvocation;

fn write_executable(path: &std::path::Path, body: &str) {
    let mut f = std::fs::File::create(path).unwrap();
    writeln!(f, "#!/bin/sh\n{body}").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }
}

/// Writes a fixture WAV with audible impulses every 0.3 s across `duration_s`
/// seconds at 48 kHz mono, giving `OnsetDetector` real onsets to find.
fn write_fixture_wav(path: &std::path::Path, duration_s: f64) {
    let sample_rate = 48000u32;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let total_samples = (duration_s * sample_rate as f64) as usize;
    let mut t = 0.0;
    let mut samples = vec![0i16; total_samples];
    while (t * sample_rate as f64) < total_samples as f64 {
        let idx = (t * sample_rate as f64) as usize;
        for k in 0..64.min(total_samples - idx) {
            samples[idx + k] = 16000;
        }
        t += 0.3;
    }
    for s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

struct TestEnv {
    _tempdir: tempfile::TempDir,
    bin_dir: PathBuf,
    shared_dir: PathBuf,
    outputs_dir: PathBuf,
    original_path: String,
}

fn setup(fixture_wav: &std::path::Path, clip_duration_s: f64) -> TestEnv {
    let tempdir = tempfile::tempdir().unwrap();
    let bin_dir = tempdir.path().join("bin");
    let shared_dir = tempdir.path().join("shared");
    let outputs_dir = tempdir.path().join("outputs");
    std::fs::create_dir_all(&bin_dir).unwrap();
    std::fs::create_dir_all(&shared_dir).unwrap();
    std::fs::create_dir_all(&outputs_dir).unwrap();

    write_executable(
        &bin_dir.join("ffmpeg"),
        &format!(
            r#"
last=""
for a in "$@"; do last="$a"; done
case "$last" in
  *.wav) cp "{fixture}" "$last" ;;
  *) : > "$last" ;;
esac
exit 0
"#,
            fixture = fixture_wav.display()
        ),
    );

    write_executable(
        &bin_dir.join("ffprobe"),
        &format!(
            r#"
last=""
for a in "$@"; do last="$a"; done
case "$last" in
  *audio_proc.wav) dur="{clip_duration_s}" ;;
  *.mp4) dur="10.000" ;;
  *) dur="{clip_duration_s}" ;;
esac
cat <<JSON
{{"format": {{"duration": "$dur"}}, "streams": [{{"codec_type": "video", "width": 1080, "height": 1920, "avg_frame_rate": "30/1"}}]}}
JSON
exit 0
"#
        ),
    );

    let original_path = std::env::var("PATH").unwrap_or_default();
    // SAFETY: this test runs single-threaded with respect to PATH mutation;
    // no other thread reads or writes the environment concurrently.
    unsafe {
        std::env::set_var("PATH", format!("{}:{}", bin_dir.display(), original_path));
    }

    TestEnv {
        _tempdir: tempdir,
        bin_dir,
        shared_dir,
        outputs_dir,
        original_path,
    }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        // SAFETY: see the matching `set_var` above.
        unsafe {
            std::env::set_var("PATH", &self.original_path);
        }
    }
}

#[test]
fn happy_path_beat_rich_audio_produces_clamped_output() {
    let tempdir = tempfile::tempdir().unwrap();
    let fixture_wav = tempdir.path().join("fixture_input.wav");
    write_fixture_wav(&fixture_wav, 10.2);

    let env = setup(&fixture_wav, 15.0);
    let _ = &env.bin_dir;

    let audio_path = env.shared_dir.join("audio_in.wav");
    std::fs::copy(&fixture_wav, &audio_path).unwrap();

    let video_paths: Vec<String> = (0..3)
        .map(|i| {
            let p = env.shared_dir.join(format!("clip_{i}.mp4"));
            std::fs::write(&p, b"not-a-real-video").unwrap();
            p.to_string_lossy().to_string()
        })
        .collect();

    let settings = Settings {
        outputs_dir: env.outputs_dir.to_string_lossy().to_string(),
        shared_dir: env.shared_dir.to_string_lossy().to_string(),
        target_duration_s: 10.0,
        profile: VideoProfile::default(),
        ..Settings::default()
    };

    let orchestrator = JobOrchestrator::new(
        settings,
        Box::new(InMemoryJobLock::default()),
        Box::new(NullProgressSink),
    );

    let task = TaskInvocation {
        job_id: "job-s1".to_string(),
        audio_path: audio_path.to_string_lossy().to_string(),
        video_paths,
        target_duration_s: 10.0,
        attention_min_s: 0.25,
        attention_max_s: 0.30,
        shuffle: false,
    };

    let outcome = orchestrator.run_job(task);
    match outcome {
        JobOutcome::Success(success) => {
            assert!(success.ok);
            assert!((success.qa.duration_out_s - 10.0).abs() <= 0.10);
            assert!(!success.qa.fallback_used);
            assert!(success.qa.segments_total >= 1);

            let done_path = env.outputs_dir.join("job-s1.done");
            assert!(done_path.exists());
            let qa_path = env.outputs_dir.join("job-s1.json");
            assert!(qa_path.exists());
        }
        JobOutcome::Failure(failure) => {
            panic!("expected success, got failure: {} {}", failure.code, failure.msg);
        }
    }
}
