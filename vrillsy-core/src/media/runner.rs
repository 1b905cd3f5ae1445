//! MediaRunner — invokes `ffmpeg` with a constructed argv and surfaces its
//! exit status plus a bounded tail of combined output.

use std::process::Command;

use crate::error::tail;

#[derive(Debug, Clone)]
pub struct MediaToolError {
    pub code: Option<i32>,
    pub tail: String,
}

impl std::fmt::Display for MediaToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "media tool exited {:?}: {}", self.code, self.tail)
    }
}

impl std::error::Error for MediaToolError {}

/// Runs `ffmpeg` (or a test double pointed to by `ffmpeg_bin`) synchronously.
/// One call never overlaps subprocess I/O with another; callers that want
/// concurrency run separate `MediaRunner`s in separate OS threads/processes.
#[derive(Debug, Clone)]
pub struct MediaRunner {
    ffmpeg_bin: String,
}

impl Default for MediaRunner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl MediaRunner {
    pub fn new(ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }

    /// Run `ffmpeg` with `args` (no `-y`/binary name included by the caller;
    /// `-y` is always appended so re-running an idempotent step never
    /// prompts).
    pub fn run(&self, args: &[String]) -> Result<(), MediaToolError> {
        let mut full_args = Vec::with_capacity(args.len() + 2);
        full_args.push("-y".to_string());
        full_args.push("-hide_banner".to_string());
        full_args.extend_from_slice(args);

        let output = Command::new(&self.ffmpeg_bin)
            .args(&full_args)
            .output()
            .map_err(|e| MediaToolError {
                code: None,
                tail: tail(&format!("failed to spawn {}: {}", self.ffmpeg_bin, e)),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(MediaToolError {
            code: output.status.code(),
            tail: tail(&combined),
        })
    }
}
