//! Thin, shell-free wrappers around the external `ffmpeg`/`ffprobe` binaries.
//!
//! Everything above this module constructs argument vectors; nothing above it
//! ever builds a shell string, which removes the class of quoting bugs the
//! original Python implementation was prone to.

pub mod probe;
pub mod runner;

pub use probe::{MediaProbe, ProbeError, StreamInfo};
pub use runner::{MediaRunner, MediaToolError};
