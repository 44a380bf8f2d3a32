//! Decoding-engine capability. Orchestration is written once against [`MediaEngine`];
//! the FFmpeg command-line backend lives in [`crate::ffmpeg::FfmpegEngine`].

use std::path::Path;
use std::time::Duration;

use crate::error::AppError;

/// Structural metadata read without decoding frame data.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeInfo {
    pub duration_ms: f64,
    pub width: u32,
    pub height: u32,
    pub format_name: Option<String>,
}

/// One still frame: seek to `offset` in `input`, scale to `width` keeping aspect ratio,
/// encode in the format implied by `output`'s extension, write to `output`.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest<'a> {
    pub input: &'a Path,
    pub offset: Duration,
    pub width: u32,
    pub output: &'a Path,
}

pub trait MediaEngine: Send + Sync {
    /// Short identifier reported by `app.capabilities`.
    fn name(&self) -> &'static str;

    /// Opens the container at `path` and reads duration and first video stream dimensions.
    /// Fails with a decode-class error when the file cannot be opened or has no video stream.
    fn probe(&self, path: &Path) -> Result<ProbeInfo, AppError>;

    /// Produces one encoded still frame at `request.output`. An offset past the end of the
    /// stream may succeed without producing an output file; callers check for the artifact.
    fn extract_frame(&self, request: &FrameRequest<'_>) -> Result<(), AppError>;
}
