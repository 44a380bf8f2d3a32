mod builder;
pub mod discovery;
mod error;
pub mod ffprobe;
mod runner;

pub use builder::{build_frame_extract_args, format_args_for_display_multiline, format_seek_seconds};
pub use error::{FfmpegErrorPayload, parse_ffmpeg_error};
pub use runner::{ToolOutput, run_ffmpeg_blocking, run_tool_blocking};

use std::path::Path;
use std::time::Duration;

use crate::engine::{FrameRequest, MediaEngine, ProbeInfo};
use crate::error::AppError;

/// Path to string for FFmpeg args or logging.
pub fn path_to_string(path: &(impl AsRef<Path> + ?Sized)) -> String {
    path.as_ref().to_string_lossy().to_string()
}

/// [`MediaEngine`] backed by the `ffmpeg`/`ffprobe` command-line tools.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEngine {
    timeout: Option<Duration>,
}

impl FfmpegEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any single ffprobe/ffmpeg invocation that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fails fast with [`AppError::FfmpegNotFound`] when the tools cannot be located.
    pub fn ensure_available(&self) -> Result<(), AppError> {
        discovery::get_ffmpeg_path()?;
        discovery::get_ffprobe_path()?;
        Ok(())
    }
}

impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg-cli"
    }

    fn probe(&self, path: &Path) -> Result<ProbeInfo, AppError> {
        ffprobe::probe_file(path, self.timeout)
    }

    fn extract_frame(&self, request: &FrameRequest<'_>) -> Result<(), AppError> {
        let args = build_frame_extract_args(
            &path_to_string(request.input),
            &path_to_string(request.output),
            request.offset,
            request.width,
        );
        log::trace!(
            target: "vidthumb::ffmpeg",
            "ffmpeg\n{}",
            format_args_for_display_multiline(&args)
        );
        run_ffmpeg_blocking(args, self.timeout)
    }
}
