//! In-memory [`MediaEngine`] for exercising orchestration without FFmpeg.
//!
//! Frames are fake payloads of the form `frame@{offset_ms}:w{width}`, so tests can tell
//! which slot received which timestamp.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::engine::{FrameRequest, MediaEngine, ProbeInfo};
use crate::error::AppError;

/// Leading bytes that make [`FakeEngine::probe`] reject a file as undecodable.
pub const UNDECODABLE_MARKER: &[u8] = b"not-a-video";

type DelayFn = Box<dyn Fn(u64) -> Duration + Send + Sync>;

pub struct FakeEngine {
    duration_ms: u64,
    width: u32,
    height: u32,
    fail_at: Vec<u64>,
    panic_at: Vec<u64>,
    empty_at: Vec<u64>,
    delay: Option<DelayFn>,
    in_flight: AtomicUsize,
    pub extract_calls: AtomicUsize,
    pub peak_concurrency: AtomicUsize,
    pub seen_inputs: Mutex<Vec<PathBuf>>,
}

impl FakeEngine {
    /// 1920x1080 stream of the given length.
    pub fn with_duration_ms(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            width: 1920,
            height: 1080,
            fail_at: Vec::new(),
            panic_at: Vec::new(),
            empty_at: Vec::new(),
            delay: None,
            in_flight: AtomicUsize::new(0),
            extract_calls: AtomicUsize::new(0),
            peak_concurrency: AtomicUsize::new(0),
            seen_inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Extraction at `offset_ms` returns an engine error.
    pub fn failing_at(mut self, offset_ms: u64) -> Self {
        self.fail_at.push(offset_ms);
        self
    }

    /// Extraction at `offset_ms` panics inside the worker.
    pub fn panicking_at(mut self, offset_ms: u64) -> Self {
        self.panic_at.push(offset_ms);
        self
    }

    /// Extraction at `offset_ms` reports success but writes a zero-byte image.
    pub fn writing_empty_at(mut self, offset_ms: u64) -> Self {
        self.empty_at.push(offset_ms);
        self
    }

    /// Sleep for `delay(offset_ms)` before producing each frame.
    pub fn with_delay(mut self, delay: impl Fn(u64) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }
}

/// Decrements the in-flight counter even when the extraction panics.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, AppError> {
    fs::read(path).map_err(|e| {
        AppError::decode_error(format!("Could not open video file {}: {}", path.display(), e))
    })
}

impl MediaEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn probe(&self, path: &Path) -> Result<ProbeInfo, AppError> {
        if read_input(path)?.starts_with(UNDECODABLE_MARKER) {
            return Err(AppError::decode_error("Could not open video file."));
        }
        Ok(ProbeInfo {
            duration_ms: self.duration_ms as f64,
            width: self.width,
            height: self.height,
            format_name: Some("fake".to_string()),
        })
    }

    fn extract_frame(&self, request: &FrameRequest<'_>) -> Result<(), AppError> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_inputs.lock().push(request.input.to_path_buf());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_concurrency.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        let offset_ms = request.offset.as_millis() as u64;
        if let Some(delay) = &self.delay {
            std::thread::sleep(delay(offset_ms));
        }
        read_input(request.input)?;

        if self.panic_at.contains(&offset_ms) {
            panic!("fake engine panic at {} ms", offset_ms);
        }
        if self.fail_at.contains(&offset_ms) {
            return Err(AppError::ffmpeg_failed(1, "Error while decoding stream #0:0"));
        }
        if offset_ms >= self.duration_ms {
            // Past the end: success without an artifact, like ffmpeg.
            return Ok(());
        }
        if self.empty_at.contains(&offset_ms) {
            return fs::write(request.output, b"").map_err(AppError::from);
        }
        let frame = format!("frame@{}:w{}", offset_ms, request.width);
        fs::write(request.output, frame).map_err(AppError::from)
    }
}
