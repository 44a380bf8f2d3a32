#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;

use vidthumb_core::config::ThumbnailerConfig;
use vidthumb_core::ffmpeg::FfmpegEngine;
use vidthumb_core::sidecar_api::MediaService;

pub const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
pub const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

pub enum VideoKind {
    /// testsrc pattern, no audio.
    Plain { width: u32, height: u32 },
    /// Sine tone only; no video stream.
    AudioOnly,
}

pub struct IntegrationEnv {
    pub ffmpeg: PathBuf,
    inputs: tempfile::TempDir,
    artifacts: tempfile::TempDir,
}

impl IntegrationEnv {
    pub fn new() -> Self {
        let ffmpeg = vidthumb_core::ffmpeg::discovery::get_ffmpeg_path()
            .expect("FFmpeg not found")
            .to_path_buf();
        Self {
            ffmpeg,
            inputs: tempfile::tempdir().expect("tempdir"),
            artifacts: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.inputs.path().join(name)
    }

    /// Directory the service writes its transient artifacts to.
    pub fn artifact_dir(&self) -> &Path {
        self.artifacts.path()
    }

    pub fn artifacts(&self) -> Vec<PathBuf> {
        fs::read_dir(self.artifacts.path())
            .expect("read artifact dir")
            .flatten()
            .map(|e| e.path())
            .collect()
    }

    pub fn config(&self) -> ThumbnailerConfig {
        ThumbnailerConfig {
            temp_dir: self.artifact_dir().to_path_buf(),
            ..ThumbnailerConfig::default()
        }
    }

    pub fn service(&self) -> MediaService {
        let config = self.config();
        let engine = FfmpegEngine::new().with_timeout(config.extract_timeout);
        MediaService::new(Arc::new(engine), config)
    }

    /// Creates a test video and returns its bytes.
    pub fn test_video_bytes(&self, name: &str, duration_secs: f32, kind: VideoKind) -> Vec<u8> {
        let output_path = self.path(name);
        let status = match kind {
            VideoKind::Plain { width, height } => {
                create_test_video(&self.ffmpeg, &output_path, duration_secs, width, height)
            }
            VideoKind::AudioOnly => create_test_audio(&self.ffmpeg, &output_path, duration_secs),
        };
        let status = status.expect("failed to create test video");
        assert!(status.success(), "ffmpeg failed to create test video");
        fs::read(&output_path).expect("read test video")
    }
}

pub fn create_test_video(
    ffmpeg: &Path,
    output_path: &Path,
    duration_secs: f32,
    width: u32,
    height: u32,
) -> std::io::Result<ExitStatus> {
    Command::new(ffmpeg)
        .args([
            "-loglevel",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            &format!(
                "testsrc=duration={}:size={}x{}:rate=25",
                duration_secs, width, height
            ),
            "-c:v",
            "mpeg4",
            "-q:v",
            "5",
            "-pix_fmt",
            "yuv420p",
            output_path.to_string_lossy().as_ref(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
}

pub fn create_test_audio(
    ffmpeg: &Path,
    output_path: &Path,
    duration_secs: f32,
) -> std::io::Result<ExitStatus> {
    Command::new(ffmpeg)
        .args([
            "-loglevel",
            "error",
            "-y",
            "-f",
            "lavfi",
            "-i",
            &format!("sine=frequency=440:duration={}", duration_secs),
            "-c:a",
            "aac",
            output_path.to_string_lossy().as_ref(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
}

/// Width and height of an encoded still, read back through ffprobe.
pub fn image_dimensions(env: &IntegrationEnv, name: &str, bytes: &[u8]) -> (i32, i32) {
    let path = env.path(name);
    fs::write(&path, bytes).expect("write image");
    let info = vidthumb_core::ffmpeg::ffprobe::probe_file(&path, None).expect("probe image");
    (info.width as i32, info.height as i32)
}
