//! Locating the `ffmpeg` and `ffprobe` executables.
//!
//! Order: `FFMPEG_PATH` env, common install locations, `PATH`, then a binary shipped
//! next to the current executable. The result is cached for the process lifetime.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use crate::error::AppError;

pub const ENV_FFMPEG_PATH: &str = "FFMPEG_PATH";
pub const ENV_FFPROBE_PATH: &str = "FFPROBE_PATH";

#[cfg(target_os = "windows")]
const BINARY_SUFFIX: &str = ".exe";
#[cfg(not(target_os = "windows"))]
const BINARY_SUFFIX: &str = "";

fn find_in_path(name: &str) -> Option<PathBuf> {
    let locator = if cfg!(target_os = "windows") { "where" } else { "which" };
    let output = Command::new(locator).arg(name).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout.lines().next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(PathBuf::from(first))
    }
}

fn common_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/opt/homebrew/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/opt/local/bin/ffmpeg"),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin\\ffmpeg.exe"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"),
        ]
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        vec![
            PathBuf::from("/usr/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", unix)))]
    {
        vec![]
    }
}

/// Binary shipped in the same directory as the running executable.
fn resolve_bundled_path(base_name: &str) -> Option<PathBuf> {
    let exe_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
    let path = exe_dir.join(format!("{}{}", base_name, BINARY_SUFFIX));
    if path.exists() {
        log::debug!(
            target: "vidthumb::ffmpeg::discovery",
            "{} found next to executable: {}",
            base_name,
            path.display()
        );
        Some(path)
    } else {
        None
    }
}

fn resolve_ffmpeg_path() -> Result<PathBuf, AppError> {
    for path in common_paths() {
        if path.exists() {
            log::debug!(
                target: "vidthumb::ffmpeg::discovery",
                "FFmpeg found in common path: {}",
                path.display()
            );
            return Ok(path);
        }
    }

    if let Some(p) = find_in_path("ffmpeg").filter(|p| p.exists()) {
        log::debug!(
            target: "vidthumb::ffmpeg::discovery",
            "FFmpeg found in PATH: {}",
            p.display()
        );
        return Ok(p);
    }

    if let Some(p) = resolve_bundled_path("ffmpeg") {
        return Ok(p);
    }

    log::error!(
        target: "vidthumb::ffmpeg::discovery",
        "FFmpeg not found in PATH or common locations"
    );
    Err(AppError::FfmpegNotFound(
        "FFmpeg not found. Install FFmpeg or set FFMPEG_PATH:\n  - macOS: brew install ffmpeg\n  - Linux: sudo apt install ffmpeg\n  - Windows: Download from https://ffmpeg.org/download.html"
            .to_string(),
    ))
}

static FFMPEG_PATH_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// FFmpeg path, cached for the process lifetime. `FFMPEG_PATH` takes precedence when it exists.
pub fn get_ffmpeg_path() -> Result<&'static Path, AppError> {
    if let Some(path) = FFMPEG_PATH_CACHE.get() {
        return Ok(path.as_path());
    }
    let from_env = std::env::var(ENV_FFMPEG_PATH)
        .ok()
        .map(PathBuf::from)
        .filter(|p| p.exists());
    let path = match from_env {
        Some(p) => {
            log::debug!(
                target: "vidthumb::ffmpeg::discovery",
                "FFmpeg path from {} env: {}",
                ENV_FFMPEG_PATH,
                p.display()
            );
            p
        }
        None => resolve_ffmpeg_path()?,
    };
    // Another thread may have initialized first; either value is valid.
    let _ = FFMPEG_PATH_CACHE.set(path);
    FFMPEG_PATH_CACHE
        .get()
        .map(PathBuf::as_path)
        .ok_or_else(|| AppError::FfmpegNotFound("FFmpeg path cache is empty".to_string()))
}

/// Paths to try for ffprobe given an ffmpeg binary path (suffixed first, then plain).
pub fn ffprobe_candidates(ffmpeg_path: &Path) -> Vec<PathBuf> {
    let Some(parent) = ffmpeg_path.parent() else {
        return vec![];
    };
    let mut candidates = Vec::with_capacity(2);
    if let Some(suffix) = ffmpeg_path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|stem| stem.strip_prefix("ffmpeg"))
        .filter(|suffix| !suffix.is_empty())
    {
        candidates.push(parent.join(format!("ffprobe{}{}", suffix, BINARY_SUFFIX)));
    }
    candidates.push(parent.join(format!("ffprobe{}", BINARY_SUFFIX)));
    candidates
}

/// ffprobe path: `FFPROBE_PATH` env, else the same directory as ffmpeg (they ship together).
pub fn get_ffprobe_path() -> Result<PathBuf, AppError> {
    if let Some(p) = std::env::var(ENV_FFPROBE_PATH)
        .ok()
        .map(PathBuf::from)
        .filter(|p| p.exists())
    {
        return Ok(p);
    }
    let ffmpeg = get_ffmpeg_path()?;
    let candidates = ffprobe_candidates(ffmpeg);
    if let Some(found) = candidates.iter().find(|c| c.exists()) {
        return Ok(found.clone());
    }
    Err(AppError::FfmpegNotFound(format!(
        "ffprobe not found next to FFmpeg (tried: {:?})",
        candidates
    )))
}
