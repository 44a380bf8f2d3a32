//! Map FFmpeg/ffprobe failures to short messages.
//!
//! Exit codes are from ffmpeg.c: 1 (general), 123 (hard exit), 255 (signal).
//! -1 is used for spawn failure. Well-known stderr lines take precedence over the
//! exit code since code 1 covers nearly every decode problem. Stderr is kept as detail.

use serde::Serialize;

/// Summary for callers plus full stderr for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FfmpegErrorPayload {
    pub summary: String,
    pub detail: String,
}

const ELLIPSIS: &str = "…";

/// Stderr fragments (lowercased) and the summary they map to.
const KNOWN_STDERR_PATTERNS: &[(&str, &str)] = &[
    ("invalid data found when processing input", "Could not open video file."),
    ("moov atom not found", "Could not open video file (truncated container)."),
    ("no such file or directory", "Input file not found."),
    ("output file is empty", "No frame at the requested offset."),
    ("does not contain any stream", "No video stream found."),
    ("unable to find a suitable output format", "Unsupported thumbnail format."),
];

pub fn parse_ffmpeg_error(stderr: &str, exit_code: Option<i32>) -> FfmpegErrorPayload {
    let summary = match known_stderr_summary(stderr) {
        Some(msg) => msg.to_string(),
        None => match exit_code {
            Some(code) => known_exit_code_summary(code)
                .unwrap_or_else(|| format!("FFmpeg failed (exit code {}).", code)),
            None => first_line_truncated(stderr, 120),
        },
    };
    FfmpegErrorPayload {
        summary,
        detail: stderr.trim().to_string(),
    }
}

fn known_stderr_summary(stderr: &str) -> Option<&'static str> {
    let lower = stderr.to_lowercase();
    KNOWN_STDERR_PATTERNS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, summary)| *summary)
}

fn known_exit_code_summary(code: i32) -> Option<String> {
    match code {
        -1 => Some("FFmpeg not found or failed to start.".into()),
        1 => Some("FFmpeg failed.".into()),
        123 | 255 => Some("FFmpeg was stopped.".into()),
        _ => None,
    }
}

/// First non-empty line of stderr, truncated to max_len bytes (adding "…" if truncated).
fn first_line_truncated(stderr: &str, max_len: usize) -> String {
    let first = stderr
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim())
        .unwrap_or(stderr);
    if first.len() <= max_len {
        return first.to_string();
    }
    let mut cut = max_len.saturating_sub(ELLIPSIS.len());
    while !first.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &first[..cut], ELLIPSIS)
}
