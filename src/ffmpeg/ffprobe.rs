//! FFprobe-based container probing: duration, first video stream dimensions, format name.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::discovery::get_ffprobe_path;
use super::runner::run_tool_blocking;
use crate::engine::ProbeInfo;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    #[serde(default)]
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    index: Option<u32>,
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    duration_ts: Option<i64>,
    #[serde(default)]
    time_base: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    streams: Option<Vec<FfprobeStream>>,
}

fn parse_rational(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den == 0.0 {
        return None;
    }
    Some(num / den)
}

fn parse_positive_seconds(s: Option<&String>) -> Option<f64> {
    s.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Duration in milliseconds. The container-level duration wins whenever it is reported and
/// positive; only otherwise does the stream's own duration (ticks × time base) apply.
fn resolve_duration_ms(format: Option<&FfprobeFormat>, stream: &FfprobeStream) -> f64 {
    if let Some(secs) = parse_positive_seconds(format.and_then(|f| f.duration.as_ref())) {
        return secs * 1000.0;
    }
    let from_ticks = stream
        .duration_ts
        .filter(|ts| *ts > 0)
        .zip(stream.time_base.as_deref().and_then(parse_rational))
        .map(|(ts, tb)| ts as f64 * tb * 1000.0);
    if let Some(ms) = from_ticks {
        return ms;
    }
    parse_positive_seconds(stream.duration.as_ref())
        .map(|secs| secs * 1000.0)
        .unwrap_or(0.0)
}

/// Parse ffprobe JSON into [`ProbeInfo`]. The first video stream by index order is used.
pub fn parse_ffprobe_json(json: &str) -> Result<ProbeInfo, AppError> {
    let output: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| AppError::decode_error(format!("Failed to parse ffprobe JSON: {}", e)))?;

    let format = output.format.as_ref();
    let streams = output.streams.as_deref().unwrap_or_default();
    let video_stream = streams
        .iter()
        .enumerate()
        .filter(|(_, s)| s.codec_type.as_deref() == Some("video"))
        .min_by_key(|(pos, s)| s.index.map(|i| i as usize).unwrap_or(*pos))
        .map(|(_, s)| s)
        .ok_or_else(|| AppError::decode_error("No video stream found"))?;

    Ok(ProbeInfo {
        duration_ms: resolve_duration_ms(format, video_stream),
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        format_name: format.and_then(|f| f.format_name.clone()),
    })
}

/// Run ffprobe on a video file and return its probe info.
pub fn probe_file(path: &Path, timeout: Option<Duration>) -> Result<ProbeInfo, AppError> {
    let ffprobe = get_ffprobe_path()?;
    let path_str = super::path_to_string(path);

    log::debug!(
        target: "vidthumb::ffmpeg::ffprobe",
        "probe: path={}",
        path_str
    );

    let args: Vec<String> = [
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(path_str))
    .collect();

    let output = match run_tool_blocking(&ffprobe, &args, timeout) {
        Ok(output) => output,
        Err(AppError::FfmpegFailed { code, stderr }) if code != -1 => {
            let payload = super::parse_ffmpeg_error(&stderr, Some(code));
            return Err(AppError::decode_error(format!(
                "Could not open video file: {}",
                payload.detail
            )));
        }
        Err(e) => return Err(e),
    };

    if !output.stderr.trim().is_empty() {
        log::debug!(
            target: "vidthumb::ffmpeg::ffprobe",
            "ffprobe warnings: {}",
            output.stderr.trim()
        );
    }

    let json = String::from_utf8(output.stdout)
        .map_err(|_| AppError::decode_error("ffprobe output was not valid UTF-8"))?;

    parse_ffprobe_json(&json)
}
