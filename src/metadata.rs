//! Metadata extraction: container duration, first video stream dimensions, file size.

use crate::engine::MediaEngine;
use crate::error::AppError;
use crate::request::{MetadataResult, VideoSource};
use crate::temp::TempFileManager;

fn dimension_to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Writes the video to a transient file, probes it, and reports the four metadata fields.
///
/// `file_size_bytes` is the size of the file as written, i.e. the input byte count.
/// The transient file is removed on every path out of this function.
pub fn extract_metadata(
    engine: &dyn MediaEngine,
    temp: &TempFileManager,
    source: &VideoSource,
) -> Result<MetadataResult, AppError> {
    let video = temp.create("video", "meta", source.extension(), source.bytes())?;

    let info = engine.probe(video.path())?;
    let file_size = video.file_size()?;

    let result = MetadataResult {
        duration_ms: info.duration_ms.max(0.0),
        width: dimension_to_i32(info.width),
        height: dimension_to_i32(info.height),
        file_size_bytes: i64::try_from(file_size).unwrap_or(i64::MAX),
        format: info.format_name,
    };
    log::debug!(
        target: "vidthumb::metadata",
        "{} ms, {}x{}, {} bytes ({})",
        result.duration_ms,
        result.width,
        result.height,
        result.file_size_bytes,
        engine.name()
    );
    Ok(result)
}
