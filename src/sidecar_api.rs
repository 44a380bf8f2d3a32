//! Request entry points for the calling layer: typed calls plus untyped JSON params.

use std::sync::Arc;

use serde_json::Value;

use crate::config::ThumbnailerConfig;
use crate::engine::MediaEngine;
use crate::error::AppError;
use crate::ffmpeg::FfmpegEngine;
use crate::metadata::extract_metadata;
use crate::request::{
    KNOWN_IMAGE_FORMATS, MetadataResult, ThumbnailBatch, ThumbnailSpec, TimestampRequest,
    VideoSource,
};
use crate::temp::{TempFileManager, cleanup_stale_artifacts};
use crate::thumbnails;

const PROTOCOL_VERSION: u8 = 1;

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppCapabilitiesResult {
    pub protocol_version: u8,
    pub engine: &'static str,
    pub image_formats: &'static [&'static str],
}

/// Engine, artifact store and limits shared by every request the calling layer makes.
pub struct MediaService {
    engine: Arc<dyn MediaEngine>,
    temp: TempFileManager,
    config: ThumbnailerConfig,
}

impl MediaService {
    pub fn new(engine: Arc<dyn MediaEngine>, config: ThumbnailerConfig) -> Self {
        Self {
            engine,
            temp: TempFileManager::new(&config.temp_dir),
            config,
        }
    }

    /// FFmpeg-backed service. A missing FFmpeg is logged here and reported per request.
    pub fn with_ffmpeg(config: ThumbnailerConfig) -> Self {
        let engine = FfmpegEngine::new().with_timeout(config.extract_timeout);
        if let Err(e) = engine.ensure_available() {
            log::warn!(target: "vidthumb::sidecar_api", "{}", e);
        }
        Self::new(Arc::new(engine), config)
    }

    pub fn config(&self) -> &ThumbnailerConfig {
        &self.config
    }

    pub fn app_capabilities(&self) -> AppCapabilitiesResult {
        AppCapabilitiesResult {
            protocol_version: PROTOCOL_VERSION,
            engine: self.engine.name(),
            image_formats: KNOWN_IMAGE_FORMATS,
        }
    }

    pub fn get_metadata(
        &self,
        video_bytes: Vec<u8>,
        extension: &str,
    ) -> Result<MetadataResult, AppError> {
        let source = VideoSource::new(video_bytes, extension)?;
        extract_metadata(self.engine.as_ref(), &self.temp, &source)
    }

    pub fn generate_thumbnails(
        &self,
        video_bytes: Vec<u8>,
        extension: &str,
        timestamps: &TimestampRequest,
        image_width: u32,
        thumbnail_format: &str,
    ) -> Result<ThumbnailBatch, AppError> {
        let source = VideoSource::new(video_bytes, extension)?;
        let spec = ThumbnailSpec::new(image_width, thumbnail_format)?;
        thumbnails::generate_thumbnails(
            Arc::clone(&self.engine),
            &self.temp,
            &source,
            timestamps,
            &spec,
            self.config.max_parallel_extractions,
        )
    }

    /// `media.inspect` with untyped params `{videoBytes, extension}`.
    pub fn media_inspect(&self, params: Value) -> Result<Value, AppError> {
        let mut params = expect_object(params)?;
        let video_bytes = parse_video_bytes(&mut params)?;
        let extension = parse_string(&mut params, "extension")?;
        let result = self.get_metadata(video_bytes, &extension)?;
        to_result_value(&result, "metadata")
    }

    /// `media.thumbnails` with untyped params
    /// `{videoBytes, extension, timestampsMs, imageWidth, thumbnailFormat}`.
    pub fn media_thumbnails(&self, params: Value) -> Result<Value, AppError> {
        let mut params = expect_object(params)?;
        let video_bytes = parse_video_bytes(&mut params)?;
        let extension = parse_string(&mut params, "extension")?;
        let timestamps = parse_timestamps(&mut params)?;
        let image_width = parse_image_width(&mut params)?;
        let thumbnail_format = parse_string(&mut params, "thumbnailFormat")?;
        let batch = self.generate_thumbnails(
            video_bytes,
            &extension,
            &timestamps,
            image_width,
            &thumbnail_format,
        )?;
        to_result_value(&batch, "thumbnails")
    }

    /// Removes artifacts a previous process left in the temp dir.
    pub fn cleanup_startup_temp(&self) -> usize {
        cleanup_stale_artifacts(self.temp.dir(), self.config.stale_artifact_max_age)
    }
}

fn to_result_value<T: serde::Serialize>(value: &T, what: &str) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::from(format!("Failed to serialize {}: {}", what, e)))
}

fn expect_object(params: Value) -> Result<Value, AppError> {
    if params.is_object() {
        Ok(params)
    } else {
        Err(AppError::invalid_argument("params must be an object"))
    }
}

fn take_field(params: &mut Value, name: &str) -> Result<Value, AppError> {
    match params.get_mut(name).map(Value::take) {
        None | Some(Value::Null) => Err(AppError::invalid_argument(format!("Missing {}", name))),
        Some(value) => Ok(value),
    }
}

fn parse_video_bytes(params: &mut Value) -> Result<Vec<u8>, AppError> {
    let value = take_field(params, "videoBytes")?;
    serde_json::from_value(value).map_err(|e| {
        AppError::invalid_argument(format!("videoBytes must be an array of bytes: {}", e))
    })
}

fn parse_string(params: &mut Value, name: &str) -> Result<String, AppError> {
    match take_field(params, name)? {
        Value::String(s) => Ok(s),
        other => Err(AppError::invalid_argument(format!(
            "{} must be a string, got {}",
            name, other
        ))),
    }
}

/// Integral entries are kept as given (negative ones are rejected later, per slot);
/// any other entry becomes an invalid slot.
fn parse_timestamps(params: &mut Value) -> Result<TimestampRequest, AppError> {
    match take_field(params, "timestampsMs")? {
        Value::Array(entries) => Ok(TimestampRequest::from_entries(
            entries.iter().map(Value::as_i64).collect(),
        )),
        _ => Err(AppError::invalid_argument("timestampsMs must be an array")),
    }
}

fn parse_image_width(params: &mut Value) -> Result<u32, AppError> {
    let raw = take_field(params, "imageWidth")?
        .as_f64()
        .filter(|w| w.is_finite())
        .ok_or_else(|| AppError::invalid_argument("imageWidth must be a number"))?;
    let rounded = raw.round();
    if rounded < 1.0 || rounded > f64::from(u32::MAX) {
        return Err(AppError::invalid_argument(format!(
            "imageWidth must be at least 1, got {}",
            raw
        )));
    }
    Ok(rounded as u32)
}
