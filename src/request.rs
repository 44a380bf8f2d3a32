//! Request and result types shared by the metadata extractor and the thumbnail batch generator.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

/// Extension tokens handed to the engine as file-name suffixes. Alphanumeric only.
static EXTENSION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]{1,16}$").expect("valid extension regex"));

/// Still-image formats advertised to callers. Any other alphanumeric token is passed through.
pub const KNOWN_IMAGE_FORMATS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff"];

/// Maps a MIME type to a file extension. Unknown video types fall back to `mp4`.
pub fn mime_to_extension(mime: &str) -> Option<&'static str> {
    let mime = mime.trim().to_lowercase();
    let ext = match mime.as_str() {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/3gpp" => "3gp",
        "video/quicktime" => "mov",
        "video/x-msvideo" => "avi",
        "video/x-matroska" => "mkv",
        "video/x-ms-wmv" => "wmv",
        "video/x-flv" => "flv",
        "video/mpeg" => "mpg",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        m if m.starts_with("video/") => "mp4",
        _ => return None,
    };
    Some(ext)
}

/// Normalizes `mp4`, `.MP4` or `video/mp4` to `.mp4`.
pub fn normalize_extension(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.contains('/') {
        return match mime_to_extension(trimmed) {
            Some(ext) => Ok(format!(".{}", ext)),
            None => Err(AppError::invalid_argument(format!(
                "Unsupported MIME type: {:?}",
                raw
            ))),
        };
    }
    let token = trimmed.trim_start_matches('.').to_lowercase();
    if !EXTENSION_TOKEN.is_match(&token) {
        return Err(AppError::invalid_argument(format!(
            "Invalid extension: {:?}",
            raw
        )));
    }
    Ok(format!(".{}", token))
}

/// Immutable video bytes plus their declared container extension (normalized, leading dot).
#[derive(Debug, Clone)]
pub struct VideoSource {
    bytes: Vec<u8>,
    extension: String,
}

impl VideoSource {
    pub fn new(bytes: Vec<u8>, extension: &str) -> Result<Self, AppError> {
        Ok(Self {
            bytes,
            extension: normalize_extension(extension)?,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

/// Ordered millisecond offsets. Position is the only identity an entry has.
///
/// `None` marks an entry that was not an integral millisecond count; negative values are
/// kept as given. Both kinds are invalid per-entry and leave their slot empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampRequest {
    entries: Vec<Option<i64>>,
}

impl TimestampRequest {
    pub fn from_millis(millis: impl IntoIterator<Item = i64>) -> Self {
        Self {
            entries: millis.into_iter().map(Some).collect(),
        }
    }

    pub fn from_entries(entries: Vec<Option<i64>>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Option<i64>] {
        &self.entries
    }

    /// `(slot index, offset ms)` for every entry that can be sampled, in input order.
    pub fn valid_entries(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Some(ms) if *ms >= 0 => Some((index, *ms as u64)),
                _ => None,
            })
    }
}

/// Output width (height follows the source aspect ratio) and still-image format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailSpec {
    width: u32,
    image_extension: String,
}

impl ThumbnailSpec {
    pub fn new(width: u32, format: &str) -> Result<Self, AppError> {
        if width == 0 {
            return Err(AppError::invalid_argument("imageWidth must be positive"));
        }
        Ok(Self {
            width,
            image_extension: normalize_extension(format)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Normalized image extension with leading dot, e.g. `.jpg`.
    pub fn image_extension(&self) -> &str {
        &self.image_extension
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResult {
    pub duration_ms: f64,
    pub width: i32,
    pub height: i32,
    pub file_size_bytes: i64,
    /// Container format name as reported by the engine (e.g. `mov,mp4,m4a,3gp,3g2,mj2`).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub format: Option<String>,
}

/// One slot per requested timestamp, in request order. `None` = that timestamp could not be sampled.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct ThumbnailBatch {
    slots: Vec<Option<Vec<u8>>>,
}

impl ThumbnailBatch {
    pub fn from_slots(slots: Vec<Option<Vec<u8>>>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[Option<Vec<u8>>] {
        &self.slots
    }

    pub fn filled_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_leading_dot_and_lowercases() {
        assert_eq!(normalize_extension("mp4").unwrap(), ".mp4");
        assert_eq!(normalize_extension(".MOV").unwrap(), ".mov");
        assert_eq!(normalize_extension("  jpg ").unwrap(), ".jpg");
    }

    #[test]
    fn normalize_maps_mime_types() {
        assert_eq!(normalize_extension("video/quicktime").unwrap(), ".mov");
        assert_eq!(normalize_extension("video/x-matroska").unwrap(), ".mkv");
        assert_eq!(normalize_extension("video/something-new").unwrap(), ".mp4");
        assert_eq!(normalize_extension("image/jpeg").unwrap(), ".jpg");
    }

    #[test]
    fn normalize_rejects_paths_and_empty() {
        for bad in ["", ".", "../etc", "mp4 -y", "text/plain", "a\\b"] {
            let err = normalize_extension(bad).expect_err(bad);
            assert_eq!(err.code(), "InvalidArgument", "{:?}", bad);
        }
    }

    #[test]
    fn valid_entries_skip_negative_and_missing() {
        let request = TimestampRequest::from_entries(vec![Some(0), None, Some(-5), Some(2500), Some(0)]);
        let valid: Vec<_> = request.valid_entries().collect();
        assert_eq!(valid, vec![(0, 0), (3, 2500), (4, 0)]);
        assert_eq!(request.len(), 5);
    }

    #[test]
    fn spec_rejects_zero_width() {
        let err = ThumbnailSpec::new(0, "jpg").expect_err("zero width");
        assert_eq!(err.code(), "InvalidArgument");
        let spec = ThumbnailSpec::new(100, "png").unwrap();
        assert_eq!(spec.image_extension(), ".png");
    }

    #[test]
    fn metadata_serializes_camel_case() {
        let meta = MetadataResult {
            duration_ms: 10_000.0,
            width: 1920,
            height: 1080,
            file_size_bytes: 42,
            format: None,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["durationMs"], 10_000.0);
        assert_eq!(json["fileSizeBytes"], 42);
        assert!(json.get("format").is_none());
    }

    #[test]
    fn batch_serializes_as_plain_sequence() {
        let batch = ThumbnailBatch::from_slots(vec![Some(vec![1, 2]), None]);
        assert_eq!(serde_json::to_string(&batch).unwrap(), "[[1,2],null]");
        assert_eq!(batch.filled_count(), 1);
    }
}
