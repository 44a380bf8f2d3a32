pub mod config;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod metadata;
pub mod request;
pub mod sidecar_api;
pub mod temp;
#[cfg(any(test, feature = "integration-test-api"))]
pub mod test_support;
pub mod thumbnails;

pub use config::ThumbnailerConfig;
pub use engine::{FrameRequest, MediaEngine, ProbeInfo};
pub use error::AppError;
pub use request::{MetadataResult, ThumbnailBatch, ThumbnailSpec, TimestampRequest, VideoSource};
